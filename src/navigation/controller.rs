// src/navigation/controller.rs
// Delivers supervisor commands to whatever executes them.

use super::Command;
use crate::CourierError;
use log::info;

/// Receives the single command the supervisor emits each tick.
///
/// Implemented by the ROS 2 publishers in production and by mocks in tests.
pub trait CommandSink {
    /// Hands one command to the pose controller, the navigator or the velocity driver
    fn send(&mut self, command: &Command) -> Result<(), CourierError>;
}

/// Sink that only logs commands, for dry runs without a robot.
/// Repeated identical commands are logged once.
#[derive(Debug, Default)]
pub struct LoggingSink {
    last: Option<Command>,
    sent: u64,
}

impl LoggingSink {
    /// Creates a logging sink
    pub fn new() -> Self {
        LoggingSink::default()
    }

    /// Number of commands received so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Most recent command
    pub fn last(&self) -> Option<Command> {
        self.last
    }
}

impl CommandSink for LoggingSink {
    fn send(&mut self, command: &Command) -> Result<(), CourierError> {
        if self.last.as_ref() != Some(command) {
            match command {
                Command::Hold => info!("Executing command: hold"),
                Command::GoToPose(goal) => info!(
                    "Executing command: pose x={:.3}, y={:.3}, theta={:.3}",
                    goal.x, goal.y, goal.theta
                ),
                Command::NavigateTo(goal) => info!(
                    "Executing command: navigate x={:.3}, y={:.3}, theta={:.3}",
                    goal.x, goal.y, goal.theta
                ),
            }
        }
        self.last = Some(*command);
        self.sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::Goal;

    #[test]
    fn counts_and_remembers_commands() {
        let mut sink = LoggingSink::new();
        sink.send(&Command::Hold).unwrap();
        sink.send(&Command::NavigateTo(Goal::new(1.0, 2.0, 0.0))).unwrap();
        assert_eq!(sink.sent(), 2);
        assert_eq!(sink.last(), Some(Command::NavigateTo(Goal::new(1.0, 2.0, 0.0))));
    }
}

//! Navigation targets and commands for Eos Courier
//!
//! This module holds the goal representation, the per-axis arrival predicate
//! and the command vocabulary the supervisor emits to the pose controller and
//! the navigator.

/// Command output seam
pub mod controller;
/// Delivery goal sequencing
pub mod planner;

pub use controller::{CommandSink, LoggingSink};
pub use planner::{Assignment, assign_next_goal};

use crate::core::Pose;
use serde::{Deserialize, Serialize};

/// Target pose for pose-hold or navigation, in the world frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    /// X position (meters)
    pub x: f64,
    /// Y position (meters)
    pub y: f64,
    /// Heading (radians)
    pub theta: f64,
}

impl Goal {
    /// Creates a goal from a full triple
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Goal { x, y, theta }
    }

    /// Goal at a catalog location, heading zero
    pub fn at_location(x: f64, y: f64) -> Self {
        Goal { x, y, theta: 0.0 }
    }

    /// The coordinate origin, where a finished delivery returns to
    pub fn origin() -> Self {
        Goal { x: 0.0, y: 0.0, theta: 0.0 }
    }
}

impl From<Pose> for Goal {
    fn from(pose: Pose) -> Self {
        Goal::new(pose.x, pose.y, pose.theta)
    }
}

/// Independent per-axis arrival thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Bound on |dx| and on |dy| (meters)
    pub position: f64,
    /// Bound on |dtheta| (radians)
    pub heading: f64,
}

impl Tolerance {
    /// Loose window used at pickups during delivery
    pub const PICKUP_COARSE: Tolerance = Tolerance { position: 0.5, heading: 1.5 };

    /// Creates a tolerance
    pub fn new(position: f64, heading: f64) -> Self {
        Tolerance { position, heading }
    }

    /// True iff every axis difference is strictly below its bound.
    ///
    /// Position is checked per axis rather than by Euclidean distance, and the
    /// heading difference is not wrapped.
    pub fn contains(&self, pose: &Pose, goal: &Goal) -> bool {
        (goal.x - pose.x).abs() < self.position
            && (goal.y - pose.y).abs() < self.position
            && (goal.theta - pose.theta).abs() < self.heading
    }
}

/// One outbound command per control tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Zero linear and angular velocity
    Hold,
    /// Direct pose control towards the goal
    GoToPose(Goal),
    /// Path-planned navigation towards the goal
    NavigateTo(Goal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn nav() -> Tolerance {
        Tolerance::new(0.15, 1.0)
    }

    #[rstest]
    #[case(0.0, 0.0, 0.0, true)]
    #[case(0.149, -0.149, 0.99, true)]
    #[case(0.15, 0.0, 0.0, false)]
    #[case(0.0, -0.15, 0.0, false)]
    #[case(0.0, 0.0, 1.0, false)]
    #[case(0.1, 0.1, -1.0, false)]
    fn close_to_is_strict_per_axis(
        #[case] dx: f64,
        #[case] dy: f64,
        #[case] dtheta: f64,
        #[case] expected: bool,
    ) {
        let pose = Pose::new(dx, dy, dtheta);
        assert_eq!(nav().contains(&pose, &Goal::origin()), expected);
    }

    #[test]
    fn position_check_is_not_euclidean() {
        // Both axes just inside: Euclidean distance ~0.198 still counts as close.
        let pose = Pose::new(0.14, 0.14, 0.0);
        assert!(nav().contains(&pose, &Goal::origin()));
    }

    #[test]
    fn heading_is_not_wrapped() {
        let pose = Pose::new(0.0, 0.0, std::f64::consts::PI - 0.01);
        let goal = Goal::new(0.0, 0.0, -std::f64::consts::PI + 0.01);
        assert!(!nav().contains(&pose, &goal));
    }

    #[test]
    fn coarse_window_is_looser_than_navigation() {
        let pose = Pose::new(0.4, -0.4, 1.4);
        assert!(Tolerance::PICKUP_COARSE.contains(&pose, &Goal::origin()));
        assert!(!nav().contains(&pose, &Goal::origin()));
    }
}

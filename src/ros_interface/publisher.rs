use crate::navigation::{Command, CommandSink, Goal};
use crate::{CourierError, TopicConfig};
use log::debug;
use r2r::geometry_msgs::msg::{Pose2D, Twist};
use r2r::QosProfile;

/// Publishes each supervisor command on the topic its kind belongs to
pub struct RosCommandSink {
    cmd_pose: r2r::Publisher<Pose2D>,
    cmd_nav: r2r::Publisher<Pose2D>,
    cmd_vel: r2r::Publisher<Twist>,
}

impl RosCommandSink {
    /// Create the pose, navigation and velocity publishers
    pub fn new(node: &mut r2r::Node, topics: &TopicConfig) -> Result<Self, CourierError> {
        let qos = QosProfile::default();
        Ok(RosCommandSink {
            cmd_pose: node.create_publisher::<Pose2D>(&topics.cmd_pose, qos.clone())?,
            cmd_nav: node.create_publisher::<Pose2D>(&topics.cmd_nav, qos.clone())?,
            cmd_vel: node.create_publisher::<Twist>(&topics.cmd_vel, qos)?,
        })
    }
}

fn pose_msg(goal: &Goal) -> Pose2D {
    Pose2D { x: goal.x, y: goal.y, theta: goal.theta }
}

impl CommandSink for RosCommandSink {
    fn send(&mut self, command: &Command) -> Result<(), CourierError> {
        let published = match command {
            // All-zero twist
            Command::Hold => self.cmd_vel.publish(&Twist::default()),
            Command::GoToPose(goal) => self.cmd_pose.publish(&pose_msg(goal)),
            Command::NavigateTo(goal) => self.cmd_nav.publish(&pose_msg(goal)),
        };
        published.map_err(|e| CourierError::CommandError(format!("{:?}: {}", command, e)))?;
        debug!("Published {:?}", command);
        Ok(())
    }
}

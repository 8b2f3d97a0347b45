//! ROS 2 interface for Eos Courier
//!
//! This module owns the r2r node and bridges it to the supervisor:
//! - Subscriptions that turn ROS messages into queued supervisor events
//! - A transform buffer fed from /tf and /tf_static
//! - The pose source and command sink the control loop talks to
//!
//! Everything runs on the control thread. Subscription streams are driven by a
//! local executor that is pumped right after `spin_once`.

mod publisher;
mod subscriber;

pub use publisher::RosCommandSink;
pub use subscriber::OdometryPose;

use crate::core::{LookupError, Pose, PoseSource, SupervisorEvent, TransformBuffer};
use crate::{CourierConfig, CourierError, PoseBackend};
use futures::executor::LocalPool;
use r2r::{Context, Node};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::Duration;

/// ROS 2 interface manager
pub struct RosInterface {
    node: Node,
    pool: LocalPool,
    transforms: Rc<RefCell<TransformBuffer>>,
    odometry: OdometryPose,
    config: CourierConfig,
}

impl RosInterface {
    /// Creates the node and every subscription. Decoded messages go to `events`.
    pub fn new(config: &CourierConfig, events: Sender<SupervisorEvent>) -> Result<Self, CourierError> {
        let context = Context::create()?;
        let mut node = Node::create(context, &config.ros.node_name, "")?;
        let pool = LocalPool::new();
        let transforms = Rc::new(RefCell::new(TransformBuffer::new(
            config.localization.transform_tolerance_secs,
        )));
        let odometry = OdometryPose::default();

        subscriber::subscribe_all(
            &mut node,
            &pool.spawner(),
            &config.ros.topics,
            events,
            transforms.clone(),
            odometry.clone(),
        )?;
        log::info!("ROS node {} subscribed to all inputs", config.ros.node_name);

        Ok(RosInterface {
            node,
            pool,
            transforms,
            odometry,
            config: config.clone(),
        })
    }

    /// Processes pending callbacks once and lets subscription tasks consume them
    pub fn spin_once(&mut self, timeout: Duration) {
        self.node.spin_once(timeout);
        self.pool.run_until_stalled();
    }

    /// Pose source for the configured backend, sharing this node's buffers
    pub fn pose_source(&self) -> RosPoseSource {
        RosPoseSource {
            backend: self.config.localization.backend,
            body_frame: self.config.localization.body_frame.clone(),
            transforms: self.transforms.clone(),
            odometry: self.odometry.clone(),
        }
    }

    /// Creates the three command publishers
    pub fn command_sink(&mut self) -> Result<RosCommandSink, CourierError> {
        RosCommandSink::new(&mut self.node, &self.config.ros.topics)
    }
}

/// Resolves poses from the transform tree, or from odometry for the body frame
pub struct RosPoseSource {
    backend: PoseBackend,
    body_frame: String,
    transforms: Rc<RefCell<TransformBuffer>>,
    odometry: OdometryPose,
}

impl PoseSource for RosPoseSource {
    fn lookup(&mut self, world_frame: &str, body_frame: &str) -> Result<Pose, LookupError> {
        match self.backend {
            PoseBackend::Odometry if body_frame == self.body_frame => self
                .odometry
                .latest()
                .ok_or_else(|| LookupError::NotYetAvailable { frame: body_frame.to_string() }),
            PoseBackend::Odometry | PoseBackend::Tf => {
                self.transforms.borrow().lookup(world_frame, body_frame)
            }
        }
    }
}

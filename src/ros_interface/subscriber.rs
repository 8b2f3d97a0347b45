// src/ros_interface/subscriber.rs
// Subscribes to every supervisor input and converts each message into a
// SupervisorEvent, or into transform buffer and odometry updates.

use crate::TopicConfig;
use crate::core::{FramedPose, Pose, SupervisorEvent, TransformBuffer};
use crate::navigation::Goal;
use crate::CourierError;
use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use futures::{Stream, StreamExt, future};
use log::{debug, warn};
use r2r::{Node, QosProfile};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use r2r::geometry_msgs::msg::{Pose2D, PoseStamped, TransformStamped};
use r2r::nav_msgs::msg::Odometry;
use r2r::sensor_msgs::msg::CameraInfo;
use r2r::tf2_msgs::msg::TFMessage;

/// Latest body pose reported by odometry
#[derive(Clone, Default)]
pub struct OdometryPose(Rc<RefCell<Option<Pose>>>);

impl OdometryPose {
    /// Newest odometry pose, if any arrived
    pub fn latest(&self) -> Option<Pose> {
        *self.0.borrow()
    }

    fn update(&self, pose: Pose) {
        *self.0.borrow_mut() = Some(pose);
    }
}

fn stamp_secs(stamp: &r2r::builtin_interfaces::msg::Time) -> f64 {
    stamp.sec as f64 + stamp.nanosec as f64 * 1e-9
}

fn pose_from_msg(pose: &r2r::geometry_msgs::msg::Pose) -> Pose {
    let p = &pose.position;
    let q = &pose.orientation;
    Pose::from_translation_rotation([p.x, p.y, p.z], [q.x, q.y, q.z, q.w])
}

fn store_transforms(buffer: &RefCell<TransformBuffer>, msg: TFMessage, is_static: bool) {
    let mut buffer = buffer.borrow_mut();
    for TransformStamped { header, child_frame_id, transform } in msg.transforms {
        let t = &transform.translation;
        let r = &transform.rotation;
        let pose = Pose::from_translation_rotation([t.x, t.y, t.z], [r.x, r.y, r.z, r.w]);
        buffer.set_transform(&header.frame_id, &child_frame_id, pose, stamp_secs(&header.stamp), is_static);
    }
}

fn forward(events: &Sender<SupervisorEvent>, event: SupervisorEvent) {
    let kind = event.kind();
    if events.send(event).is_err() {
        debug!("Control loop gone, dropping {} event", kind);
    }
}

// Drives `stream` on the local executor, handing each message to `handle`
fn spawn_stream<T, S, F>(spawner: &LocalSpawner, stream: S, mut handle: F) -> Result<(), CourierError>
where
    S: Stream<Item = T> + Unpin + 'static,
    F: FnMut(T) + 'static,
{
    spawner
        .spawn_local(stream.for_each(move |msg| {
            handle(msg);
            future::ready(())
        }))
        .map_err(|e| CourierError::RosError(format!("failed to spawn subscription task: {}", e)))
}

/// Subscribes to every input topic
pub fn subscribe_all(
    node: &mut Node,
    spawner: &LocalSpawner,
    topics: &TopicConfig,
    events: Sender<SupervisorEvent>,
    transforms: Rc<RefCell<TransformBuffer>>,
    odometry: OdometryPose,
) -> Result<(), CourierError> {
    let qos = QosProfile::default();

    let tf = node.subscribe::<TFMessage>("/tf", qos.clone())?;
    let buffer = transforms.clone();
    spawn_stream(spawner, tf, move |msg| store_transforms(&buffer, msg, false))?;

    let tf_static = node.subscribe::<TFMessage>("/tf_static", qos.clone().transient_local())?;
    let buffer = transforms;
    spawn_stream(spawner, tf_static, move |msg| store_transforms(&buffer, msg, true))?;

    let odom = node.subscribe::<Odometry>(&topics.odometry, qos.clone())?;
    spawn_stream(spawner, odom, move |msg: Odometry| odometry.update(pose_from_msg(&msg.pose.pose)))?;

    let camera_info = node.subscribe::<CameraInfo>(&topics.camera_info, qos.clone())?;
    let tx = events.clone();
    spawn_stream(spawner, camera_info, move |msg: CameraInfo| {
        forward(&tx, SupervisorEvent::CameraInfo(msg.k.to_vec()))
    })?;

    let stop_sign = node.subscribe::<r2r::std_msgs::msg::String>(&topics.stop_sign, qos.clone())?;
    let tx = events.clone();
    spawn_stream(spawner, stop_sign, move |msg: r2r::std_msgs::msg::String| {
        match SupervisorEvent::detection_from_json(&msg.data) {
            Ok(event) => forward(&tx, event),
            Err(e) => warn!("{}", e),
        }
    })?;

    let nav_pose = node.subscribe::<Pose2D>(&topics.nav_pose, qos.clone())?;
    let tx = events.clone();
    spawn_stream(spawner, nav_pose, move |msg: Pose2D| {
        forward(&tx, SupervisorEvent::NavGoal(Goal::new(msg.x, msg.y, msg.theta)))
    })?;

    let click_goal = node.subscribe::<PoseStamped>(&topics.click_goal, qos.clone())?;
    let tx = events.clone();
    spawn_stream(spawner, click_goal, move |msg: PoseStamped| {
        let framed = FramedPose { frame_id: msg.header.frame_id.clone(), pose: pose_from_msg(&msg.pose) };
        forward(&tx, SupervisorEvent::ClickGoal(framed))
    })?;

    let food = node.subscribe::<r2r::std_msgs::msg::String>(&topics.food_location, qos.clone())?;
    let tx = events.clone();
    spawn_stream(spawner, food, move |msg: r2r::std_msgs::msg::String| {
        match SupervisorEvent::food_locations_from_json(&msg.data) {
            Ok(event) => forward(&tx, event),
            Err(e) => warn!("{}", e),
        }
    })?;

    let requests = node.subscribe::<r2r::std_msgs::msg::String>(&topics.delivery_request, qos)?;
    let tx = events;
    spawn_stream(spawner, requests, move |msg: r2r::std_msgs::msg::String| {
        forward(&tx, SupervisorEvent::DeliveryRequest(msg.data))
    })?;

    Ok(())
}

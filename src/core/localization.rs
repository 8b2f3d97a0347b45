// core/localization.rs

// Resolves the robot pose in the world frame once per tick. Lookups go through
// the PoseSource seam; failures keep the previous pose so a late transform tree
// at startup never stops the control loop. Also hosts the 2D frame tree that
// the ROS bridge feeds from /tf.

use log::{debug, info, warn};
use nalgebra::{Isometry2, Quaternion, UnitQuaternion, Vector2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pose: robot position (x, y) and heading in the world frame
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Pose {
    /// X position (meters)
    pub x: f64,
    /// Y position (meters)
    pub y: f64,
    /// Orientation (radians)
    pub theta: f64,
}

impl Pose {
    /// Creates a pose from a full triple
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Planar pose from a 3D translation and an (x, y, z, w) quaternion
    pub fn from_translation_rotation(translation: [f64; 3], rotation: [f64; 4]) -> Self {
        let [qx, qy, qz, qw] = rotation;
        let yaw = UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz))
            .euler_angles()
            .2;
        Pose::new(translation[0], translation[1], yaw)
    }

    /// Euclidean distance in the plane
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (Vector2::new(self.x, self.y) - Vector2::new(other.x, other.y)).norm()
    }

    /// Rigid transform placing the body frame in the world frame
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.x, self.y), self.theta)
    }

    /// Inverse of `to_isometry`
    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Pose::new(iso.translation.vector.x, iso.translation.vector.y, iso.rotation.angle())
    }
}

/// A pose expressed in a named frame, as carried by click goals
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FramedPose {
    /// Frame the pose is expressed in; empty means the world frame
    pub frame_id: String,
    /// Pose inside `frame_id`
    pub pose: Pose,
}

/// Why a frame lookup produced no pose
#[derive(Debug, Clone, PartialEq)]
pub enum LookupError {
    /// Frame has not been published yet
    NotYetAvailable {
        /// The unknown frame
        frame: String,
    },
    /// Both frames are known but belong to disconnected trees
    Connectivity {
        /// Frame the pose was requested in
        target: String,
        /// Frame whose pose was requested
        source: String,
    },
    /// A dynamic link on the path is older than the tolerance allows
    Extrapolation {
        /// Child frame of the stale link
        frame: String,
        /// How far the link lags the newest data (seconds)
        lag_secs: f64,
    },
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LookupError::NotYetAvailable { frame } => {
                write!(f, "frame {} is not available yet", frame)
            }
            LookupError::Connectivity { target, source } => {
                write!(f, "frames {} and {} are not connected", target, source)
            }
            LookupError::Extrapolation { frame, lag_secs } => {
                write!(f, "transform to {} lags newest data by {:.3}s", frame, lag_secs)
            }
        }
    }
}

impl std::error::Error for LookupError {}

/// Anything that can place one frame inside another
pub trait PoseSource {
    /// Latest pose of `body_frame` expressed in `world_frame`
    fn lookup(&mut self, world_frame: &str, body_frame: &str) -> Result<Pose, LookupError>;
}

/// Expresses a framed pose in the world frame
pub fn transform_into(
    source: &mut dyn PoseSource,
    world_frame: &str,
    framed: &FramedPose,
) -> Result<Pose, LookupError> {
    let frame = normalize(&framed.frame_id);
    if frame.is_empty() || frame == normalize(world_frame) {
        return Ok(framed.pose);
    }
    let world_from_frame = source.lookup(world_frame, frame)?.to_isometry();
    Ok(Pose::from_isometry(&(world_from_frame * framed.pose.to_isometry())))
}

fn normalize(frame: &str) -> &str {
    frame.trim_start_matches('/')
}

/// Keeps the last resolved pose and refreshes it once per tick
pub struct PoseAdapter {
    world_frame: String,
    body_frame: String,
    pose: Pose,
    resolved: bool,
    misses: u64,
}

impl PoseAdapter {
    /// Adapter for `body_frame` in `world_frame`, unresolved until the first lookup succeeds
    pub fn new(world_frame: &str, body_frame: &str) -> Self {
        PoseAdapter {
            world_frame: world_frame.to_string(),
            body_frame: body_frame.to_string(),
            pose: Pose::default(),
            resolved: false,
            misses: 0,
        }
    }

    /// Best-effort startup pose; the coordinate origin when nothing resolves yet
    pub fn capture_origin(&mut self, source: &mut dyn PoseSource) -> Pose {
        match source.lookup(&self.world_frame, &self.body_frame) {
            Ok(origin) => {
                info!("Origin pose: x={:.3}, y={:.3}, theta={:.3}", origin.x, origin.y, origin.theta);
                self.pose = origin;
                self.resolved = true;
                origin
            }
            Err(e) => {
                warn!("Origin pose unavailable ({}), using coordinate origin", e);
                Pose::default()
            }
        }
    }

    /// Returns true when the pose was updated this tick.
    pub fn refresh(&mut self, source: &mut dyn PoseSource) -> bool {
        match source.lookup(&self.world_frame, &self.body_frame) {
            Ok(pose) => {
                if !self.resolved {
                    info!("Pose resolved after {} missed ticks", self.misses);
                }
                self.pose = pose;
                self.resolved = true;
                self.misses = 0;
                true
            }
            // Every failure kind is retried next tick with the last pose.
            Err(
                e @ (LookupError::NotYetAvailable { .. }
                | LookupError::Connectivity { .. }
                | LookupError::Extrapolation { .. }),
            ) => {
                self.misses += 1;
                debug!("Pose lookup failed ({}), keeping previous pose", e);
                false
            }
        }
    }

    /// Last resolved pose, the coordinate origin before any
    pub fn current(&self) -> Pose {
        self.pose
    }

    /// True once any lookup has succeeded
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Frame poses are expressed in
    pub fn world_frame(&self) -> &str {
        &self.world_frame
    }
}

struct Link {
    parent: String,
    transform: Isometry2<f64>, // child pose in the parent frame
    stamp: f64,
    is_static: bool,
}

/// Planar frame tree keyed by child frame
pub struct TransformBuffer {
    links: HashMap<String, Link>,
    tolerance_secs: f64,
    newest_stamp: f64,
}

impl TransformBuffer {
    /// Empty buffer; dynamic links may lag the newest data by `tolerance_secs`
    pub fn new(tolerance_secs: f64) -> Self {
        TransformBuffer {
            links: HashMap::new(),
            tolerance_secs,
            newest_stamp: f64::NEG_INFINITY,
        }
    }

    /// Stores the pose of `child` in `parent`, replacing any earlier link of `child`
    pub fn set_transform(&mut self, parent: &str, child: &str, pose: Pose, stamp: f64, is_static: bool) {
        if !is_static && stamp > self.newest_stamp {
            self.newest_stamp = stamp;
        }
        self.links.insert(
            normalize(child).to_string(),
            Link {
                parent: normalize(parent).to_string(),
                transform: pose.to_isometry(),
                stamp,
                is_static,
            },
        );
    }

    fn is_known(&self, frame: &str) -> bool {
        self.links.contains_key(frame) || self.links.values().any(|link| link.parent == frame)
    }

    // Frames from `frame` up to its root with the pose of `frame` in each
    fn chain(&self, frame: &str) -> Vec<(String, Isometry2<f64>, Option<&Link>)> {
        let mut chain = vec![(frame.to_string(), Isometry2::identity(), None)];
        let mut current = frame.to_string();
        let mut accumulated = Isometry2::identity();
        while let Some(link) = self.links.get(&current) {
            accumulated = link.transform * accumulated;
            current = link.parent.clone();
            if chain.iter().any(|(name, _, _)| *name == current) {
                break; // cycle
            }
            chain.push((current.clone(), accumulated, Some(link)));
        }
        chain
    }

    fn check_lag(&self, frame: &str, link: Option<&Link>) -> Result<(), LookupError> {
        match link {
            Some(link) if !link.is_static => {
                let lag_secs = self.newest_stamp - link.stamp;
                if lag_secs > self.tolerance_secs {
                    return Err(LookupError::Extrapolation { frame: frame.to_string(), lag_secs });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Pose of `source` expressed in `target`
    pub fn lookup(&self, target: &str, source: &str) -> Result<Pose, LookupError> {
        let (target, source) = (normalize(target), normalize(source));
        if target != source {
            for frame in [source, target] {
                if !self.is_known(frame) {
                    return Err(LookupError::NotYetAvailable { frame: frame.to_string() });
                }
            }
        }

        let source_chain = self.chain(source);
        let target_chain = self.chain(target);
        for (i, (ancestor, ancestor_from_source, _)) in source_chain.iter().enumerate() {
            if let Some(j) = target_chain.iter().position(|(name, _, _)| name == ancestor) {
                for (name, _, link) in source_chain[..=i].iter().chain(&target_chain[..=j]) {
                    self.check_lag(name, *link)?;
                }
                let ancestor_from_target = target_chain[j].1;
                let target_from_source = ancestor_from_target.inverse() * *ancestor_from_source;
                return Ok(Pose::from_isometry(&target_from_source));
            }
        }
        Err(LookupError::Connectivity { target: target.to_string(), source: source.to_string() })
    }
}

impl PoseSource for TransformBuffer {
    fn lookup(&mut self, world_frame: &str, body_frame: &str) -> Result<Pose, LookupError> {
        TransformBuffer::lookup(self, world_frame, body_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn assert_pose(actual: Pose, expected: Pose) {
        assert!((actual.x - expected.x).abs() < EPS, "{:?} != {:?}", actual, expected);
        assert!((actual.y - expected.y).abs() < EPS, "{:?} != {:?}", actual, expected);
        assert!((actual.theta - expected.theta).abs() < EPS, "{:?} != {:?}", actual, expected);
    }

    fn tree() -> TransformBuffer {
        let mut buffer = TransformBuffer::new(0.5);
        buffer.set_transform("map", "odom", Pose::new(1.0, 0.0, FRAC_PI_2), 10.0, false);
        buffer.set_transform("/odom", "/base_footprint", Pose::new(2.0, 0.0, 0.0), 10.0, false);
        buffer
    }

    #[test]
    fn yaw_from_quaternion() {
        let half = FRAC_PI_2 / 2.0;
        let pose = Pose::from_translation_rotation([1.0, 2.0, 0.3], [0.0, 0.0, half.sin(), half.cos()]);
        assert_pose(pose, Pose::new(1.0, 2.0, FRAC_PI_2));
    }

    #[test]
    fn composes_through_the_chain() {
        let pose = tree().lookup("map", "base_footprint").unwrap();
        assert_pose(pose, Pose::new(1.0, 2.0, FRAC_PI_2));
    }

    #[test]
    fn inverse_lookup_through_common_ancestor() {
        let mut buffer = tree();
        buffer.set_transform("map", "camera_goal_frame", Pose::new(1.0, 2.0, FRAC_PI_2), 10.0, true);
        let pose = buffer.lookup("base_footprint", "camera_goal_frame").unwrap();
        assert_pose(pose, Pose::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn unknown_frame_is_not_yet_available() {
        let err = TransformBuffer::new(0.5).lookup("map", "base_footprint").unwrap_err();
        assert!(matches!(err, LookupError::NotYetAvailable { .. }));
    }

    #[test]
    fn disjoint_trees_are_not_connected() {
        let mut buffer = tree();
        buffer.set_transform("world", "rack", Pose::default(), 10.0, true);
        let err = buffer.lookup("map", "rack").unwrap_err();
        assert!(matches!(err, LookupError::Connectivity { .. }));
    }

    #[test]
    fn lagging_dynamic_link_is_rejected_but_static_is_not() {
        let mut buffer = tree();
        buffer.set_transform("map", "odom", Pose::new(1.0, 0.0, FRAC_PI_2), 11.0, false);
        buffer.set_transform("odom", "base_footprint", Pose::new(2.0, 0.0, 0.0), 10.2, false);
        assert!(matches!(
            buffer.lookup("map", "base_footprint"),
            Err(LookupError::Extrapolation { .. })
        ));

        buffer.set_transform("map", "dock", Pose::new(3.0, 3.0, 0.0), 0.0, true);
        assert_pose(buffer.lookup("map", "dock").unwrap(), Pose::new(3.0, 3.0, 0.0));
    }

    #[test]
    fn adapter_keeps_stale_pose_on_failure() {
        let mut buffer = tree();
        let mut adapter = PoseAdapter::new("map", "base_footprint");
        assert!(adapter.refresh(&mut buffer));
        let before = adapter.current();

        let mut empty = TransformBuffer::new(0.5);
        assert!(!adapter.refresh(&mut empty));
        assert_eq!(adapter.current(), before);
        assert!(adapter.is_resolved());
    }

    #[test]
    fn origin_defaults_when_unavailable() {
        let mut adapter = PoseAdapter::new("map", "base_footprint");
        let origin = adapter.capture_origin(&mut TransformBuffer::new(0.5));
        assert_eq!(origin, Pose::default());
        assert!(!adapter.is_resolved());
    }

    #[test]
    fn click_goal_in_world_frame_passes_through() {
        let framed = FramedPose { frame_id: "/map".into(), pose: Pose::new(4.0, 5.0, 0.1) };
        let pose = transform_into(&mut TransformBuffer::new(0.5), "map", &framed).unwrap();
        assert_eq!(pose, framed.pose);
    }

    #[test]
    fn click_goal_is_moved_into_world_frame() {
        let framed = FramedPose { frame_id: "odom".into(), pose: Pose::new(2.0, 0.0, 0.0) };
        let pose = transform_into(&mut tree(), "map", &framed).unwrap();
        assert_pose(pose, Pose::new(1.0, 2.0, FRAC_PI_2));
    }
}

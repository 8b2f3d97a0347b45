//! Eos Courier - supervisory controller for discover-then-deliver missions
//!
//! This library provides the mode state machine that drives a mobile robot through
//! a bounded discovery period and then through a sequence of delivery requests,
//! together with the pose adaptation, detection handling, goal queueing and the
//! optional ROS 2 bridge it talks through.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Supervisor state machine and its runtime
pub mod core;
pub mod navigation;
#[cfg(feature = "ros")]
pub mod ros_interface;

// Re-export commonly used items for easier access
pub use crate::core::{
    Core, FramedPose, Mode, Phase, Pose, PoseAdapter, PoseSource, Supervisor, SupervisorEvent,
    TickOutcome,
};
pub use navigation::{Command, CommandSink, Goal, LoggingSink, Tolerance};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Eos Courier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    /// Mode state machine thresholds and timers
    pub supervisor: SupervisorConfig,
    /// Pose source and frame selection
    pub localization: LocalizationConfig,
    /// Detection range model
    pub perception: PerceptionConfig,
    /// ROS 2 node and topic names
    pub ros: RosConfig,
}

impl CourierConfig {
    /// Load and validate a configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CourierError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CourierError::ConfigError(format!("failed to open {}: {}", path.display(), e))
        })?;
        let config: CourierConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, CourierError> {
        let config: CourierConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every section for values the controller cannot run with
    pub fn validate(&self) -> Result<(), CourierError> {
        self.supervisor.validate()?;
        self.localization.validate()?;
        self.perception.validate()
    }
}

/// Thresholds and timers of the mode state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Per-axis position threshold for "at goal" (meters)
    pub pos_eps: f64,
    /// Heading threshold for "at goal" (radians)
    pub theta_eps: f64,
    /// Distance to the origin under which discovery may finish (meters)
    pub dis_thres: f64,
    /// Dwell time at a stop sign and at a pickup (seconds)
    pub stop_time_secs: f64,
    /// Range under which a stop sign is obeyed (meters)
    pub stop_min_dist: f64,
    /// Time spent crossing an intersection (seconds)
    pub crossing_time_secs: f64,
    /// Minimum discovery duration (seconds)
    pub discover_time_secs: f64,
    /// Tick rate of the control loop (Hz)
    pub control_rate_hz: f64,
    /// Arrival tolerance used by POSE during delivery
    pub pickup_tolerance: PickupTolerance,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            pos_eps: 0.15,
            theta_eps: 1.0,
            dis_thres: 0.3,
            stop_time_secs: 3.0,
            stop_min_dist: 0.5,
            crossing_time_secs: 3.0,
            discover_time_secs: 60.0,
            control_rate_hz: 10.0,
            pickup_tolerance: PickupTolerance::Coarse,
        }
    }
}

impl SupervisorConfig {
    /// Checks thresholds, durations and the control rate
    pub fn validate(&self) -> Result<(), CourierError> {
        let non_negative = [
            ("pos_eps", self.pos_eps),
            ("theta_eps", self.theta_eps),
            ("dis_thres", self.dis_thres),
            ("stop_time_secs", self.stop_time_secs),
            ("stop_min_dist", self.stop_min_dist),
            ("crossing_time_secs", self.crossing_time_secs),
            ("discover_time_secs", self.discover_time_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(CourierError::ConfigError(format!(
                    "supervisor.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.control_rate_hz.is_finite() || self.control_rate_hz <= 0.0 {
            return Err(CourierError::ConfigError(format!(
                "supervisor.control_rate_hz must be positive, got {}",
                self.control_rate_hz
            )));
        }

        // Every duration the tick reads must be representable
        let durations = [
            ("stop_time_secs", self.stop_time_secs),
            ("crossing_time_secs", self.crossing_time_secs),
            ("discover_time_secs", self.discover_time_secs),
            ("control_rate_hz", 1.0 / self.control_rate_hz),
        ];
        for (name, secs) in durations {
            if let Err(e) = Duration::try_from_secs_f64(secs) {
                return Err(CourierError::ConfigError(format!(
                    "supervisor.{} gives an unusable duration of {}s: {}",
                    name, secs, e
                )));
            }
        }
        Ok(())
    }

    /// Stop-sign and pickup dwell time
    pub fn stop_time(&self) -> Duration {
        Duration::from_secs_f64(self.stop_time_secs)
    }

    /// Intersection crossing time
    pub fn crossing_time(&self) -> Duration {
        Duration::from_secs_f64(self.crossing_time_secs)
    }

    /// Minimum discovery duration
    pub fn discover_time(&self) -> Duration {
        Duration::from_secs_f64(self.discover_time_secs)
    }

    /// Period of one control tick
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.control_rate_hz)
    }

    /// Tolerance shared by NAV and discovery-phase POSE
    pub fn navigation_tolerance(&self) -> Tolerance {
        Tolerance::new(self.pos_eps, self.theta_eps)
    }

    /// Tolerance used by POSE while delivering
    pub fn pickup_tolerance(&self) -> Tolerance {
        match self.pickup_tolerance {
            PickupTolerance::Coarse => Tolerance::PICKUP_COARSE,
            PickupTolerance::Navigation => self.navigation_tolerance(),
        }
    }
}

/// Which arrival check delivery-phase POSE uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickupTolerance {
    /// Fixed 0.5 m / 0.5 m / 1.5 rad window
    Coarse,
    /// Same thresholds as navigation
    Navigation,
}

/// Where the robot pose comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoseBackend {
    /// Transform tree lookup of world frame to body frame
    Tf,
    /// Latest odometry message (simulator ground truth)
    Odometry,
}

/// Pose source and frame selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizationConfig {
    /// Pose backend
    pub backend: PoseBackend,
    /// `true` when a SLAM map frame exists, `false` for odometry-relative framing
    pub mapping: bool,
    /// Robot body frame
    pub body_frame: String,
    /// Maximum lag of a dynamic transform behind the newest received data (seconds)
    pub transform_tolerance_secs: f64,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        LocalizationConfig {
            backend: PoseBackend::Tf,
            mapping: true,
            body_frame: "base_footprint".to_string(),
            transform_tolerance_secs: 1.0,
        }
    }
}

impl LocalizationConfig {
    /// World frame in which poses and goals are expressed
    pub fn world_frame(&self) -> &'static str {
        if self.mapping { "map" } else { "odom" }
    }

    fn validate(&self) -> Result<(), CourierError> {
        // Odometry poses are expressed in the odom frame
        if self.backend == PoseBackend::Odometry && self.mapping {
            return Err(CourierError::ConfigError(
                "localization.backend odometry requires mapping: false".to_string(),
            ));
        }
        if self.body_frame.trim_start_matches('/').is_empty() {
            return Err(CourierError::ConfigError(
                "localization.body_frame must not be empty".to_string(),
            ));
        }
        if !self.transform_tolerance_secs.is_finite() || self.transform_tolerance_secs < 0.0 {
            return Err(CourierError::ConfigError(format!(
                "localization.transform_tolerance_secs must be non-negative, got {}",
                self.transform_tolerance_secs
            )));
        }
        Ok(())
    }
}

/// Detection range model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Physical width of a stop sign (meters)
    pub known_object_width: f64,
    /// Focal length used until camera calibration arrives (pixels)
    pub default_focal_length: f64,
    /// Detector classes that trigger a stop
    pub stop_classes: Vec<String>,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        PerceptionConfig {
            known_object_width: 0.09,
            default_focal_length: 1.0,
            stop_classes: vec!["stop_sign".to_string()],
        }
    }
}

impl PerceptionConfig {
    fn validate(&self) -> Result<(), CourierError> {
        if !self.known_object_width.is_finite() || self.known_object_width <= 0.0 {
            return Err(CourierError::ConfigError(format!(
                "perception.known_object_width must be positive, got {}",
                self.known_object_width
            )));
        }
        Ok(())
    }
}

/// ROS 2 specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosConfig {
    /// Node name
    pub node_name: String,
    /// Topic names
    pub topics: TopicConfig,
}

impl Default for RosConfig {
    fn default() -> Self {
        RosConfig {
            node_name: "turtlebot_supervisor_nav".to_string(),
            topics: TopicConfig::default(),
        }
    }
}

/// Topic names used by the ROS 2 bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Pose-hold commands (geometry_msgs/Pose2D)
    pub cmd_pose: String,
    /// Navigation commands (geometry_msgs/Pose2D)
    pub cmd_nav: String,
    /// Zero-velocity commands (geometry_msgs/Twist)
    pub cmd_vel: String,
    /// Camera calibration (sensor_msgs/CameraInfo)
    pub camera_info: String,
    /// Stop-sign detections (JSON over std_msgs/String)
    pub stop_sign: String,
    /// Explicit navigation goals (geometry_msgs/Pose2D)
    pub nav_pose: String,
    /// Click-to-navigate goals (geometry_msgs/PoseStamped)
    pub click_goal: String,
    /// Food-location batches (JSON over std_msgs/String)
    pub food_location: String,
    /// Delivery requests (std_msgs/String)
    pub delivery_request: String,
    /// Odometry for the odometry backend (nav_msgs/Odometry)
    pub odometry: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        TopicConfig {
            cmd_pose: "/cmd_pose".to_string(),
            cmd_nav: "/cmd_nav_supervisor".to_string(),
            cmd_vel: "/cmd_vel".to_string(),
            camera_info: "/camera/camera_info".to_string(),
            stop_sign: "/detector/stop_sign".to_string(),
            nav_pose: "/nav_pose".to_string(),
            click_goal: "/move_base_simple/goal".to_string(),
            food_location: "/food_location".to_string(),
            delivery_request: "/delivery_request".to_string(),
            odometry: "/odom".to_string(),
        }
    }
}

/// Eos Courier error types
#[derive(Debug)]
pub enum CourierError {
    /// Configuration could not be read or is invalid
    ConfigError(String),
    /// The supervisor reached a state it must not continue from
    InvalidState(String),
    /// A command could not be delivered to the command sink
    CommandError(String),
    /// An inbound message could not be decoded
    PayloadError(String),
    /// ROS interface error
    RosError(String),
}

impl std::fmt::Display for CourierError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CourierError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            CourierError::InvalidState(msg) => write!(f, "Invalid supervisor state: {}", msg),
            CourierError::CommandError(msg) => write!(f, "Command error: {}", msg),
            CourierError::PayloadError(msg) => write!(f, "Payload error: {}", msg),
            CourierError::RosError(msg) => write!(f, "ROS error: {}", msg),
        }
    }
}

impl std::error::Error for CourierError {}

impl From<serde_yaml::Error> for CourierError {
    fn from(e: serde_yaml::Error) -> Self {
        CourierError::ConfigError(e.to_string())
    }
}

#[cfg(feature = "ros")]
impl From<r2r::Error> for CourierError {
    fn from(e: r2r::Error) -> Self {
        CourierError::RosError(e.to_string())
    }
}

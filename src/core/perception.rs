// core/perception.rs

// Turns raw detector output into something the supervisor can act on: an
// apparent range for stop signs, computed from the bounding box width and the
// camera focal length under a pinhole model.

use crate::PerceptionConfig;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// A single detector hit
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct DetectedObject {
    /// Detector class
    pub name: String,
    /// Pixel bounds [x_min, y_min, x_max, y_max]
    pub corners: [f64; 4],
    /// Detector score, zero when absent
    #[serde(default)]
    pub confidence: f64,
}

impl DetectedObject {
    /// Bounding box width in pixels
    pub fn pixel_width(&self) -> f64 {
        self.corners[2] - self.corners[0]
    }
}

/// Pinhole camera reduced to the one scalar the range model needs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    focal_length: f64,
}

impl CameraModel {
    /// Camera with a known focal length (pixels)
    pub fn new(focal_length: f64) -> Self {
        CameraModel { focal_length }
    }

    /// Focal length (pixels)
    pub fn focal_length(&self) -> f64 {
        self.focal_length
    }

    /// Takes fy from a row-major 3x3 intrinsic matrix
    pub fn update_from_intrinsics(&mut self, k: &[f64]) {
        match k.get(4) {
            Some(&fy) if fy.is_finite() && fy > 0.0 => {
                if fy != self.focal_length {
                    info!("Camera focal length set to {:.3}", fy);
                }
                self.focal_length = fy;
            }
            Some(&fy) => warn!("Ignoring camera intrinsics with focal length {}", fy),
            None => warn!("Ignoring camera intrinsics with {} entries", k.len()),
        }
    }
}

/// Decides whether a detection is a stop sign close enough to obey
#[derive(Clone, Debug)]
pub struct StopSignPolicy {
    known_width: f64,
    stop_classes: Vec<String>,
    stop_min_dist: f64,
}

impl StopSignPolicy {
    /// Policy obeying stop classes closer than `stop_min_dist`
    pub fn new(config: &PerceptionConfig, stop_min_dist: f64) -> Self {
        StopSignPolicy {
            known_width: config.known_object_width,
            stop_classes: config.stop_classes.clone(),
            stop_min_dist,
        }
    }

    /// Range in meters, or None when the box gives no usable range
    pub fn estimate_range(&self, camera: &CameraModel, detection: &DetectedObject) -> Option<f64> {
        let range = camera.focal_length() * self.known_width / detection.pixel_width();
        if range.is_finite() && range > 0.0 { Some(range) } else { None }
    }

    /// Range of a recognised stop sign strictly inside the stopping distance
    pub fn stopping_range(&self, camera: &CameraModel, detection: &DetectedObject) -> Option<f64> {
        if !self.stop_classes.iter().any(|class| *class == detection.name) {
            debug!("Ignoring detection of {}", detection.name);
            return None;
        }
        match self.estimate_range(camera, detection) {
            Some(range) if range < self.stop_min_dist => Some(range),
            Some(range) => {
                debug!("{} at {:.3}m is too far to obey", detection.name, range);
                None
            }
            None => {
                debug!("Ignoring {} with corners {:?}", detection.name, detection.corners);
                None
            }
        }
    }
}

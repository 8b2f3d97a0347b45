// core/api.rs

// Inbound interface of the supervisor. Every external input (detector, camera,
// operator goals, delivery requests) is turned into a SupervisorEvent and queued;
// the control loop applies queued events between ticks.

use super::localization::FramedPose;
use super::memory::FoodLocationBatch;
use super::perception::DetectedObject;
use crate::CourierError;
use crate::navigation::Goal;
use std::sync::mpsc::{Receiver, Sender, channel};

/// Everything that can change supervisor state outside of a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// Row-major 3x3 camera intrinsic matrix
    CameraInfo(Vec<f64>),
    /// Object detector hit
    Detection(DetectedObject),
    /// Explicit navigation goal in the world frame
    NavGoal(Goal),
    /// Operator click in an arbitrary frame
    ClickGoal(FramedPose),
    /// Discovered food locations
    FoodLocations(FoodLocationBatch),
    /// Comma-separated list of requested items
    DeliveryRequest(String),
}

impl SupervisorEvent {
    /// Decodes a detector payload (JSON `DetectedObject`)
    pub fn detection_from_json(payload: &str) -> Result<Self, CourierError> {
        serde_json::from_str(payload)
            .map(SupervisorEvent::Detection)
            .map_err(|e| CourierError::PayloadError(format!("bad detection payload: {}", e)))
    }

    /// Decodes a food-location payload (JSON `FoodLocationBatch`)
    pub fn food_locations_from_json(payload: &str) -> Result<Self, CourierError> {
        serde_json::from_str(payload)
            .map(SupervisorEvent::FoodLocations)
            .map_err(|e| CourierError::PayloadError(format!("bad food location payload: {}", e)))
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SupervisorEvent::CameraInfo(_) => "camera_info",
            SupervisorEvent::Detection(_) => "detection",
            SupervisorEvent::NavGoal(_) => "nav_goal",
            SupervisorEvent::ClickGoal(_) => "click_goal",
            SupervisorEvent::FoodLocations(_) => "food_locations",
            SupervisorEvent::DeliveryRequest(_) => "delivery_request",
        }
    }
}

/// Queue between event producers and the control loop
pub fn event_queue() -> (Sender<SupervisorEvent>, Receiver<SupervisorEvent>) {
    channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_payloads() {
        let event =
            SupervisorEvent::food_locations_from_json(r#"{"names":["a"],"xs":[1.0],"ys":[2.0]}"#)
                .unwrap();
        assert_eq!(event.kind(), "food_locations");

        let event = SupervisorEvent::detection_from_json(
            r#"{"name":"stop_sign","corners":[0.0,0.0,10.0,10.0],"confidence":0.8}"#,
        )
        .unwrap();
        assert!(matches!(event, SupervisorEvent::Detection(ref d) if d.name == "stop_sign"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(SupervisorEvent::detection_from_json("{not json").is_err());
        assert!(SupervisorEvent::food_locations_from_json(r#"{"names":"a"}"#).is_err());
    }
}

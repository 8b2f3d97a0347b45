// core/state.rs

// The supervisor's finite state machine. Each control tick reads the latest
// pose, checks the exit condition of the current mode and emits exactly one
// command. Discovery and delivery use different transition tables; which one
// runs is decided by the phase, never by a nested loop.

use super::api::SupervisorEvent;
use super::localization::{FramedPose, Pose, PoseSource, transform_into};
use super::memory::{Catalog, FoodLocationBatch, RequestQueue};
use super::perception::{CameraModel, DetectedObject, StopSignPolicy};
use crate::navigation::{Command, Goal, Tolerance, assign_next_goal};
use crate::{CourierConfig, CourierError, SupervisorConfig};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Robot behavioral modes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Zero velocity, waiting
    Idle,
    /// Direct pose control towards the goal
    Pose,
    /// Waiting at a stop sign
    Stop,
    /// Crossing an intersection after a stop
    Cross,
    /// Navigating towards the goal
    Nav,
    /// Dwelling at a pickup
    Pick,
    /// Choosing the next delivery target
    Deli,
}

impl Mode {
    fn needs_goal(self) -> bool {
        matches!(self, Mode::Pose | Mode::Cross | Mode::Nav)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            Mode::Idle => "IDLE",
            Mode::Pose => "POSE",
            Mode::Stop => "STOP",
            Mode::Cross => "CROSS",
            Mode::Nav => "NAV",
            Mode::Pick => "PICK",
            Mode::Deli => "DELI",
        };
        f.write_str(name)
    }
}

/// Which transition table the tick runs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Exploring; IDLE checks whether discovery may finish
    Discovery,
    /// Catalog frozen, no delivery running
    Ready,
    /// Working through a request queue
    Delivering,
}

/// Supervisor bookkeeping visible to callers
#[derive(Clone, Debug, PartialEq)]
pub struct SupervisorState {
    /// Active mode
    pub mode: Mode,
    /// Latest resolved pose handed to the tick
    pub pose: Pose,
    /// True once a tick carried a resolved pose; pose-gated exits wait for it
    pub pose_resolved: bool,
    /// Current target; none before the first assignment
    pub goal: Option<Goal>,
    /// Origin of every mode timer
    pub mode_entry_time: Instant,
    /// Start of the discovery period
    pub discovery_start_time: Instant,
    /// Catalog frozen, delivery requests accepted
    pub discovery_finished: bool,
    /// Return-home leg of the current delivery assigned
    pub delivery_finished: bool,
    /// Pose captured at startup
    pub origin_pose: Pose,
}

/// Result of one control tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutcome {
    /// The one command to send this tick
    pub command: Command,
    /// True on the tick a delivery request is fully served
    pub delivery_complete: bool,
}

/// Mode state machine with its catalog and request queues
pub struct Supervisor {
    config: SupervisorConfig,
    world_frame: String,
    state: SupervisorState,
    phase: Phase,
    catalog: Catalog,
    requests: Option<RequestQueue>,
    pending_requests: VecDeque<String>,
    camera: CameraModel,
    stop_policy: StopSignPolicy,
    last_mode_logged: Option<Mode>,
}

impl Supervisor {
    /// Starts in IDLE at the beginning of discovery
    pub fn new(config: &CourierConfig, origin_pose: Pose, now: Instant) -> Result<Self, CourierError> {
        config.validate()?;
        info!(
            "Supervisor settings: backend={:?}, world_frame={}, pickup_tolerance={:?}",
            config.localization.backend,
            config.localization.world_frame(),
            config.supervisor.pickup_tolerance
        );

        Ok(Supervisor {
            config: config.supervisor.clone(),
            world_frame: config.localization.world_frame().to_string(),
            state: SupervisorState {
                mode: Mode::Idle,
                pose: origin_pose,
                pose_resolved: false,
                goal: None,
                mode_entry_time: now,
                discovery_start_time: now,
                discovery_finished: false,
                delivery_finished: false,
                origin_pose,
            },
            phase: Phase::Discovery,
            catalog: Catalog::new(),
            requests: None,
            pending_requests: VecDeque::new(),
            camera: CameraModel::new(config.perception.default_focal_length),
            stop_policy: StopSignPolicy::new(&config.perception, config.supervisor.stop_min_dist),
            last_mode_logged: None,
        })
    }

    /// Active mode
    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    /// Active transition table
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Full bookkeeping snapshot
    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    /// Discovered food locations
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Camera model used for range estimates
    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Queue of the delivery in progress
    pub fn request_queue(&self) -> Option<&RequestQueue> {
        self.requests.as_ref()
    }

    /// Accepted requests waiting for the current delivery to end
    pub fn pending_requests(&self) -> usize {
        self.pending_requests.len()
    }

    /// Applies one event. Events never block and never run a tick.
    pub fn handle_event(&mut self, event: SupervisorEvent, now: Instant, transforms: &mut dyn PoseSource) {
        match event {
            SupervisorEvent::CameraInfo(k) => self.camera.update_from_intrinsics(&k),
            SupervisorEvent::Detection(detection) => self.on_detection(&detection, now),
            SupervisorEvent::NavGoal(goal) => self.on_nav_goal(goal, now),
            SupervisorEvent::ClickGoal(framed) => self.on_click_goal(&framed, now, transforms),
            SupervisorEvent::FoodLocations(batch) => self.on_food_locations(&batch),
            SupervisorEvent::DeliveryRequest(request) => self.on_delivery_request(request),
        }
    }

    fn on_detection(&mut self, detection: &DetectedObject, now: Instant) {
        let Some(range) = self.stop_policy.stopping_range(&self.camera, detection) else {
            return;
        };
        if self.state.mode == Mode::Nav {
            info!("{} at {:.3}m, stopping", detection.name, range);
            self.enter_mode(Mode::Stop, now);
        } else {
            debug!("{} at {:.3}m ignored in {}", detection.name, range, self.state.mode);
        }
    }

    fn on_nav_goal(&mut self, goal: Goal, now: Instant) {
        info!("Navigation goal x={:.3}, y={:.3}, theta={:.3}", goal.x, goal.y, goal.theta);
        self.state.goal = Some(goal);
        self.enter_mode(Mode::Nav, now);
    }

    fn on_click_goal(&mut self, framed: &FramedPose, now: Instant, transforms: &mut dyn PoseSource) {
        if self.state.discovery_finished {
            debug!("Discovery finished, ignoring click goal");
            return;
        }
        match transform_into(transforms, &self.world_frame, framed) {
            Ok(pose) => self.on_nav_goal(Goal::from(pose), now),
            Err(e) => warn!("Dropping click goal in {}: {}", framed.frame_id, e),
        }
    }

    fn on_food_locations(&mut self, batch: &FoodLocationBatch) {
        if self.state.discovery_finished {
            debug!("Catalog frozen, ignoring {} food locations", batch.names.len());
            return;
        }
        if let Err(e) = self.catalog.replace_with(batch) {
            warn!("Dropping food locations: {}", e);
        }
    }

    fn on_delivery_request(&mut self, request: String) {
        if !self.state.discovery_finished {
            debug!("Discovery not finished, ignoring request {:?}", request);
            return;
        }
        info!("Received request {:?}", request);
        self.pending_requests.push_back(request);
    }

    /// One control step: bookkeeping, exit condition, one command.
    /// `pose` is `None` until the pose source has resolved at least once.
    pub fn tick(&mut self, pose: Option<Pose>, now: Instant) -> Result<TickOutcome, CourierError> {
        match pose {
            Some(pose) => {
                self.state.pose = pose;
                self.state.pose_resolved = true;
            }
            None => debug!("No resolved pose yet, holding pose-gated transitions"),
        }

        if self.phase == Phase::Ready {
            if let Some(request) = self.pending_requests.pop_front() {
                self.begin_delivery(&request, now);
            }
        }

        if self.last_mode_logged != Some(self.state.mode) {
            info!("Current mode: {}", self.state.mode);
            self.last_mode_logged = Some(self.state.mode);
        }

        match self.phase {
            Phase::Discovery | Phase::Ready => self.free_step(now),
            Phase::Delivering => self.delivery_step(now),
        }
    }

    fn free_step(&mut self, now: Instant) -> Result<TickOutcome, CourierError> {
        match self.state.mode {
            Mode::Idle => {
                if self.phase == Phase::Discovery {
                    self.check_discovery_finished(now);
                }
            }
            Mode::Pose => {
                if self.at_goal(self.config.navigation_tolerance())? {
                    self.enter_mode(Mode::Idle, now);
                }
            }
            Mode::Stop => {
                if self.elapsed_beyond(self.config.stop_time(), now) {
                    self.enter_mode(Mode::Cross, now);
                }
            }
            Mode::Cross => {
                if self.elapsed_beyond(self.config.crossing_time(), now) {
                    self.enter_mode(Mode::Nav, now);
                }
            }
            Mode::Nav => {
                if self.at_goal(self.config.navigation_tolerance())? {
                    self.enter_mode(Mode::Idle, now);
                }
            }
            Mode::Pick | Mode::Deli => {
                return Err(CourierError::InvalidState(format!(
                    "mode {} is not supported outside delivery",
                    self.state.mode
                )));
            }
        }
        Ok(TickOutcome { command: self.command()?, delivery_complete: false })
    }

    fn delivery_step(&mut self, now: Instant) -> Result<TickOutcome, CourierError> {
        let complete = match self.state.mode {
            Mode::Idle => self.state.delivery_finished,
            Mode::Pose => {
                if self.at_goal(self.config.pickup_tolerance())? {
                    self.enter_mode(Mode::Pick, now);
                }
                false
            }
            Mode::Stop => {
                if self.elapsed_beyond(self.config.stop_time(), now) {
                    self.enter_mode(Mode::Cross, now);
                }
                false
            }
            Mode::Pick => {
                if self.state.delivery_finished {
                    true
                } else {
                    if self.elapsed_beyond(self.config.stop_time(), now) {
                        self.enter_mode(Mode::Deli, now);
                    }
                    false
                }
            }
            Mode::Cross => {
                if self.elapsed_beyond(self.config.crossing_time(), now) {
                    self.enter_mode(Mode::Nav, now);
                }
                false
            }
            Mode::Nav => {
                if self.at_goal(self.config.navigation_tolerance())? {
                    self.enter_mode(Mode::Pick, now);
                }
                false
            }
            Mode::Deli => {
                self.assign_goal(now)?;
                false
            }
        };

        if complete {
            self.finish_delivery(now);
            return Ok(TickOutcome { command: Command::Hold, delivery_complete: true });
        }
        Ok(TickOutcome { command: self.command()?, delivery_complete: false })
    }

    fn begin_delivery(&mut self, request: &str, now: Instant) {
        let queue = RequestQueue::from_request(request);
        info!("Entering delivery with {:?}", queue.pending_items());
        self.requests = Some(queue);
        self.state.delivery_finished = false;
        self.phase = Phase::Delivering;
        self.enter_mode(Mode::Deli, now);
    }

    fn finish_delivery(&mut self, now: Instant) {
        info!("Delivery finished");
        self.requests = None;
        self.phase = Phase::Ready;
        self.enter_mode(Mode::Idle, now);
    }

    fn assign_goal(&mut self, now: Instant) -> Result<(), CourierError> {
        let queue = self
            .requests
            .as_mut()
            .ok_or_else(|| CourierError::InvalidState("DELI without a request queue".to_string()))?;
        let assignment = assign_next_goal(queue, &self.catalog);
        if assignment.is_final() {
            self.state.delivery_finished = true;
        }
        self.state.goal = Some(assignment.goal());
        self.enter_mode(Mode::Nav, now);
        Ok(())
    }

    fn check_discovery_finished(&mut self, now: Instant) {
        if !self.state.pose_resolved {
            return;
        }
        let elapsed = now.saturating_duration_since(self.state.discovery_start_time);
        let home_distance = self.state.pose.distance_to(&self.state.origin_pose);
        if elapsed > self.config.discover_time() && home_distance < self.config.dis_thres {
            self.state.discovery_finished = true;
            self.phase = Phase::Ready;
            self.enter_mode(Mode::Idle, now);
            info!("Finished discovery with {} food locations, ready to deliver", self.catalog.len());
        }
    }

    fn elapsed_beyond(&self, duration: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.state.mode_entry_time) > duration
    }

    fn require_goal(&self) -> Result<Goal, CourierError> {
        self.state.goal.ok_or_else(|| {
            CourierError::InvalidState(format!("mode {} has no goal assigned", self.state.mode))
        })
    }

    fn at_goal(&self, tolerance: Tolerance) -> Result<bool, CourierError> {
        let goal = self.require_goal()?;
        Ok(self.state.pose_resolved && tolerance.contains(&self.state.pose, &goal))
    }

    fn enter_mode(&mut self, mode: Mode, now: Instant) {
        if mode != self.state.mode {
            debug!("{} -> {}", self.state.mode, mode);
        }
        self.state.mode = mode;
        self.state.mode_entry_time = now;
    }

    fn command(&self) -> Result<Command, CourierError> {
        let mode = self.state.mode;
        if !mode.needs_goal() {
            return Ok(Command::Hold);
        }
        let goal = self.require_goal()?;
        Ok(match mode {
            Mode::Pose => Command::GoToPose(goal),
            _ => Command::NavigateTo(goal),
        })
    }
}

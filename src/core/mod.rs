// core/mod.rs

// Declares the supervisor's submodules and the Core runtime that ties them
// together: queued events in, one pose refresh, one tick, one command out.

/// Inbound events
pub mod api;
/// Poses, frame tree and pose adapter
pub mod localization;
/// Food catalog and request queue
pub mod memory;
/// Stop-sign range model
pub mod perception;
/// Mode state machine
pub mod state;

pub use api::{SupervisorEvent, event_queue};
pub use localization::{FramedPose, LookupError, Pose, PoseAdapter, PoseSource, TransformBuffer};
pub use memory::{Catalog, CatalogError, FoodLocation, FoodLocationBatch, QueueEntry, RequestQueue};
pub use perception::{CameraModel, DetectedObject, StopSignPolicy};
pub use state::{Mode, Phase, Supervisor, SupervisorState, TickOutcome};

use crate::navigation::CommandSink;
use crate::{CourierConfig, CourierError};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Core struct: owns the supervisor, its pose adapter and both ends of the
/// outside world. Everything runs on the caller's thread.
pub struct Core<S: PoseSource, K: CommandSink> {
    supervisor: Supervisor,
    adapter: PoseAdapter,
    source: S,
    sink: K,
    events: Receiver<SupervisorEvent>,
    period: Duration,
}

impl<S: PoseSource, K: CommandSink> Core<S, K> {
    /// Captures the origin pose from `source` and builds the supervisor
    pub fn new(
        config: &CourierConfig,
        mut source: S,
        sink: K,
        events: Receiver<SupervisorEvent>,
        now: Instant,
    ) -> Result<Self, CourierError> {
        let mut adapter = PoseAdapter::new(
            config.localization.world_frame(),
            &config.localization.body_frame,
        );
        let origin = adapter.capture_origin(&mut source);
        let supervisor = Supervisor::new(config, origin, now)?;

        Ok(Core {
            supervisor,
            adapter,
            source,
            sink,
            events,
            period: config.supervisor.period(),
        })
    }

    /// Applies queued events, refreshes the pose, ticks and sends one command
    pub fn run_cycle(&mut self, now: Instant) -> Result<TickOutcome, CourierError> {
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    debug!("Applying {} event", event.kind());
                    self.supervisor.handle_event(event, now, &mut self.source);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        self.adapter.refresh(&mut self.source);
        let pose = self.adapter.is_resolved().then(|| self.adapter.current());
        let outcome = self.supervisor.tick(pose, now)?;
        self.sink.send(&outcome.command)?;
        if outcome.delivery_complete {
            info!("Request served, waiting for the next one");
        }
        Ok(outcome)
    }

    /// Ticks at the configured rate until `shutdown` is raised or a tick fails.
    /// `pump` runs before every cycle to let producers enqueue events.
    pub fn run<F>(&mut self, shutdown: &AtomicBool, mut pump: F) -> Result<(), CourierError>
    where
        F: FnMut() -> Result<(), CourierError>,
    {
        info!("Control loop running every {:?}", self.period);
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            pump()?;
            self.run_cycle(Instant::now())?;

            let spent = started.elapsed();
            match self.period.checked_sub(spent) {
                Some(remaining) => std::thread::sleep(remaining),
                None => warn!("Control cycle overran its period by {:?}", spent - self.period),
            }
        }
        info!("Control loop stopped in mode {}", self.supervisor.mode());
        Ok(())
    }

    /// The state machine
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// The pose adapter
    pub fn adapter(&self) -> &PoseAdapter {
        &self.adapter
    }

    /// The pose source, e.g. to feed a transform buffer
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// The command sink
    pub fn sink(&self) -> &K {
        &self.sink
    }
}

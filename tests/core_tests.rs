use eos_courier::core::{
    Core, LookupError, Mode, Phase, Pose, PoseSource, SupervisorEvent, event_queue,
};
use eos_courier::{Command, CommandSink, CourierConfig, CourierError, Goal};
use mockall::mock;
use mockall::predicate::eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

mock! {
    pub Source {}
    impl PoseSource for Source {
        fn lookup(&mut self, world_frame: &str, body_frame: &str) -> Result<Pose, LookupError>;
    }
}

mock! {
    pub Sink {}
    impl CommandSink for Sink {
        fn send(&mut self, command: &Command) -> Result<(), CourierError>;
    }
}

fn steady_source(pose: Pose) -> MockSource {
    let mut source = MockSource::new();
    source.expect_lookup().returning(move |_, _| Ok(pose));
    source
}

// The startup lookup becomes the origin pose
#[test]
fn test_origin_captured_at_startup() {
    let mut sink = MockSink::new();
    sink.expect_send().with(eq(Command::Hold)).times(1).returning(|_| Ok(()));
    let (_tx, rx) = event_queue();

    let origin = Pose::new(0.5, -0.5, 0.1);
    let mut core = Core::new(&CourierConfig::default(), steady_source(origin), sink, rx, Instant::now()).unwrap();
    assert_eq!(core.supervisor().state().origin_pose, origin);

    let outcome = core.run_cycle(Instant::now()).unwrap();
    assert_eq!(outcome.command, Command::Hold);
    assert!(core.adapter().is_resolved());
}

// Without any transform the origin falls back to the coordinate origin
#[test]
fn test_unresolved_origin_defaults_to_zero() {
    let mut source = MockSource::new();
    source
        .expect_lookup()
        .returning(|_, body| Err(LookupError::NotYetAvailable { frame: body.to_string() }));
    let (_tx, rx) = event_queue();

    let core = Core::new(&CourierConfig::default(), source, MockSink::new(), rx, Instant::now()).unwrap();
    assert_eq!(core.supervisor().state().origin_pose, Pose::default());
    assert!(!core.adapter().is_resolved());
}

// A pose source that never resolves never lets discovery finish
#[test]
fn test_unresolved_pose_blocks_discovery() {
    let mut source = MockSource::new();
    source
        .expect_lookup()
        .returning(|_, body| Err(LookupError::NotYetAvailable { frame: body.to_string() }));
    let mut sink = MockSink::new();
    sink.expect_send().with(eq(Command::Hold)).returning(|_| Ok(()));
    let (_tx, rx) = event_queue();

    let t0 = Instant::now();
    let mut core = Core::new(&CourierConfig::default(), source, sink, rx, t0).unwrap();
    for secs in [30, 61, 120] {
        core.run_cycle(t0 + Duration::from_secs(secs)).unwrap();
    }
    assert!(!core.adapter().is_resolved());
    assert!(!core.supervisor().state().discovery_finished);
    assert_eq!(core.supervisor().phase(), Phase::Discovery);
}

// A failed lookup keeps the last resolved pose
#[test]
fn test_lookup_failure_keeps_previous_pose() {
    let mut source = MockSource::new();
    let mut calls = 0;
    source.expect_lookup().returning(move |world, _| {
        calls += 1;
        if calls <= 2 {
            Ok(Pose::new(1.0, 1.0, 0.0))
        } else {
            Err(LookupError::Extrapolation { frame: world.to_string(), lag_secs: 2.0 })
        }
    });
    let mut sink = MockSink::new();
    sink.expect_send().returning(|_| Ok(()));
    let (_tx, rx) = event_queue();

    let mut core = Core::new(&CourierConfig::default(), source, sink, rx, Instant::now()).unwrap();
    core.run_cycle(Instant::now()).unwrap();
    core.run_cycle(Instant::now()).unwrap();
    assert_eq!(core.supervisor().state().pose, Pose::new(1.0, 1.0, 0.0));
}

// Queued events are applied before the tick that follows them
#[test]
fn test_events_applied_before_tick() {
    let goal = Goal::new(3.0, 0.0, 0.0);
    let mut sink = MockSink::new();
    sink.expect_send().with(eq(Command::NavigateTo(goal))).times(1).returning(|_| Ok(()));
    let (tx, rx) = event_queue();

    let mut core = Core::new(&CourierConfig::default(), steady_source(Pose::default()), sink, rx, Instant::now()).unwrap();
    tx.send(SupervisorEvent::NavGoal(goal)).unwrap();
    core.run_cycle(Instant::now()).unwrap();
    assert_eq!(core.supervisor().mode(), Mode::Nav);
}

// Sink failures stop the cycle with a command error
#[test]
fn test_sink_error_propagates() {
    let mut sink = MockSink::new();
    sink.expect_send()
        .returning(|_| Err(CourierError::CommandError("publisher closed".to_string())));
    let (_tx, rx) = event_queue();

    let mut core = Core::new(&CourierConfig::default(), steady_source(Pose::default()), sink, rx, Instant::now()).unwrap();
    assert!(matches!(core.run_cycle(Instant::now()), Err(CourierError::CommandError(_))));
}

// The loop pumps, ticks once and exits when shutdown is raised
#[test]
fn test_run_stops_on_shutdown() {
    let mut sink = MockSink::new();
    sink.expect_send().times(1).returning(|_| Ok(()));
    let (_tx, rx) = event_queue();
    let mut core = Core::new(&CourierConfig::default(), steady_source(Pose::default()), sink, rx, Instant::now()).unwrap();

    let shutdown = AtomicBool::new(false);
    let mut pumped = 0;
    core.run(&shutdown, || {
        pumped += 1;
        shutdown.store(true, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();
    assert_eq!(pumped, 1);
}

// Pump errors end the loop before any command is sent
#[test]
fn test_run_propagates_pump_error() {
    let mut sink = MockSink::new();
    sink.expect_send().times(0);
    let (_tx, rx) = event_queue();
    let mut core = Core::new(&CourierConfig::default(), steady_source(Pose::default()), sink, rx, Instant::now()).unwrap();

    let shutdown = AtomicBool::new(false);
    let result = core.run(&shutdown, || Err(CourierError::RosError("context lost".to_string())));
    assert!(matches!(result, Err(CourierError::RosError(_))));
}

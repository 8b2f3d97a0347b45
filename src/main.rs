// src/main.rs
// Entry point for Eos Courier: loads configuration, brings up the ROS 2 bridge
// and runs the supervisor's control loop until Ctrl+C.

use eos_courier::core::{Core, PoseSource, event_queue};
use eos_courier::ros_interface::RosInterface;
use eos_courier::{CourierConfig, CourierError};
use log::{error, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// Spins allowed for the transform tree to fill before the origin is captured
const WARMUP_SPINS: usize = 30;
const SPIN_TIMEOUT: Duration = Duration::from_millis(10);

fn load_config() -> Result<CourierConfig, CourierError> {
    match std::env::args().nth(1) {
        Some(path) => CourierConfig::load(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(CourierConfig::default())
        }
    }
}

fn run() -> Result<(), CourierError> {
    let config = load_config()?;
    let (events_tx, events_rx) = event_queue();
    let mut ros = RosInterface::new(&config, events_tx)?;
    let sink = ros.command_sink()?;
    let mut source = ros.pose_source();

    let world_frame = config.localization.world_frame();
    for _ in 0..WARMUP_SPINS {
        ros.spin_once(SPIN_TIMEOUT);
        if source.lookup(world_frame, &config.localization.body_frame).is_ok() {
            break;
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }

    let mut core = Core::new(&config, source, sink, events_rx, Instant::now())?;
    core.run(&shutdown, || {
        ros.spin_once(SPIN_TIMEOUT);
        Ok(())
    })
}

fn main() {
    env_logger::init();
    info!("Starting Eos Courier supervisor...");

    if let Err(e) = run() {
        error!("Supervisor stopped: {}", e);
        std::process::exit(1);
    }
    info!("Eos Courier shut down");
}

//! End-to-end control loop tests over the simulated backends
//!
//! Synthetic scenarios, no camera, model, or serial hardware required.

use anugam::app::App;
use anugam::centroid::CentroidEstimator;
use anugam::config::AppConfig;
use anugam::controller::{Command, Mode, ModeController, SharedMode};
use anugam::detect::DetectionAdapter;
use anugam::dispatch::{command_channel, SerialWriter, WritePort};
use anugam::sim::SimRig;
use anugam::video::FrameSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct RecordingPort {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WritePort for RecordingPort {
    fn write_command(&mut self, bytes: &[u8]) -> anugam::Result<()> {
        self.writes.lock().push(bytes.to_vec());
        Ok(())
    }
}

/// One pipeline step: frame -> observations -> centroid -> command
fn step(
    source: &mut dyn FrameSource,
    adapter: &mut DetectionAdapter,
    estimator: &CentroidEstimator,
    controller: &mut ModeController,
) -> Option<Command> {
    let frame = source.next_frame().unwrap()?;
    let observations = adapter.observe(&frame);
    let centroid = estimator.estimate(&observations);
    Some(controller.tick(&centroid))
}

#[test]
fn end_to_end_tracking_delta_reaches_the_wire() {
    // Target dead-center vertically, 20px left of center, noiseless
    let rig = SimRig::new(640, 480, 300.0, 0.0, 0.0, 42);
    let mut adapter = DetectionAdapter::new(Box::new(rig.pose), None, 15, 0.5);
    let estimator = CentroidEstimator::new(0.3);

    let mode = SharedMode::new();
    mode.set(Mode::Tracking);
    let mut controller = ModeController::new(mode, 640, 50);

    let mut source = rig.source;
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert_eq!(cmd, Command::Track(-20));

    // And the writer puts exactly the ASCII delta on the wire
    let writes = Arc::new(Mutex::new(Vec::new()));
    let port = RecordingPort {
        writes: Arc::clone(&writes),
    };
    let (sink, rx) = command_channel();
    let writer = SerialWriter::spawn(Some(Box::new(port)), rx);

    sink.submit(cmd);
    let deadline = Instant::now() + Duration::from_secs(2);
    while writes.lock().is_empty() {
        assert!(Instant::now() < deadline, "writer never delivered");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(writes.lock()[0], b"-20\n");

    drop(sink);
    writer.join().unwrap();
}

#[test]
fn tracking_converges_to_center() {
    let rig = SimRig::new(640, 480, 560.0, 8.0, 0.0, 1);
    let mut adapter = DetectionAdapter::new(Box::new(rig.pose), Some(Box::new(rig.boxes)), 15, 0.5);
    let estimator = CentroidEstimator::new(0.3);

    let mode = SharedMode::new();
    mode.set(Mode::Tracking);
    let mut controller = ModeController::new(mode, 640, 50);
    let mut source = rig.source;

    let mut deltas = Vec::new();
    for _ in 0..100 {
        match step(&mut source, &mut adapter, &estimator, &mut controller).unwrap() {
            Command::Track(d) => deltas.push(d),
            other => panic!("expected Track while tracking a visible target, got {:?}", other),
        }
    }

    assert!(deltas[0] > 0, "target starts right of center");
    assert_eq!(*deltas.last().unwrap(), 0, "loop settles on the target");
    for pair in deltas.windows(2) {
        assert!(pair[1] <= pair[0], "delta must shrink monotonically: {:?}", pair);
    }
}

#[test]
fn lost_target_stops_without_leaving_tracking() {
    let rig = SimRig::new(640, 480, 400.0, 0.0, 0.0, 5);
    let world = Arc::clone(&rig.world);
    let mut adapter = DetectionAdapter::new(Box::new(rig.pose), None, 15, 0.5);
    let estimator = CentroidEstimator::new(0.3);

    let mode = SharedMode::new();
    mode.set(Mode::Tracking);
    let mut controller = ModeController::new(mode, 640, 50);
    let mut source = rig.source;

    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert_eq!(cmd, Command::Track(80));

    world.lock().set_visible(false);
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert_eq!(cmd, Command::Stop);

    // Mode never auto-transitioned: the target coming back resumes tracking
    world.lock().set_visible(true);
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert_eq!(cmd, Command::Track(80));
}

#[test]
fn mode_switch_gates_command_kind() {
    let rig = SimRig::new(640, 480, 400.0, 0.0, 0.0, 9);
    let world = Arc::clone(&rig.world);
    let mut adapter = DetectionAdapter::new(Box::new(rig.pose), None, 15, 0.5);
    let estimator = CentroidEstimator::new(0.3);

    let mode = SharedMode::new();
    let mut controller = ModeController::new(mode.clone(), 640, 50);
    let mut source = rig.source;

    // Default mode holds still regardless of the visible target
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert_eq!(cmd, Command::Stop);

    mode.set(Mode::Scanning);
    world.lock().set_visible(false);
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert!(matches!(cmd, Command::Scan(_)));

    mode.set(Mode::Tracking);
    world.lock().set_visible(true);
    let cmd = step(&mut source, &mut adapter, &estimator, &mut controller).unwrap();
    assert!(matches!(cmd, Command::Track(_)));
}

#[test]
fn app_runs_sim_pipeline_with_dropouts() {
    let mut config = AppConfig::default();
    // Ephemeral control port; a serial device that cannot exist
    config.control.bind_address = "127.0.0.1:0".to_string();
    config.hardware.serial_port = "/dev/anugam-missing-for-test".to_string();

    let mut app = App::new(config.clone()).unwrap();
    assert!(!app.serial_connected());
    app.mode().set(Mode::Tracking);

    let rig = SimRig::with_defaults(
        config.video.frame_width,
        config.video.frame_height,
        7,
    )
    .with_dropouts(5);
    let mut adapter = DetectionAdapter::new(
        Box::new(rig.pose),
        Some(Box::new(rig.boxes)),
        config.tracking.detector_interval,
        config.tracking.confidence_threshold,
    );
    let mut source = rig.source;

    // Transient dropouts are skipped; the loop still completes all 50 frames
    app.run(&mut source, &mut adapter, Some(50)).unwrap();
    app.stop();
}

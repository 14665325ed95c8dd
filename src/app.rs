//! Application orchestration for the anugam daemon
//!
//! Wires the shared mode cell, command mailbox, serial writer thread, and
//! control channel server, then drives the main control loop:
//! frame -> detection adapter -> centroid estimator -> mode controller ->
//! command sink. The loop never blocks on serial or network I/O.

use crate::centroid::CentroidEstimator;
use crate::config::AppConfig;
use crate::control::ControlServer;
use crate::controller::{Command, ModeController, SharedMode};
use crate::detect::DetectionAdapter;
use crate::dispatch::{command_channel, CommandSink, SerialTransport, SerialWriter, WritePort};
use crate::error::{Error, Result};
use crate::video::FrameSource;
use log::{debug, error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Give up after this many frame dropouts in a row; a camera that stopped
/// delivering is a persistent failure, not a glitch.
const MAX_CONSECUTIVE_DROPOUTS: u32 = 120;

/// Main application structure that owns all long-running components
pub struct App {
    config: AppConfig,
    mode: SharedMode,
    sink: CommandSink,
    writer: SerialWriter,
    control: ControlServer,
    shutdown: Arc<AtomicBool>,
}

impl App {
    /// Initialize all components
    ///
    /// A missing serial device is non-fatal: the writer runs disconnected
    /// and dispatches become no-ops. A control channel bind failure is
    /// fatal.
    pub fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing anugam");

        let mode = SharedMode::new();
        let (sink, command_rx) = command_channel();

        let port: Option<Box<dyn WritePort>> =
            match SerialTransport::open(&config.hardware.serial_port, config.hardware.baud_rate) {
                Ok(p) => Some(Box::new(p)),
                Err(e) => {
                    warn!(
                        "Serial device {} unavailable ({}), continuing disconnected",
                        config.hardware.serial_port, e
                    );
                    None
                }
            };
        let writer = SerialWriter::spawn(port, command_rx);

        let shutdown = Arc::new(AtomicBool::new(false));
        let control =
            ControlServer::spawn(&config.control.bind_address, mode.clone(), Arc::clone(&shutdown))?;

        Self::setup_signal_handler(Arc::clone(&shutdown));

        info!("✓ Dispatch and control channel initialized");

        Ok(Self {
            config,
            mode,
            sink,
            writer,
            control,
            shutdown,
        })
    }

    fn setup_signal_handler(shutdown: Arc<AtomicBool>) {
        thread::Builder::new()
            .name("signal-handler".to_string())
            .spawn(move || {
                let mut signals =
                    Signals::new([SIGINT, SIGTERM]).expect("Failed to register signal handlers");

                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {:?}, initiating shutdown...", sig);
                    shutdown.store(true, Ordering::Relaxed);
                }
            })
            .expect("Failed to spawn signal handler thread");
    }

    /// The shared mode cell (written by the control channel)
    pub fn mode(&self) -> &SharedMode {
        &self.mode
    }

    /// A clone of the command sink, the thread-safe entry point external
    /// collaborators use to push raw values through the same serial link
    pub fn sink(&self) -> CommandSink {
        self.sink.clone()
    }

    /// Whether the serial link is currently connected
    pub fn serial_connected(&self) -> bool {
        self.writer.is_connected()
    }

    /// Run the main control loop until shutdown, frame limit, or a
    /// persistent frame source failure
    ///
    /// One iteration per acquired frame; the only wait inside an iteration
    /// is the bounded detector inference.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        adapter: &mut DetectionAdapter,
        frame_limit: Option<u64>,
    ) -> Result<()> {
        let estimator = CentroidEstimator::new(self.config.tracking.secondary_blend);
        let mut controller = ModeController::new(
            self.mode.clone(),
            self.config.video.frame_width,
            self.config.scan.step,
        );

        info!(
            "Control loop running ({}x{} frames, mode: {:?})",
            self.config.video.frame_width,
            self.config.video.frame_height,
            self.mode.get()
        );

        let mut frames: u64 = 0;
        let mut consecutive_dropouts: u32 = 0;

        let result = loop {
            if self.shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, leaving control loop");
                break Ok(());
            }
            if let Some(limit) = frame_limit {
                if frames >= limit {
                    info!("Frame limit {} reached, leaving control loop", limit);
                    break Ok(());
                }
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => {
                    consecutive_dropouts = 0;
                    frame
                }
                Ok(None) => {
                    consecutive_dropouts += 1;
                    if consecutive_dropouts >= MAX_CONSECUTIVE_DROPOUTS {
                        break Err(Error::FrameSource(format!(
                            "no frame delivered for {} consecutive attempts",
                            consecutive_dropouts
                        )));
                    }
                    debug!("Frame dropout ({} in a row), retrying", consecutive_dropouts);
                    continue;
                }
                Err(e) => break Err(e),
            };
            frames += 1;

            let observations = adapter.observe(&frame);
            let centroid = estimator.estimate(&observations);
            let command = controller.tick(&centroid);
            log::trace!(
                "frame {}: {} observations, centroid {:?} -> {:?}",
                frames,
                observations.len(),
                centroid.point,
                command
            );
            self.sink.submit(command);
        };

        // Leave the chair halted whichever way the loop ended
        self.sink.submit(Command::Stop);

        if let Err(ref e) = result {
            error!("Control loop terminated: {}", e);
        }
        result
    }

    /// Shut down all components
    ///
    /// Stops producing, signals the server threads, and lets the writer
    /// drain the final command before joining it.
    pub fn stop(self) {
        info!("Stopping anugam...");
        let App {
            sink,
            writer,
            control,
            shutdown,
            ..
        } = self;

        shutdown.store(true, Ordering::Relaxed);
        sink.submit(Command::Stop);
        drop(sink);

        if writer.join().is_err() {
            error!("Serial writer thread panicked");
        }
        if control.join().is_err() {
            error!("Control server thread panicked");
        }

        info!("✓ All threads stopped");
    }
}

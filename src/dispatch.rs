//! Command dispatch: coalescing mailbox and the serial writer thread
//!
//! The mailbox is a capacity-one slot where a new command overwrites any
//! undelivered one; a stale command is worse than a dropped one, so there is
//! deliberately no deeper queue. A dedicated writer thread drains the slot
//! into the serial device, isolating slow or failing I/O from the frame
//! cadence.

use crate::controller::Command;
use crate::error::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Wire sentinel meaning "stop": outside the achievable delta range for any
/// supported frame width, so a genuine centered delta of 0 stays unambiguous.
pub const STOP_SENTINEL: i32 = 9999;

/// Map a command to its wire integer
pub fn wire_value(cmd: Command) -> i32 {
    match cmd {
        Command::Stop => STOP_SENTINEL,
        Command::Scan(v) => v,
        Command::Track(v) => v,
    }
}

/// Encode a command as a newline-terminated ASCII decimal integer
pub fn encode(cmd: Command) -> Vec<u8> {
    format!("{}\n", wire_value(cmd)).into_bytes()
}

/// Anything the writer thread can push encoded commands into
///
/// The seam that lets tests substitute the physical port.
pub trait WritePort: Send {
    fn write_command(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Serial port wrapper for the motor controller link
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open a serial port (8N1, no flow control)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(100))
            .open()?;

        log::info!("Opened serial port: {} at {} baud", path, baud_rate);

        Ok(SerialTransport { port })
    }
}

impl WritePort for SerialTransport {
    fn write_command(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Producer handle for the coalescing command mailbox
///
/// Cloneable and thread-safe; `submit_raw` is the entry point for external
/// collaborators (e.g. the manual-move HTTP proxy) that need to push a raw
/// wire value through the same link.
#[derive(Clone)]
pub struct CommandSink {
    tx: Sender<Command>,
    rx: Receiver<Command>,
}

/// Create the capacity-one command mailbox
pub fn command_channel() -> (CommandSink, Receiver<Command>) {
    let (tx, rx) = bounded(1);
    let sink = CommandSink {
        tx,
        rx: rx.clone(),
    };
    (sink, rx)
}

impl CommandSink {
    /// Publish a command, overwriting any undelivered one
    ///
    /// Never blocks. If the writer has shut down the command is dropped.
    pub fn submit(&self, cmd: Command) {
        let mut pending = cmd;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(c)) => {
                    // Drain the stale value and retry with the fresh one
                    let _ = self.rx.try_recv();
                    pending = c;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Publish a raw wire value
    ///
    /// Manual taps ride the sweep variant; the wire encoding is the raw
    /// value either way, and the stop sentinel maps back to `Stop`.
    pub fn submit_raw(&self, value: i32) {
        let cmd = if value == STOP_SENTINEL {
            Command::Stop
        } else {
            Command::Scan(value)
        };
        self.submit(cmd);
    }
}

/// Handle to the serial writer thread
pub struct SerialWriter {
    handle: JoinHandle<()>,
    connected: Arc<AtomicBool>,
}

impl SerialWriter {
    /// Spawn the writer thread
    ///
    /// `port` is `None` when the device was absent at startup; the writer
    /// then runs disconnected and every dispatch is a logged no-op. A write
    /// failure mid-run drops the port and downgrades to the same state; the
    /// thread itself never crashes on I/O failure.
    pub fn spawn(port: Option<Box<dyn WritePort>>, rx: Receiver<Command>) -> Self {
        let connected = Arc::new(AtomicBool::new(port.is_some()));
        let connected_flag = Arc::clone(&connected);

        let handle = thread::Builder::new()
            .name("serial-writer".to_string())
            .spawn(move || {
                run_writer_loop(port, rx, connected_flag);
            })
            .expect("Failed to spawn serial writer thread");

        Self { handle, connected }
    }

    /// Whether the link is currently connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Wait for the writer to drain and exit (all sinks must be dropped)
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run_writer_loop(
    mut port: Option<Box<dyn WritePort>>,
    rx: Receiver<Command>,
    connected: Arc<AtomicBool>,
) {
    log::debug!("Serial writer thread started (connected: {})", port.is_some());

    // Blocks until a command arrives; exits when every sink is dropped
    while let Ok(cmd) = rx.recv() {
        let Some(link) = port.as_mut() else {
            log::trace!("Serial disconnected, dropping {:?}", cmd);
            continue;
        };

        let bytes = encode(cmd);
        if let Err(e) = link.write_command(&bytes) {
            log::error!("Serial write failed, closing link: {}", e);
            port = None;
            connected.store(false, Ordering::Relaxed);
        } else {
            log::trace!("Wrote {:?} as {:?}", cmd, String::from_utf8_lossy(&bytes));
        }
    }

    log::debug!("Serial writer thread exiting");
}

//! Operator control channel: WebSocket mode commands
//!
//! One accept thread plus one thread per connected client. Each client can
//! only ever do one thing: write the shared mode cell. The control loop
//! never blocks on this server; it only reads the cell once per frame.
//!
//! # Protocol
//!
//! Plaintext WebSocket messages, one command per message, vocabulary exactly
//! `stop` / `track` / `scan`. Anything else is rejected and logged without
//! touching the mode. No acknowledgement payload is sent.

use crate::controller::{Mode, SharedMode};
use crate::error::Result;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tungstenite::Message;

/// Handle to the control channel server
pub struct ControlServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ControlServer {
    /// Bind and spawn the accept thread
    ///
    /// Bind failure is fatal at startup; everything after that (handshake
    /// failures, client disconnects, bad messages) is handled locally.
    pub fn spawn(
        bind_address: &str,
        mode: SharedMode,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        let local_addr = listener.local_addr()?;
        // Non-blocking accept so the thread can observe the shutdown flag
        listener.set_nonblocking(true)?;

        let handle = thread::Builder::new()
            .name("control-server".to_string())
            .spawn(move || {
                run_accept_loop(listener, mode, shutdown);
            })?;

        log::info!("Control channel listening on ws://{}", local_addr);

        Ok(Self { local_addr, handle })
    }

    /// Actual bound address (useful when binding to port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept thread to exit
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn run_accept_loop(listener: TcpListener, mode: SharedMode, shutdown: Arc<AtomicBool>) {
    log::debug!("Control server accept loop started");

    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let mode = mode.clone();
                let shutdown = Arc::clone(&shutdown);
                let spawned = thread::Builder::new()
                    .name("control-client".to_string())
                    .spawn(move || {
                        handle_client(stream, peer, mode, shutdown);
                    });
                if let Err(e) = spawned {
                    log::error!("Failed to spawn client thread for {}: {}", peer, e);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                log::warn!("Control channel accept error: {}", e);
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    log::debug!("Control server accept loop exiting");
}

fn handle_client(stream: TcpStream, peer: SocketAddr, mode: SharedMode, shutdown: Arc<AtomicBool>) {
    // The listener is non-blocking; the handshake needs a blocking stream
    if let Err(e) = stream.set_nonblocking(false) {
        log::warn!("Failed to configure stream for {}: {}", peer, e);
        return;
    }

    let mut ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("WebSocket handshake failed from {}: {}", peer, e);
            return;
        }
    };

    // Read timeout so the thread can observe the shutdown flag
    if let Err(e) = ws.get_ref().set_read_timeout(Some(Duration::from_millis(500))) {
        log::warn!("Failed to set read timeout for {}: {}", peer, e);
    }

    log::info!("Control client connected: {}", peer);

    while !shutdown.load(Ordering::Relaxed) {
        match ws.read() {
            Ok(Message::Text(text)) => match Mode::parse(text.as_str()) {
                Some(new_mode) => {
                    log::info!("Operator command from {}: {} -> {:?}", peer, text, new_mode);
                    mode.set(new_mode);
                }
                None => {
                    log::warn!("Rejected unknown control message from {}: {:?}", peer, text);
                }
            },
            Ok(Message::Close(_)) => {
                log::info!("Control client closed: {}", peer);
                break;
            }
            // Binary payloads are ignored; ping/pong handled by the library
            Ok(_) => {}
            Err(tungstenite::Error::Io(e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                log::info!("Control client disconnected: {}", peer);
                break;
            }
            Err(e) => {
                log::debug!("Control client {} error: {}", peer, e);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_for_mode(shared: &SharedMode, expected: Mode) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while shared.get() != expected {
            assert!(
                Instant::now() < deadline,
                "mode never became {:?} (is {:?})",
                expected,
                shared.get()
            );
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_mode_commands_and_rejection() {
        let shared = SharedMode::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let server =
            ControlServer::spawn("127.0.0.1:0", shared.clone(), Arc::clone(&shutdown)).unwrap();

        let url = format!("ws://{}", server.local_addr());
        let (mut ws, _resp) = tungstenite::connect(url).unwrap();

        ws.send(Message::Text("track".into())).unwrap();
        wait_for_mode(&shared, Mode::Tracking);

        // Invalid message is ignored, not queued
        ws.send(Message::Text("bogus".into())).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(shared.get(), Mode::Tracking);

        ws.send(Message::Text("scan".into())).unwrap();
        wait_for_mode(&shared, Mode::Scanning);

        ws.send(Message::Text("stop".into())).unwrap();
        wait_for_mode(&shared, Mode::Stopped);

        let _ = ws.close(None);
        shutdown.store(true, Ordering::Relaxed);
        server.join().unwrap();
    }

    #[test]
    fn test_client_disconnect_does_not_disturb_mode() {
        let shared = SharedMode::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let server =
            ControlServer::spawn("127.0.0.1:0", shared.clone(), Arc::clone(&shutdown)).unwrap();

        let url = format!("ws://{}", server.local_addr());
        let (mut ws, _resp) = tungstenite::connect(url.clone()).unwrap();
        ws.send(Message::Text("track".into())).unwrap();
        wait_for_mode(&shared, Mode::Tracking);
        drop(ws);

        thread::sleep(Duration::from_millis(100));
        assert_eq!(shared.get(), Mode::Tracking);

        // A second client can still connect and command
        let (mut ws2, _resp) = tungstenite::connect(url).unwrap();
        ws2.send(Message::Text("stop".into())).unwrap();
        wait_for_mode(&shared, Mode::Stopped);

        let _ = ws2.close(None);
        shutdown.store(true, Ordering::Relaxed);
        server.join().unwrap();
    }
}

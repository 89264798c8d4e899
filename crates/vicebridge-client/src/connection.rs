//! Socket lifecycle and inbound frame pump.
//!
//! One [`Connection`] owns at most one TCP stream at a time. A dedicated
//! reader thread drains the socket, feeds the stream buffer, and handles
//! every decoded frame in arrival order: run-state events update the
//! connection state and notify sinks first, then the frame is offered to
//! the correlator, and anything still unclaimed is dropped with a trace
//! diagnostic.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use tracing::{debug, trace, warn};
use vicebridge_wire::{codec, Frame, ProtocolVersion, DEFAULT_MAX_BODY};

use crate::correlator::Correlator;
use crate::error::{ClientError, Result};
use crate::types::ConnectionState;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Callback invoked when the peer reports execution stopped/resumed.
pub type RunStateSink = Box<dyn Fn(bool) + Send + Sync + 'static>;

/// Callback invoked for every unsolicited (sentinel-tagged) frame.
pub type FrameSink = Box<dyn Fn(&Frame) + Send + Sync + 'static>;

/// Connection settings. The protocol generation is part of the
/// configuration: there is no wire handshake to negotiate it.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub protocol: ProtocolVersion,
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Timeout for each individual call.
    pub call_timeout: Duration,
    pub max_body_len: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6502,
            protocol: ProtocolVersion::default(),
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(10),
            max_body_len: DEFAULT_MAX_BODY,
        }
    }
}

struct LifecycleInner {
    connected: bool,
    running: bool,
    writer: Option<TcpStream>,
    reader: Option<thread::JoinHandle<()>>,
    /// Bumped on every connect; a reader thread only tears down state
    /// belonging to its own generation.
    generation: u64,
}

struct Shared {
    lifecycle: Mutex<LifecycleInner>,
    run_sinks: Mutex<Vec<RunStateSink>>,
    frame_sinks: Mutex<Vec<FrameSink>>,
}

impl Shared {
    fn lock_lifecycle(&self) -> MutexGuard<'_, LifecycleInner> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_running(&self, running: bool) {
        self.lock_lifecycle().running = running;
    }

    fn notify_run_state(&self, running: bool) {
        let sinks = self
            .run_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for sink in sinks.iter() {
            sink(running);
        }
    }

    fn notify_unsolicited(&self, frame: &Frame) {
        let sinks = self
            .frame_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for sink in sinks.iter() {
            sink(frame);
        }
    }
}

/// One monitor session. Owned and passed explicitly; nothing here is a
/// process-wide singleton, so independent sessions and test isolation
/// come for free.
pub struct Connection {
    config: ConnectionConfig,
    correlator: Arc<Correlator>,
    shared: Arc<Shared>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        let correlator = Arc::new(Correlator::new(&config.protocol.wire));
        Self {
            config,
            correlator,
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(LifecycleInner {
                    connected: false,
                    running: false,
                    writer: None,
                    reader: None,
                    generation: 0,
                }),
                run_sinks: Mutex::new(Vec::new()),
                frame_sinks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open the socket and start the reader thread.
    pub fn connect(&self) -> Result<()> {
        let mut lifecycle = self.shared.lock_lifecycle();
        if lifecycle.connected {
            return Err(ClientError::AlreadyConnected {
                host: self.config.host.clone(),
                port: self.config.port,
            });
        }

        let stream = self.open_stream()?;
        let read_half = stream.try_clone().map_err(|source| {
            ClientError::ConnectFailed {
                host: self.config.host.clone(),
                port: self.config.port,
                source,
            }
        })?;

        // Any call left over from a previous session must not survive
        // into this one with a reusable id.
        self.correlator.fail_all();

        lifecycle.writer = Some(stream);
        lifecycle.connected = true;
        // A freshly attached monitor target is executing until told otherwise.
        lifecycle.running = true;
        lifecycle.generation += 1;

        let generation = lifecycle.generation;
        let correlator = Arc::clone(&self.correlator);
        let shared = Arc::clone(&self.shared);
        let protocol = self.config.protocol.clone();
        let max_body = self.config.max_body_len;
        lifecycle.reader = Some(thread::spawn(move || {
            read_loop(read_half, generation, &protocol, max_body, &correlator, &shared);
        }));

        debug!(
            host = %self.config.host,
            port = self.config.port,
            protocol = self.config.protocol.name,
            "connected to binary monitor"
        );
        Ok(())
    }

    fn open_stream(&self) -> Result<TcpStream> {
        let connect_failed = |source: std::io::Error| ClientError::ConnectFailed {
            host: self.config.host.clone(),
            port: self.config.port,
            source,
        };
        let mut addrs = (self.config.host.as_str(), self.config.port)
            .to_socket_addrs()
            .map_err(connect_failed)?;
        let addr = addrs.next().ok_or_else(|| {
            connect_failed(std::io::Error::new(
                ErrorKind::AddrNotAvailable,
                "host resolved to no addresses",
            ))
        })?;

        let stream =
            TcpStream::connect_timeout(&addr, self.config.connect_timeout).map_err(|source| {
                if source.kind() == ErrorKind::TimedOut || source.kind() == ErrorKind::WouldBlock {
                    ClientError::ConnectTimeout {
                        host: self.config.host.clone(),
                        port: self.config.port,
                        timeout: self.config.connect_timeout,
                    }
                } else {
                    ClientError::ConnectFailed {
                        host: self.config.host.clone(),
                        port: self.config.port,
                        source,
                    }
                }
            })?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    /// Close the socket, reject all pending calls, and free the slot for
    /// a later connect. A no-op when already disconnected.
    pub fn disconnect(&self) {
        let reader = {
            let mut lifecycle = self.shared.lock_lifecycle();
            lifecycle.connected = false;
            lifecycle.running = false;
            if let Some(writer) = lifecycle.writer.take() {
                let _ = writer.shutdown(Shutdown::Both);
            }
            lifecycle.reader.take()
        };
        if let Some(handle) = reader {
            let _ = handle.join();
        }
        self.correlator.fail_all();
    }

    pub fn state(&self) -> ConnectionState {
        let lifecycle = self.shared.lock_lifecycle();
        ConnectionState {
            connected: lifecycle.connected,
            host: self.config.host.clone(),
            port: self.config.port,
            running: lifecycle.running,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock_lifecycle().connected
    }

    /// Register a sink for execution stopped/resumed notifications.
    pub fn on_run_state_changed(&self, sink: RunStateSink) {
        self.shared
            .run_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Register a sink for unsolicited frames (checkpoint hits etc.).
    pub fn on_unsolicited_frame(&self, sink: FrameSink) {
        self.shared
            .frame_sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// The facade flips this after step/continue acks; the peer's own
    /// stopped/resumed events keep it honest afterwards.
    pub(crate) fn set_running(&self, running: bool) {
        self.shared.set_running(running);
    }

    /// Send one command and wait for the matching response.
    ///
    /// The pending call is registered before any byte is written, so a
    /// response cannot arrive ahead of its table entry.
    pub(crate) fn transact(&self, command: u8, body: &[u8]) -> Result<Frame> {
        let ticket = self.correlator.register(Some(command))?;

        let mut wire = BytesMut::new();
        codec::encode_request(
            &self.config.protocol.wire,
            command,
            ticket.id,
            body,
            &mut wire,
        )?;

        let write_result = {
            let mut lifecycle = self.shared.lock_lifecycle();
            match lifecycle.writer.as_mut() {
                None => Err(ClientError::NotConnected),
                Some(writer) => writer
                    .write_all(&wire)
                    .and_then(|()| writer.flush())
                    .map_err(ClientError::SendFailed),
            }
        };
        if let Err(err) = write_result {
            self.correlator.take(ticket.id);
            return Err(err);
        }
        trace!(command, id = ticket.id, len = body.len(), "request sent");

        match ticket.rx.recv_timeout(self.config.call_timeout) {
            Ok(result) => result,
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                if self.correlator.take(ticket.id) {
                    Err(ClientError::ResponseTimeout(self.config.call_timeout))
                } else {
                    // The response won the race against our timeout; it
                    // was sent under the table lock, so it is ready now.
                    match ticket.rx.try_recv() {
                        Ok(result) => result,
                        Err(_) => Err(ClientError::ResponseTimeout(self.config.call_timeout)),
                    }
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                Err(ClientError::ConnectionClosed)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_loop(
    mut stream: TcpStream,
    generation: u64,
    protocol: &ProtocolVersion,
    max_body: usize,
    correlator: &Correlator,
    shared: &Shared,
) {
    let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    'outer: loop {
        let read = match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(error = %err, "socket read failed");
                break;
            }
        };
        buf.extend_from_slice(&chunk[..read]);

        loop {
            match codec::decode_response(&mut buf, &protocol.wire, max_body) {
                Ok(Some(frame)) => handle_frame(frame, protocol, correlator, shared),
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "unrecoverable stream error, closing connection");
                    break 'outer;
                }
            }
        }
    }

    // Teardown: mark disconnected and release the socket so a future
    // connect may proceed, then reject everything still in flight.
    {
        let mut lifecycle = shared.lock_lifecycle();
        if lifecycle.generation != generation {
            // A newer connection owns the state already.
            return;
        }
        lifecycle.connected = false;
        lifecycle.running = false;
        if let Some(writer) = lifecycle.writer.take() {
            let _ = writer.shutdown(Shutdown::Both);
        }
    }
    correlator.fail_all();
    debug!("reader loop ended");
}

fn handle_frame(
    frame: Frame,
    protocol: &ProtocolVersion,
    correlator: &Correlator,
    shared: &Shared,
) {
    // A stopped/resumed frame is a state notification first, even when it
    // also answers an in-flight call below.
    if frame.kind == protocol.events.stopped || frame.kind == protocol.events.resumed {
        let running = frame.kind == protocol.events.resumed;
        shared.set_running(running);
        shared.notify_run_state(running);
        trace!(running, "run state changed");
    }

    if frame.request_id == protocol.wire.async_request_id {
        shared.notify_unsolicited(&frame);
    }

    if let Some(frame) = correlator.dispatch(frame) {
        trace!(
            kind = frame.kind,
            request_id = frame.request_id,
            "frame matched no pending call, dropping"
        );
    }
}

//! Binary monitor client for a C64 emulator's debug socket.
//!
//! This is the protocol-engineering layer of vicebridge. One TCP
//! connection carries both synchronous command replies and unsolicited
//! events; this crate frames requests, demultiplexes that stream,
//! correlates responses to callers, and exposes typed debug operations
//! with local address validation and classified errors.
//!
//! - [`Connection`] — socket lifecycle, stream buffer, reader thread
//! - [`MonitorClient`] — typed operations (memory, registers,
//!   checkpoints, execution control, display, snapshots)
//!
//! Protocol generation selection, framing, and status classification live
//! in `vicebridge-wire`.

mod connection;
mod correlator;
pub mod error;
mod monitor;
pub mod types;

pub use connection::{Connection, ConnectionConfig, FrameSink, RunStateSink};
pub use error::{ClientError, Result};
pub use monitor::{encode_checkpoint_body, MonitorClient};
pub use types::{
    Checkpoint, CheckpointKind, CheckpointOptions, ConnectionState, DisplayFrame, MemSpace,
    PaletteEntry, RegisterId, Registers, StatusFlags,
};

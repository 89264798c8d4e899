use std::io;
use std::time::Duration;

use vicebridge_wire::{PeerStatus, WireError};

/// Errors that can occur in monitor client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Range start is past its end.
    #[error("range start {start:#06x} is past end {end:#06x}")]
    InvalidRange { start: u16, end: u16 },

    /// A write would run past the top of the 16-bit address space.
    #[error("writing {len} byte(s) at {addr:#06x} runs past the top of memory")]
    RangeOverflow { addr: u16, len: usize },

    /// Write payload is empty.
    #[error("write payload is empty")]
    EmptyPayload,

    /// Step count must be at least one instruction.
    #[error("step count must be at least 1")]
    ZeroCount,

    /// Filenames cross the wire with a single length byte.
    #[error("filename is {len} bytes, limit is 255")]
    FilenameTooLong { len: usize },

    /// No connection is open.
    #[error("not connected")]
    NotConnected,

    /// A connection is already open.
    #[error("already connected to {host}:{port}")]
    AlreadyConnected { host: String, port: u16 },

    /// The connect attempt did not complete in time.
    #[error("connecting to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// The connect attempt failed outright.
    #[error("failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: io::Error,
    },

    /// Writing the request to the socket failed.
    #[error("send failed: {0}")]
    SendFailed(io::Error),

    /// The connection closed while calls were outstanding.
    #[error("connection closed")]
    ConnectionClosed,

    /// No matching response arrived in time.
    #[error("no response after {0:?}")]
    ResponseTimeout(Duration),

    /// Every allocatable request id has a live pending call.
    #[error("every request id is attached to a pending call")]
    IdSpaceExhausted,

    /// The peer answered with a non-OK status byte.
    #[error("peer reported {0}")]
    Peer(PeerStatus),

    /// The peer's response body did not decode.
    #[error("malformed {what} response: {detail}")]
    MalformedResponse {
        what: &'static str,
        detail: String,
    },

    /// Frame-level error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
}

impl ClientError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidRange { .. } => "invalid-range",
            ClientError::RangeOverflow { .. } => "invalid-address",
            ClientError::EmptyPayload => "empty-payload",
            ClientError::ZeroCount => "invalid-count",
            ClientError::FilenameTooLong { .. } => "invalid-filename",
            ClientError::NotConnected => "not-connected",
            ClientError::AlreadyConnected { .. } => "already-connected",
            ClientError::ConnectTimeout { .. } => "connect-timeout",
            ClientError::ConnectFailed { .. } => "connect-failed",
            ClientError::SendFailed(_) => "send-failed",
            ClientError::ConnectionClosed => "connection-closed",
            ClientError::ResponseTimeout(_) => "response-timeout",
            ClientError::IdSpaceExhausted => "id-space-exhausted",
            ClientError::Peer(status) => status.kind(),
            ClientError::MalformedResponse { .. } => "malformed-response",
            ClientError::Wire(_) => "wire-error",
        }
    }

    /// Human remediation hint, when one exists.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            ClientError::InvalidRange { .. } | ClientError::RangeOverflow { .. } => {
                Some("addresses must stay inside the 16-bit space, 0x0000..=0xffff".into())
            }
            ClientError::NotConnected => Some("call connect first".into()),
            ClientError::AlreadyConnected { .. } => {
                Some("disconnect before opening another session".into())
            }
            ClientError::ConnectTimeout { host, port, .. }
            | ClientError::ConnectFailed { host, port, .. } => Some(format!(
                "ensure the emulator's binary monitor is enabled and listening on {host}:{port} \
                 (e.g. start it with -binarymonitor)"
            )),
            ClientError::ConnectionClosed => {
                Some("the emulator side dropped the session; reconnect and retry".into())
            }
            ClientError::ResponseTimeout(_) => Some(
                "the emulator may be paused inside its own monitor UI; resume it and retry".into(),
            ),
            ClientError::IdSpaceExhausted => {
                Some("wait for outstanding calls to finish before issuing more".into())
            }
            ClientError::Peer(status) => Some(status.suggestion()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vicebridge_wire::status;

    #[test]
    fn peer_errors_classify_through_status() {
        let err = ClientError::Peer(PeerStatus(status::OBJECT_MISSING));
        assert_eq!(err.kind(), "object-missing");
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn connect_failures_carry_a_hint() {
        let err = ClientError::ConnectFailed {
            host: "127.0.0.1".into(),
            port: 6502,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let hint = err.suggestion().unwrap();
        assert!(hint.contains("127.0.0.1:6502"));
        assert!(hint.contains("binarymonitor"));
    }

    #[test]
    fn local_validation_kinds_are_stable() {
        assert_eq!(
            ClientError::InvalidRange {
                start: 2,
                end: 1
            }
            .kind(),
            "invalid-range"
        );
        assert_eq!(ClientError::EmptyPayload.kind(), "empty-payload");
    }
}

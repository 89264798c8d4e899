//! Peer status bytes and their classification.
//!
//! Unlike the command codes, status bytes have stayed stable across
//! protocol generations, so they are plain constants rather than part of
//! the versioned [`crate::ProtocolVersion`] configuration.

use std::fmt;

pub const OK: u8 = 0x00;
pub const OBJECT_MISSING: u8 = 0x01;
pub const INVALID_MEMSPACE: u8 = 0x02;
pub const INVALID_COMMAND_LENGTH: u8 = 0x80;
pub const INVALID_PARAMETER: u8 = 0x81;
pub const INVALID_API_VERSION: u8 = 0x82;
pub const INVALID_COMMAND_TYPE: u8 = 0x83;
pub const INVALID_TARGET: u8 = 0x84;
pub const INVALID_PARAMETER_LENGTH: u8 = 0x85;

/// A classified peer status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerStatus(pub u8);

impl PeerStatus {
    pub fn is_ok(self) -> bool {
        self.0 == OK
    }

    /// Stable machine-readable kind for this status.
    pub fn kind(self) -> &'static str {
        match self.0 {
            OK => "ok",
            OBJECT_MISSING => "object-missing",
            INVALID_MEMSPACE => "invalid-memory-space",
            INVALID_COMMAND_LENGTH => "invalid-command-length",
            INVALID_PARAMETER => "invalid-parameter",
            INVALID_API_VERSION => "invalid-api-version",
            INVALID_COMMAND_TYPE => "invalid-command-type",
            INVALID_TARGET => "invalid-target",
            INVALID_PARAMETER_LENGTH => "invalid-parameter-length",
            _ => "peer-error",
        }
    }

    /// Human remediation hint for this status.
    pub fn suggestion(self) -> String {
        match self.0 {
            OBJECT_MISSING => {
                "the referenced object does not exist on the peer; it may have been deleted or never created".into()
            }
            INVALID_MEMSPACE => {
                "use memspace 'main' or a drive unit the attached machine actually has".into()
            }
            INVALID_COMMAND_LENGTH => {
                "the request body length does not match this command; check the selected protocol generation".into()
            }
            INVALID_PARAMETER => "a request parameter is out of range for the peer".into(),
            INVALID_API_VERSION => {
                "the peer speaks a different protocol generation; reconnect with --protocol v1/v2/v3".into()
            }
            INVALID_COMMAND_TYPE => {
                "the peer does not know this command code; it likely speaks an older protocol generation".into()
            }
            INVALID_TARGET => "the addressed device is not present on the peer".into(),
            INVALID_PARAMETER_LENGTH => {
                "a length-prefixed request field does not match its declared length".into()
            }
            code => format!(
                "peer returned error 0x{code:02x}; consult the emulator's monitor log for details"
            ),
        }
    }
}

impl fmt::Display for PeerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.kind(), self.0)
    }
}

//! Wire format for the C64 binary monitor protocol.
//!
//! Every message is framed with:
//! - A 1-byte start marker (0x02) for stream resynchronization
//! - A 1-byte protocol api version
//! - A 4-byte little-endian body length
//! - A request id and kind/status bytes whose width and order are
//!   generation-specific (see [`ProtocolVersion`])
//!
//! No partial reads, no buffer management in user code.

pub mod body;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod status;

pub use body::BodyCursor;
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, Frame, Request,
    DEFAULT_MAX_BODY, STX,
};
pub use error::{Result, WireError};
pub use protocol::{CommandSet, EventSet, IdWidth, ProtocolVersion, WireFormat};
pub use status::PeerStatus;

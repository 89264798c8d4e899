/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The frame header declares a body larger than the configured maximum.
    #[error("frame body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The frame header carries an API version other than the configured one.
    #[error("frame declares api version {found:#04x}, expected {expected:#04x}")]
    VersionMismatch { expected: u8, found: u8 },

    /// The request id does not fit the configured id field width.
    #[error("request id {id:#x} does not fit a {width}-byte id field")]
    RequestIdOutOfRange { id: u32, width: usize },

    /// A body decode read past the end of the body.
    #[error("body truncated: needed {needed} more byte(s)")]
    Truncated { needed: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur when decoding raw hardware state.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input buffer is not the size the decoder requires.
    #[error("expected {expected} byte(s) of {what}, got {got}")]
    WrongLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

pub type Result<T> = std::result::Result<T, DecodeError>;

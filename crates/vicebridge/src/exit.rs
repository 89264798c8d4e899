use std::fmt;

use vicebridge_client::ClientError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const CONNECTION_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// A terminal error: exit code plus the structured fields the output
/// layer marshals ({isError, code, message, suggestion}).
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub kind: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            kind: "error".to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    let code = match &err {
        ClientError::InvalidRange { .. }
        | ClientError::RangeOverflow { .. }
        | ClientError::EmptyPayload
        | ClientError::ZeroCount
        | ClientError::FilenameTooLong { .. } => USAGE,
        ClientError::NotConnected
        | ClientError::AlreadyConnected { .. }
        | ClientError::ConnectTimeout { .. }
        | ClientError::ConnectFailed { .. }
        | ClientError::SendFailed(_)
        | ClientError::ConnectionClosed => CONNECTION_ERROR,
        ClientError::ResponseTimeout(_) => TIMEOUT,
        ClientError::MalformedResponse { .. } | ClientError::Wire(_) => DATA_INVALID,
        ClientError::IdSpaceExhausted | ClientError::Peer(_) => FAILURE,
    };
    CliError {
        code,
        kind: err.kind().to_string(),
        message: format!("{context}: {err}"),
        suggestion: err.suggestion(),
    }
}

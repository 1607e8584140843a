use sohook_protocol::EnvelopeError;

/// Errors from the agent client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("agent error {code}: {message}")]
    Agent { code: i64, message: String },

    #[error("endpoint URL is empty")]
    EmptyEndpoint,
}

/// Coarse failure category, used for logging and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Host unreachable, connection refused, timeout or unusable URL.
    Network,
    /// The agent answered with something that is not a valid envelope.
    Protocol,
    /// The envelope carried a non-zero `code`.
    Agent,
    /// Rejected locally before any request was made.
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::Status { .. } | Error::Protocol(_) => ErrorKind::Protocol,
            Error::Agent { .. } => ErrorKind::Agent,
            Error::EmptyEndpoint => ErrorKind::Config,
        }
    }

    /// Whether the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Network(e) if e.is_timeout())
    }
}

impl From<EnvelopeError> for Error {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::Agent { code, message } => Error::Agent { code, message },
            EnvelopeError::Payload(e) => Error::Protocol(e),
        }
    }
}

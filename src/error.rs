// Error taxonomy for the client. The API and session layers return
// `PmsError`; the binary wraps them in `anyhow` and maps the innermost
// `PmsError` back to a process exit code.

use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PmsError {
    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// A client-side precondition failed; raised before any request is sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the JSON we expected.
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session file {}: {source}", path.display())]
    Session {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PmsError>;

/// Process exit codes, one per error class.
pub mod exit {
    pub const OK: u8 = 0;
    pub const HTTP: u8 = 1;
    pub const INVALID_ARGUMENT: u8 = 2;
    pub const TRANSPORT: u8 = 3;
    pub const LOCAL: u8 = 4;
}

impl PmsError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PmsError::Http { .. } => exit::HTTP,
            PmsError::InvalidArgument(_) => exit::INVALID_ARGUMENT,
            PmsError::Transport(_) | PmsError::Decode(_) => exit::TRANSPORT,
            PmsError::Session { .. } | PmsError::Io(_) => exit::LOCAL,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PmsError::InvalidArgument(msg.into())
    }
}

/// Exit code for an application-level error: the first `PmsError` found in
/// the chain decides, anything else is a local failure.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<PmsError>())
        .map(PmsError::exit_code)
        .unwrap_or(exit::LOCAL)
}

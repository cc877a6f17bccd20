//! Error types and handlers for IIB, Pulp and Quay operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IibPushError>;

#[derive(Error, Debug)]
pub enum IibPushError {
    /// Invalid argument combination, raised before any remote call
    #[error("Validation error: {0}")]
    Validation(String),
    /// IIB API errors
    #[error("IIB error: {0}")]
    Iib(String),
    /// The build reached the `failed` state
    #[error("IIB build {id} failed: {reason}")]
    BuildFailed { id: String, reason: String },
    /// The build did not reach a terminal state in time
    #[error("Timed out after {seconds}s waiting for IIB build {id}")]
    BuildTimeout { id: String, seconds: u64 },
    /// Kerberos ticket or SPNEGO errors
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Pulp error: {0}")]
    Pulp(String),
    #[error("Quay error: {0}")]
    Quay(String),
    /// An external command could not be spawned or exited non-zero
    #[error("Command '{program}' failed: {message}")]
    Command { program: String, message: String },
    #[error("Push collector error: {0}")]
    Collector(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IibPushError {
    /// Process exit code for this error: 2 for usage problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            IibPushError::Validation(_) => 2,
            _ => 1,
        }
    }
}

impl From<reqwest::Error> for IibPushError {
    fn from(err: reqwest::Error) -> Self {
        handlers::NetworkErrorHandler::handle_network_error(&err, "request")
    }
}

impl From<url::ParseError> for IibPushError {
    fn from(err: url::ParseError) -> Self {
        IibPushError::Validation(format!("Invalid URL: {}", err))
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Query failed ({status}): {message}")]
    Query { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] csv::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl ClientError {
    /// Whether the failure came from reaching or authenticating with the store
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Unauthorized(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

use thiserror::Error;

/// Main error type shared by the studio dashboard crates
#[derive(Error, Debug)]
pub enum StudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown sensor: {0}")]
    UnknownSensor(String),

    #[error("Invalid time window (start={start}d, stop={stop}d): {reason}")]
    InvalidWindow { start: u32, stop: u32, reason: String },
}

pub type Result<T> = std::result::Result<T, StudioError>;

pub mod types;
pub mod error;
pub mod config;

pub use types::*;
pub use error::{Result, StudioError};
pub use config::{
    ConflictPolicy, DashboardConfig, EnvOverrides, PivotConfig, ServerConfig, StoreConfig,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BUCKET, "Studio");
        assert!(MIN_START_DAYS > MIN_STOP_DAYS);
        assert!(MAX_START_DAYS > MAX_STOP_DAYS);
        assert!(DEFAULT_START_DAYS > DEFAULT_STOP_DAYS);
    }
}

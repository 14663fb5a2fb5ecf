pub mod app_config;
pub mod config;
pub mod job;
pub mod numeric;
pub mod pricing;
pub mod store;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use job::{JobEta, JobMode, JobParams, NewLogEntry, OutcomeStatus, PriceJob, RunLogEntry};
pub use store::{InMemoryJobStore, JobStore, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid job mode: {0}")]
    InvalidJobMode(String),
    #[error("invalid outcome status: {0}")]
    InvalidOutcomeStatus(String),
}

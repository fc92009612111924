use thiserror::Error;

use crate::sweep::model::DeletionOutcome;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unrecognized config type: {0}")]
    UnrecognizedSource(String),

    #[error("Config source '{0}' is not available in this build")]
    SourceUnavailable(String),

    #[error("Missing required config field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Remote config error: {0}")]
    Remote(String),
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("delete called with an empty identifier list")]
    EmptyBatch,

    #[error("partial cross-store deletion: {0}")]
    PartialDeletion(DeletionOutcome),

    #[error("origin returned identifier {0} which was already deleted in this run")]
    RevisitedIdentifier(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type SweepResult<T> = Result<T, SweepError>;

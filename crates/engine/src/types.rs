use std::path::PathBuf;

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a FeatureCollection, found `{0}`")]
    NotAFeatureCollection(String),
    #[error("postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),
    #[error("invalid manifest: {0}")]
    Manifest(#[from] toml::de::Error),
    #[error("invalid table name `{name}`: {reason}")]
    InvalidTableName { name: String, reason: &'static str },
    #[error("invalid import target `{0}`, expected <path>=<name>")]
    InvalidTarget(String),
    #[error("no transaction is open")]
    NoTransaction,
    #[error("a transaction is already open")]
    TransactionOpen,
}

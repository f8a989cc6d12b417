//! Import GeoJSON feature collections into a spatial table.
//!
//! The engine owns everything below the command line: configuration types,
//! feature collection parsing, the [`FeatureStore`] backends (PostGIS and
//! DuckDB spatial) and the import/export routines that drive them.

mod config;
mod duckdb_store;
mod export;
mod feature;
mod identifiers;
mod importer;
#[cfg(test)]
mod memory_store;
mod postgis;
mod store;
mod types;

pub use config::{
    default_targets, DuckDbConfig, ImportManifest, ImportTarget, PostgresConfig,
    DEFAULT_DUCKDB_PATH, DEFAULT_DUCKDB_TABLE, DEFAULT_PG_DATABASE, DEFAULT_PG_HOST,
    DEFAULT_PG_PASSWORD, DEFAULT_PG_PORT, DEFAULT_PG_USER, DEFAULT_POSTGIS_TABLE,
};
pub use duckdb_store::{DuckDbConnector, DuckDbStore};
pub use export::{export_features, feature_collection};
pub use feature::{parse_feature_collection, read_feature_collection, FeatureRow};
pub use identifiers::validate_table_name;
pub use importer::{
    ensure_schema, import_all, import_file, run_import, ImportOutcome, ImportReport,
    ImportStatus, ImportSummary,
};
pub use postgis::{PostgisConnector, PostgisStore};
pub use store::{FeatureStore, StoreConnector, StoredFeature};
pub use types::{EngineError, EngineResult};

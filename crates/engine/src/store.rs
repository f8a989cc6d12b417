use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{EngineResult, FeatureRow};

/// A single connection to the table holding imported features.
///
/// Inserts only happen between [`begin`](FeatureStore::begin) and
/// [`commit`](FeatureStore::commit) / [`rollback`](FeatureStore::rollback).
#[async_trait]
pub trait FeatureStore: Send + Sized {
    /// Enables the spatial extension and creates the table if needed.
    async fn ensure_schema(&mut self) -> EngineResult<()>;

    /// Rows previously imported under `source_name`.
    async fn count_by_name(&mut self, source_name: &str) -> EngineResult<i64>;

    async fn begin(&mut self) -> EngineResult<()>;

    async fn insert_feature(&mut self, source_name: &str, row: &FeatureRow) -> EngineResult<()>;

    async fn commit(&mut self) -> EngineResult<()>;

    async fn rollback(&mut self) -> EngineResult<()>;

    /// Stored rows ordered by id, optionally limited to one import.
    async fn fetch_features(
        &mut self,
        source_name: Option<&str>,
    ) -> EngineResult<Vec<StoredFeature>>;

    /// Releases the connection. An open transaction is rolled back.
    async fn close(self) -> EngineResult<()>;
}

/// Opens a fresh [`FeatureStore`] for each logical operation.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: FeatureStore;

    async fn connect(&self) -> EngineResult<Self::Store>;
}

/// A row read back from the feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFeature {
    pub id: i64,
    pub source_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub geometry: Option<Value>,
    pub properties: Map<String, Value>,
}

impl StoredFeature {
    /// Builds a row from the text columns both backends select.
    pub(crate) fn from_columns(
        id: i64,
        source_name: Option<String>,
        name: Option<String>,
        description: Option<String>,
        geometry: Option<String>,
        properties: Option<String>,
    ) -> EngineResult<Self> {
        let geometry = geometry
            .map(|text| serde_json::from_str::<Value>(&text))
            .transpose()?;
        let properties = match properties {
            Some(text) => match serde_json::from_str::<Value>(&text)? {
                Value::Object(map) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        Ok(Self {
            id,
            source_name,
            name,
            description,
            geometry,
            properties,
        })
    }
}

/// Closes `store`, keeping `result` as the outcome when it already failed.
pub(crate) async fn close_after<S, T>(store: S, result: EngineResult<T>) -> EngineResult<T>
where
    S: FeatureStore,
{
    match (result, store.close().await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::error!(error = %close_err, "failed to close store after error");
            Err(err)
        }
    }
}

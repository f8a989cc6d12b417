//! In-memory [`FeatureStore`] for exercising the import flow without a database.

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::store::{FeatureStore, StoreConnector, StoredFeature};
use crate::{EngineError, EngineResult, FeatureRow};

#[derive(Debug, Default)]
pub struct MemoryState {
    pub schema_ready: bool,
    pub rows: Vec<StoredFeature>,
    pub connections: usize,
    pub closed: usize,
    pub rollbacks: usize,
    pub inserts: usize,
    /// Zero-based insert attempt that fails.
    pub fail_insert_at: Option<usize>,
    pub fail_schema: bool,
    next_id: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    pub state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnector {
    pub fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self) -> EngineResult<MemoryStore> {
        self.state().connections += 1;
        Ok(MemoryStore {
            state: Arc::clone(&self.state),
            staged: None,
        })
    }
}

pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    staged: Option<Vec<StoredFeature>>,
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn ensure_schema(&mut self) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_schema {
            return Err(io::Error::other("extension unavailable").into());
        }
        state.schema_ready = true;
        Ok(())
    }

    async fn count_by_name(&mut self, source_name: &str) -> EngineResult<i64> {
        let state = self.state.lock().unwrap();
        let count = state
            .rows
            .iter()
            .filter(|row| row.source_name.as_deref() == Some(source_name))
            .count();
        Ok(count as i64)
    }

    async fn begin(&mut self) -> EngineResult<()> {
        if self.staged.is_some() {
            return Err(EngineError::TransactionOpen);
        }
        self.staged = Some(Vec::new());
        Ok(())
    }

    async fn insert_feature(&mut self, source_name: &str, row: &FeatureRow) -> EngineResult<()> {
        let staged = self.staged.as_mut().ok_or(EngineError::NoTransaction)?;
        let mut state = self.state.lock().unwrap();
        let attempt = state.inserts;
        state.inserts += 1;
        if state.fail_insert_at == Some(attempt) {
            return Err(io::Error::other("injected insert failure").into());
        }
        staged.push(StoredFeature::from_columns(
            0,
            Some(source_name.to_string()),
            Some(row.name.clone()),
            Some(row.description.clone()),
            row.geometry.clone(),
            Some(serde_json::to_string(&row.properties)?),
        )?);
        Ok(())
    }

    async fn commit(&mut self) -> EngineResult<()> {
        let staged = self.staged.take().ok_or(EngineError::NoTransaction)?;
        let mut state = self.state.lock().unwrap();
        for mut row in staged {
            state.next_id += 1;
            row.id = state.next_id;
            state.rows.push(row);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> EngineResult<()> {
        self.staged.take().ok_or(EngineError::NoTransaction)?;
        self.state.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    async fn fetch_features(
        &mut self,
        source_name: Option<&str>,
    ) -> EngineResult<Vec<StoredFeature>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .iter()
            .filter(|row| source_name.is_none() || row.source_name.as_deref() == source_name)
            .cloned()
            .collect())
    }

    async fn close(mut self) -> EngineResult<()> {
        if self.staged.is_some() {
            self.rollback().await?;
        }
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

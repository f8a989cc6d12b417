use std::path::PathBuf;

use async_trait::async_trait;
use duckdb::Connection;

use crate::identifiers::validate_table_name;
use crate::store::{FeatureStore, StoreConnector, StoredFeature};
use crate::{DuckDbConfig, EngineError, EngineResult, FeatureRow};

/// Opens a local DuckDB file with the `spatial` extension loaded.
#[derive(Debug, Clone)]
pub struct DuckDbConnector {
    path: PathBuf,
    table: String,
}

impl DuckDbConnector {
    pub fn new(config: DuckDbConfig, table: impl Into<String>) -> EngineResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            path: config.path,
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl StoreConnector for DuckDbConnector {
    type Store = DuckDbStore;

    async fn connect(&self) -> EngineResult<DuckDbStore> {
        let conn = Connection::open(&self.path)?;
        ensure_spatial_extension(&conn)?;
        tracing::debug!(path = %self.path.display(), "opened duckdb database");
        Ok(DuckDbStore {
            conn,
            table: self.table.clone(),
            in_transaction: false,
        })
    }
}

fn ensure_spatial_extension(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch("INSTALL spatial; LOAD spatial;")?;
    Ok(())
}

pub struct DuckDbStore {
    conn: Connection,
    table: String,
    in_transaction: bool,
}

impl DuckDbStore {
    fn sequence_name(&self) -> String {
        format!("{}_id_seq", self.table)
    }

    /// `CREATE SCHEMA` for a qualified table; DuckDB only ships `main`.
    fn create_schema_sql(&self) -> Option<String> {
        self.table
            .split_once('.')
            .map(|(schema, _)| format!("CREATE SCHEMA IF NOT EXISTS {schema};"))
    }

    fn require_transaction(&self) -> EngineResult<()> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(EngineError::NoTransaction)
        }
    }
}

#[async_trait]
impl FeatureStore for DuckDbStore {
    async fn ensure_schema(&mut self) -> EngineResult<()> {
        if let Some(create_schema) = self.create_schema_sql() {
            self.conn.execute_batch(&create_schema)?;
        }
        // GEOMETRY carries no SRID here; coordinates are stored as lon/lat WGS84.
        let sql = format!(
            "CREATE SEQUENCE IF NOT EXISTS {sequence};
             CREATE TABLE IF NOT EXISTS {table} (
                 id BIGINT PRIMARY KEY DEFAULT nextval('{sequence}'),
                 source_name VARCHAR,
                 name VARCHAR,
                 description VARCHAR,
                 geom GEOMETRY,
                 properties JSON
             );
             ALTER TABLE {table} ADD COLUMN IF NOT EXISTS source_name VARCHAR;",
            sequence = self.sequence_name(),
            table = self.table
        );
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    async fn count_by_name(&mut self, source_name: &str) -> EngineResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE source_name = $1",
            table = self.table
        );
        let count: i64 = self
            .conn
            .query_row(&sql, duckdb::params![source_name], |row| row.get(0))?;
        Ok(count)
    }

    async fn begin(&mut self) -> EngineResult<()> {
        if self.in_transaction {
            return Err(EngineError::TransactionOpen);
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    async fn insert_feature(&mut self, source_name: &str, row: &FeatureRow) -> EngineResult<()> {
        self.require_transaction()?;
        let sql = format!(
            "INSERT INTO {table} (source_name, name, description, geom, properties)
             VALUES ($1, $2, $3, ST_GeomFromGeoJSON($4), CAST($5 AS JSON))",
            table = self.table
        );
        let properties = serde_json::to_string(&row.properties)?;
        self.conn.execute(
            &sql,
            duckdb::params![
                source_name,
                row.name,
                row.description,
                row.geometry,
                properties
            ],
        )?;
        Ok(())
    }

    async fn commit(&mut self) -> EngineResult<()> {
        self.require_transaction()?;
        self.in_transaction = false;
        if let Err(err) = self.conn.execute_batch("COMMIT") {
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %rollback_err, "failed to roll back after commit error");
            }
            return Err(err.into());
        }
        Ok(())
    }

    async fn rollback(&mut self) -> EngineResult<()> {
        self.require_transaction()?;
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    async fn fetch_features(
        &mut self,
        source_name: Option<&str>,
    ) -> EngineResult<Vec<StoredFeature>> {
        let sql = format!(
            "SELECT id, source_name, name, description,
                    CAST(ST_AsGeoJSON(geom) AS VARCHAR), CAST(properties AS VARCHAR)
             FROM {table}
             WHERE ($1::VARCHAR IS NULL OR source_name = $1)
             ORDER BY id",
            table = self.table
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(duckdb::params![source_name], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, source_name, name, description, geometry, properties) = row?;
            out.push(StoredFeature::from_columns(
                id,
                source_name,
                name,
                description,
                geometry,
                properties,
            )?);
        }
        Ok(out)
    }

    async fn close(mut self) -> EngineResult<()> {
        if self.in_transaction {
            self.rollback().await?;
        }
        self.conn.close().map_err(|(_, err)| EngineError::from(err))
    }
}

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use crate::identifiers::validate_table_name;
use crate::store::{FeatureStore, StoreConnector, StoredFeature};
use crate::{EngineError, EngineResult, FeatureRow, PostgresConfig};

/// Connects to PostgreSQL with the PostGIS extension.
#[derive(Debug, Clone)]
pub struct PostgisConnector {
    config: PostgresConfig,
    table: String,
}

impl PostgisConnector {
    pub fn new(config: PostgresConfig, table: impl Into<String>) -> EngineResult<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { config, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.database)
            .username(&self.config.user)
            .password(&self.config.password)
    }
}

#[async_trait]
impl StoreConnector for PostgisConnector {
    type Store = PostgisStore;

    async fn connect(&self) -> EngineResult<PostgisStore> {
        // One connection per operation, never shared.
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(self.connect_options())
            .await?;
        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            database = %self.config.database,
            "connected to postgres"
        );
        Ok(PostgisStore {
            pool,
            table: self.table.clone(),
            tx: None,
        })
    }
}

pub struct PostgisStore {
    pool: PgPool,
    table: String,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgisStore {
    fn transaction(&mut self) -> EngineResult<&mut Transaction<'static, Postgres>> {
        self.tx.as_mut().ok_or(EngineError::NoTransaction)
    }
}

#[async_trait]
impl FeatureStore for PostgisStore {
    async fn ensure_schema(&mut self) -> EngineResult<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS postgis")
            .execute(&self.pool)
            .await?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id SERIAL PRIMARY KEY,
                source_name VARCHAR(255),
                name VARCHAR(255),
                description TEXT,
                geom geometry(Geometry, 4326),
                properties JSONB
            )",
            table = self.table
        );
        sqlx::query(&create).execute(&self.pool).await?;

        // Tables created before imports were tagged lack the column.
        let alter = format!(
            "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS source_name VARCHAR(255)",
            table = self.table
        );
        sqlx::query(&alter).execute(&self.pool).await?;
        Ok(())
    }

    async fn count_by_name(&mut self, source_name: &str) -> EngineResult<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE source_name = $1",
            table = self.table
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(source_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn begin(&mut self) -> EngineResult<()> {
        if self.tx.is_some() {
            return Err(EngineError::TransactionOpen);
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn insert_feature(&mut self, source_name: &str, row: &FeatureRow) -> EngineResult<()> {
        let sql = format!(
            "INSERT INTO {table} (source_name, name, description, geom, properties)
             VALUES ($1, $2, $3, ST_SetSRID(ST_GeomFromGeoJSON($4::text), 4326), $5)",
            table = self.table
        );
        let tx = self.transaction()?;
        sqlx::query(&sql)
            .bind(source_name)
            .bind(&row.name)
            .bind(&row.description)
            .bind(row.geometry.as_deref())
            .bind(Json(&row.properties))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> EngineResult<()> {
        let tx = self.tx.take().ok_or(EngineError::NoTransaction)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> EngineResult<()> {
        let tx = self.tx.take().ok_or(EngineError::NoTransaction)?;
        tx.rollback().await?;
        Ok(())
    }

    async fn fetch_features(
        &mut self,
        source_name: Option<&str>,
    ) -> EngineResult<Vec<StoredFeature>> {
        let sql = format!(
            "SELECT id::int8, source_name, name, description,
                    ST_AsGeoJSON(geom), properties::text
             FROM {table}
             WHERE ($1::text IS NULL OR source_name = $1)
             ORDER BY id",
            table = self.table
        );
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
                Option<String>,
            ),
        >(&sql)
        .bind(source_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, source_name, name, description, geometry, properties)| {
                StoredFeature::from_columns(id, source_name, name, description, geometry, properties)
            })
            .collect()
    }

    async fn close(mut self) -> EngineResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        self.pool.close().await;
        Ok(())
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use geoimport_engine::{
    DuckDbConfig, DuckDbConnector, EngineResult, ImportManifest, ImportTarget, PostgisConnector,
    PostgresConfig, DEFAULT_DUCKDB_PATH, DEFAULT_DUCKDB_TABLE, DEFAULT_PG_DATABASE,
    DEFAULT_PG_HOST, DEFAULT_PG_PASSWORD, DEFAULT_PG_PORT, DEFAULT_PG_USER,
    DEFAULT_POSTGIS_TABLE,
};

use crate::CliResult;

pub mod export;
pub mod import;

#[derive(Debug, Parser)]
#[command(
    name = "geoimport",
    version,
    about = "Import GeoJSON feature collections into a spatial table",
    after_help = "Connection defaults are the fixed importer constants \
                  (localhost:5432, database webgis, user postgres). \
                  Environment variables and flags override them; \
                  without --manifest or --file the built-in file list \
                  (data/nanjing.geojson, data/suzhou.geojson) is imported."
)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the feature table if needed, then import files.
    ///
    /// Without --manifest or --file the built-in file list is imported.
    Import {
        /// TOML manifest listing `[[files]]` entries and an optional `table`.
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// File to import and its display name; may be repeated.
        #[arg(long = "file", value_name = "PATH=NAME")]
        files: Vec<ImportTarget>,
    },
    /// Write stored features as a GeoJSON FeatureCollection.
    Export {
        /// Only export rows imported under this name.
        #[arg(long)]
        name: Option<String>,

        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// PostgreSQL with PostGIS.
    Postgres,
    /// Local DuckDB file with the spatial extension.
    Duckdb,
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    #[arg(
        long,
        value_enum,
        env = "GEOIMPORT_BACKEND",
        default_value_t = Backend::Postgres,
        global = true
    )]
    pub backend: Backend,

    #[arg(long, env = "PGHOST", default_value = DEFAULT_PG_HOST, global = true)]
    pub host: String,

    #[arg(long, env = "PGPORT", default_value_t = DEFAULT_PG_PORT, global = true)]
    pub port: u16,

    #[arg(long, env = "PGDATABASE", default_value = DEFAULT_PG_DATABASE, global = true)]
    pub database: String,

    #[arg(long, env = "PGUSER", default_value = DEFAULT_PG_USER, global = true)]
    pub user: String,

    #[arg(
        long,
        env = "PGPASSWORD",
        default_value = DEFAULT_PG_PASSWORD,
        hide_env_values = true,
        hide_default_value = true,
        global = true
    )]
    pub password: String,

    /// Target table, optionally schema qualified.
    #[arg(long, env = "GEOIMPORT_TABLE", global = true)]
    pub table: Option<String>,

    #[arg(
        long,
        env = "GEOIMPORT_DUCKDB_PATH",
        default_value = DEFAULT_DUCKDB_PATH,
        global = true
    )]
    pub duckdb_path: PathBuf,
}

impl ConnectionArgs {
    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
    }

    fn postgis(&self, table: Option<String>) -> EngineResult<PostgisConnector> {
        let table = table.unwrap_or_else(|| DEFAULT_POSTGIS_TABLE.to_string());
        PostgisConnector::new(self.postgres_config(), table)
    }

    fn duckdb(&self, table: Option<String>) -> EngineResult<DuckDbConnector> {
        let table = table.unwrap_or_else(|| DEFAULT_DUCKDB_TABLE.to_string());
        let config = DuckDbConfig {
            path: self.duckdb_path.clone(),
        };
        DuckDbConnector::new(config, table)
    }
}

pub async fn dispatch(cli: Cli) -> CliResult<ExitCode> {
    let Cli {
        connection,
        command,
    } = cli;

    match command {
        Command::Import { manifest, files } => {
            let manifest = manifest
                .as_deref()
                .map(ImportManifest::load)
                .transpose()?;
            // --table / GEOIMPORT_TABLE wins over the manifest's table.
            let table = connection
                .table
                .clone()
                .or_else(|| manifest.as_ref().and_then(|m| m.table.clone()));
            let targets = import::collect_targets(manifest, files);
            match connection.backend {
                Backend::Postgres => import::run(&connection.postgis(table)?, &targets).await,
                Backend::Duckdb => import::run(&connection.duckdb(table)?, &targets).await,
            }
        }
        Command::Export { name, output } => {
            let table = connection.table.clone();
            let name = name.as_deref();
            let output = output.as_deref();
            match connection.backend {
                Backend::Postgres => {
                    export::run(&connection.postgis(table)?, name, output).await
                }
                Backend::Duckdb => export::run(&connection.duckdb(table)?, name, output).await,
            }
        }
    }
}

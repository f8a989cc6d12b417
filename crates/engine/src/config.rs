use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::{EngineError, EngineResult};

pub const DEFAULT_POSTGIS_TABLE: &str = "public.geojson_data";
pub const DEFAULT_DUCKDB_TABLE: &str = "geojson_data";

pub const DEFAULT_PG_HOST: &str = "localhost";
pub const DEFAULT_PG_PORT: u16 = 5432;
pub const DEFAULT_PG_DATABASE: &str = "webgis";
pub const DEFAULT_PG_USER: &str = "postgres";
pub const DEFAULT_PG_PASSWORD: &str = "123";

pub const DEFAULT_DUCKDB_PATH: &str = "geoimport.duckdb";

/// Connection parameters for the PostGIS backend.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PG_HOST.to_string(),
            port: DEFAULT_PG_PORT,
            database: DEFAULT_PG_DATABASE.to_string(),
            user: DEFAULT_PG_USER.to_string(),
            password: DEFAULT_PG_PASSWORD.to_string(),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckDbConfig {
    pub path: PathBuf,
}

impl Default for DuckDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DUCKDB_PATH),
        }
    }
}

/// One input file and the display name its rows are recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportTarget {
    pub path: PathBuf,
    pub name: String,
}

impl ImportTarget {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Parses `<path>=<name>`, splitting on the first `=`.
impl FromStr for ImportTarget {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((path, name)) = value.split_once('=') else {
            return Err(EngineError::InvalidTarget(value.to_string()));
        };
        let (path, name) = (path.trim(), name.trim());
        if path.is_empty() || name.is_empty() {
            return Err(EngineError::InvalidTarget(value.to_string()));
        }
        Ok(Self::new(path, name))
    }
}

/// The built-in import list used when nothing else is configured.
pub fn default_targets() -> Vec<ImportTarget> {
    vec![
        ImportTarget::new("data/nanjing.geojson", "南京市"),
        ImportTarget::new("data/suzhou.geojson", "苏州市"),
    ]
}

/// A TOML file listing the files to import:
///
/// ```toml
/// table = "public.geojson_data"
///
/// [[files]]
/// path = "data/nanjing.geojson"
/// name = "南京市"
/// ```
///
/// Relative file paths are resolved against the manifest's directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportManifest {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub files: Vec<ImportTarget>,
}

impl ImportManifest {
    pub fn parse(input: &str) -> EngineResult<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let input = fs::read_to_string(path).map_err(|source| EngineError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::parse(&input)?;
        if let Some(base) = path.parent() {
            for target in &mut manifest.files {
                if target.path.is_relative() {
                    target.path = base.join(&target.path);
                }
            }
        }
        Ok(manifest)
    }
}

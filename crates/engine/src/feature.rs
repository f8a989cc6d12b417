use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{EngineError, EngineResult};

const FEATURE_COLLECTION: &str = "FeatureCollection";

/// Property copied into the `name` column.
pub const NAME_PROPERTY: &str = "name";
/// Property copied into the `description` column.
pub const DESCRIPTION_PROPERTY: &str = "describe";

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Option<Vec<RawFeature>>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

/// One feature, shaped for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub name: String,
    pub description: String,
    /// GeoJSON geometry text, `None` for a null geometry.
    pub geometry: Option<String>,
    /// The full property bag, `name` and `describe` included.
    pub properties: Map<String, Value>,
}

impl FeatureRow {
    fn from_raw(raw: RawFeature) -> EngineResult<Self> {
        let properties = raw.properties.unwrap_or_default();
        let geometry = match raw.geometry {
            Some(geometry) => Some(serde_json::to_string(&geometry)?),
            None => None,
        };
        Ok(Self {
            name: property_text(&properties, NAME_PROPERTY),
            description: property_text(&properties, DESCRIPTION_PROPERTY),
            geometry,
            properties,
        })
    }
}

fn property_text(properties: &Map<String, Value>, key: &str) -> String {
    match properties.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn parse_feature_collection(input: &str) -> EngineResult<Vec<FeatureRow>> {
    let input = input.trim_start_matches('\u{feff}');
    let collection: RawCollection = serde_json::from_str(input)?;
    if collection.kind != FEATURE_COLLECTION {
        return Err(EngineError::NotAFeatureCollection(collection.kind));
    }
    let Some(features) = collection.features else {
        return Err(EngineError::Json(
            <serde_json::Error as serde::de::Error>::missing_field("features"),
        ));
    };
    features.into_iter().map(FeatureRow::from_raw).collect()
}

pub fn read_feature_collection(path: &Path) -> EngineResult<Vec<FeatureRow>> {
    let input = fs::read_to_string(path).map_err(|source| EngineError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    parse_feature_collection(&input)
}

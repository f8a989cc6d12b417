use serde_json::{json, Map, Value};

use crate::store::{close_after, FeatureStore, StoreConnector, StoredFeature};
use crate::EngineResult;

/// Reads stored rows back as a GeoJSON `FeatureCollection`.
pub async fn export_features<C: StoreConnector>(
    connector: &C,
    source_name: Option<&str>,
) -> EngineResult<Value> {
    let mut store = connector.connect().await?;
    let result = store.fetch_features(source_name).await;
    let features = close_after(store, result).await?;
    tracing::info!(features = features.len(), "exported stored features");
    Ok(feature_collection(&features))
}

/// `name` and `description` come first; keys in the stored bag override them.
pub fn feature_collection(features: &[StoredFeature]) -> Value {
    let features: Vec<Value> = features.iter().map(feature_value).collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}

fn feature_value(feature: &StoredFeature) -> Value {
    let mut properties = Map::new();
    properties.insert("name".to_string(), json!(feature.name));
    properties.insert("description".to_string(), json!(feature.description));
    properties.insert("source_name".to_string(), json!(feature.source_name));
    for (key, value) in &feature.properties {
        properties.insert(key.clone(), value.clone());
    }
    json!({
        "type": "Feature",
        "id": feature.id,
        "geometry": feature.geometry,
        "properties": properties,
    })
}

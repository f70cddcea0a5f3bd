// District boundaries and the choropleth join.
//
// Geometry is never inspected, only carried through, so it stays a raw
// `serde_json::Value` instead of a typed polygon.
use crate::error::{DrishtiError, Result};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct GeoDistrict {
    pub state: String,
    pub district: String,
    pub geometry: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoCollection {
    pub features: Vec<GeoDistrict>,
}

#[derive(Debug, Deserialize)]
struct RawCollection {
    #[serde(default)]
    features: Vec<RawFeature>,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    properties: Map<String, Value>,
    #[serde(default)]
    geometry: Value,
}

impl GeoCollection {
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn for_state(&self, state: &str) -> GeoCollection {
        GeoCollection {
            features: self
                .features
                .iter()
                .filter(|f| f.state == state)
                .cloned()
                .collect(),
        }
    }
}

/// Load the district GeoJSON. An absent file is an empty collection;
/// a present but malformed one is an error.
///
/// Features without a `district` property are dropped, since they can never
/// join to a metric row.
pub fn load_geojson(path: &Path) -> Result<GeoCollection> {
    if !path.exists() {
        log::warn!("No GeoJSON found at {}", path.display());
        return Ok(GeoCollection::default());
    }
    let text = std::fs::read_to_string(path)?;
    parse_geojson(&text).map_err(|e| DrishtiError::GeoJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

pub fn parse_geojson(text: &str) -> std::result::Result<GeoCollection, serde_json::Error> {
    let raw: RawCollection = serde_json::from_str(text)?;
    let features = raw
        .features
        .into_iter()
        .filter_map(|f| {
            let district = f.properties.get("district")?.as_str()?.trim().to_string();
            let state = f
                .properties
                .get("state")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_string();
            Some(GeoDistrict {
                state,
                district,
                geometry: f.geometry,
            })
        })
        .collect();
    Ok(GeoCollection { features })
}

/// One map feature after the join. `value` is `None` when the district had
/// no metric row, or the metric was undefined for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub state: String,
    pub district: String,
    pub geometry: Value,
    pub value: Option<f64>,
}

/// Left-join geometry to a metric table on district name.
///
/// `key` extracts the district name of a row and `metric` its value.
pub fn merge_for_map<T>(
    geo: &GeoCollection,
    rows: &[T],
    key: impl Fn(&T) -> &str,
    metric: impl Fn(&T) -> Option<f64>,
) -> Vec<MapFeature> {
    if geo.is_empty() {
        return Vec::new();
    }
    let by_district: HashMap<&str, &T> = rows.iter().map(|r| (key(r), r)).collect();
    geo.features
        .iter()
        .map(|f| MapFeature {
            state: f.state.clone(),
            district: f.district.clone(),
            geometry: f.geometry.clone(),
            value: by_district.get(f.district.as_str()).and_then(|r| metric(r)),
        })
        .collect()
}

/// Render joined features as a GeoJSON FeatureCollection, with the metric
/// under `properties.<metric_name>` (null when unmatched).
pub fn to_feature_collection(features: &[MapFeature], metric_name: &str) -> Value {
    let features: Vec<Value> = features
        .iter()
        .map(|f| {
            let mut props = Map::new();
            props.insert("district".into(), Value::from(f.district.clone()));
            props.insert("state".into(), Value::from(f.state.clone()));
            props.insert(metric_name.into(), f.value.map_or(Value::Null, Value::from));
            json!({
                "type": "Feature",
                "properties": props,
                "geometry": f.geometry,
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

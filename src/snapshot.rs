// Loading and saving of the JSON snapshots the reconciliation runs over.

use crate::models::{
    OperatorCode, OperatorRoute, ReferenceRoute, ReferenceRouteId, Stop, StopId,
};
use ahash::AHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The canonical reference feed snapshot, routes and stops together.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSnapshot {
    pub route_list: BTreeMap<ReferenceRouteId, ReferenceRoute>,
    pub stop_list: AHashMap<StopId, Stop>,
}

/// Reconciled routes of every operator keyed by their combined snapshot
/// key, plus the union of all operator stops.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedSnapshot {
    pub route_list: BTreeMap<String, OperatorRoute>,
    pub stop_list: BTreeMap<StopId, Stop>,
}

#[derive(Serialize)]
struct AnnotatedReferenceRoute<'a> {
    #[serde(flatten)]
    route: &'a ReferenceRoute,
    #[serde(rename = "_route", skip_serializing_if = "BTreeMap::is_empty")]
    matched: &'a BTreeMap<OperatorCode, OperatorRoute>,
}

pub fn load_reference(path: &Path) -> Result<ReferenceSnapshot, SnapshotError> {
    decode(path)
}

pub fn load_operator_routes(path: &Path) -> Result<Vec<OperatorRoute>, SnapshotError> {
    decode(path)
}

pub fn load_operator_stops(path: &Path) -> Result<AHashMap<StopId, Stop>, SnapshotError> {
    decode(path)
}

pub fn load_combined(path: &Path) -> Result<CombinedSnapshot, SnapshotError> {
    decode(path)
}

pub fn save_route_list(path: &Path, routes: &[OperatorRoute]) -> Result<(), SnapshotError> {
    encode(path, &routes)
}

pub fn save_combined(path: &Path, snapshot: &CombinedSnapshot) -> Result<(), SnapshotError> {
    encode(path, snapshot)
}

/// Re-serializes the reference route list with each route's per-operator
/// match attached, for diagnostics and downstream consumers.
pub fn save_reference_annotations(
    path: &Path,
    routes: &BTreeMap<ReferenceRouteId, ReferenceRoute>,
    matches: &BTreeMap<ReferenceRouteId, BTreeMap<OperatorCode, OperatorRoute>>,
) -> Result<(), SnapshotError> {
    let empty = BTreeMap::new();
    let annotated: BTreeMap<&ReferenceRouteId, AnnotatedReferenceRoute> = routes
        .iter()
        .map(|(id, route)| {
            (
                id,
                AnnotatedReferenceRoute {
                    route,
                    matched: matches.get(id).unwrap_or(&empty),
                },
            )
        })
        .collect();
    encode(path, &annotated)
}

fn decode<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, SnapshotError> {
    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn encode<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let encoded = serde_json::to_string(value).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, encoded).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use compact_str::CompactString;
use std::collections::BTreeMap;

pub type StopId = CompactString;
pub type OperatorCode = CompactString;
pub type ReferenceRouteId = CompactString;
pub type Bound = CompactString;

/// Departure frequency per service period.
/// Service calendar id, then period start time, to (period end time, headway
/// seconds). None when the period has a single timetabled departure.
pub type FrequencyTable =
    BTreeMap<CompactString, BTreeMap<CompactString, Option<(CompactString, CompactString)>>>;

/// Name key carrying the operator's native display name for a stop.
pub const NATIVE_NAME_KEY: &str = "zh";
pub const ENGLISH_NAME_KEY: &str = "en";
/// Reference stops fall back to this key for operators the feed does not label.
pub const UNKNOWN_OPERATOR_KEY: &str = "unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalisedName {
    #[serde(default)]
    pub zh: String,
    #[serde(default)]
    pub en: String,
}

/// A physical stop. Reference-feed stops key `name` by operator code
/// (plus `unknown`), operator stops key it by language tag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stop {
    #[serde(default)]
    pub name: BTreeMap<CompactString, String>,
    pub lat: f64,
    pub lng: f64,
}

impl Stop {
    pub fn localised_name(&self) -> LocalisedName {
        LocalisedName {
            zh: self.name.get(NATIVE_NAME_KEY).cloned().unwrap_or_default(),
            en: self.name.get(ENGLISH_NAME_KEY).cloned().unwrap_or_default(),
        }
    }
}

/// A route as described by the operator itself. Reconciled output records
/// reuse this shape, with reference metadata filled in.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRoute {
    pub route: CompactString,
    #[serde(default)]
    pub co: Vec<OperatorCode>,
    pub bound: Bound,
    #[serde(default)]
    pub orig: LocalisedName,
    #[serde(default)]
    pub dest: LocalisedName,
    /// Disambiguates stop pattern variants sharing one route number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<CompactString>,
    pub stops: Vec<StopId>,
    /// One fare per inter-stop segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fares: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq: Option<FrequencyTable>,
    /// Journey time over the whole route, minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jt: Option<CompactString>,
    /// Reference route id the crawler already attached upstream, where the
    /// operator's own data carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtfs_id: Option<ReferenceRouteId>,
    /// Reference route ids this record was reconciled against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gtfs: Option<Vec<ReferenceRouteId>>,
    #[serde(
        default,
        rename = "virtual",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_virtual: bool,
}

impl OperatorRoute {
    /// Stable key of a reconciled record inside the combined snapshot.
    pub fn key(&self) -> String {
        format!(
            "{}+{}+{}+{}",
            self.route,
            self.service_type.as_deref().unwrap_or("1"),
            self.orig.en,
            self.dest.en
        )
        .to_uppercase()
    }
}

/// One route of the canonical reference feed, with per-bound stop
/// sequences, fare tables and frequencies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceRoute {
    pub route: CompactString,
    #[serde(default)]
    pub co: Vec<OperatorCode>,
    #[serde(default)]
    pub stops: BTreeMap<Bound, Vec<StopId>>,
    #[serde(default)]
    pub fares: BTreeMap<Bound, Vec<f64>>,
    #[serde(default)]
    pub freq: BTreeMap<Bound, FrequencyTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jt: Option<CompactString>,
    #[serde(default)]
    pub orig: LocalisedName,
    #[serde(default)]
    pub dest: LocalisedName,
}

// Copyright Catenary Transit Initiatives
// Per-operator reconciliation behaviour

use crate::models::{OperatorCode, OperatorRoute, ReferenceRoute};

/// How one operator's routes are matched against the reference feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    /// Route number equality against reference routes listing this operator.
    Standard,
    /// No alignment at all. The operator's stop list already corresponds
    /// 1:1 with the reference feed, so one flat fare per segment is copied
    /// onto routes that arrive pre-tagged with the reference route id.
    FlatFare { membership: OperatorCode },
    /// The reference feed groups these routes under a shared membership
    /// tag and route numbers do not line up, so candidates are selected by
    /// origin/destination name prefix in either direction.
    NamePrefix { membership: OperatorCode },
    /// Matches like Standard, but merged candidates are never appended to
    /// the output; matches only annotate the reference feed.
    AnnotateOnly,
}

#[derive(Clone, Debug)]
pub struct OperatorProfile {
    pub code: OperatorCode,
    pub kind: OperatorKind,
}

impl OperatorProfile {
    pub fn standard(code: &str) -> OperatorProfile {
        OperatorProfile {
            code: code.into(),
            kind: OperatorKind::Standard,
        }
    }

    /// Whether the flat fare shortcut replaces matching for this
    /// reference route.
    pub fn flat_fare_applies(&self, reference: &ReferenceRoute) -> bool {
        match &self.kind {
            OperatorKind::FlatFare { membership } => reference.co.contains(membership),
            _ => false,
        }
    }

    /// Whether this operator's candidates should be aligned against the
    /// reference route at all.
    pub fn participates(&self, reference: &ReferenceRoute) -> bool {
        let member = reference.co.contains(&self.code);
        match &self.kind {
            OperatorKind::NamePrefix { membership } => {
                member || reference.co.contains(membership)
            }
            _ => member,
        }
    }

    /// A declared member that fails to match is worth a diagnostic;
    /// membership through a shared tag is not.
    pub fn is_declared_member(&self, reference: &ReferenceRoute) -> bool {
        reference.co.contains(&self.code)
    }

    /// Candidate filter applied before alignment.
    pub fn eligible(&self, candidate: &OperatorRoute, reference: &ReferenceRoute) -> bool {
        if self.is_declared_member(reference) && candidate.route == reference.route {
            return true;
        }
        match &self.kind {
            OperatorKind::NamePrefix { .. } => {
                (candidate.orig.zh.starts_with(&reference.orig.zh)
                    && candidate.dest.zh.starts_with(&reference.dest.zh))
                    || (candidate.orig.zh.starts_with(&reference.dest.zh)
                        && candidate.dest.zh.starts_with(&reference.orig.zh))
            }
            _ => false,
        }
    }

    pub fn appends_merged(&self) -> bool {
        self.kind != OperatorKind::AnnotateOnly
    }
}

/// Every operator the reconciliation currently runs over, in pass order.
pub fn default_roster() -> Vec<OperatorProfile> {
    vec![
        OperatorProfile::standard("kmb"),
        OperatorProfile::standard("ctb"),
        OperatorProfile::standard("nlb"),
        OperatorProfile::standard("lrtfeeder"),
        OperatorProfile {
            code: "gmb".into(),
            kind: OperatorKind::FlatFare {
                membership: "gmb".into(),
            },
        },
        OperatorProfile::standard("lightRail"),
        OperatorProfile {
            code: "mtr".into(),
            kind: OperatorKind::AnnotateOnly,
        },
        OperatorProfile {
            code: "sunferry".into(),
            kind: OperatorKind::FlatFare {
                membership: "ferry".into(),
            },
        },
        OperatorProfile {
            code: "fortuneferry".into(),
            kind: OperatorKind::FlatFare {
                membership: "ferry".into(),
            },
        },
        OperatorProfile {
            code: "hkkf".into(),
            kind: OperatorKind::NamePrefix {
                membership: "ferry".into(),
            },
        },
    ]
}

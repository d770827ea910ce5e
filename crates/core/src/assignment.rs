//! The per-request assignment result and its cookie token.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::experiment::{Experiment, Variant};

/// Compact cookie encoding of a chosen experiment and its variant indexes:
/// `<experimentID>.<i1>-<i2>-...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentToken {
    pub experiment_id: String,
    pub variant_indexes: Vec<usize>,
}

impl AssignmentToken {
    pub fn new(experiment_id: impl Into<String>, variant_indexes: Vec<usize>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            variant_indexes,
        }
    }

    /// The `<index>-<index>` part of the token.
    pub fn indexes_part(&self) -> String {
        self.variant_indexes
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for AssignmentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.experiment_id, self.indexes_part())
    }
}

/// The experiment and variants a visitor sees for one request.
///
/// Serializes with `$`-prefixed computed fields followed by every field of
/// the chosen experiment. With no experiment, `$experimentIndex` is `-1` and
/// all collections are empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Assignment {
    /// Position of the chosen experiment in the catalog
    #[serde(rename = "$experimentIndex", serialize_with = "serialize_index")]
    pub experiment_index: Option<usize>,

    #[serde(rename = "$variantIndexes")]
    pub variant_indexes: Vec<usize>,

    #[serde(rename = "$activeVariants")]
    pub active_variants: Vec<Variant>,

    #[serde(rename = "$classes")]
    pub classes: Vec<String>,

    #[serde(flatten)]
    pub experiment: Option<Experiment>,
}

fn serialize_index<S: Serializer>(index: &Option<usize>, serializer: S) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => serializer.serialize_u64(*i as u64),
        None => serializer.serialize_i64(-1),
    }
}

impl Assignment {
    /// The "no active experiment" assignment.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.experiment.is_some()
    }

    pub fn experiment_id(&self) -> Option<&str> {
        self.experiment.as_ref().map(|e| e.id.as_str())
    }

    /// Token encoding of this assignment, if an experiment is active.
    pub fn token(&self) -> Option<AssignmentToken> {
        self.experiment
            .as_ref()
            .map(|e| AssignmentToken::new(e.id.clone(), self.variant_indexes.clone()))
    }
}

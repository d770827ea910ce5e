//! Experiment and variant definitions.
//!
//! The wire format follows the catalog JSON used by front-end tooling:
//! `experimentID`, `maxAge` and `eligibleWhen` keep their camelCase names,
//! and any unknown keys are preserved so they can be merged into the
//! [`Assignment`](crate::Assignment) handed to application code.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::EligibilityError;

/// A per-experiment rule restricting which requests may be assigned to it.
///
/// Closures `Fn(&RequestContext) -> bool` implement this automatically.
/// Returning an error is treated exactly like returning `Ok(false)`.
pub trait Eligibility: Send + Sync {
    fn is_eligible(&self, ctx: &RequestContext) -> Result<bool, EligibilityError>;
}

impl<F> Eligibility for F
where
    F: Fn(&RequestContext) -> bool + Send + Sync,
{
    fn is_eligible(&self, ctx: &RequestContext) -> Result<bool, EligibilityError> {
        Ok(self(ctx))
    }
}

/// One arm of an experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Relative selection weight (default 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Payload consumed by application code
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Variant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Weight used for random selection.
    pub fn selection_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }
}

/// A named A/B test with an ordered set of variants.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique identifier within the catalog; persisted in the cookie
    #[serde(rename = "experimentID")]
    pub id: String,

    /// Display name, used to build class tags
    #[serde(default)]
    pub name: String,

    /// Relative selection weight (default 1, 0 = never drawn)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    /// Cookie lifetime in seconds; falls back to the configured default
    #[serde(rename = "maxAge", default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,

    #[serde(default)]
    pub variants: Vec<Variant>,

    /// Number of simultaneous variant slots (default 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sections: Option<usize>,

    /// Declarative eligibility rule, compiled when the catalog is loaded
    #[serde(rename = "eligibleWhen", default, skip_serializing_if = "Option::is_none")]
    pub eligible_when: Option<String>,

    /// Remaining catalog fields, carried into the assignment untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,

    #[serde(skip)]
    pub eligibility: Option<Arc<dyn Eligibility>>,
}

impl Experiment {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    pub fn with_sections(mut self, sections: usize) -> Self {
        self.sections = Some(sections);
        self
    }

    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_eligibility(mut self, predicate: impl Eligibility + 'static) -> Self {
        self.eligibility = Some(Arc::new(predicate));
        self
    }

    /// Weight used for random selection among experiments.
    pub fn selection_weight(&self) -> f64 {
        self.weight.unwrap_or(1.0)
    }

    /// Number of variant slots to fill. Zero is treated as unset.
    pub fn section_count(&self) -> usize {
        self.sections.filter(|&s| s > 0).unwrap_or(1)
    }

    /// Whether a variant exists at `index`.
    pub fn has_variant(&self, index: usize) -> bool {
        index < self.variants.len()
    }

    /// Class tag injected for the variant at `index`.
    pub fn class_for(&self, index: usize) -> String {
        format!("exp-{}-{}", self.name, index)
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("max_age", &self.max_age)
            .field("variants", &self.variants)
            .field("sections", &self.sections)
            .field("eligible_when", &self.eligible_when)
            .field("extra", &self.extra)
            .field("has_eligibility", &self.eligibility.is_some())
            .finish()
    }
}

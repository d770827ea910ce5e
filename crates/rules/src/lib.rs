//! Declarative eligibility rules for experiments.
//!
//! Catalog entries cannot carry code, so an experiment may instead declare
//! an `eligibleWhen` condition that is compiled into an
//! [`Eligibility`](abwright_core::Eligibility) predicate when the catalog is
//! loaded:
//!
//! ```toml
//! [[experiments]]
//! experimentID = "mobile-nav"
//! name = "mobile-nav"
//! eligibleWhen = 'header.user-agent CONTAINS "Mobile" AND path STARTS_WITH "/shop"'
//! ```
//!
//! An experiment whose rule fails to compile stays in the catalog but is
//! never eligible; the failure is logged once at load time.

mod parser;

use std::sync::Arc;

use abwright_core::{Eligibility, EligibilityError, Experiment, RequestContext};
use tracing::warn;

pub use parser::{Condition, parse_condition};

/// Errors from compiling a rule.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    #[error("rule parse error: {0}")]
    Parse(String),

    #[error("invalid pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },
}

/// A compiled `eligibleWhen` rule.
#[derive(Debug, Clone)]
pub struct RulePredicate {
    source: String,
    condition: Condition,
}

impl RulePredicate {
    pub fn compile(source: &str) -> Result<Self, RuleError> {
        Ok(Self {
            source: source.to_string(),
            condition: parse_condition(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Eligibility for RulePredicate {
    fn is_eligible(&self, ctx: &RequestContext) -> Result<bool, EligibilityError> {
        Ok(self.condition.evaluate(ctx))
    }
}

/// Stand-in for a rule that failed to compile.
struct InvalidRule {
    experiment_id: String,
    detail: String,
}

impl Eligibility for InvalidRule {
    fn is_eligible(&self, _ctx: &RequestContext) -> Result<bool, EligibilityError> {
        Err(EligibilityError::InvalidRule {
            experiment_id: self.experiment_id.clone(),
            detail: self.detail.clone(),
        })
    }
}

/// Attach compiled predicates to every experiment declaring `eligibleWhen`.
///
/// Experiments that already carry a programmatic predicate keep it.
pub fn compile_catalog(experiments: &mut [Experiment]) {
    for exp in experiments.iter_mut() {
        if exp.eligibility.is_some() {
            continue;
        }
        let Some(rule) = exp.eligible_when.as_deref() else {
            continue;
        };
        exp.eligibility = Some(match RulePredicate::compile(rule) {
            Ok(predicate) => Arc::new(predicate),
            Err(e) => {
                warn!(experiment = %exp.id, rule, error = %e, "Invalid eligibility rule; experiment disabled");
                Arc::new(InvalidRule {
                    experiment_id: exp.id.clone(),
                    detail: e.to_string(),
                })
            }
        });
    }
}

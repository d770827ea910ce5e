//! Experiment selection.

use std::panic::{AssertUnwindSafe, catch_unwind};

use abwright_core::{Experiment, RequestContext};
use rand::Rng;
use tracing::{debug, warn};

use crate::weighted::weighted_index;

/// Choose one experiment from `catalog` for this request.
///
/// A non-empty `candidate_id` restored from the cookie is honored directly
/// when it names a catalog entry, skipping weighting and eligibility.
/// Otherwise experiments are drawn by weight; a drawn experiment whose
/// eligibility predicate rejects the request (or fails) has its working
/// weight zeroed and the draw is retried, at most once per experiment.
pub fn select_experiment<R: Rng + ?Sized>(
    catalog: &[Experiment],
    candidate_id: &str,
    ctx: &RequestContext,
    rng: &mut R,
) -> Option<usize> {
    if !candidate_id.is_empty() {
        if let Some(index) = catalog.iter().position(|exp| exp.id == candidate_id) {
            debug!(experiment = candidate_id, index, "Restored experiment from cookie");
            return Some(index);
        }
        debug!(experiment = candidate_id, "Cookie names an unknown experiment; drawing fresh");
    }

    let mut weights: Vec<f64> = catalog.iter().map(Experiment::selection_weight).collect();
    for _ in 0..catalog.len() {
        let index = weighted_index(&weights, rng)?;
        if is_eligible(&catalog[index], ctx) {
            debug!(experiment = %catalog[index].id, index, "Drew experiment");
            return Some(index);
        }
        debug!(experiment = %catalog[index].id, "Request not eligible; retrying");
        weights[index] = 0.0;
    }
    None
}

/// Evaluate the experiment's predicate, treating errors and panics as "no".
fn is_eligible(experiment: &Experiment, ctx: &RequestContext) -> bool {
    let Some(predicate) = experiment.eligibility.as_ref() else {
        return true;
    };
    match catch_unwind(AssertUnwindSafe(|| predicate.is_eligible(ctx))) {
        Ok(Ok(eligible)) => eligible,
        Ok(Err(e)) => {
            warn!(experiment = %experiment.id, error = %e, "Eligibility check failed; treating as ineligible");
            false
        }
        Err(_) => {
            warn!(experiment = %experiment.id, "Eligibility predicate panicked; treating as ineligible");
            false
        }
    }
}

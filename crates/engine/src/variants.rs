//! Variant selection for a chosen experiment.

use abwright_core::Experiment;
use rand::Rng;

use crate::weighted::weighted_index;

/// Fill the experiment's section slots with distinct variant indexes.
///
/// Restored indexes are kept in order when they name an existing variant and
/// have not been seen yet; the remaining slots are drawn by variant weight
/// without replacement. The result never exceeds `section_count()` and is
/// shorter only when no drawable variant remains (all remaining weights are
/// zero, or there are fewer variants than sections).
pub fn select_variants<R: Rng + ?Sized>(
    experiment: &Experiment,
    restored: &[usize],
    rng: &mut R,
) -> Vec<usize> {
    let sections = experiment.section_count();
    let mut chosen: Vec<usize> = Vec::with_capacity(sections);

    for &index in restored {
        if chosen.len() == sections {
            break;
        }
        if experiment.has_variant(index) && !chosen.contains(&index) {
            chosen.push(index);
        }
    }

    let mut weights: Vec<f64> = experiment
        .variants
        .iter()
        .map(|v| v.selection_weight())
        .collect();
    for &index in &chosen {
        weights[index] = 0.0;
    }

    while chosen.len() < sections {
        let Some(index) = weighted_index(&weights, rng) else {
            tracing::warn!(
                experiment = %experiment.id,
                sections,
                filled = chosen.len(),
                "Not enough selectable variants to fill every section"
            );
            break;
        };
        weights[index] = 0.0;
        chosen.push(index);
    }

    chosen
}

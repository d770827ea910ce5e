//! Weighted random draw.

use rand::Rng;

/// Pick an index with probability `weights[i] / sum(weights)`.
///
/// Negative and non-finite weights count as zero. Returns `None` when no
/// weight is positive; a zero-weight index is never returned. Weights are
/// scaled by the largest one so very large values cannot overflow the sum.
pub fn weighted_index<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let max = weights
        .iter()
        .copied()
        .filter(|w| w.is_finite() && *w > 0.0)
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return None;
    }
    let usable = |w: f64| if w.is_finite() && w > 0.0 { w / max } else { 0.0 };
    let total: f64 = weights.iter().map(|&w| usable(w)).sum();

    let mut remaining = rng.random::<f64>() * total;
    let mut last_positive = None;
    for (i, &w) in weights.iter().enumerate() {
        let w = usable(w);
        if w == 0.0 {
            continue;
        }
        if remaining < w {
            return Some(i);
        }
        remaining -= w;
        last_positive = Some(i);
    }
    // Rounding can leave a sliver past the final bucket.
    last_positive
}

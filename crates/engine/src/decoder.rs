//! Assignment cookie decoding.

/// Candidate restored from an assignment cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedToken {
    /// Empty when the cookie is absent or unusable
    pub experiment_id: String,
    /// Integer segments of the index list; not yet range-checked
    pub variant_indexes: Vec<usize>,
}

impl DecodedToken {
    pub fn has_candidate(&self) -> bool {
        !self.experiment_id.is_empty()
    }
}

/// Decode `<experimentID>.<i1>-<i2>-...`.
///
/// Never fails: a missing separator or empty id yields an empty token, and
/// index segments that are not non-negative integers are dropped.
pub fn decode_token(raw: Option<&str>) -> DecodedToken {
    let Some(raw) = raw else {
        return DecodedToken::default();
    };
    let mut parts = raw.split('.');
    let (Some(id), Some(indexes)) = (parts.next(), parts.next()) else {
        tracing::debug!(cookie = raw, "Assignment cookie has no separator; ignoring");
        return DecodedToken::default();
    };
    if id.is_empty() {
        return DecodedToken::default();
    }

    DecodedToken {
        experiment_id: id.to_string(),
        variant_indexes: indexes
            .split('-')
            .filter_map(|segment| segment.trim().parse::<usize>().ok())
            .collect(),
    }
}

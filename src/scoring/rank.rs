use std::cmp::Ordering;

use crate::error::ConfigError;

/// Row indices of the top `top_n` scores, best first.
///
/// The sort is stable: rows with exactly equal scores keep the order in
/// which they appear in `scores`, so the earlier row always gets the lower
/// rank number. Rank `r` is position `r - 1` of the returned vector.
/// A NaN score ranks below every real score.
pub fn rank_order(scores: &[f64], top_n: usize) -> Result<Vec<usize>, ConfigError> {
    if top_n == 0 {
        return Err(ConfigError::InvalidTopN);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare_desc(scores[a], scores[b]));
    order.truncate(top_n);
    Ok(order)
}

fn compare_desc(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    }
}

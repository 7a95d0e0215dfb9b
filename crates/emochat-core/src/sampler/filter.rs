use derivative::Derivative;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::softmax;

/// Score written into every excluded position.
pub const FILTER_VALUE: f32 = f32::NEG_INFINITY;

#[derive(Debug, Clone, Copy, PartialEq, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct FilterParams {
    /// Keep only the `top_k` highest scores; `0` disables the stage.
    pub top_k: usize,
    /// Keep the smallest high-probability prefix whose mass reaches `top_p`; `0` disables the stage.
    pub top_p: f32,
    /// Drop every score below this value.
    #[derivative(Default(value = "f32::NEG_INFINITY"))]
    pub threshold: f32,
}

/// Mask a single logit distribution with top-k, nucleus and threshold filtering.
///
/// The stages run in that order on the same vector, so a position excluded by an earlier
/// stage stays excluded. Retained positions keep their original score. Ties at the k-th
/// score all survive the top-k stage.
pub fn top_filtering(mut logits: Vec<f32>, params: &FilterParams) -> Vec<f32> {
    let FilterParams {
        top_k,
        top_p,
        threshold,
    } = *params;

    let top_k = top_k.min(logits.len());
    if top_k > 0 {
        let mut scores = logits.clone();
        let (_, &mut kth, _) = scores.select_nth_unstable_by(top_k - 1, |x, y| y.total_cmp(x));
        logits
            .iter_mut()
            .filter(|x| **x < kth)
            .for_each(|x| *x = FILTER_VALUE);
    }

    if top_p > 0.0 {
        let sorted = logits
            .iter()
            .copied()
            .enumerate()
            .sorted_by(|(_, x), (_, y)| y.total_cmp(x))
            .collect_vec();
        let probs = softmax(&sorted.iter().map(|(_, x)| *x).collect_vec());

        // the token whose mass crosses `top_p` is kept as well
        let keep = probs
            .iter()
            .scan(0.0, |cum, x| {
                *cum += x;
                Some(*cum)
            })
            .position(|cum| cum >= top_p)
            .map(|index| index + 1)
            .unwrap_or(sorted.len());
        for &(id, _) in &sorted[keep..] {
            logits[id] = FILTER_VALUE;
        }
    }

    logits
        .iter_mut()
        .filter(|x| **x < threshold)
        .for_each(|x| *x = FILTER_VALUE);

    logits
}

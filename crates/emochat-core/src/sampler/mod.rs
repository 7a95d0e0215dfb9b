use anyhow::Result;
use derivative::Derivative;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{ChatError, Device, InputBuilder, Model, SpecialTokens};

use self::filter::{top_filtering, FilterParams};

pub mod filter;

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct DecodeConfig {
    /// Maximum number of tokens generated per turn.
    #[derivative(Default(value = "20"))]
    pub max_length: usize,
    /// Special tokens are avoided before this many tokens have been generated.
    #[derivative(Default(value = "1"))]
    pub min_length: usize,
    #[derivative(Default(value = "0.6"))]
    pub temperature: f32,
    pub top_k: usize,
    #[derivative(Default(value = "0.9"))]
    pub top_p: f32,
    pub device: Device,
}

impl DecodeConfig {
    pub fn filter(&self) -> FilterParams {
        FilterParams {
            top_k: self.top_k,
            top_p: self.top_p,
            ..Default::default()
        }
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return vec![0.0; logits.len()];
    }
    let exp = logits.iter().map(|x| (x - max).exp()).collect_vec();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|x| x / sum).collect()
}

/// Index of the highest probability; the lowest index wins on ties.
pub fn argmax(probs: &[f32]) -> Option<usize> {
    probs
        .iter()
        .enumerate()
        .min_by(|(_, x), (_, y)| y.total_cmp(x))
        .map(|(id, _)| id)
}

/// Scale one row of scores by `1 / temperature`, filter it and normalize.
pub fn next_token_probs(scores: &[f32], temperature: f32, params: &FilterParams) -> Vec<f32> {
    let scores = scores.iter().map(|x| x / temperature).collect_vec();
    softmax(&top_filtering(scores, params))
}

/// Autoregressive decoder for one utterance at a time.
#[derive(Debug, Clone)]
pub struct SequenceSampler {
    pub config: DecodeConfig,
    rng: fastrand::Rng,
}

impl SequenceSampler {
    pub fn new(config: DecodeConfig) -> Self {
        Self {
            config,
            rng: fastrand::Rng::new(),
        }
    }

    pub fn with_seed(config: DecodeConfig, seed: u64) -> Self {
        Self {
            config,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Draw a token proportionally to `probs`; `None` if no token has positive probability.
    fn multinomial(&mut self, probs: &[f32]) -> Option<usize> {
        let sum: f32 = probs.iter().filter(|&&x| x > 0.0).sum();
        let rand = self.rng.f32() * sum;
        probs
            .iter()
            .enumerate()
            .filter(|(_, &x)| x > 0.0)
            .scan(0.0, |cum, (id, &x)| {
                *cum += x;
                Some((id, *cum))
            })
            .find_or_last(|&(_, cum)| rand < cum)
            .map(|(id, _)| id)
    }

    /// Generate the token ids of one reply. Special tokens are never part of the output.
    pub fn sample_sequence(
        &mut self,
        model: &dyn Model,
        builder: &dyn InputBuilder,
        special: &SpecialTokens,
        personality: &[Vec<u32>],
        history: &[Vec<u32>],
    ) -> Result<Vec<u32>> {
        let params = self.config.filter();
        let mut output = Vec::with_capacity(self.config.max_length);

        for step in 0..self.config.max_length {
            let input = builder.build(personality, history, &output, false);
            let logits = model.forward(&input.input_ids, &input.segment_ids)?;
            let scores = logits.last().ok_or(ChatError::EmptyLogits)?;
            let probs = next_token_probs(scores, self.config.temperature, &params);

            let mut token = argmax(&probs).ok_or(ChatError::EmptyLogits)? as u32;
            if step < self.config.min_length && special.contains(token) {
                let max = probs.iter().copied().fold(0.0, f32::max);
                while special.contains(token) {
                    if max == 1.0 {
                        log::warn!("model generating special token {token} with probability 1");
                        break;
                    }
                    token = self
                        .multinomial(&probs)
                        .ok_or(ChatError::DegenerateDistribution)? as u32;
                }
            }

            if special.contains(token) {
                break;
            }
            output.push(token);
        }

        Ok(output)
    }
}

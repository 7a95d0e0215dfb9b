use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use crate::{
    emotion::EmotionTable,
    error::ChatError,
    history::History,
    input::SegmentInputBuilder,
    sampler::{filter::FilterParams, DecodeConfig, SequenceSampler},
    tokenizer::SpecialTokens,
    turn::{Engine, Personality, Session, TurnResult},
};

pub mod emotion;
pub mod error;
pub mod history;
pub mod input;
pub mod load;
pub mod model;
pub mod persona;
pub mod sampler;
pub mod tokenizer;
pub mod turn;

/// Where the model runs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Gpu,
}

/// Token and segment ids fed to the model; both have the same length.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ModelInput {
    pub input_ids: Vec<u32>,
    pub segment_ids: Vec<u32>,
}

/// Row-major `(positions × vocab_size)` scores.
#[derive(Debug, Clone)]
pub struct Logits {
    vocab_size: usize,
    data: Vec<f32>,
}

impl Logits {
    pub fn new(vocab_size: usize, data: Vec<f32>) -> Result<Self> {
        if vocab_size == 0 || data.len() % vocab_size != 0 {
            return Err(ChatError::Shape {
                expected: vocab_size,
                actual: data.len(),
            }
            .into());
        }
        Ok(Self { vocab_size, data })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn positions(&self) -> usize {
        self.data.len() / self.vocab_size
    }

    pub fn position(&self, index: usize) -> Option<&[f32]> {
        let start = index * self.vocab_size;
        self.data.get(start..start + self.vocab_size)
    }

    /// Scores for the most recent position.
    pub fn last(&self) -> Option<&[f32]> {
        self.positions()
            .checked_sub(1)
            .and_then(|index| self.position(index))
    }
}

pub trait Model: Send + Sync {
    /// Score every vocabulary entry for each position of the input.
    fn forward(&self, input_ids: &[u32], segment_ids: &[u32]) -> Result<Logits>;
}

pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
    fn decode(&self, tokens: &[u32], skip_special: bool) -> Result<String>;
    /// Look up the id of a single vocabulary entry.
    fn token_id(&self, token: &str) -> Option<u32>;

    fn special_token_ids(&self) -> Result<SpecialTokens> {
        SpecialTokens::resolve(self)
    }
}

pub trait InputBuilder: Send + Sync {
    /// Concatenate personality, history and the partial reply into one model input.
    fn build(
        &self,
        personality: &[Vec<u32>],
        history: &[Vec<u32>],
        reply: &[u32],
        with_eos: bool,
    ) -> ModelInput;
}

pub trait EmotionClassifier: Send + Sync {
    fn predict(&self, texts: &[&str]) -> Result<Vec<String>>;
    /// Every label `predict` can return.
    fn labels(&self) -> Vec<String>;
}

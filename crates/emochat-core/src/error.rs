use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("no emoji mapped for emotion `{0}`")]
    UnknownEmotion(String),
    #[error("model returned no logits")]
    EmptyLogits,
    #[error("no token left to sample: every probability is zero")]
    DegenerateDistribution,
    #[error("special token `{0}` is missing from the vocabulary")]
    MissingSpecialToken(&'static str),
    #[error("shape mismatch: expected a multiple of {expected}, got {actual}")]
    Shape { expected: usize, actual: usize },
    #[error("token {token} out of range for vocabulary of {vocab_size}")]
    TokenOutOfRange { token: u32, vocab_size: usize },
}

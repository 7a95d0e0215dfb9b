use std::{collections::BTreeSet, path::Path};

use anyhow::Result;
use tokenizers::AddedToken;

use crate::{ChatError, Tokenizer};

pub const BOS: &str = "<bos>";
pub const EOS: &str = "<eos>";
pub const SPEAKER1: &str = "<speaker1>";
pub const SPEAKER2: &str = "<speaker2>";
pub const PAD: &str = "<pad>";

/// Reserved entries that never appear in generated text.
pub const SPECIAL_TOKENS: [&str; 5] = [BOS, EOS, SPEAKER1, SPEAKER2, PAD];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpecialTokens(BTreeSet<u32>);

impl SpecialTokens {
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self(ids.into_iter().collect())
    }

    /// Look up every entry of [`SPECIAL_TOKENS`] in the vocabulary.
    pub fn resolve<T: Tokenizer + ?Sized>(tokenizer: &T) -> Result<Self> {
        let mut ids = BTreeSet::new();
        for token in SPECIAL_TOKENS {
            let id = tokenizer
                .token_id(token)
                .ok_or(ChatError::MissingSpecialToken(token))?;
            ids.insert(id);
        }
        Ok(Self(ids))
    }

    pub fn contains(&self, token: u32) -> bool {
        self.0.contains(&token)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

/// A Hugging Face `tokenizer.json` with the chat special tokens registered.
pub struct HfTokenizer(tokenizers::Tokenizer);

impl HfTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut tokenizer =
            tokenizers::Tokenizer::from_file(path.as_ref()).map_err(anyhow::Error::msg)?;
        let tokens = SPECIAL_TOKENS
            .iter()
            .map(|&token| AddedToken::from(token, true))
            .collect::<Vec<_>>();
        let added = tokenizer.add_special_tokens(&tokens);
        if added > 0 {
            log::info!("added {added} special tokens to the vocabulary");
        }
        Ok(Self(tokenizer))
    }

    pub fn vocab_size(&self) -> usize {
        self.0.get_vocab_size(true)
    }
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self.0.encode(text, false).map_err(anyhow::Error::msg)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32], skip_special: bool) -> Result<String> {
        self.0
            .decode(tokens, skip_special)
            .map_err(anyhow::Error::msg)
    }

    fn token_id(&self, token: &str) -> Option<u32> {
        self.0.token_to_id(token)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct VocabTokenizer(HashMap<&'static str, u32>);

    impl Tokenizer for VocabTokenizer {
        fn encode(&self, _text: &str) -> Result<Vec<u32>> {
            Ok(vec![])
        }

        fn decode(&self, _tokens: &[u32], _skip_special: bool) -> Result<String> {
            Ok(String::new())
        }

        fn token_id(&self, token: &str) -> Option<u32> {
            self.0.get(token).copied()
        }
    }

    #[test]
    fn resolve_collects_every_special_token() {
        let tokenizer = VocabTokenizer(SPECIAL_TOKENS.into_iter().zip(40..).collect());
        let special = tokenizer.special_token_ids().unwrap();
        assert_eq!(special.iter().collect::<Vec<_>>(), vec![40, 41, 42, 43, 44]);
        assert!(special.contains(42));
        assert!(!special.contains(0));
    }

    #[test]
    fn resolve_fails_on_missing_token() {
        let tokenizer = VocabTokenizer(HashMap::from([(BOS, 1), (EOS, 2)]));
        let err = tokenizer.special_token_ids().unwrap_err();
        assert_eq!(
            err.downcast_ref::<ChatError>(),
            Some(&ChatError::MissingSpecialToken(SPEAKER1))
        );
    }
}

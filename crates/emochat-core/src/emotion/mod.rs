use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ChatError;

pub use self::bayes::NaiveBayes;

pub mod bayes;

const DEFAULT_EMOJIS: [(&str, &str); 14] = [
    ("anger", "😡"),
    ("boredom", "🥱"),
    ("empty", "😶"),
    ("enthusiasm", "🤩"),
    ("fun", "😜"),
    ("happiness", "😊"),
    ("hate", "😠"),
    ("joy", "😂"),
    ("love", "😍"),
    ("neutral", "😐"),
    ("relief", "😌"),
    ("sadness", "😢"),
    ("surprise", "😮"),
    ("worry", "😟"),
];

/// Maps emotion labels to the emoji appended to an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionTable(HashMap<String, String>);

impl Default for EmotionTable {
    fn default() -> Self {
        DEFAULT_EMOJIS.into_iter().collect()
    }
}

impl EmotionTable {
    pub fn emoji(&self, label: &str) -> Result<&str, ChatError> {
        self.0
            .get(label)
            .map(String::as_str)
            .ok_or_else(|| ChatError::UnknownEmotion(label.into()))
    }

    pub fn insert(&mut self, label: impl Into<String>, emoji: impl Into<String>) {
        self.0.insert(label.into(), emoji.into());
    }

    /// Labels from `labels` that have no emoji.
    pub fn missing<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        labels
            .iter()
            .map(|label| label.as_ref())
            .filter(|&label| !self.0.contains_key(label))
            .map(String::from)
            .collect()
    }
}

impl<L: Into<String>, E: Into<String>> FromIterator<(L, E)> for EmotionTable {
    fn from_iter<T: IntoIterator<Item = (L, E)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(label, emoji)| (label.into(), emoji.into()))
                .collect(),
        )
    }
}

impl<L: Into<String>, E: Into<String>> Extend<(L, E)> for EmotionTable {
    fn extend<T: IntoIterator<Item = (L, E)>>(&mut self, iter: T) {
        iter.into_iter()
            .for_each(|(label, emoji)| self.insert(label, emoji));
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;
    use crate::EmotionClassifier;

    struct StubClassifier;

    impl EmotionClassifier for StubClassifier {
        fn predict(&self, texts: &[&str]) -> Result<Vec<String>> {
            Ok(texts
                .iter()
                .map(|text| match text.contains('!') {
                    true => "anger".to_string(),
                    false => "joy".to_string(),
                })
                .collect())
        }

        fn labels(&self) -> Vec<String> {
            vec!["joy".into(), "anger".into()]
        }
    }

    #[test]
    fn stub_labels_all_have_emojis() {
        let table = EmotionTable::default();
        let classifier = StubClassifier;
        assert!(table.missing(&classifier.labels()).is_empty());

        for label in classifier.predict(&["hello there", "stop it!"]).unwrap() {
            assert!(!table.emoji(&label).unwrap().is_empty());
        }
    }

    #[test]
    fn unmapped_label_is_a_lookup_error() {
        let table: EmotionTable = [("joy", "😂"), ("anger", "😡")].into_iter().collect();
        assert_eq!(
            table.emoji("melancholy"),
            Err(ChatError::UnknownEmotion("melancholy".into()))
        );
        assert_eq!(table.missing(&["joy", "melancholy"]), vec!["melancholy"]);
    }

    #[test]
    fn extend_overrides_defaults() {
        let mut table = EmotionTable::default();
        table.extend([("joy", "🎉"), ("awe", "🤯")]);
        assert_eq!(table.emoji("joy"), Ok("🎉"));
        assert_eq!(table.emoji("awe"), Ok("🤯"));
        assert_eq!(table.emoji("worry"), Ok("😟"));
    }
}

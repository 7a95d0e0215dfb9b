use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::Read,
    path::Path,
};

use anyhow::{bail, Result};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::EmotionClassifier;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[a-z0-9']+").expect("word pattern");
}

fn words(text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    WORD.find_iter(&text)
        .map(|word| word.as_str().to_string())
        .collect()
}

/// One row of the emotion corpus; other columns are ignored.
#[derive(Debug, Deserialize)]
struct Record {
    sentiment: String,
    content: String,
}

#[derive(Debug, Clone)]
struct Class {
    label: String,
    log_prior: f64,
    counts: HashMap<String, usize>,
    total: usize,
}

/// Multinomial naive Bayes over lowercase word counts, with add-one smoothing.
#[derive(Debug, Clone)]
pub struct NaiveBayes {
    classes: Vec<Class>,
    vocab: HashSet<String>,
}

impl NaiveBayes {
    pub fn train<L, T>(samples: impl IntoIterator<Item = (L, T)>) -> Result<Self>
    where
        L: Into<String>,
        T: AsRef<str>,
    {
        let mut docs: BTreeMap<String, (usize, HashMap<String, usize>)> = BTreeMap::new();
        let mut vocab = HashSet::new();
        let mut num_docs = 0usize;

        for (label, text) in samples {
            let (count, counts) = docs.entry(label.into()).or_default();
            *count += 1;
            num_docs += 1;
            for word in words(text.as_ref()) {
                *counts.entry(word.clone()).or_default() += 1;
                vocab.insert(word);
            }
        }
        if num_docs == 0 {
            bail!("emotion classifier needs at least one training sample");
        }

        let classes = docs
            .into_iter()
            .map(|(label, (count, counts))| Class {
                label,
                log_prior: (count as f64 / num_docs as f64).ln(),
                total: counts.values().sum(),
                counts,
            })
            .collect_vec();
        Ok(Self { classes, vocab })
    }

    /// Train from CSV with `sentiment` and `content` columns.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let records: Vec<Record> = reader.deserialize::<Record>().try_collect()?;
        Self::train(
            records
                .into_iter()
                .map(|Record { sentiment, content }| (sentiment, content)),
        )
    }

    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let classifier = Self::from_reader(file)?;
        log::info!(
            "trained emotion classifier on {:?}: {} labels, {} words",
            path,
            classifier.classes.len(),
            classifier.vocab.len()
        );
        Ok(classifier)
    }

    fn classify(&self, text: &str) -> &str {
        let words = words(text)
            .into_iter()
            .filter(|word| self.vocab.contains(word))
            .counts();
        let vocab = self.vocab.len() as f64;

        let score = |class: &Class| {
            let denominator = (class.total as f64 + vocab).ln();
            words.iter().fold(class.log_prior, |acc, (word, &n)| {
                let count = class.counts.get(word).copied().unwrap_or_default();
                acc + n as f64 * ((count as f64 + 1.0).ln() - denominator)
            })
        };

        // earlier labels win ties
        let mut best = &self.classes[0];
        let mut best_score = score(best);
        for class in &self.classes[1..] {
            let candidate = score(class);
            if candidate > best_score {
                best = class;
                best_score = candidate;
            }
        }
        &best.label
    }
}

impl EmotionClassifier for NaiveBayes {
    fn predict(&self, texts: &[&str]) -> Result<Vec<String>> {
        Ok(texts
            .iter()
            .map(|text| self.classify(text).to_string())
            .collect())
    }

    fn labels(&self) -> Vec<String> {
        self.classes.iter().map(|class| class.label.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::EmotionTable;

    const CORPUS: &str = r#""tweet_id","sentiment","author","content"
1,"happiness","a","what a lovely sunny day, so happy"
2,"happiness","b","happy happy birthday to you"
3,"sadness","c","i miss you so much, feeling sad"
4,"sadness","d","sad and lonely tonight"
5,"worry","e","worried about the exam tomorrow"
6,"anger","f","i hate waiting in this stupid line"
"#;

    #[test]
    fn predicts_label_of_matching_words() {
        let classifier = NaiveBayes::from_reader(CORPUS.as_bytes()).unwrap();
        let labels = classifier
            .predict(&["so happy today", "sad sad sad", "the exam is tomorrow"])
            .unwrap();
        assert_eq!(labels, vec!["happiness", "sadness", "worry"]);
    }

    #[test]
    fn unseen_words_fall_back_to_prior() {
        let classifier = NaiveBayes::train([
            ("neutral", "ok"),
            ("neutral", "fine"),
            ("love", "adore"),
        ])
        .unwrap();
        assert_eq!(classifier.predict(&["xyzzy"]).unwrap(), vec!["neutral"]);
    }

    #[test]
    fn ties_go_to_first_label() {
        let classifier = NaiveBayes::train([("fun", "party"), ("boredom", "meeting")]).unwrap();
        assert_eq!(classifier.labels(), vec!["boredom", "fun"]);
        assert_eq!(classifier.predict(&[""]).unwrap(), vec!["boredom"]);
    }

    #[test]
    fn predictions_stay_within_labels() {
        let classifier = NaiveBayes::from_reader(CORPUS.as_bytes()).unwrap();
        let labels = classifier.labels();
        for label in classifier
            .predict(&["anything at all", "birthday exam line", "!!!"])
            .unwrap()
        {
            assert!(labels.contains(&label));
        }
    }

    #[test]
    fn default_table_covers_corpus_labels() {
        let corpus = [
            "empty",
            "sadness",
            "enthusiasm",
            "neutral",
            "worry",
            "surprise",
            "love",
            "fun",
            "hate",
            "happiness",
            "boredom",
            "relief",
            "anger",
        ];
        let classifier = NaiveBayes::train(corpus.map(|label| (label, label))).unwrap();
        assert!(EmotionTable::default()
            .missing(&classifier.labels())
            .is_empty());
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let header = "tweet_id,sentiment,author,content\n";
        assert!(NaiveBayes::from_reader(header.as_bytes()).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CORPUS.as_bytes()).unwrap();
        file.flush().unwrap();

        let classifier = NaiveBayes::from_csv(file.path()).unwrap();
        assert_eq!(
            classifier.labels(),
            vec!["anger", "happiness", "sadness", "worry"]
        );
    }
}

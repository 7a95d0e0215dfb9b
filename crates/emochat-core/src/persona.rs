use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use serde::Deserialize;

use crate::{Personality, Tokenizer};

#[derive(Debug, Clone, Deserialize)]
struct Dialog {
    personality: Vec<String>,
}

/// Read every personality of a persona-chat style dataset.
///
/// The file is a JSON object of splits (`train`, `valid`, ...), each a list of dialogs carrying
/// a `personality` list of sentences. Splits are visited in key order.
pub fn read_personalities(json: &str) -> Result<Vec<Vec<String>>> {
    let dataset: BTreeMap<String, Vec<Dialog>> = serde_json::from_str(json)?;
    Ok(dataset
        .into_values()
        .flatten()
        .map(|dialog| dialog.personality)
        .collect())
}

pub fn load_personalities(path: impl AsRef<Path>) -> Result<Vec<Vec<String>>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let personalities = read_personalities(&json)?;
    log::info!("read {} personalities from {:?}", personalities.len(), path);
    Ok(personalities)
}

/// Pick the first personality whose text contains `keyword`, or a random one.
pub fn select_persona<'a>(
    personalities: &'a [Personality],
    keyword: &str,
    rng: &mut fastrand::Rng,
) -> Option<&'a Personality> {
    let matched = match keyword.is_empty() {
        true => None,
        false => personalities
            .iter()
            .find(|persona| persona.text.contains(keyword)),
    };
    let persona = match matched {
        Some(persona) => Some(persona),
        None if personalities.is_empty() => None,
        None => {
            if !keyword.is_empty() {
                log::warn!("no personality mentions {keyword:?}, picking one at random");
            }
            Some(&personalities[rng.usize(..personalities.len())])
        }
    }?;
    log::info!("selected personality: {}", persona.text);
    Some(persona)
}

/// Encode every personality with `tokenizer`.
pub fn encode_personalities<T: Tokenizer + ?Sized>(
    tokenizer: &T,
    personalities: &[Vec<String>],
) -> Result<Vec<Personality>> {
    personalities
        .iter()
        .map(|sentences| Personality::encode(tokenizer, sentences))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "valid": [
            {"personality": ["i like to ski .", "i have a dog ."], "utterances": []}
        ],
        "train": [
            {"personality": ["i love cats .", "i am a chef ."], "utterances": [{"history": []}]},
            {"personality": ["i own two cats .", "i live in paris ."]}
        ]
    }"#;

    fn persona(text: &str) -> Personality {
        Personality {
            sentences: vec![text.bytes().map(u32::from).collect()],
            text: text.to_string(),
        }
    }

    #[test]
    fn splits_are_read_in_key_order() {
        let personalities = read_personalities(DATASET).unwrap();
        assert_eq!(personalities.len(), 3);
        assert_eq!(personalities[0], vec!["i love cats .", "i am a chef ."]);
        assert_eq!(personalities[2], vec!["i like to ski .", "i have a dog ."]);
    }

    #[test]
    fn first_keyword_match_wins() {
        let personalities = [
            persona("i like to ski ."),
            persona("i love cats ."),
            persona("i own two cats ."),
        ];
        let mut rng = fastrand::Rng::with_seed(3);
        let selected = select_persona(&personalities, "cats", &mut rng).unwrap();
        assert_eq!(selected.text, "i love cats .");
    }

    #[test]
    fn unmatched_keyword_picks_any() {
        let personalities = [persona("i like to ski ."), persona("i love cats .")];
        let mut rng = fastrand::Rng::with_seed(3);
        let selected = select_persona(&personalities, "dragons", &mut rng).unwrap();
        assert!(personalities.contains(selected));
        assert!(select_persona(&[], "cats", &mut rng).is_none());
    }

    #[test]
    fn empty_keyword_is_random() {
        let personalities = (0..16)
            .map(|index| persona(&format!("persona {index}")))
            .collect::<Vec<_>>();
        let mut rng = fastrand::Rng::with_seed(11);
        let picks = (0..32)
            .filter_map(|_| select_persona(&personalities, "", &mut rng))
            .map(|persona| persona.text.clone())
            .collect::<std::collections::HashSet<_>>();
        assert!(picks.len() > 1);
    }
}

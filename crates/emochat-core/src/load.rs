use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use derivative::Derivative;
use serde::{Deserialize, Serialize};

use crate::{
    emotion::NaiveBayes,
    model::BigramModel,
    persona::{encode_personalities, load_personalities, select_persona},
    tokenizer::HfTokenizer,
    DecodeConfig, EmotionClassifier, EmotionTable, Engine, Personality, SequenceSampler,
    Session,
};

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct ModelOption {
    /// Path to the folder containing all models.
    #[derivative(Default(value = "\"assets/models\".into()"))]
    #[serde(alias = "model_path")]
    pub path: PathBuf,
    /// Name of the model.
    #[derivative(Default(value = "\"bigram.st\".into()"))]
    #[serde(alias = "model_name")]
    pub name: PathBuf,
}

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct TokenizerOption {
    #[derivative(Default(value = "\"assets/tokenizer/tokenizer.json\".into()"))]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct EmotionOption {
    /// CSV corpus with `sentiment` and `content` columns.
    #[derivative(Default(value = "\"assets/emotion/text_emotion.csv\".into()"))]
    pub path: PathBuf,
    /// Extra or overriding label to emoji entries.
    pub emojis: HashMap<String, String>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaOption {
    /// Persona-chat style dataset to pick a personality from.
    pub dataset: Option<PathBuf>,
    /// Prefer the first personality containing this text.
    pub keyword: String,
    /// Use these sentences instead of a dataset.
    pub sentences: Vec<String>,
}

#[derive(Debug, Derivative, Clone, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct LoadRequest {
    /// Path to the model.
    pub model_path: PathBuf,
    /// Path to the tokenizer.
    pub tokenizer_path: PathBuf,
    /// Path to the emotion corpus.
    pub emotion_path: PathBuf,
    pub emojis: HashMap<String, String>,
    pub persona: PersonaOption,
    pub decode: DecodeConfig,
    /// Number of exchanges kept in the history.
    #[derivative(Default(value = "5"))]
    pub max_history: usize,
    /// Seed for every random draw; `0` leaves them unseeded.
    pub seed: u64,
}

/// Locate the model file `name` inside the models folder `root` (`[model] path`).
///
/// `name` may repeat the `root` prefix. Names with `..` and absolute paths outside `root`
/// are rejected so a config cannot load a model from elsewhere on disk.
pub fn model_file(root: impl AsRef<Path>, name: impl AsRef<Path>) -> Result<PathBuf> {
    let (root, name) = (root.as_ref(), name.as_ref());
    if name.components().any(|part| part == Component::ParentDir) {
        bail!("model name {name:?} must not contain \"..\"");
    }
    let path = match name.is_absolute() || name.starts_with(root) {
        true => name.to_path_buf(),
        false => root.join(name),
    };
    if !path.starts_with(root) {
        bail!("model {path:?} is outside the models folder {root:?}");
    }
    Ok(path)
}

pub fn load_engine(request: &LoadRequest) -> Result<Engine> {
    log::info!("loading tokenizer {:?}", request.tokenizer_path);
    let tokenizer = HfTokenizer::from_file(&request.tokenizer_path)?;

    log::info!("loading model {:?}", request.model_path);
    let model = BigramModel::load(&request.model_path, request.decode.device)?;
    if model.vocab_size() < tokenizer.vocab_size() {
        bail!(
            "model vocabulary ({}) is smaller than the tokenizer's ({})",
            model.vocab_size(),
            tokenizer.vocab_size()
        );
    }

    log::info!("training emotion classifier on {:?}", request.emotion_path);
    let classifier = NaiveBayes::from_csv(&request.emotion_path)?;

    let mut emojis = EmotionTable::default();
    emojis.extend(request.emojis.clone());
    let missing = emojis.missing(&classifier.labels());
    if !missing.is_empty() {
        log::warn!("emotions without emoji: {}", missing.join(", "));
    }

    Engine::new(
        Arc::new(model),
        Arc::new(tokenizer),
        Arc::new(classifier),
        emojis,
    )
}

fn rng(seed: u64) -> fastrand::Rng {
    match seed {
        0 => fastrand::Rng::new(),
        seed => fastrand::Rng::with_seed(seed),
    }
}

/// Pick the personality for a new conversation.
pub fn load_personality(request: &LoadRequest, engine: &Engine) -> Result<Personality> {
    let PersonaOption {
        dataset,
        keyword,
        sentences,
    } = &request.persona;
    let tokenizer = engine.tokenizer.as_ref();

    if !sentences.is_empty() {
        let personality = Personality::encode(tokenizer, sentences)?;
        log::info!("personality: {}", personality.text);
        return Ok(personality);
    }
    let Some(dataset) = dataset else {
        bail!("either persona sentences or a persona dataset is required");
    };

    let personalities = encode_personalities(tokenizer, &load_personalities(dataset)?)?;
    match select_persona(&personalities, keyword, &mut rng(request.seed)) {
        Some(personality) => Ok(personality.clone()),
        None => bail!("persona dataset {:?} is empty", dataset),
    }
}

pub fn load_session(request: &LoadRequest, engine: &Engine) -> Result<Session> {
    let personality = load_personality(request, engine)?;
    let sampler = match request.seed {
        0 => SequenceSampler::new(request.decode.clone()),
        seed => SequenceSampler::with_seed(request.decode.clone(), seed),
    };
    Ok(Session::new(personality, request.max_history, sampler))
}

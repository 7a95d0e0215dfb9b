use derivative::Derivative;
use emochat_core::{
    load::{model_file, EmotionOption, LoadRequest, ModelOption, PersonaOption, TokenizerOption},
    DecodeConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model: ModelOption,
    pub tokenizer: TokenizerOption,
    pub emotion: EmotionOption,
    pub persona: PersonaOption,
    pub decode: DecodeConfig,
    pub session: SessionOption,
}

#[derive(Debug, Derivative, Clone, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct SessionOption {
    /// Number of exchanges remembered; the history holds twice as many utterances.
    #[derivative(Default(value = "5"))]
    pub max_history: usize,
    /// Seed for persona selection and sampling; `0` picks a fresh one every run.
    pub seed: u64,
}

impl TryFrom<Config> for LoadRequest {
    type Error = anyhow::Error;

    fn try_from(value: Config) -> Result<Self, Self::Error> {
        let Config {
            model: ModelOption { path, name },
            tokenizer: TokenizerOption {
                path: tokenizer_path,
            },
            emotion: EmotionOption {
                path: emotion_path,
                emojis,
            },
            persona,
            decode,
            session: SessionOption { max_history, seed },
        } = value;

        let model_path = model_file(path, name)?;

        Ok(Self {
            model_path,
            tokenizer_path,
            emotion_path,
            emojis,
            persona,
            decode,
            max_history,
            seed,
        })
    }
}

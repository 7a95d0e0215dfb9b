use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    EmotionClassifier, EmotionTable, History, InputBuilder, Model, SegmentInputBuilder,
    SequenceSampler, SpecialTokens, Tokenizer,
};

/// Sentences conditioning every reply of a session.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personality {
    pub sentences: Vec<Vec<u32>>,
    pub text: String,
}

impl Personality {
    pub fn encode<T, S>(tokenizer: &T, sentences: &[S]) -> Result<Self>
    where
        T: Tokenizer + ?Sized,
        S: AsRef<str>,
    {
        let sentences: Vec<_> = sentences
            .iter()
            .map(|sentence| tokenizer.encode(sentence.as_ref()))
            .try_collect()?;
        let text = tokenizer.decode(&sentences.concat(), true)?;
        Ok(Self { sentences, text })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResult {
    /// Emotion of the user's message.
    pub emotion: String,
    /// Emoji of the user's message.
    pub emoji: String,
    /// Generated reply followed by the emoji of its own emotion.
    pub text: String,
}

/// State of one conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub personality: Personality,
    pub history: History,
    pub sampler: SequenceSampler,
}

impl Session {
    pub fn new(personality: Personality, max_history: usize, sampler: SequenceSampler) -> Self {
        Self {
            personality,
            history: History::new(max_history),
            sampler,
        }
    }
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct Engine {
    pub model: Arc<dyn Model>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub classifier: Arc<dyn EmotionClassifier>,
    pub builder: Arc<dyn InputBuilder>,
    pub special: SpecialTokens,
    pub emojis: EmotionTable,
}

impl Engine {
    /// Build an engine using the speaker-segment input layout of `tokenizer`.
    pub fn new(
        model: Arc<dyn Model>,
        tokenizer: Arc<dyn Tokenizer>,
        classifier: Arc<dyn EmotionClassifier>,
        emojis: EmotionTable,
    ) -> Result<Self> {
        let builder = Arc::new(SegmentInputBuilder::resolve(tokenizer.as_ref())?);
        let special = tokenizer.special_token_ids()?;
        Ok(Self {
            model,
            tokenizer,
            classifier,
            builder,
            special,
            emojis,
        })
    }

    fn classify(&self, text: &str) -> Result<String> {
        Ok(self.classifier.predict(&[text])?.concat())
    }

    /// Answer one user message, updating the session history.
    pub fn respond(&self, session: &mut Session, input: &str) -> Result<TurnResult> {
        let emotion = self.classify(input)?;
        let emoji = self.emojis.emoji(&emotion)?.to_string();

        let Session {
            personality,
            history,
            sampler,
        } = session;

        history.push(self.tokenizer.encode(input)?);
        let output = sampler.sample_sequence(
            self.model.as_ref(),
            self.builder.as_ref(),
            &self.special,
            &personality.sentences,
            history.entries(),
        )?;
        history.push(output.clone());
        history.evict();

        let reply = self.tokenizer.decode(&output, true)?;
        let reply_emotion = self.classify(&reply)?;
        let text = format!("{} {}", reply, self.emojis.emoji(&reply_emotion)?);

        log::debug!("[{emotion}] {input:?} -> [{reply_emotion}] {reply:?}");
        Ok(TurnResult {
            emotion,
            emoji,
            text,
        })
    }
}

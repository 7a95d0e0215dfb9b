use anyhow::Result;
use itertools::Itertools;

use crate::{
    tokenizer::{BOS, EOS, SPEAKER1, SPEAKER2},
    ChatError, InputBuilder, ModelInput, Tokenizer,
};

/// Lays out persona, history and reply as speaker-tagged segments.
///
/// The persona segment starts with `<bos>`. Every following segment is prefixed with a speaker
/// token, alternating backwards from the reply, which is always spoken by `<speaker1>`. Segment
/// ids alternate `<speaker1>`/`<speaker2>` by segment position, starting from the persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentInputBuilder {
    pub bos: u32,
    pub eos: u32,
    pub speaker1: u32,
    pub speaker2: u32,
}

impl SegmentInputBuilder {
    pub fn resolve<T: Tokenizer + ?Sized>(tokenizer: &T) -> Result<Self> {
        let id = |token: &'static str| {
            tokenizer
                .token_id(token)
                .ok_or(ChatError::MissingSpecialToken(token))
        };
        Ok(Self {
            bos: id(BOS)?,
            eos: id(EOS)?,
            speaker1: id(SPEAKER1)?,
            speaker2: id(SPEAKER2)?,
        })
    }
}

impl InputBuilder for SegmentInputBuilder {
    fn build(
        &self,
        personality: &[Vec<u32>],
        history: &[Vec<u32>],
        reply: &[u32],
        with_eos: bool,
    ) -> ModelInput {
        let persona = std::iter::once(self.bos)
            .chain(personality.iter().flatten().copied())
            .collect_vec();
        let reply = reply
            .iter()
            .copied()
            .chain(with_eos.then_some(self.eos))
            .collect_vec();

        let len = history.len() + 2;
        let segments = std::iter::once(persona)
            .chain(
                history
                    .iter()
                    .map(Vec::as_slice)
                    .chain(std::iter::once(reply.as_slice()))
                    .enumerate()
                    .map(|(index, segment)| {
                        let speaker = match (len - index) % 2 {
                            1 => self.speaker2,
                            _ => self.speaker1,
                        };
                        std::iter::once(speaker)
                            .chain(segment.iter().copied())
                            .collect_vec()
                    }),
            )
            .collect_vec();

        let segment_ids = segments
            .iter()
            .enumerate()
            .flat_map(|(index, segment)| {
                let speaker = match index % 2 {
                    1 => self.speaker2,
                    _ => self.speaker1,
                };
                std::iter::repeat(speaker).take(segment.len())
            })
            .collect();
        let input_ids = segments.into_iter().flatten().collect();

        ModelInput {
            input_ids,
            segment_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUILDER: SegmentInputBuilder = SegmentInputBuilder {
        bos: 100,
        eos: 101,
        speaker1: 102,
        speaker2: 103,
    };

    #[test]
    fn persona_only_prompt() {
        let input = BUILDER.build(&[vec![1, 2], vec![3]], &[], &[], false);
        assert_eq!(input.input_ids, vec![100, 1, 2, 3, 102]);
        assert_eq!(input.segment_ids, vec![102, 102, 102, 102, 103]);
    }

    #[test]
    fn speakers_alternate_back_from_reply() {
        let history = [vec![10, 11], vec![20], vec![30]];
        let input = BUILDER.build(&[vec![1]], &history, &[40], true);
        assert_eq!(
            input.input_ids,
            vec![100, 1, 103, 10, 11, 102, 20, 103, 30, 102, 40, 101]
        );
        assert_eq!(
            input.segment_ids,
            vec![102, 102, 103, 103, 103, 102, 102, 103, 103, 102, 102, 102]
        );
    }

    #[test]
    fn reply_is_tagged_speaker1_without_eos() {
        let input = BUILDER.build(&[vec![1]], &[vec![5, 6]], &[7, 8], false);
        assert_eq!(input.input_ids, vec![100, 1, 103, 5, 6, 102, 7, 8]);
        assert_eq!(input.input_ids.len(), input.segment_ids.len());
        assert_eq!(input.segment_ids[5..], [102, 102, 102]);
    }
}

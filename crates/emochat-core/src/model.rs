use std::{fs::File, path::Path};

use anyhow::{bail, Result};
use half::f16;
use memmap2::Mmap;
use safetensors::{Dtype, SafeTensorError, SafeTensors};

use crate::{ChatError, Device, Logits, Model};

pub const TRANSITION: &str = "transition";
pub const SEGMENT: &str = "segment";

/// Next-token scores looked up from a `[vocab, vocab]` transition table.
///
/// Row `t` of the transition table scores the token following `t`. An optional segment table
/// of the same shape adds row `s` for a position whose segment id is `s`.
#[derive(Debug, Clone)]
pub struct BigramModel {
    vocab_size: usize,
    transition: Vec<f32>,
    segment: Option<Vec<f32>>,
}

fn read_tensor(tensors: &SafeTensors, name: &str) -> Result<Option<(Vec<usize>, Vec<f32>)>> {
    let view = match tensors.tensor(name) {
        Ok(view) => view,
        Err(SafeTensorError::TensorNotFound(_)) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let data = match view.dtype() {
        Dtype::F32 => view
            .data()
            .chunks_exact(4)
            .map(|x| f32::from_le_bytes([x[0], x[1], x[2], x[3]]))
            .collect(),
        Dtype::F16 => view
            .data()
            .chunks_exact(2)
            .map(|x| f16::from_le_bytes([x[0], x[1]]).to_f32())
            .collect(),
        dtype => bail!("tensor `{name}` has unsupported dtype {dtype:?}"),
    };
    Ok(Some((view.shape().to_vec(), data)))
}

impl BigramModel {
    pub fn new(vocab_size: usize, transition: Vec<f32>, segment: Option<Vec<f32>>) -> Result<Self> {
        let expected = vocab_size * vocab_size;
        for table in std::iter::once(&transition).chain(segment.as_ref()) {
            if vocab_size == 0 || table.len() != expected {
                bail!(ChatError::Shape {
                    expected,
                    actual: table.len(),
                });
            }
        }
        Ok(Self {
            vocab_size,
            transition,
            segment,
        })
    }

    pub fn from_safetensors(data: &[u8]) -> Result<Self> {
        let tensors = SafeTensors::deserialize(data)?;
        let Some((shape, transition)) = read_tensor(&tensors, TRANSITION)? else {
            bail!("missing tensor `{TRANSITION}`");
        };
        let vocab_size = match shape[..] {
            [rows, cols] if rows == cols => rows,
            _ => bail!("tensor `{TRANSITION}` must be square, got {shape:?}"),
        };
        let segment = read_tensor(&tensors, SEGMENT)?.map(|(_, data)| data);
        Self::new(vocab_size, transition, segment)
    }

    pub fn load(path: impl AsRef<Path>, device: Device) -> Result<Self> {
        let path = path.as_ref();
        if device == Device::Gpu {
            log::warn!("bigram model runs on the cpu only");
        }
        let file = File::open(path)?;
        let data = unsafe { Mmap::map(&file)? };
        let model = Self::from_safetensors(&data)?;
        log::info!(
            "loaded model {:?}: vocab {}, segment table: {}",
            path,
            model.vocab_size,
            model.segment.is_some()
        );
        Ok(model)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn row<'a>(&self, table: &'a [f32], token: u32) -> Result<&'a [f32]> {
        let start = token as usize * self.vocab_size;
        table
            .get(start..start + self.vocab_size)
            .ok_or_else(|| {
                ChatError::TokenOutOfRange {
                    token,
                    vocab_size: self.vocab_size,
                }
                .into()
            })
    }
}

impl Model for BigramModel {
    fn forward(&self, input_ids: &[u32], segment_ids: &[u32]) -> Result<Logits> {
        if input_ids.len() != segment_ids.len() {
            bail!(
                "{} input ids but {} segment ids",
                input_ids.len(),
                segment_ids.len()
            );
        }

        let mut data = Vec::with_capacity(input_ids.len() * self.vocab_size);
        for (&token, &segment) in input_ids.iter().zip(segment_ids) {
            let scores = self.row(&self.transition, token)?;
            match &self.segment {
                Some(table) => {
                    let bias = self.row(table, segment)?;
                    data.extend(scores.iter().zip(bias).map(|(x, y)| x + y));
                }
                None => data.extend_from_slice(scores),
            }
        }
        Logits::new(self.vocab_size, data)
    }
}

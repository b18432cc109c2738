use dec_logits::Sequences;
use dec_tensor::Tensor;

use crate::error::{DecodeError, Result};

/// Growable per-(batch, beam) token buffers plus finished tracking.
///
/// Two flat buffers of `batch_beam_size * max_length` tokens are kept and
/// flipped on every append: the new token for row `i` is written after the
/// history of whichever prior beam `beam_indices[i]` names, so beam
/// re-parenting never aliases rows that are still being read. All rows have
/// the same length at the start of every step; finished rows are padded
/// with EOS and their true length is recorded separately.
pub struct SequenceStore {
    buffers: [Vec<u32>; 2],
    current: usize,
    batch_size: usize,
    num_beams: usize,
    max_length: usize,
    prompt_length: usize,
    current_length: usize,
    finished: Vec<bool>,
    finished_at: Vec<usize>,
}

impl SequenceStore {
    /// Allocate buffers sized to `max_length` and copy each batch
    /// element's prompt into all of its beams.
    pub fn new(prompts: &Tensor, num_beams: usize, max_length: usize) -> Result<Self> {
        let shape = prompts.shape();
        if shape.ndim() != 2 {
            return Err(DecodeError::InvalidArgument {
                input: "input_ids".to_string(),
                message: format!("expected 2 dimensions, got shape {}", shape),
            });
        }
        let batch_size = shape.dim(0);
        let prompt_length = shape.dim(1);
        let data = prompts.data_u32()?;

        let batch_beam_size = batch_size * num_beams;
        let mut buffer = vec![0u32; batch_beam_size * max_length];
        for i in 0..batch_beam_size {
            let batch = i / num_beams;
            let src = &data[batch * prompt_length..(batch + 1) * prompt_length];
            buffer[i * max_length..i * max_length + prompt_length].copy_from_slice(src);
        }

        Ok(Self {
            buffers: [buffer.clone(), buffer],
            current: 0,
            batch_size,
            num_beams,
            max_length,
            prompt_length,
            current_length: prompt_length,
            finished: vec![false; batch_beam_size],
            finished_at: vec![0; batch_beam_size],
        })
    }

    pub fn batch_beam_size(&self) -> usize {
        self.batch_size * self.num_beams
    }

    pub fn num_beams(&self) -> usize {
        self.num_beams
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn prompt_length(&self) -> usize {
        self.prompt_length
    }

    /// Extend every row by one token.
    ///
    /// `beam_indices[i]` names the prior beam (within row `i`'s batch
    /// element) whose history the new token extends; for greedy search it
    /// is always 0. Rows already finished ignore their entry, keep their
    /// own history, and take an EOS pad so the store stays rectangular.
    pub fn append(
        &mut self,
        beam_indices: &[u32],
        next_tokens: &[u32],
        eos_token_id: u32,
    ) -> Result<()> {
        let batch_beam_size = self.batch_size * self.num_beams;
        if beam_indices.len() != batch_beam_size || next_tokens.len() != batch_beam_size {
            return Err(DecodeError::InvariantViolation(format!(
                "selector returned {} tokens and {} beam indices for {} rows",
                next_tokens.len(),
                beam_indices.len(),
                batch_beam_size
            )));
        }
        if self.current_length >= self.max_length {
            return Err(DecodeError::InvariantViolation(format!(
                "append past max_length {}",
                self.max_length
            )));
        }

        let length = self.current_length;
        let max_length = self.max_length;
        let (first, second) = self.buffers.split_at_mut(1);
        let (src, dst) = if self.current == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        };

        for i in 0..batch_beam_size {
            let (parent, token) = if self.finished[i] {
                (i, eos_token_id)
            } else {
                let beam = beam_indices[i] as usize;
                if beam >= self.num_beams {
                    return Err(DecodeError::InvariantViolation(format!(
                        "beam index {} out of range for {} beams",
                        beam, self.num_beams
                    )));
                }
                let batch = i / self.num_beams;
                (batch * self.num_beams + beam, next_tokens[i])
            };

            let from = parent * max_length;
            let to = i * max_length;
            dst[to..to + length].copy_from_slice(&src[from..from + length]);
            dst[to + length] = token;

            if !self.finished[i] && token == eos_token_id {
                self.finished[i] = true;
                self.finished_at[i] = length + 1;
            }
        }

        self.current = 1 - self.current;
        self.current_length += 1;
        Ok(())
    }

    /// True once EOS was appended or the length bound is reached.
    pub fn is_finished(&self, batch: usize, beam: usize) -> bool {
        self.finished[batch * self.num_beams + beam] || self.current_length >= self.max_length
    }

    /// True once every row has produced EOS.
    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|&f| f)
    }

    /// A row's final sequence: trimmed to where it finished, or the full
    /// current prefix if it never did.
    pub fn final_sequence(&self, batch_beam_index: usize) -> &[u32] {
        let length = if self.finished[batch_beam_index] {
            self.finished_at[batch_beam_index]
        } else {
            self.current_length
        };
        let start = batch_beam_index * self.max_length;
        &self.buffers[self.current][start..start + length]
    }
}

impl Sequences for SequenceStore {
    fn sequence(&self, batch_beam_index: usize) -> &[u32] {
        let start = batch_beam_index * self.max_length;
        &self.buffers[self.current][start..start + self.current_length]
    }

    fn current_length(&self) -> usize {
        self.current_length
    }

    fn batch_beam_size(&self) -> usize {
        self.batch_size * self.num_beams
    }
}

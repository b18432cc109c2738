use dec_logits::Sequences;

use crate::error::{DecodeError, Result};
use crate::sequences::SequenceStore;

/// A completed (or finalized) sequence with its length-penalized score.
#[derive(Debug, Clone)]
pub struct BeamHypothesis {
    pub tokens: Vec<u32>,
    pub score: f32,
}

/// Sorted top candidates for one step, flattened batch-major.
///
/// Each batch element contributes `per_batch` candidates ordered by
/// combined score descending, ties already broken toward the lower beam
/// index and lower token id by the top-k's index ordering.
pub struct BeamCandidates {
    pub scores: Vec<f32>,
    pub tokens: Vec<u32>,
    pub beams: Vec<u32>,
    pub per_batch: usize,
}

/// Re-ranks beam expansions every step and banks finished hypotheses.
///
/// Cumulative scores are combined in log-space. At initialization only
/// beam 0 of each batch element carries score 0; the other beams start at
/// a large negative value so the first step expands a single beam of
/// identical prompt copies instead of `num_beams` duplicates.
pub struct BeamScorer {
    batch_size: usize,
    num_beams: usize,
    length_penalty: f32,
    eos_token_id: u32,
    prompt_length: usize,
    beam_scores: Vec<f32>,
    hypotheses: Vec<Vec<BeamHypothesis>>,
    done: Vec<bool>,
    next_tokens: Vec<u32>,
    next_indices: Vec<u32>,
}

impl BeamScorer {
    pub fn new(
        batch_size: usize,
        num_beams: usize,
        length_penalty: f32,
        eos_token_id: u32,
        prompt_length: usize,
    ) -> Self {
        let mut beam_scores = vec![-1e9f32; batch_size * num_beams];
        for batch in 0..batch_size {
            beam_scores[batch * num_beams] = 0.0;
        }
        Self {
            batch_size,
            num_beams,
            length_penalty,
            eos_token_id,
            prompt_length,
            beam_scores,
            hypotheses: vec![Vec::new(); batch_size],
            done: vec![false; batch_size],
            next_tokens: vec![0; batch_size * num_beams],
            next_indices: vec![0; batch_size * num_beams],
        }
    }

    /// Cumulative log-probability per (batch, beam) row.
    pub fn beam_scores(&self) -> &[f32] {
        &self.beam_scores
    }

    pub fn next_tokens(&self) -> &[u32] {
        &self.next_tokens
    }

    pub fn next_indices(&self) -> &[u32] {
        &self.next_indices
    }

    pub fn done(&self, batch: usize) -> bool {
        self.done[batch]
    }

    pub fn all_done(&self) -> bool {
        self.done.iter().all(|&d| d)
    }

    /// Wu-style penalty factor: `((5 + generated) / 6) ^ alpha`.
    fn penalty_factor(&self, generated: usize) -> f32 {
        ((5.0 + generated as f32) / 6.0).powf(self.length_penalty)
    }

    /// Consume one step's candidates: EOS candidates are banked as
    /// finished hypotheses, everything else fills the next beam slots in
    /// rank order, recording which prior beam each slot extends.
    ///
    /// # Errors
    /// Fails with an invariant violation if a batch element cannot fill
    /// all of its beam slots.
    pub fn process(&mut self, store: &SequenceStore, candidates: &BeamCandidates) -> Result<()> {
        for batch in 0..self.batch_size {
            let base = batch * self.num_beams;
            if self.done[batch] {
                // Frozen batch element: pad so the store stays rectangular.
                for slot in 0..self.num_beams {
                    self.next_tokens[base + slot] = self.eos_token_id;
                    self.next_indices[base + slot] = slot as u32;
                }
                continue;
            }

            let start = batch * candidates.per_batch;
            let mut slot = 0;
            for c in start..start + candidates.per_batch {
                let token = candidates.tokens[c];
                let beam = candidates.beams[c];
                let score = candidates.scores[c];

                if token == self.eos_token_id {
                    let mut tokens = store.sequence(base + beam as usize).to_vec();
                    tokens.push(self.eos_token_id);
                    let generated = tokens.len() - self.prompt_length;
                    self.push_hypothesis(
                        batch,
                        BeamHypothesis {
                            tokens,
                            score: score / self.penalty_factor(generated),
                        },
                    );
                    continue;
                }

                self.next_tokens[base + slot] = token;
                self.next_indices[base + slot] = beam;
                self.beam_scores[base + slot] = score;
                slot += 1;
                if slot == self.num_beams {
                    break;
                }
            }

            if slot < self.num_beams {
                return Err(DecodeError::InvariantViolation(format!(
                    "batch element {} filled only {} of {} beam slots",
                    batch, slot, self.num_beams
                )));
            }

            if self.hypotheses[batch].len() >= self.num_beams {
                self.done[batch] = true;
            }
        }
        Ok(())
    }

    fn push_hypothesis(&mut self, batch: usize, hypothesis: BeamHypothesis) {
        let hyps = &mut self.hypotheses[batch];
        hyps.push(hypothesis);
        hyps.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hyps.truncate(self.num_beams);
    }

    /// Bank the live beams and return, per batch element, the `num_beams`
    /// best hypotheses ranked best-first.
    pub fn finalize(mut self, store: &SequenceStore) -> Vec<Vec<BeamHypothesis>> {
        for batch in 0..self.batch_size {
            if self.done[batch] {
                continue;
            }
            for beam in 0..self.num_beams {
                let row = batch * self.num_beams + beam;
                let tokens = store.final_sequence(row).to_vec();
                let generated = tokens.len().saturating_sub(self.prompt_length);
                let score = self.beam_scores[row] / self.penalty_factor(generated);
                self.push_hypothesis(batch, BeamHypothesis { tokens, score });
            }
        }
        self.hypotheses
    }
}

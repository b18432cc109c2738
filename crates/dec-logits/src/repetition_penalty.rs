use std::collections::HashSet;

use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Penalizes tokens that already appear in a sequence.
///
/// For each token present in a row's history, a positive score is divided
/// by the penalty and a negative score is multiplied by it. This assumes
/// scores are predominantly one sign, as model logits typically are.
pub struct RepetitionPenaltyProcessor {
    penalty: f32,
}

impl RepetitionPenaltyProcessor {
    /// `penalty` of 1.0 means no penalty.
    pub fn new(penalty: f32) -> Self {
        Self { penalty }
    }
}

impl<E: Element> LogitsProcessor<E> for RepetitionPenaltyProcessor {
    fn name(&self) -> &str {
        "repetition_penalty"
    }

    fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if self.penalty == 1.0 {
            return;
        }

        for i in 0..scores.batch_beam_size {
            let seen: HashSet<u32> = sequences.sequence(i).iter().copied().collect();
            let row = scores.row_mut(i);
            for token in seen {
                let score = row[token as usize].to_f32();
                row[token as usize] = E::from_f32(if score < 0.0 {
                    score * self.penalty
                } else {
                    score / self.penalty
                });
            }
        }
    }
}

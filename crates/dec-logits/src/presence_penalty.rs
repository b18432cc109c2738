use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Subtracts a flat penalty from tokens flagged in a presence mask.
///
/// The mask covers (batch_size, vocab_size); every beam of a batch
/// element shares that element's mask row. Unlike the repetition penalty
/// this does not scale with the score, it shifts flagged tokens down by
/// a constant. A penalty of 0.0 disables the stage.
pub struct PresencePenaltyProcessor {
    presence_mask: Vec<u32>,
    penalty: f32,
}

impl PresencePenaltyProcessor {
    pub fn new(presence_mask: Vec<u32>, penalty: f32) -> Self {
        Self {
            presence_mask,
            penalty,
        }
    }
}

impl<E: Element> LogitsProcessor<E> for PresencePenaltyProcessor {
    fn name(&self) -> &str {
        "presence_penalty"
    }

    fn process(&self, _sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if self.penalty == 0.0 || self.presence_mask.is_empty() {
            return;
        }
        let vocab_size = scores.vocab_size;
        let batch_size = self.presence_mask.len() / vocab_size;
        let num_beams = scores.batch_beam_size / batch_size;

        for i in 0..scores.batch_beam_size {
            let batch = i / num_beams;
            let mask = &self.presence_mask[batch * vocab_size..(batch + 1) * vocab_size];
            let row = scores.row_mut(i);
            for (s, &m) in row.iter_mut().zip(mask) {
                if m != 0 {
                    *s = E::from_f32(s.to_f32() - m as f32 * self.penalty);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequences::SliceSequences;
    use approx::assert_relative_eq;

    #[test]
    fn test_flagged_tokens_are_shifted_down() {
        let p = PresencePenaltyProcessor::new(vec![0, 1, 0], 2.5);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![1.0f32, 1.0, 1.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 3);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_relative_eq!(scores.row(0)[0], 1.0);
        assert_relative_eq!(scores.row(0)[1], -1.5);
        assert_relative_eq!(scores.row(0)[2], 1.0);
    }

    #[test]
    fn test_beams_share_their_batch_mask() {
        // Batch 0 flags token 0, batch 1 flags token 1; two beams each.
        let p = PresencePenaltyProcessor::new(vec![1, 0, 0, 1], 1.0);
        let rows = vec![vec![0u32]; 4];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![0.0f32; 8];
        let mut scores = NextTokenScores::new(&mut buf, 4, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0), &[-1.0, 0.0]);
        assert_eq!(scores.row(1), &[-1.0, 0.0]);
        assert_eq!(scores.row(2), &[0.0, -1.0]);
        assert_eq!(scores.row(3), &[0.0, -1.0]);
    }

    #[test]
    fn test_zero_penalty_is_identity() {
        let p = PresencePenaltyProcessor::new(vec![1, 1], 0.0);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![3.0f32, 4.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0), &[3.0, 4.0]);
    }

    #[test]
    fn test_suppressed_tokens_stay_suppressed() {
        let p = PresencePenaltyProcessor::new(vec![1, 0], 5.0);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![f32::NEG_INFINITY, 1.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[0], f32::NEG_INFINITY);
    }
}

use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Forces the EOS score to negative infinity while sequences are shorter
/// than a minimum length, so no sequence can finish early.
pub struct MinLengthProcessor {
    min_length: usize,
    eos_token_id: u32,
}

impl MinLengthProcessor {
    pub fn new(min_length: usize, eos_token_id: u32) -> Self {
        Self {
            min_length,
            eos_token_id,
        }
    }
}

impl<E: Element> LogitsProcessor<E> for MinLengthProcessor {
    fn name(&self) -> &str {
        "min_length"
    }

    fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if sequences.current_length() < self.min_length {
            scores.set_score(self.eos_token_id, E::neg_infinity());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequences::SliceSequences;

    #[test]
    fn test_suppresses_eos_below_min_length() {
        let p = MinLengthProcessor::new(4, 2);
        let rows = vec![vec![5u32, 7, 8]]; // length 3 < 4
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![1.0f32; 4];
        let mut scores = NextTokenScores::new(&mut buf, 1, 4);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[2], f32::NEG_INFINITY);
        assert_eq!(scores.row(0)[0], 1.0);
    }

    #[test]
    fn test_leaves_eos_at_min_length() {
        let p = MinLengthProcessor::new(3, 2);
        let rows = vec![vec![5u32, 7, 8]]; // length 3 == 3
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![1.0f32; 4];
        let mut scores = NextTokenScores::new(&mut buf, 1, 4);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[2], 1.0);
    }
}

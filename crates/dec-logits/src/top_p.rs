use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Top-p (nucleus) filtering.
///
/// Per row, keeps the smallest set of highest-scored tokens whose
/// cumulative softmax probability exceeds `top_p` and suppresses the
/// rest. The single best token always survives. Values of 0.0 and >= 1.0
/// disable the filter.
pub struct TopPProcessor {
    top_p: f32,
}

impl TopPProcessor {
    pub fn new(top_p: f32) -> Self {
        Self { top_p }
    }
}

impl<E: Element> LogitsProcessor<E> for TopPProcessor {
    fn name(&self) -> &str {
        "top_p"
    }

    fn process(&self, _sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if self.top_p <= 0.0 || self.top_p >= 1.0 {
            return;
        }

        for i in 0..scores.batch_beam_size {
            let row = scores.row_mut(i);

            // Descending sort of indices; ties keep the lower token id first.
            let mut indices: Vec<usize> = (0..row.len()).collect();
            indices.sort_by(|&a, &b| {
                row[b]
                    .partial_cmp(&row[a])
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.cmp(&b))
            });

            // Softmax over the sorted scores, in f32.
            let max = row[indices[0]].to_f32();
            let exps: Vec<f32> = indices
                .iter()
                .map(|&idx| (row[idx].to_f32() - max).exp())
                .collect();
            let sum: f32 = exps.iter().sum();

            // Walk the nucleus; everything past the cutoff is suppressed.
            let mut cumulative = 0.0f32;
            let mut cutoff = indices.len();
            for (rank, &e) in exps.iter().enumerate() {
                cumulative += e / sum;
                if cumulative > self.top_p {
                    cutoff = rank + 1;
                    break;
                }
            }
            for &idx in &indices[cutoff..] {
                row[idx] = E::neg_infinity();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequences::SliceSequences;

    #[test]
    fn test_keeps_nucleus_only() {
        // Scores heavily favor token 1; a small top_p keeps only it.
        let p = TopPProcessor::new(0.5);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![0.0f32, 10.0, 0.0, 0.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 4);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[1], 10.0);
        assert_eq!(scores.row(0)[0], f32::NEG_INFINITY);
        assert_eq!(scores.row(0)[2], f32::NEG_INFINITY);
        assert_eq!(scores.row(0)[3], f32::NEG_INFINITY);
    }

    #[test]
    fn test_best_token_always_survives() {
        let p = TopPProcessor::new(0.01);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![1.0f32, 2.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[1], 2.0);
    }

    #[test]
    fn test_disabled_values() {
        for top_p in [0.0, 1.0, 1.5] {
            let p = TopPProcessor::new(top_p);
            let rows = vec![vec![0u32]];
            let seqs = SliceSequences::new(&rows);
            let mut buf = vec![1.0f32, 2.0, 3.0];
            let mut scores = NextTokenScores::new(&mut buf, 1, 3);
            LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
            assert_eq!(scores.row(0), &[1.0, 2.0, 3.0]);
        }
    }
}

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use dec_logits::NextTokenScores;
use dec_tensor::Element;

use crate::beam::BeamCandidates;
use crate::device::DeviceAdapter;
use crate::error::{DecodeError, Result};

/// Greedy selection: argmax per row, ties resolved to the lower token id.
pub fn greedy_select<E: Element>(
    scores: &NextTokenScores<'_, E>,
    adapter: &dyn DeviceAdapter<E>,
) -> Result<Vec<u32>> {
    let buffer: Vec<f32> = scores.as_slice().iter().map(|s| s.to_f32()).collect();
    let (_, indices) = adapter.topk(&buffer, scores.vocab_size, 1)?;
    if indices.len() != scores.batch_beam_size {
        return Err(DecodeError::InvariantViolation(format!(
            "top-k returned {} selections for {} rows",
            indices.len(),
            scores.batch_beam_size
        )));
    }
    Ok(indices)
}

/// Candidate generation for beam search: per batch element, the top
/// `2 * num_beams` (beam, token) pairs by cumulative log-probability plus
/// step log-probability, combined in log-space.
///
/// Twice the beam count is requested so the scorer can bank EOS
/// candidates and still fill every beam slot.
pub fn beam_candidates<E: Element>(
    scores: &NextTokenScores<'_, E>,
    beam_scores: &[f32],
    num_beams: usize,
    adapter: &dyn DeviceAdapter<E>,
) -> Result<BeamCandidates> {
    let vocab_size = scores.vocab_size;
    let batch_size = scores.batch_beam_size / num_beams;
    let per_batch = 2 * num_beams;

    let mut out = BeamCandidates {
        scores: Vec::with_capacity(batch_size * per_batch),
        tokens: Vec::with_capacity(batch_size * per_batch),
        beams: Vec::with_capacity(batch_size * per_batch),
        per_batch,
    };

    // One top-k per batch element over its flattened beam*vocab block; a
    // flat index ties to the lower beam first, then the lower token id.
    let mut combined = vec![0.0f32; num_beams * vocab_size];
    for batch in 0..batch_size {
        for beam in 0..num_beams {
            let row = batch * num_beams + beam;
            let cumulative = beam_scores[row];
            for (j, s) in scores.row(row).iter().enumerate() {
                combined[beam * vocab_size + j] = cumulative + s.to_f32();
            }
        }
        let (values, indices) = adapter.topk(&combined, num_beams * vocab_size, per_batch)?;
        for (value, flat) in values.into_iter().zip(indices) {
            out.scores.push(value);
            out.beams.push(flat / vocab_size as u32);
            out.tokens.push(flat % vocab_size as u32);
        }
    }
    Ok(out)
}

/// Seeded multinomial sampling over the softmaxed score rows, the
/// stochastic alternative to argmax for single-beam runs.
pub struct SamplingSelector {
    rng: StdRng,
}

impl SamplingSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Draw one token per row.
    pub fn select<E: Element>(&mut self, scores: &NextTokenScores<'_, E>) -> Vec<u32> {
        let mut picks = Vec::with_capacity(scores.batch_beam_size);
        for i in 0..scores.batch_beam_size {
            let row = scores.row(i);
            let max = row
                .iter()
                .map(|s| s.to_f32())
                .fold(f32::NEG_INFINITY, f32::max);
            let weights: Vec<f32> = row.iter().map(|s| (s.to_f32() - max).exp()).collect();

            match WeightedIndex::new(&weights) {
                Ok(dist) => picks.push(dist.sample(&mut self.rng) as u32),
                // Degenerate weights: fall back to the argmax.
                Err(_) => {
                    let argmax = row
                        .iter()
                        .enumerate()
                        .max_by(|(ai, a), (bi, b)| {
                            a.partial_cmp(b)
                                .unwrap_or(std::cmp::Ordering::Equal)
                                .then(bi.cmp(ai))
                        })
                        .map(|(i, _)| i as u32)
                        .unwrap_or(0);
                    picks.push(argmax);
                }
            }
        }
        picks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CpuAdapter;

    #[test]
    fn test_greedy_argmax() {
        let adapter = CpuAdapter::new();
        let mut buf = vec![0.1f32, 0.9, 0.2, 0.8, 0.1, 0.3];
        let scores = NextTokenScores::new(&mut buf, 2, 3);
        let tokens = greedy_select(&scores, &adapter).unwrap();
        assert_eq!(tokens, vec![1, 0]);
    }

    #[test]
    fn test_greedy_tie_break_prefers_lower_id() {
        let adapter = CpuAdapter::new();
        let mut buf = vec![0.5f32, 0.9, 0.9, 0.1];
        let scores = NextTokenScores::new(&mut buf, 1, 4);
        let tokens = greedy_select(&scores, &adapter).unwrap();
        assert_eq!(tokens, vec![1]);
    }

    #[test]
    fn test_beam_candidates_combines_cumulative_scores() {
        let adapter = CpuAdapter::new();
        // Two beams, vocab 3. Beam 1 carries a big cumulative lead.
        let mut buf = vec![0.0f32, -1.0, -2.0, -0.5, -1.5, -2.5];
        let scores = NextTokenScores::new(&mut buf, 2, 3);
        let beam_scores = vec![-10.0, 0.0];
        let candidates = beam_candidates(&scores, &beam_scores, 2, &adapter).unwrap();
        assert_eq!(candidates.per_batch, 4);
        // All top candidates come from beam 1.
        assert_eq!(candidates.beams[0], 1);
        assert_eq!(candidates.tokens[0], 0);
        assert_eq!(candidates.beams[1], 1);
        assert_eq!(candidates.tokens[1], 1);
        // Rank order is non-increasing.
        for pair in candidates.scores.windows(2) {
            assert!(pair[0] >= pair[1]);
        }
    }

    #[test]
    fn test_beam_candidate_tie_breaks_lower_beam_then_token() {
        let adapter = CpuAdapter::new();
        let mut buf = vec![1.0f32, 1.0, 1.0, 1.0];
        let scores = NextTokenScores::new(&mut buf, 2, 2);
        let candidates = beam_candidates(&scores, &[0.0, 0.0], 2, &adapter).unwrap();
        assert_eq!(candidates.beams, vec![0, 0, 1, 1]);
        assert_eq!(candidates.tokens, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_sampling_is_deterministic_under_seed() {
        let mut buf_a = vec![0.0f32, 5.0, 0.0, 1.0];
        let scores_a = NextTokenScores::new(&mut buf_a, 1, 4);
        let mut buf_b = vec![0.0f32, 5.0, 0.0, 1.0];
        let scores_b = NextTokenScores::new(&mut buf_b, 1, 4);

        let a = SamplingSelector::new(42).select(&scores_a);
        let b = SamplingSelector::new(42).select(&scores_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sampling_never_picks_suppressed_token() {
        let mut buf = vec![f32::NEG_INFINITY, 2.0];
        let scores = NextTokenScores::new(&mut buf, 1, 2);
        let mut selector = SamplingSelector::new(7);
        for _ in 0..16 {
            assert_eq!(selector.select(&scores), vec![1]);
        }
    }
}

use dec_tensor::Element;

/// Mutable view over one step's score buffer.
///
/// The buffer is a dense (batch_beam_size, vocab_size) row-major matrix,
/// re-materialized from raw logits every step, mutated in place by the
/// processor pipeline, then read by the selector.
pub struct NextTokenScores<'a, E: Element> {
    scores: &'a mut [E],
    pub batch_beam_size: usize,
    pub vocab_size: usize,
}

impl<'a, E: Element> NextTokenScores<'a, E> {
    /// Wrap a score buffer.
    ///
    /// # Panics
    /// Panics if `scores.len() != batch_beam_size * vocab_size`.
    pub fn new(scores: &'a mut [E], batch_beam_size: usize, vocab_size: usize) -> Self {
        assert_eq!(
            scores.len(),
            batch_beam_size * vocab_size,
            "score buffer length {} does not match {} rows of {}",
            scores.len(),
            batch_beam_size,
            vocab_size
        );
        NextTokenScores {
            scores,
            batch_beam_size,
            vocab_size,
        }
    }

    /// Score row for one (batch, beam) pair.
    pub fn row(&self, batch_beam_index: usize) -> &[E] {
        let start = batch_beam_index * self.vocab_size;
        &self.scores[start..start + self.vocab_size]
    }

    /// Mutable score row for one (batch, beam) pair.
    pub fn row_mut(&mut self, batch_beam_index: usize) -> &mut [E] {
        let start = batch_beam_index * self.vocab_size;
        &mut self.scores[start..start + self.vocab_size]
    }

    /// Set one token's score across every row.
    ///
    /// # Panics
    /// Panics if `token_id >= vocab_size`.
    pub fn set_score(&mut self, token_id: u32, score: E) {
        let token = token_id as usize;
        assert!(token < self.vocab_size, "token id {} out of vocab", token);
        for i in 0..self.batch_beam_size {
            self.scores[i * self.vocab_size + token] = score;
        }
    }

    /// The whole buffer, row-major.
    pub fn as_slice(&self) -> &[E] {
        self.scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows() {
        let mut buf = vec![0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0];
        let mut scores = NextTokenScores::new(&mut buf, 2, 3);
        assert_eq!(scores.row(0), &[0.0, 1.0, 2.0]);
        assert_eq!(scores.row(1), &[3.0, 4.0, 5.0]);
        scores.row_mut(1)[0] = 9.0;
        assert_eq!(scores.row(1), &[9.0, 4.0, 5.0]);
    }

    #[test]
    fn test_set_score_hits_every_row() {
        let mut buf = vec![0.0f32; 6];
        let mut scores = NextTokenScores::new(&mut buf, 2, 3);
        scores.set_score(1, f32::NEG_INFINITY);
        assert_eq!(scores.row(0)[1], f32::NEG_INFINITY);
        assert_eq!(scores.row(1)[1], f32::NEG_INFINITY);
        assert_eq!(scores.row(0)[0], 0.0);
    }

    #[test]
    #[should_panic(expected = "does not match")]
    fn test_length_mismatch_panics() {
        let mut buf = vec![0.0f32; 5];
        NextTokenScores::new(&mut buf, 2, 3);
    }
}

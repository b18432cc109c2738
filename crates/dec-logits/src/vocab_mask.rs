use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Suppresses a fixed set of disallowed vocabulary tokens.
///
/// Masked tokens are set to negative infinity in every row, so they can
/// never be selected. This runs first in the pipeline; later stages never
/// raise a score back from negative infinity.
pub struct VocabMaskProcessor {
    banned: Vec<u32>,
}

impl VocabMaskProcessor {
    /// Create a mask processor from the set of disallowed token ids.
    pub fn new(banned: Vec<u32>) -> Self {
        Self { banned }
    }
}

impl<E: Element> LogitsProcessor<E> for VocabMaskProcessor {
    fn name(&self) -> &str {
        "vocab_mask"
    }

    fn process(&self, _sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        for &token_id in &self.banned {
            scores.set_score(token_id, E::neg_infinity());
        }
    }
}

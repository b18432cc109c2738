use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Masks per-batch token sets on the first generation step only.
///
/// Each batch element carries its own banned set, applied to all of its
/// beams while the sequences are still at prompt length. Once the first
/// token has been generated the mask no longer applies, so it constrains
/// how a continuation may start without constraining the rest of it.
pub struct PrefixVocabMaskProcessor {
    banned: Vec<Vec<u32>>,
    prompt_length: usize,
}

impl PrefixVocabMaskProcessor {
    /// `banned[b]` holds the token ids disallowed for batch element `b`'s
    /// first generated token.
    pub fn new(banned: Vec<Vec<u32>>, prompt_length: usize) -> Self {
        Self {
            banned,
            prompt_length,
        }
    }
}

impl<E: Element> LogitsProcessor<E> for PrefixVocabMaskProcessor {
    fn name(&self) -> &str {
        "prefix_vocab_mask"
    }

    fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if sequences.current_length() != self.prompt_length || self.banned.is_empty() {
            return;
        }
        let num_beams = scores.batch_beam_size / self.banned.len();

        for i in 0..scores.batch_beam_size {
            let batch = i / num_beams;
            let row = scores.row_mut(i);
            for &token in &self.banned[batch] {
                row[token as usize] = E::neg_infinity();
            }
        }
    }
}

use std::collections::HashSet;

use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Blocks tokens that would complete an n-gram already present in a
/// sequence.
///
/// For each row, the last `n - 1` tokens form the current prefix; every
/// earlier occurrence of that prefix bans the token that followed it.
/// With `n == 1` every previously seen token is banned. Matching is a
/// linear scan per row; cheap relative to the subgraph invocation that
/// dominates each step.
pub struct NoRepeatNGramProcessor {
    ngram_size: usize,
}

impl NoRepeatNGramProcessor {
    pub fn new(ngram_size: usize) -> Self {
        Self { ngram_size }
    }
}

impl<E: Element> LogitsProcessor<E> for NoRepeatNGramProcessor {
    fn name(&self) -> &str {
        "no_repeat_ngram"
    }

    fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        let n = self.ngram_size;
        if n == 0 || n > sequences.current_length() {
            return;
        }
        let prefix_len = n - 1;

        for i in 0..scores.batch_beam_size {
            let sequence = sequences.sequence(i);
            let prefix = &sequence[sequence.len() - prefix_len..];

            let mut banned: HashSet<u32> = HashSet::new();
            for j in 0..=sequence.len() - n {
                if prefix_len == 0 || sequence[j..j + prefix_len] == *prefix {
                    banned.insert(sequence[j + prefix_len]);
                }
            }

            let row = scores.row_mut(i);
            for token in banned {
                row[token as usize] = E::neg_infinity();
            }
        }
    }
}

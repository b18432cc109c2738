//! `dec-logits` - Logits-processor pipeline for decoding-runtime.
//!
//! An ordered, composable chain of in-place score transformations applied
//! to the per-step score buffer before token selection: vocabulary and
//! first-step prefix masking, min-length EOS suppression,
//! no-repeat-n-gram filtering, plus temperature, repetition-penalty,
//! presence-penalty, and top-p shaping.

pub mod min_length;
pub mod no_repeat_ngram;
pub mod prefix_vocab_mask;
pub mod presence_penalty;
pub mod processor;
pub mod repetition_penalty;
pub mod scores;
pub mod sequences;
pub mod temperature;
pub mod top_p;
pub mod vocab_mask;

pub use min_length::MinLengthProcessor;
pub use no_repeat_ngram::NoRepeatNGramProcessor;
pub use prefix_vocab_mask::PrefixVocabMaskProcessor;
pub use presence_penalty::PresencePenaltyProcessor;
pub use processor::{LogitsProcessor, LogitsProcessorList};
pub use repetition_penalty::RepetitionPenaltyProcessor;
pub use scores::NextTokenScores;
pub use sequences::Sequences;
pub use temperature::TemperatureProcessor;
pub use top_p::TopPProcessor;
pub use vocab_mask::VocabMaskProcessor;

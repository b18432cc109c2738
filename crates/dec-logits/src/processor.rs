use dec_tensor::Element;

use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Trait for processors that transform a score buffer in place before
/// selection.
///
/// A processor may suppress tokens (negative infinity) or reshape scores,
/// but must never raise a suppressed score back above negative infinity;
/// that is what keeps the pipeline order meaningful.
pub trait LogitsProcessor<E: Element>: Send + Sync {
    /// Returns the name of this processor.
    fn name(&self) -> &str;

    /// Transform the score buffer in place.
    fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>);
}

/// Ordered chain of logits processors.
///
/// The order processors are added is the order they run. Masking stages
/// go first so nothing downstream can resurrect a banned token.
pub struct LogitsProcessorList<E: Element> {
    processors: Vec<Box<dyn LogitsProcessor<E>>>,
}

impl<E: Element> LogitsProcessorList<E> {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Add a processor to the end of the chain. Returns self for
    /// builder-style usage.
    pub fn with(mut self, processor: Box<dyn LogitsProcessor<E>>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Number of processors in the chain.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Returns true if the chain has no processors.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor in order on the score buffer.
    pub fn process(&self, sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        for processor in &self.processors {
            processor.process(sequences, scores);
        }
    }
}

impl<E: Element> Default for LogitsProcessorList<E> {
    fn default() -> Self {
        Self::new()
    }
}

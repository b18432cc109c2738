use dec_logits::{
    LogitsProcessorList, MinLengthProcessor, NoRepeatNGramProcessor, PrefixVocabMaskProcessor,
    PresencePenaltyProcessor, RepetitionPenaltyProcessor, TemperatureProcessor, TopPProcessor,
    VocabMaskProcessor,
};
use dec_tensor::{DType, Element, Tensor};

use crate::error::{DecodeError, Result};

/// Raw tensors supplied by the caller for one run: the prompt plus the
/// scalar length bounds.
pub struct RunInputs {
    /// Prompt token ids, shape (batch_size, prompt_length), dtype u32.
    pub input_ids: Tensor,
    /// Required scalar: total sequence length bound, prompt included.
    pub max_length: Option<Tensor>,
    /// Optional scalar: no sequence may finish before this length.
    pub min_length: Option<Tensor>,
}

/// Declarative description of one scalar run input.
struct ScalarSpec {
    name: &'static str,
    required: bool,
}

const SCALAR_INPUTS: [ScalarSpec; 2] = [
    ScalarSpec {
        name: "max_length",
        required: true,
    },
    ScalarSpec {
        name: "min_length",
        required: false,
    },
];

/// Validated run parameters. Immutable once the loop starts.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub batch_size: usize,
    /// Beams per batch element; 1 selects the greedy variant.
    pub num_beams: usize,
    pub vocab_size: usize,
    /// Populated from the `max_length` scalar input during validation.
    pub max_length: usize,
    /// Populated from the `min_length` scalar input; 0 when absent.
    pub min_length: usize,
    /// Length-penalty exponent for beam ranking (Wu-style).
    pub length_penalty: f32,
    /// N-gram blocking size; 0 disables. Forced to 0 for greedy runs.
    pub no_repeat_ngram_size: usize,
    /// Disallowed token ids, applied before every other processor.
    pub vocab_mask: Option<Vec<u32>>,
    /// Per-batch token ids disallowed for the first generated token only.
    pub prefix_vocab_mask: Option<Vec<Vec<u32>>>,
    pub eos_token_id: u32,
    /// Capture per-step score snapshots. Forced off for greedy runs.
    pub output_scores: bool,
    /// Score temperature; 1.0 disables.
    pub temperature: f32,
    /// Repetition penalty; 1.0 disables.
    pub repetition_penalty: f32,
    /// Flat subtraction from tokens flagged in `presence_mask`; 0.0
    /// disables.
    pub presence_penalty: f32,
    /// Presence flags, shape (batch_size, vocab_size) row-major; every
    /// beam of a batch element shares its row.
    pub presence_mask: Option<Vec<u32>>,
    /// Nucleus filtering threshold; values outside (0, 1) disable.
    pub top_p: f32,
    /// When set on a greedy run, selection samples from the softmaxed
    /// scores with this seed instead of taking the argmax.
    pub seed: Option<u64>,
    /// Populated from the prompt tensor during validation.
    pub prompt_length: usize,
}

impl SearchParams {
    pub fn new(batch_size: usize, num_beams: usize, vocab_size: usize, eos_token_id: u32) -> Self {
        Self {
            batch_size,
            num_beams,
            vocab_size,
            max_length: 0,
            min_length: 0,
            length_penalty: 1.0,
            no_repeat_ngram_size: 0,
            vocab_mask: None,
            prefix_vocab_mask: None,
            eos_token_id,
            output_scores: false,
            temperature: 1.0,
            repetition_penalty: 1.0,
            presence_penalty: 0.0,
            presence_mask: None,
            top_p: 1.0,
            seed: None,
            prompt_length: 0,
        }
    }

    /// Total number of (batch, beam) rows.
    pub fn batch_beam_size(&self) -> usize {
        self.batch_size * self.num_beams
    }

    /// Validate the run inputs, populate the length bounds, and apply the
    /// greedy-variant derivations.
    ///
    /// Returns the prompt length.
    ///
    /// # Errors
    /// `InvalidArgument` when a tensor has the wrong shape or a value is
    /// inconsistent, `MissingInput` when a required scalar is absent.
    pub fn bind_inputs(&mut self, inputs: &RunInputs) -> Result<usize> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1".to_string()));
        }
        if self.num_beams == 0 {
            return Err(invalid("num_beams", "must be at least 1".to_string()));
        }
        if self.vocab_size == 0 {
            return Err(invalid("vocab_size", "must be positive".to_string()));
        }
        if (self.eos_token_id as usize) >= self.vocab_size {
            return Err(invalid(
                "eos_token_id",
                format!(
                    "token id {} exceeds vocab size {}",
                    self.eos_token_id, self.vocab_size
                ),
            ));
        }

        let shape = inputs.input_ids.shape();
        if shape.ndim() != 2 {
            return Err(invalid(
                "input_ids",
                format!(
                    "expected 2 dimensions (batch_size, prompt_length), got shape {}",
                    shape
                ),
            ));
        }
        if inputs.input_ids.dtype() != DType::U32 {
            return Err(invalid(
                "input_ids",
                format!("expected dtype u32, got {}", inputs.input_ids.dtype()),
            ));
        }
        if shape.dim(0) != self.batch_size {
            return Err(invalid(
                "input_ids",
                format!(
                    "batch dimension {} does not match batch_size {}",
                    shape.dim(0),
                    self.batch_size
                ),
            ));
        }
        let prompt_length = shape.dim(1);
        if prompt_length == 0 {
            return Err(invalid("input_ids", "prompt is empty".to_string()));
        }
        for &token in inputs.input_ids.data_u32()? {
            if (token as usize) >= self.vocab_size {
                return Err(invalid(
                    "input_ids",
                    format!("token id {} exceeds vocab size {}", token, self.vocab_size),
                ));
            }
        }

        // Scalar inputs are checked uniformly against the declarative table.
        let mut values = [None::<u32>; SCALAR_INPUTS.len()];
        let tensors = [&inputs.max_length, &inputs.min_length];
        for ((spec, tensor), value) in SCALAR_INPUTS.iter().zip(tensors).zip(values.iter_mut()) {
            match tensor {
                Some(t) => {
                    if !t.shape().is_scalar() {
                        return Err(invalid(
                            spec.name,
                            format!("expected a scalar, got shape {}", t.shape()),
                        ));
                    }
                    *value = Some(t.scalar_value_u32()?);
                }
                None if spec.required => {
                    return Err(DecodeError::MissingInput(spec.name.to_string()));
                }
                None => {}
            }
        }
        self.max_length = values[0].unwrap_or(0) as usize;
        self.min_length = values[1].unwrap_or(0) as usize;

        if self.max_length < prompt_length {
            return Err(invalid(
                "max_length",
                format!(
                    "{} is shorter than the prompt length {}",
                    self.max_length, prompt_length
                ),
            ));
        }
        if self.min_length > self.max_length {
            return Err(invalid(
                "min_length",
                format!("{} exceeds max_length {}", self.min_length, self.max_length),
            ));
        }

        if let Some(mask) = &self.vocab_mask {
            for &token in mask {
                if (token as usize) >= self.vocab_size {
                    return Err(invalid(
                        "vocab_mask",
                        format!("token id {} exceeds vocab size {}", token, self.vocab_size),
                    ));
                }
            }
        }
        if let Some(masks) = &self.prefix_vocab_mask {
            if masks.len() != self.batch_size {
                return Err(invalid(
                    "prefix_vocab_mask",
                    format!(
                        "{} mask sets do not match batch_size {}",
                        masks.len(),
                        self.batch_size
                    ),
                ));
            }
            for &token in masks.iter().flatten() {
                if (token as usize) >= self.vocab_size {
                    return Err(invalid(
                        "prefix_vocab_mask",
                        format!("token id {} exceeds vocab size {}", token, self.vocab_size),
                    ));
                }
            }
        }
        if let Some(mask) = &self.presence_mask {
            if mask.len() != self.batch_size * self.vocab_size {
                return Err(invalid(
                    "presence_mask",
                    format!(
                        "mask of {} entries does not match batch_size {} * vocab_size {}",
                        mask.len(),
                        self.batch_size,
                        self.vocab_size
                    ),
                ));
            }
        }

        // Greedy search never re-ranks beams or returns per-token score
        // distributions.
        if self.num_beams == 1 {
            self.no_repeat_ngram_size = 0;
            self.output_scores = false;
        }

        self.prompt_length = prompt_length;
        Ok(prompt_length)
    }

    /// Build the processor pipeline in its fixed order: vocabulary mask,
    /// first-step prefix mask, min-length EOS suppression, n-gram
    /// blocking, then the shaping stages that never resurrect a
    /// suppressed token.
    pub fn build_pipeline<E: Element>(&self) -> LogitsProcessorList<E> {
        let mut list = LogitsProcessorList::new();
        if let Some(mask) = &self.vocab_mask {
            if !mask.is_empty() {
                list = list.with(Box::new(VocabMaskProcessor::new(mask.clone())));
            }
        }
        if let Some(masks) = &self.prefix_vocab_mask {
            if masks.iter().any(|m| !m.is_empty()) {
                list = list.with(Box::new(PrefixVocabMaskProcessor::new(
                    masks.clone(),
                    self.prompt_length,
                )));
            }
        }
        if self.min_length > 0 {
            list = list.with(Box::new(MinLengthProcessor::new(
                self.min_length,
                self.eos_token_id,
            )));
        }
        if self.no_repeat_ngram_size > 0 {
            list = list.with(Box::new(NoRepeatNGramProcessor::new(
                self.no_repeat_ngram_size,
            )));
        }
        if self.temperature != 1.0 {
            list = list.with(Box::new(TemperatureProcessor::new(self.temperature)));
        }
        if self.repetition_penalty != 1.0 {
            list = list.with(Box::new(RepetitionPenaltyProcessor::new(
                self.repetition_penalty,
            )));
        }
        if self.presence_penalty != 0.0 {
            if let Some(mask) = &self.presence_mask {
                list = list.with(Box::new(PresencePenaltyProcessor::new(
                    mask.clone(),
                    self.presence_penalty,
                )));
            }
        }
        if self.top_p > 0.0 && self.top_p < 1.0 {
            list = list.with(Box::new(TopPProcessor::new(self.top_p)));
        }
        list
    }
}

fn invalid(input: &str, message: String) -> DecodeError {
    DecodeError::InvalidArgument {
        input: input.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dec_tensor::Shape;

    fn inputs(prompt: Vec<u32>, batch: usize, len: usize, max_length: u32) -> RunInputs {
        RunInputs {
            input_ids: Tensor::from_u32(prompt, Shape::new(vec![batch, len])),
            max_length: Some(Tensor::scalar_u32(max_length)),
            min_length: None,
        }
    }

    #[test]
    fn test_valid_inputs() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let prompt_len = params.bind_inputs(&inputs(vec![5, 7], 1, 2, 4)).unwrap();
        assert_eq!(prompt_len, 2);
        assert_eq!(params.max_length, 4);
        assert_eq!(params.min_length, 0);
    }

    #[test]
    fn test_missing_max_length() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let run = RunInputs {
            input_ids: Tensor::from_u32(vec![5, 7], Shape::new(vec![1, 2])),
            max_length: None,
            min_length: None,
        };
        let err = params.bind_inputs(&run).unwrap_err();
        assert!(matches!(err, DecodeError::MissingInput(name) if name == "max_length"));
    }

    #[test]
    fn test_non_scalar_max_length_names_input_and_shape() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let run = RunInputs {
            input_ids: Tensor::from_u32(vec![5, 7], Shape::new(vec![1, 2])),
            max_length: Some(Tensor::from_u32(vec![4, 4], Shape::new(vec![2]))),
            min_length: None,
        };
        let err = params.bind_inputs(&run).unwrap_err();
        match err {
            DecodeError::InvalidArgument { input, message } => {
                assert_eq!(input, "max_length");
                assert!(message.contains("[2]"), "message was: {message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_prompt_must_be_2d() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let run = RunInputs {
            input_ids: Tensor::from_u32(vec![5, 7], Shape::new(vec![2])),
            max_length: Some(Tensor::scalar_u32(4)),
            min_length: None,
        };
        let err = params.bind_inputs(&run).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument { input, .. } if input == "input_ids"));
    }

    #[test]
    fn test_greedy_derivations() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        params.no_repeat_ngram_size = 3;
        params.output_scores = true;
        params.bind_inputs(&inputs(vec![5, 7], 1, 2, 4)).unwrap();
        assert_eq!(params.no_repeat_ngram_size, 0);
        assert!(!params.output_scores);
    }

    #[test]
    fn test_beam_keeps_ngram_and_scores() {
        let mut params = SearchParams::new(1, 2, 10, 9);
        params.no_repeat_ngram_size = 3;
        params.output_scores = true;
        params.bind_inputs(&inputs(vec![5, 7], 1, 2, 4)).unwrap();
        assert_eq!(params.no_repeat_ngram_size, 3);
        assert!(params.output_scores);
    }

    #[test]
    fn test_max_length_shorter_than_prompt() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let err = params.bind_inputs(&inputs(vec![5, 7, 8], 1, 3, 2)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument { input, .. } if input == "max_length"));
    }

    #[test]
    fn test_min_length_exceeding_max_length() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        let run = RunInputs {
            input_ids: Tensor::from_u32(vec![5, 7], Shape::new(vec![1, 2])),
            max_length: Some(Tensor::scalar_u32(4)),
            min_length: Some(Tensor::scalar_u32(9)),
        };
        let err = params.bind_inputs(&run).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument { input, .. } if input == "min_length"));
    }

    #[test]
    fn test_out_of_vocab_prompt() {
        let mut params = SearchParams::new(1, 1, 6, 5);
        let err = params.bind_inputs(&inputs(vec![5, 7], 1, 2, 4)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidArgument { input, .. } if input == "input_ids"));
    }

    #[test]
    fn test_pipeline_composition() {
        let mut params = SearchParams::new(1, 2, 10, 9);
        params.vocab_mask = Some(vec![3]);
        params.min_length = 3;
        params.no_repeat_ngram_size = 2;
        params.bind_inputs(&inputs(vec![5, 7], 1, 2, 6)).unwrap();
        let pipeline = params.build_pipeline::<f32>();
        assert_eq!(pipeline.len(), 3);
    }

    #[test]
    fn test_pipeline_includes_prefix_and_presence_stages() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        params.prefix_vocab_mask = Some(vec![vec![4]]);
        params.presence_mask = Some(vec![0; 10]);
        params.presence_penalty = 0.5;
        params.bind_inputs(&inputs(vec![5, 7], 1, 2, 6)).unwrap();
        let pipeline = params.build_pipeline::<f32>();
        assert_eq!(pipeline.len(), 2);
        // Without a penalty the presence stage is left out.
        params.presence_penalty = 0.0;
        assert_eq!(params.build_pipeline::<f32>().len(), 1);
    }

    #[test]
    fn test_prefix_vocab_mask_batch_mismatch() {
        let mut params = SearchParams::new(2, 1, 10, 9);
        params.prefix_vocab_mask = Some(vec![vec![1]]);
        let err = params
            .bind_inputs(&inputs(vec![5, 7, 1, 2], 2, 2, 6))
            .unwrap_err();
        assert!(
            matches!(err, DecodeError::InvalidArgument { input, .. } if input == "prefix_vocab_mask")
        );
    }

    #[test]
    fn test_prefix_vocab_mask_out_of_vocab() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        params.prefix_vocab_mask = Some(vec![vec![12]]);
        let err = params.bind_inputs(&inputs(vec![5, 7], 1, 2, 6)).unwrap_err();
        assert!(
            matches!(err, DecodeError::InvalidArgument { input, .. } if input == "prefix_vocab_mask")
        );
    }

    #[test]
    fn test_presence_mask_wrong_size() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        params.presence_mask = Some(vec![1; 9]);
        let err = params.bind_inputs(&inputs(vec![5, 7], 1, 2, 6)).unwrap_err();
        assert!(
            matches!(err, DecodeError::InvalidArgument { input, .. } if input == "presence_mask")
        );
    }

    #[test]
    fn test_pipeline_empty_for_plain_greedy() {
        let mut params = SearchParams::new(1, 1, 10, 9);
        params.bind_inputs(&inputs(vec![5, 7], 1, 2, 4)).unwrap();
        let pipeline = params.build_pipeline::<f32>();
        assert!(pipeline.is_empty());
    }
}

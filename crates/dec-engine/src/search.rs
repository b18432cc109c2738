use tracing::{debug, info};

use dec_logits::NextTokenScores;
use dec_tensor::{CopyDirection, Element, Tensor};

use crate::beam::BeamScorer;
use crate::device::DeviceAdapter;
use crate::error::{DecodeError, Result};
use crate::params::{RunInputs, SearchParams};
use crate::selector::{beam_candidates, greedy_select, SamplingSelector};
use crate::sequences::SequenceStore;
use crate::subgraph::Subgraph;
use crate::trace::{NoopTraceSink, TraceSink};

use dec_logits::Sequences;

static NOOP_TRACE: NoopTraceSink = NoopTraceSink;

/// Phases of one generation run. There is no valid transition back to
/// `Initializing`; a loop executes exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Stepping,
    Finalizing,
    Done,
}

/// Final result of a generation run.
#[derive(Debug, Clone)]
pub struct SearchOutput {
    /// Per batch element, ranked output sequences (best first). Greedy
    /// runs produce one sequence per batch element; beam runs produce
    /// `num_beams`, each trimmed at its EOS.
    pub sequences: Vec<Vec<Vec<u32>>>,
    /// Length-penalized ranking scores, beam search only.
    pub sequence_scores: Option<Vec<Vec<f32>>>,
    /// Post-pipeline score snapshots per step, when `output_scores` is
    /// set (never for greedy runs).
    pub step_scores: Option<Vec<Vec<f32>>>,
}

/// Orchestrates one generation run against an external subgraph.
///
/// Each step strictly depends on the completed output of the previous
/// step: the subgraph input for step N+1 is derived from step N's
/// selected tokens, so steps never overlap or reorder. Work inside a
/// step (row-partitioned top-k, log-softmax) is the adapter's to
/// parallelize.
pub struct DecodingLoop<'a, E: Element> {
    params: SearchParams,
    adapter: &'a dyn DeviceAdapter<E>,
    trace: &'a dyn TraceSink,
    state: LoopState,
}

impl<'a, E: Element> DecodingLoop<'a, E> {
    pub fn new(params: SearchParams, adapter: &'a dyn DeviceAdapter<E>) -> Self {
        Self {
            params,
            adapter,
            trace: &NOOP_TRACE,
            state: LoopState::Initializing,
        }
    }

    /// Inject a trace observer.
    pub fn with_trace(mut self, trace: &'a dyn TraceSink) -> Self {
        self.trace = trace;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run the full state machine: validate and allocate, step until
    /// every sequence is finished or the length bound is hit, then
    /// assemble the output.
    ///
    /// # Errors
    /// Configuration errors surface before the first subgraph call.
    /// Subgraph and device failures abort the run with no partial
    /// output. A second call on the same loop is an invariant violation.
    pub fn execute(
        &mut self,
        inputs: &RunInputs,
        subgraph: &mut dyn Subgraph,
    ) -> Result<SearchOutput> {
        if self.state != LoopState::Initializing {
            return Err(DecodeError::InvariantViolation(
                "decoding loop has already executed".to_string(),
            ));
        }

        let prompt_length = self.params.bind_inputs(inputs)?;
        let params = &self.params;
        let batch_beam_size = params.batch_beam_size();
        let vocab_size = params.vocab_size;

        info!(
            batch_size = params.batch_size,
            num_beams = params.num_beams,
            vocab_size,
            prompt_length,
            max_length = params.max_length,
            adapter = self.adapter.name(),
            "starting generation run"
        );

        let mut store = SequenceStore::new(&inputs.input_ids, params.num_beams, params.max_length)?;
        let pipeline = params.build_pipeline::<E>();
        let mut scorer = (params.num_beams > 1).then(|| {
            BeamScorer::new(
                params.batch_size,
                params.num_beams,
                params.length_penalty,
                params.eos_token_id,
                prompt_length,
            )
        });
        let mut sampler = match (params.num_beams, params.seed) {
            (1, Some(seed)) => Some(SamplingSelector::new(seed)),
            _ => None,
        };
        let mut step_scores: Option<Vec<Vec<f32>>> = params.output_scores.then(Vec::new);

        let mut feeds = self.adapter.build_inputs(params, &store)?;
        self.state = LoopState::Stepping;
        let mut step = 0usize;

        while store.current_length() < params.max_length {
            let finished = match &scorer {
                Some(s) => s.all_done(),
                None => store.all_finished(),
            };
            if finished {
                break;
            }
            step += 1;

            let fetches = subgraph.run(&feeds)?;
            let logits = fetches.logits()?;
            let dims = logits.shape().dims();
            if dims != [batch_beam_size, vocab_size] {
                return Err(DecodeError::Backend(format!(
                    "subgraph returned logits shaped {}, expected [{}, {}]",
                    logits.shape(),
                    batch_beam_size,
                    vocab_size
                )));
            }

            // Stage the logits host-side; the transfer path is the
            // adapter's choice based on the declared devices.
            let mut staging = Tensor::zeros(logits.dtype(), logits.shape().clone());
            self.adapter
                .copy(logits, &mut staging, CopyDirection::DeviceToHost)?;

            let mut buffer =
                self.adapter
                    .process_logits(&staging, vocab_size, params.num_beams > 1)?;
            let mut scores = NextTokenScores::new(&mut buffer, batch_beam_size, vocab_size);
            pipeline.process(&store, &mut scores);

            if self.trace.enabled() || step_scores.is_some() {
                let snapshot: Vec<f32> = scores.as_slice().iter().map(|s| s.to_f32()).collect();
                self.trace
                    .scores("processed_scores", step, batch_beam_size, vocab_size, &snapshot);
                if let Some(all) = step_scores.as_mut() {
                    all.push(snapshot);
                }
            }

            let (next_tokens, beam_indices) = match scorer.as_mut() {
                Some(s) => {
                    let candidates =
                        beam_candidates(&scores, s.beam_scores(), params.num_beams, self.adapter)?;
                    s.process(&store, &candidates)?;
                    (s.next_tokens().to_vec(), s.next_indices().to_vec())
                }
                None => {
                    let tokens = match sampler.as_mut() {
                        Some(sampler) => sampler.select(&scores),
                        None => greedy_select(&scores, self.adapter)?,
                    };
                    (tokens, vec![0u32; batch_beam_size])
                }
            };
            self.trace.tokens("next_tokens", step, &next_tokens);

            store.append(&beam_indices, &next_tokens, params.eos_token_id)?;
            feeds = self
                .adapter
                .update_feeds(feeds, fetches, &next_tokens, &beam_indices)?;

            debug!(step, length = store.current_length(), "completed step");
        }

        self.state = LoopState::Finalizing;
        let (sequences, sequence_scores) = match scorer {
            Some(s) => {
                let ranked = s.finalize(&store);
                let scores: Vec<Vec<f32>> = ranked
                    .iter()
                    .map(|hyps| hyps.iter().map(|h| h.score).collect())
                    .collect();
                let sequences = ranked
                    .into_iter()
                    .map(|hyps| hyps.into_iter().map(|h| h.tokens).collect())
                    .collect();
                (sequences, Some(scores))
            }
            None => {
                let sequences = (0..params.batch_size)
                    .map(|b| vec![store.final_sequence(b).to_vec()])
                    .collect();
                (sequences, None)
            }
        };
        self.state = LoopState::Done;

        info!(steps = step, "generation run complete");
        Ok(SearchOutput {
            sequences,
            sequence_scores,
            step_scores,
        })
    }
}

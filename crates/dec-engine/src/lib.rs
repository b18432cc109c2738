//! Autoregressive token-decoding engine.
//!
//! The [`DecodingLoop`] drives an external neural [`Subgraph`] one step at
//! a time: run it on the current feeds, shape the returned logits through
//! a processor pipeline, select next tokens (greedy, sampled, or beam
//! search), extend the [`SequenceStore`], and rebuild the feeds for the
//! next step. Backend-specific work goes through a [`DeviceAdapter`] so
//! the loop itself never branches on the device.
//!
//! ```no_run
//! use dec_engine::{CpuAdapter, DecodingLoop, RunInputs, SearchParams};
//! use dec_tensor::{Shape, Tensor};
//!
//! # fn run(subgraph: &mut dyn dec_engine::Subgraph) -> dec_engine::Result<()> {
//! let params = SearchParams::new(1, 4, 32_000, 2);
//! let inputs = RunInputs {
//!     input_ids: Tensor::from_u32(vec![1, 15, 943], Shape::new(vec![1, 3])),
//!     max_length: Some(Tensor::scalar_u32(64)),
//!     min_length: None,
//! };
//! let adapter = CpuAdapter::new();
//! let mut decoding = DecodingLoop::<f32>::new(params, &adapter);
//! let output = decoding.execute(&inputs, subgraph)?;
//! println!("{:?}", output.sequences[0][0]);
//! # Ok(())
//! # }
//! ```

mod beam;
mod device;
mod error;
mod feeds;
mod params;
mod search;
mod selector;
mod sequences;
mod subgraph;
mod trace;

pub use beam::{BeamCandidates, BeamHypothesis, BeamScorer};
pub use device::{CpuAdapter, DeviceAdapter};
pub use error::{DecodeError, Result};
pub use feeds::{Feeds, Fetches, TensorMap, BEAM_INDICES_NAME, INPUT_IDS_NAME, LOGITS_NAME};
pub use params::{RunInputs, SearchParams};
pub use search::{DecodingLoop, LoopState, SearchOutput};
pub use selector::{beam_candidates, greedy_select, SamplingSelector};
pub use sequences::SequenceStore;
pub use subgraph::Subgraph;
pub use trace::{NoopTraceSink, StdoutTraceSink, TraceSink};

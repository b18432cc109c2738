use rayon::prelude::*;

use dec_tensor::{CopyDirection, DType, Device, Element, Shape, Tensor};

use crate::error::{DecodeError, Result};
use crate::feeds::{Feeds, Fetches, BEAM_INDICES_NAME, INPUT_IDS_NAME, LOGITS_NAME};
use crate::params::SearchParams;
use crate::sequences::SequenceStore;

use dec_logits::Sequences;

/// The fixed set of pluggable operations the decoding loop calls through
/// instead of touching a backend directly.
///
/// One implementation exists per backend (CPU, CUDA, WASM-GPU) and is
/// selected once at run setup; the loop itself never branches on the
/// device. Failures propagate unchanged; an adapter never substitutes a
/// default.
pub trait DeviceAdapter<E: Element>: Send + Sync {
    /// Returns the name of this adapter (e.g., "cpu").
    fn name(&self) -> &str;

    /// The device this adapter computes on.
    fn device(&self) -> Device;

    /// Top-k per row of a row-major buffer: the k largest values and
    /// their in-row positions, ordered by value descending with ties
    /// going to the lower index.
    fn topk(&self, scores: &[f32], row_size: usize, k: usize) -> Result<(Vec<f32>, Vec<u32>)>;

    /// Materialize raw logits into a score buffer, applying log-softmax
    /// per row when beam scoring needs probabilities combined in
    /// log-space.
    fn process_logits(
        &self,
        logits: &Tensor,
        vocab_size: usize,
        log_softmax: bool,
    ) -> Result<Vec<E>>;

    /// Raw buffer transfer. The path is chosen purely from the declared
    /// device of `src` and `dst`; a same-device copy degenerates to
    /// direct memory duplication.
    fn copy(&self, src: &Tensor, dst: &mut Tensor, direction: CopyDirection) -> Result<()>;

    /// Construct the initial subgraph feeds from the prompt sequences.
    fn build_inputs(&self, params: &SearchParams, store: &SequenceStore) -> Result<Feeds>;

    /// Build the next step's feeds from this step's selections, carrying
    /// over any recurrent state the subgraph returned.
    fn update_feeds(
        &self,
        feeds: Feeds,
        fetches: Fetches,
        next_tokens: &[u32],
        beam_indices: &[u32],
    ) -> Result<Feeds>;
}

/// Reference CPU implementation of the adapter bundle.
///
/// Row-partitioned work (top-k, log-softmax) fans out across the rayon
/// pool; rows are disjoint so no synchronization is needed beyond the
/// static partitioning.
#[derive(Debug, Default)]
pub struct CpuAdapter;

impl CpuAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl<E: Element> DeviceAdapter<E> for CpuAdapter {
    fn name(&self) -> &str {
        "cpu"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn topk(&self, scores: &[f32], row_size: usize, k: usize) -> Result<(Vec<f32>, Vec<u32>)> {
        if row_size == 0 || scores.len() % row_size != 0 {
            return Err(DecodeError::InvariantViolation(format!(
                "top-k buffer of {} is not a whole number of rows of {}",
                scores.len(),
                row_size
            )));
        }
        if k == 0 || k > row_size {
            return Err(DecodeError::InvariantViolation(format!(
                "top-k of {} out of range for rows of {}",
                k, row_size
            )));
        }

        let rows: Vec<(Vec<f32>, Vec<u32>)> = scores
            .par_chunks(row_size)
            .map(|row| {
                let mut order: Vec<usize> = (0..row_size).collect();
                // Value descending; equal values resolve to the lower index.
                order.sort_by(|&a, &b| {
                    row[b]
                        .partial_cmp(&row[a])
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.cmp(&b))
                });
                order.truncate(k);
                let values = order.iter().map(|&i| row[i]).collect();
                let indices = order.iter().map(|&i| i as u32).collect();
                (values, indices)
            })
            .collect();

        let mut values = Vec::with_capacity(rows.len() * k);
        let mut indices = Vec::with_capacity(rows.len() * k);
        for (v, i) in rows {
            values.extend(v);
            indices.extend(i);
        }
        Ok((values, indices))
    }

    fn process_logits(
        &self,
        logits: &Tensor,
        vocab_size: usize,
        log_softmax: bool,
    ) -> Result<Vec<E>> {
        let mut raw: Vec<f32> = match logits.dtype() {
            DType::F16 => logits.data_f16()?.iter().map(|v| v.to_f32()).collect(),
            _ => logits.data_f32()?.to_vec(),
        };
        if vocab_size == 0 || raw.len() % vocab_size != 0 {
            return Err(DecodeError::Backend(format!(
                "logits buffer of {} is not a whole number of rows of {}",
                raw.len(),
                vocab_size
            )));
        }

        if log_softmax {
            raw.par_chunks_mut(vocab_size).for_each(|row| {
                let max = row.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                let sum: f32 = row.iter().map(|&v| (v - max).exp()).sum();
                let log_sum = sum.ln() + max;
                for v in row.iter_mut() {
                    *v -= log_sum;
                }
            });
        }

        Ok(raw.into_iter().map(E::from_f32).collect())
    }

    fn copy(&self, src: &Tensor, dst: &mut Tensor, _direction: CopyDirection) -> Result<()> {
        match (src.device(), dst.device()) {
            (Device::Cpu, Device::Cpu) => {
                dst.copy_from(src)?;
                Ok(())
            }
            (from, to) => Err(DecodeError::Backend(format!(
                "cpu adapter cannot transfer {} -> {}",
                from, to
            ))),
        }
    }

    fn build_inputs(&self, _params: &SearchParams, store: &SequenceStore) -> Result<Feeds> {
        let batch_beam_size = store.batch_beam_size();
        let prompt_length = store.prompt_length();
        let mut data = Vec::with_capacity(batch_beam_size * prompt_length);
        for i in 0..batch_beam_size {
            data.extend_from_slice(store.sequence(i));
        }
        let mut feeds = Feeds::new();
        feeds.insert(
            INPUT_IDS_NAME,
            Tensor::from_u32(data, Shape::new(vec![batch_beam_size, prompt_length])),
        );
        Ok(feeds)
    }

    fn update_feeds(
        &self,
        _feeds: Feeds,
        fetches: Fetches,
        next_tokens: &[u32],
        beam_indices: &[u32],
    ) -> Result<Feeds> {
        let batch_beam_size = next_tokens.len();
        let mut feeds = Feeds::new();
        feeds.insert(
            INPUT_IDS_NAME,
            Tensor::from_u32(
                next_tokens.to_vec(),
                Shape::new(vec![batch_beam_size, 1]),
            ),
        );
        feeds.insert(
            BEAM_INDICES_NAME,
            Tensor::from_u32(beam_indices.to_vec(), Shape::new(vec![batch_beam_size])),
        );
        // Everything else the subgraph produced is recurrent state it
        // expects back on the next step.
        for (name, tensor) in fetches.iter() {
            if name != LOGITS_NAME {
                feeds.insert(name, tensor.clone());
            }
        }
        Ok(feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn adapter() -> CpuAdapter {
        CpuAdapter::new()
    }

    #[test]
    fn test_topk_single_row() {
        let a = adapter();
        let (values, indices) =
            DeviceAdapter::<f32>::topk(&a, &[0.1, 0.9, 0.5, 0.3], 4, 2).unwrap();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(values, vec![0.9, 0.5]);
    }

    #[test]
    fn test_topk_tie_breaks_to_lower_index() {
        let a = adapter();
        let (_, indices) = DeviceAdapter::<f32>::topk(&a, &[0.5, 0.9, 0.9, 0.5], 4, 3).unwrap();
        assert_eq!(indices, vec![1, 2, 0]);
    }

    #[test]
    fn test_topk_multi_row() {
        let a = adapter();
        let (values, indices) =
            DeviceAdapter::<f32>::topk(&a, &[1.0, 2.0, 3.0, 9.0, 8.0, 7.0], 3, 1).unwrap();
        assert_eq!(indices, vec![2, 0]);
        assert_eq!(values, vec![3.0, 9.0]);
    }

    #[test]
    fn test_topk_rejects_bad_geometry() {
        let a = adapter();
        assert!(DeviceAdapter::<f32>::topk(&a, &[1.0, 2.0, 3.0], 2, 1).is_err());
        assert!(DeviceAdapter::<f32>::topk(&a, &[1.0, 2.0], 2, 3).is_err());
    }

    #[test]
    fn test_process_logits_raw_copy() {
        let a = adapter();
        let logits = Tensor::from_f32(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let out: Vec<f32> = a.process_logits(&logits, 3, false).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_process_logits_log_softmax_rows() {
        let a = adapter();
        let logits = Tensor::from_f32(vec![1.0, 1.0, 0.0, 0.0], Shape::new(vec![2, 2]));
        let out: Vec<f32> = a.process_logits(&logits, 2, true).unwrap();
        // Uniform rows: every log-probability is ln(0.5).
        for v in out {
            assert_relative_eq!(v, 0.5f32.ln(), epsilon = 1e-6);
        }
    }

    #[test]
    fn test_copy_same_device() {
        let a = adapter();
        let src = Tensor::from_f32(vec![1.0, 2.0], Shape::new(vec![2]));
        let mut dst = Tensor::zeros(DType::F32, Shape::new(vec![2]));
        DeviceAdapter::<f32>::copy(&a, &src, &mut dst, CopyDirection::DeviceToHost).unwrap();
        assert_eq!(dst.data_f32().unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_copy_rejects_foreign_device() {
        let a = adapter();
        let src = Tensor::from_f32(vec![1.0], Shape::new(vec![1])).with_device(Device::Cuda);
        let mut dst = Tensor::zeros(DType::F32, Shape::new(vec![1]));
        let err = DeviceAdapter::<f32>::copy(&a, &src, &mut dst, CopyDirection::DeviceToHost)
            .unwrap_err();
        assert!(matches!(err, DecodeError::Backend(_)));
    }

    #[test]
    fn test_update_feeds_carries_recurrent_state() {
        let a = adapter();
        let mut fetches = Fetches::new();
        fetches.insert(LOGITS_NAME, Tensor::from_f32(vec![0.0; 2], Shape::new(vec![1, 2])));
        fetches.insert("past_state", Tensor::from_f32(vec![1.0], Shape::new(vec![1])));
        let feeds = DeviceAdapter::<f32>::update_feeds(&a, Feeds::new(), fetches, &[4], &[0])
            .unwrap();
        assert!(feeds.get(LOGITS_NAME).is_none());
        assert!(feeds.get("past_state").is_some());
        assert_eq!(feeds.get(INPUT_IDS_NAME).unwrap().data_u32().unwrap(), &[4]);
        assert_eq!(feeds.get(BEAM_INDICES_NAME).unwrap().data_u32().unwrap(), &[0]);
    }
}

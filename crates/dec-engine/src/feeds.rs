use std::collections::BTreeMap;

use dec_tensor::Tensor;

use crate::error::{DecodeError, Result};

/// Name of the token id feed the adapter builds every step.
pub const INPUT_IDS_NAME: &str = "input_ids";
/// Name of the parent-beam feed, so stateful subgraphs can re-parent
/// their recurrent state.
pub const BEAM_INDICES_NAME: &str = "beam_indices";
/// Name of the logits output the subgraph must produce.
pub const LOGITS_NAME: &str = "logits";

/// Named tensor bindings exchanged with the external subgraph.
///
/// Feeds and fetches are both tensor maps; the loop only interprets the
/// `logits` fetch, everything else is opaque recurrent state that
/// `update_feeds` carries over to the next step.
#[derive(Debug, Clone, Default)]
pub struct TensorMap {
    entries: BTreeMap<String, Tensor>,
}

/// Inputs handed to the subgraph each step.
pub type Feeds = TensorMap;
/// Outputs received from the subgraph each step.
pub type Fetches = TensorMap;

impl TensorMap {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.entries.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The logits tensor a fetches map must contain.
    ///
    /// # Errors
    /// Fails with a backend error if the subgraph declared no `logits`
    /// output.
    pub fn logits(&self) -> Result<&Tensor> {
        self.entries.get(LOGITS_NAME).ok_or_else(|| {
            DecodeError::Backend("subgraph fetches are missing the 'logits' output".to_string())
        })
    }
}

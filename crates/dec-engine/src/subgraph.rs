use crate::error::Result;
use crate::feeds::{Feeds, Fetches};

/// The external neural subgraph the loop drives.
///
/// Each step receives the current feeds (token ids plus whatever
/// recurrent state the previous step returned) and must produce fetches
/// containing at least a `logits` tensor shaped
/// (batch_beam_size, vocab_size). Any other declared output is opaque to
/// the loop and carried forward through `update_feeds`.
///
/// A failure here aborts the run; the loop returns no partial output.
pub trait Subgraph {
    fn run(&mut self, feeds: &Feeds) -> Result<Fetches>;
}

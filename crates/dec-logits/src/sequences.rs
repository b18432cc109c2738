/// Read-only view of the token sequences generated so far.
///
/// Processors that depend on history (n-gram blocking, repetition
/// penalty, min-length) see sequences through this trait; the engine's
/// sequence store implements it.
pub trait Sequences {
    /// Token history for one (batch, beam) row, prompt included.
    fn sequence(&self, batch_beam_index: usize) -> &[u32];

    /// Current length. Identical across all rows at the start of every
    /// step.
    fn current_length(&self) -> usize;

    /// Number of (batch, beam) rows.
    fn batch_beam_size(&self) -> usize;
}

/// Sequences backed by borrowed rows, for tests and simple callers.
pub struct SliceSequences<'a> {
    rows: &'a [Vec<u32>],
}

impl<'a> SliceSequences<'a> {
    pub fn new(rows: &'a [Vec<u32>]) -> Self {
        SliceSequences { rows }
    }
}

impl Sequences for SliceSequences<'_> {
    fn sequence(&self, batch_beam_index: usize) -> &[u32] {
        &self.rows[batch_beam_index]
    }

    fn current_length(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    fn batch_beam_size(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_sequences() {
        let rows = vec![vec![1, 2, 3], vec![4, 5, 6]];
        let seqs = SliceSequences::new(&rows);
        assert_eq!(seqs.batch_beam_size(), 2);
        assert_eq!(seqs.current_length(), 3);
        assert_eq!(seqs.sequence(1), &[4, 5, 6]);
    }
}

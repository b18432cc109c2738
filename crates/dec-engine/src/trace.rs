/// Observer invoked at defined trace points inside the decoding loop.
///
/// Replaces ambient console-dump state with an explicit, optionally
/// injected interface. The loop only materializes trace payloads when
/// `enabled` returns true.
pub trait TraceSink: Send + Sync {
    /// Whether the loop should materialize payloads for this sink.
    fn enabled(&self) -> bool {
        false
    }

    /// Processed score buffer for one step, row-major.
    fn scores(&self, _label: &str, _step: usize, _rows: usize, _cols: usize, _values: &[f32]) {}

    /// Selected tokens for one step.
    fn tokens(&self, _label: &str, _step: usize, _tokens: &[u32]) {}
}

/// The default sink: observes nothing.
pub struct NoopTraceSink;

impl TraceSink for NoopTraceSink {}

/// Console sink that prints trace points to stdout.
pub struct StdoutTraceSink;

impl TraceSink for StdoutTraceSink {
    fn enabled(&self) -> bool {
        true
    }

    fn scores(&self, label: &str, step: usize, rows: usize, cols: usize, values: &[f32]) {
        println!("[step {step}] {label} ({rows}x{cols})");
        for (i, row) in values.chunks(cols).enumerate() {
            println!("  row {i}: {row:?}");
        }
    }

    fn tokens(&self, label: &str, step: usize, tokens: &[u32]) {
        println!("[step {step}] {label}: {tokens:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_is_disabled() {
        assert!(!NoopTraceSink.enabled());
    }

    #[test]
    fn test_stdout_is_enabled() {
        assert!(StdoutTraceSink.enabled());
    }
}

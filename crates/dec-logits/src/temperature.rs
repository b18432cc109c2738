use dec_tensor::Element;

use crate::processor::LogitsProcessor;
use crate::scores::NextTokenScores;
use crate::sequences::Sequences;

/// Scales all scores by dividing by a temperature value.
///
/// Higher temperatures flatten the distribution, lower temperatures
/// sharpen it. A temperature of 1.0 is a no-op.
pub struct TemperatureProcessor {
    temperature: f32,
}

impl TemperatureProcessor {
    pub fn new(temperature: f32) -> Self {
        Self { temperature }
    }
}

impl<E: Element> LogitsProcessor<E> for TemperatureProcessor {
    fn name(&self) -> &str {
        "temperature"
    }

    fn process(&self, _sequences: &dyn Sequences, scores: &mut NextTokenScores<'_, E>) {
        if self.temperature == 1.0 {
            return;
        }
        // Clamp temperature to a very small positive value if it is <= 0.
        let temp = if self.temperature <= 0.0 {
            1e-7
        } else {
            self.temperature
        };

        for i in 0..scores.batch_beam_size {
            for s in scores.row_mut(i) {
                *s = E::from_f32(s.to_f32() / temp);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequences::SliceSequences;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaling() {
        let p = TemperatureProcessor::new(2.0);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![4.0f32, -2.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_relative_eq!(scores.row(0)[0], 2.0);
        assert_relative_eq!(scores.row(0)[1], -1.0);
    }

    #[test]
    fn test_unit_temperature_is_identity() {
        let p = TemperatureProcessor::new(1.0);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![3.5f32];
        let mut scores = NextTokenScores::new(&mut buf, 1, 1);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[0], 3.5);
    }

    #[test]
    fn test_neg_infinity_stays_suppressed() {
        let p = TemperatureProcessor::new(0.5);
        let rows = vec![vec![0u32]];
        let seqs = SliceSequences::new(&rows);
        let mut buf = vec![f32::NEG_INFINITY, 1.0];
        let mut scores = NextTokenScores::new(&mut buf, 1, 2);
        LogitsProcessor::<f32>::process(&p, &seqs, &mut scores);
        assert_eq!(scores.row(0)[0], f32::NEG_INFINITY);
    }
}

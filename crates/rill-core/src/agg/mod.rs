mod welford;

pub use welford::Welford;

use rill_lang::plan::AggKind;

use crate::event::Value;

// ---------------------------------------------------------------------------
// Accumulator
// ---------------------------------------------------------------------------

/// Incremental aggregation state: O(1) `update` per event, O(1) `finalize`
/// at window close. One accumulator exists per select-clause output per
/// open window instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count { n: u64 },
    Min { extremum: Option<f64> },
    Max { extremum: Option<f64> },
    Mean { sum: f64, n: u64 },
    Variance(Welford),
    Stdev(Welford),
}

impl Accumulator {
    pub fn new(kind: AggKind) -> Self {
        match kind {
            AggKind::Count => Accumulator::Count { n: 0 },
            AggKind::Min => Accumulator::Min { extremum: None },
            AggKind::Max => Accumulator::Max { extremum: None },
            AggKind::Mean => Accumulator::Mean { sum: 0.0, n: 0 },
            AggKind::Variance => Accumulator::Variance(Welford::default()),
            AggKind::Stdev => Accumulator::Stdev(Welford::default()),
        }
    }

    /// Feed one event's sample.
    ///
    /// `count` increments regardless of the sample; every other function
    /// updates only when a numeric sample is present (a `None` sample is a
    /// coercion failure the caller has already counted).
    pub fn update(&mut self, sample: Option<f64>) {
        match self {
            Accumulator::Count { n } => *n += 1,
            Accumulator::Min { extremum } => {
                if let Some(v) = sample {
                    *extremum = Some(extremum.map_or(v, |m| m.min(v)));
                }
            }
            Accumulator::Max { extremum } => {
                if let Some(v) = sample {
                    *extremum = Some(extremum.map_or(v, |m| m.max(v)));
                }
            }
            Accumulator::Mean { sum, n } => {
                if let Some(v) = sample {
                    *sum += v;
                    *n += 1;
                }
            }
            Accumulator::Variance(w) | Accumulator::Stdev(w) => {
                if let Some(v) = sample {
                    w.update(v);
                }
            }
        }
    }

    /// Produce the close-time result.
    ///
    /// An aggregate with zero qualifying samples yields `Value::Null` — a
    /// window with no data reports "no data", not zero. `var`/`stdev`
    /// additionally require two samples.
    pub fn finalize(&self) -> Value {
        match self {
            Accumulator::Count { n } => Value::Number(*n as f64),
            Accumulator::Min { extremum } | Accumulator::Max { extremum } => {
                extremum.map(Value::Number).unwrap_or(Value::Null)
            }
            Accumulator::Mean { sum, n } => {
                if *n == 0 {
                    Value::Null
                } else {
                    Value::Number(sum / *n as f64)
                }
            }
            Accumulator::Variance(w) => {
                w.sample_variance().map(Value::Number).unwrap_or(Value::Null)
            }
            Accumulator::Stdev(w) => w.stdev().map(Value::Number).unwrap_or(Value::Null),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(kind: AggKind, samples: &[f64]) -> Accumulator {
        let mut acc = Accumulator::new(kind);
        for &v in samples {
            acc.update(Some(v));
        }
        acc
    }

    // -- 1. count_ignores_sample_values --------------------------------------

    #[test]
    fn count_ignores_sample_values() {
        let mut acc = Accumulator::new(AggKind::Count);
        acc.update(Some(10.0));
        acc.update(None);
        acc.update(Some(f64::NAN));
        assert_eq!(acc.finalize(), Value::Number(3.0));
    }

    // -- 2. min_and_max ------------------------------------------------------

    #[test]
    fn min_and_max() {
        let samples = [3.0, -1.0, 7.0, 2.0];
        assert_eq!(feed(AggKind::Min, &samples).finalize(), Value::Number(-1.0));
        assert_eq!(feed(AggKind::Max, &samples).finalize(), Value::Number(7.0));
    }

    // -- 3. mean -------------------------------------------------------------

    #[test]
    fn mean() {
        assert_eq!(
            feed(AggKind::Mean, &[10.0, 20.0]).finalize(),
            Value::Number(15.0),
        );
    }

    // -- 4. min_mean_max_ordering --------------------------------------------

    #[test]
    fn min_mean_max_ordering() {
        let samples = [5.0, 1.0, 9.0, 4.0, 4.0];
        let min = feed(AggKind::Min, &samples).finalize().as_f64().unwrap();
        let mean = feed(AggKind::Mean, &samples).finalize().as_f64().unwrap();
        let max = feed(AggKind::Max, &samples).finalize().as_f64().unwrap();
        assert!(min <= mean && mean <= max);
    }

    // -- 5. variance_and_stdev -----------------------------------------------

    #[test]
    fn variance_and_stdev() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let var = feed(AggKind::Variance, &samples)
            .finalize()
            .as_f64()
            .unwrap();
        let stdev = feed(AggKind::Stdev, &samples).finalize().as_f64().unwrap();
        assert!(var >= 0.0);
        assert!((stdev - var.sqrt()).abs() < 1e-12);
        // Sample variance of the classic sequence is 32/7.
        assert!((var - 32.0 / 7.0).abs() < 1e-12);
    }

    // -- 6. empty_aggregates_finalize_to_null --------------------------------

    #[test]
    fn empty_aggregates_finalize_to_null() {
        for kind in [
            AggKind::Min,
            AggKind::Max,
            AggKind::Mean,
            AggKind::Variance,
            AggKind::Stdev,
        ] {
            assert_eq!(
                Accumulator::new(kind).finalize(),
                Value::Null,
                "{} of an empty window should be null",
                kind.name(),
            );
        }
        assert_eq!(
            Accumulator::new(AggKind::Count).finalize(),
            Value::Number(0.0),
        );
    }

    // -- 7. single_sample_variance_is_null -----------------------------------

    #[test]
    fn single_sample_variance_is_null() {
        assert_eq!(feed(AggKind::Variance, &[5.0]).finalize(), Value::Null);
        assert_eq!(feed(AggKind::Stdev, &[5.0]).finalize(), Value::Null);
    }

    // -- 8. skipped_samples_do_not_move_state --------------------------------

    #[test]
    fn skipped_samples_do_not_move_state() {
        let mut acc = Accumulator::new(AggKind::Mean);
        acc.update(Some(10.0));
        acc.update(None);
        acc.update(Some(20.0));
        assert_eq!(acc.finalize(), Value::Number(15.0));
    }
}

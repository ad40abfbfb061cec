use crate::history::Outcome;
use crate::road::RoadElement;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// What one simulation reported back: the pass/fail classification, the
/// objective feature value (absent on executor errors) and any extra
/// columns the executor wants carried into the history export.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub outcome: Outcome,
    pub feature: Option<f64>,
    pub extras: BTreeMap<String, JsonValue>,
}

/// Runs one candidate road through a driving simulation.
///
/// Implementations may be arbitrarily slow or I/O-bound; the engine never
/// calls them, only the driver loop does, strictly sequentially. An `Err`
/// is recorded as `Outcome::Error` with no feature value; whether it also
/// aborts the whole run is the driver's `exit_on_error` policy.
pub trait Executor<E: RoadElement> {
    fn simulate(&mut self, test: &[E]) -> Result<Simulation, anyhow::Error>;
}

/// A stand-in executor producing weighted random outcomes and feature
/// values, sufficient to drive the search end-to-end without a simulator.
pub struct MockExecutor {
    rng: ChaCha8Rng,
}

impl MockExecutor {
    /// The mock keeps its own seeded generator so its verdicts don't
    /// perturb the search's random stream.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl<E: RoadElement> Executor<E> for MockExecutor {
    fn simulate(&mut self, _test: &[E]) -> Result<Simulation, anyhow::Error> {
        // 3 FAIL : 5 PASS : 1 ERROR
        let roll = self.rng.random_range(0..9);
        let outcome = match roll {
            0..3 => Outcome::Fail,
            3..8 => Outcome::Pass,
            _ => Outcome::Error,
        };
        let feature = match outcome {
            Outcome::Error => None,
            _ => Some(self.rng.random_range(0.0..2.0)),
        };
        let mut extras = BTreeMap::new();
        extras.insert(
            "description".to_string(),
            JsonValue::from("mocked simulation result"),
        );
        Ok(Simulation {
            outcome,
            feature,
            extras,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_executor_produces_all_weighted_outcomes() {
        let mut executor = MockExecutor::new(42);
        let test: Vec<f64> = vec![0.0; 10];
        let mut passes = 0;
        let mut fails = 0;
        let mut errors = 0;
        for _ in 0..300 {
            let simulation = Executor::<f64>::simulate(&mut executor, &test).unwrap();
            match simulation.outcome {
                Outcome::Pass => {
                    passes += 1;
                    assert!(simulation.feature.is_some());
                }
                Outcome::Fail => {
                    fails += 1;
                    assert!(simulation.feature.is_some());
                }
                Outcome::Error => {
                    errors += 1;
                    assert!(simulation.feature.is_none());
                }
                Outcome::Invalid => panic!("mock never reports INVALID"),
            }
        }
        assert!(passes > fails, "PASS should dominate: {passes} vs {fails}");
        assert!(
            fails > errors,
            "FAIL should outnumber ERROR: {fails} vs {errors}"
        );
        assert!(errors > 0, "ERROR slot should be hit over 300 runs");
    }

    #[test]
    fn mock_executor_is_deterministic_per_seed() {
        let test: Vec<f64> = vec![0.0; 5];
        let mut first = MockExecutor::new(7);
        let mut second = MockExecutor::new(7);
        for _ in 0..20 {
            let a = Executor::<f64>::simulate(&mut first, &test).unwrap();
            let b = Executor::<f64>::simulate(&mut second, &test).unwrap();
            assert_eq!(a.outcome, b.outcome);
            assert_eq!(a.feature, b.feature);
        }
    }
}

pub mod config;
pub mod core;
pub mod crossovers;
pub mod executor;
pub mod history;
pub mod mutators;
pub mod objective;
pub mod report;
pub mod representation;
pub mod road;
pub mod runner;
pub mod stopcriteria;

pub use crate::core::SearchCore;
pub use config::SwerveConfig;
pub use crossovers::{
    ChromosomeCrossover, CrossoverOperator, RandomCrossover, SinglePointCrossover,
};
pub use executor::{Executor, MockExecutor, Simulation};
pub use history::{History, HistoryError, Lineage, Outcome, ParentInfo, TestRecord};
pub use mutators::{MutationOperator, OperatorSet, RoadMutator};
pub use objective::{Direction, Objective};
pub use report::{FailureReport, collect_failures};
pub use representation::{FixStepKappaRepresentation, RoadRepresentation};
pub use road::RoadElement;
pub use runner::SearchRunner;
pub use stopcriteria::{CountingStop, StopCriterion, TimeStop};

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    // End-to-end smoke test: a small budget against the mock executor must
    // fill the history and usually surface at least one lane departure.
    #[test]
    fn full_search_against_the_mock_executor() {
        let core = SearchCore::new(
            Box::new(FixStepKappaRepresentation::new(20, 5, 10.0)),
            Objective::maximize("distance_from_center"),
            Some(RoadMutator::standard()),
            Some(RandomCrossover::standard()),
        );
        let mut runner = SearchRunner::new(
            core,
            Box::new(MockExecutor::new(1)),
            Box::new(CountingStop::new(50, 10)),
        );
        let mut rng = ChaCha8Rng::from_seed([0u8; 32]);
        runner.run(&mut rng).expect("search should complete");

        let history = runner.core().history();
        assert_eq!(history.len(), 50);
        let failures = collect_failures(history);
        assert!(
            !failures.is_empty(),
            "a 3-in-9 FAIL rate over 50 runs should produce failures"
        );
    }
}

use crate::core::SearchCore;
use crate::executor::Executor;
use crate::history::{Outcome, TestRecord};
use crate::road::RoadElement;
use crate::stopcriteria::StopCriterion;
use log::{error, info};
use rand_core::RngCore;

/// The driver loop tying the engine, an executor and a stop criterion
/// together: random generation until the random budget is spent, then
/// ask/tell until the total budget is spent.
pub struct SearchRunner<E: RoadElement> {
    core: SearchCore<E>,
    executor: Box<dyn Executor<E>>,
    stop_criterion: Box<dyn StopCriterion>,
    /// Whether an executor error aborts the run. In some deployments a
    /// simulator crash is fatal, in others an expected nuisance to skip.
    pub exit_on_error: bool,
}

impl<E: RoadElement> SearchRunner<E> {
    pub fn new(
        core: SearchCore<E>,
        executor: Box<dyn Executor<E>>,
        stop_criterion: Box<dyn StopCriterion>,
    ) -> Self {
        Self {
            core,
            executor,
            stop_criterion,
            exit_on_error: false,
        }
    }

    pub fn core(&self) -> &SearchCore<E> {
        &self.core
    }

    /// Runs the whole search: random phase, then mutation phase.
    pub fn run(&mut self, rng: &mut dyn RngCore) -> Result<(), anyhow::Error> {
        info!("starting initial random generation phase");
        while self.stop_criterion.is_random_phase() && !self.stop_criterion.is_over() {
            let candidate = self.core.ask_random(rng);
            self.step(candidate)?;
        }
        info!("finished random generation phase, starting mutation phase");
        while !self.stop_criterion.is_over() {
            let candidate = self.core.ask(rng);
            self.step(candidate)?;
        }
        info!(
            "search finished after {} executions",
            self.core.history().len()
        );
        Ok(())
    }

    fn step(&mut self, candidate: TestRecord<E>) -> Result<(), anyhow::Error> {
        let executed = self.execute(candidate)?;
        self.stop_criterion.execute_test(executed.outcome);
        self.core.tell(executed);
        Ok(())
    }

    /// Executes one candidate, merging the simulation result into the
    /// record. Executor errors become `Outcome::Error` with no feature
    /// value and, under `exit_on_error`, abort the run.
    fn execute(&mut self, mut record: TestRecord<E>) -> Result<TestRecord<E>, anyhow::Error> {
        match self.executor.simulate(&record.test) {
            Ok(simulation) => {
                record.outcome = Some(simulation.outcome);
                record.feature = simulation.feature;
                record.extras.extend(simulation.extras);
            }
            Err(e) => {
                error!("error during execution of test: {e:#}");
                record.outcome = Some(Outcome::Error);
                record.feature = None;
                if self.exit_on_error {
                    return Err(e);
                }
            }
        }
        Ok(record)
    }
}

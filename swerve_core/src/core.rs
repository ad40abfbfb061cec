use crate::crossovers::{CrossoverCandidate, CrossoverChild, RandomCrossover};
use crate::history::{History, Lineage, Outcome, ParentInfo, TestRecord};
use crate::mutators::RoadMutator;
use crate::objective::Objective;
use crate::representation::RoadRepresentation;
use crate::road::RoadElement;
use log::{debug, error, info, warn};
use rand_core::RngCore;
use std::collections::VecDeque;

/// Where the `ask` state machine currently stands. One search round runs
/// the mutant batch, then the crossover batch, then recalculates the
/// dynamic threshold and starts over.
enum AskPhase<E: RoadElement> {
    RoundStart,
    MutantBatch {
        queue: VecDeque<TestRecord<E>>,
        emitted: usize,
        history_len_at_emit: usize,
    },
    CrossoverStart,
    CrossoverBatch {
        queue: VecDeque<TestRecord<E>>,
    },
}

/// The search engine: owns the execution history and produces candidate
/// roads through the ask/tell protocol.
///
/// The driver loop alternates `ask` (or `ask_random` during the initial
/// random phase) with executing the candidate and handing the result back
/// via `tell`. Each `ask` call emits exactly one candidate and suspends;
/// the engine resumes where it left off on the next call. The engine
/// assumes a single driver that tells every result before asking again.
pub struct SearchCore<E: RoadElement> {
    representation: Box<dyn RoadRepresentation<E>>,
    objective: Objective,
    mutator: Option<RoadMutator<E>>,
    crossover: Option<RandomCrossover<E>>,
    history: History<E>,
    phase: AskPhase<E>,
    /// How many times a record may serve as a crossover parent before it is
    /// retired from the pool. Mutation parenthood is stricter: once.
    pub crossover_max_visits: u32,
}

impl<E: RoadElement> SearchCore<E> {
    pub fn new(
        representation: Box<dyn RoadRepresentation<E>>,
        objective: Objective,
        mutator: Option<RoadMutator<E>>,
        crossover: Option<RandomCrossover<E>>,
    ) -> Self {
        if mutator.is_none() {
            warn!("no mutator was chosen");
        }
        if crossover.is_none() {
            warn!("no crossover was chosen");
        }
        Self {
            representation,
            objective,
            mutator,
            crossover,
            history: History::new(),
            phase: AskPhase::RoundStart,
            crossover_max_visits: 10,
        }
    }

    pub fn history(&self) -> &History<E> {
        &self.history
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn representation(&self) -> &dyn RoadRepresentation<E> {
        self.representation.as_ref()
    }

    /// Produces a fresh random road wrapped as a generation-0 candidate.
    ///
    /// Panics if the representation generates an invalid road; that is a
    /// contract violation of the representation, not a recoverable error.
    pub fn ask_random(&self, rng: &mut dyn RngCore) -> TestRecord<E> {
        let test = self.representation.generate(rng);
        assert!(
            self.representation.is_valid(&test),
            "the newly generated test should be valid"
        );
        TestRecord::random(test)
    }

    /// Registers the result of an execution, appending it to the history.
    /// The record's positional index is stable from here on.
    pub fn tell(&mut self, record: TestRecord<E>) -> usize {
        debug!(
            "tell: method={} outcome={:?} {}={:?}",
            record.method,
            record.outcome,
            self.objective.feature(),
            record.feature
        );
        self.history.push(record)
    }

    /// Emits the next candidate of the current search round.
    ///
    /// A round emits the mutated batch of the best unvisited parent, then
    /// the crossover children, then tightens the dynamic threshold and
    /// starts over. With no mutants available the round falls back to one
    /// random road. Emission of a mutant batch stops early as soon as the
    /// previously emitted mutant came back FAIL: once a parent has a
    /// failing child there is no budget left to spend on its siblings.
    pub fn ask(&mut self, rng: &mut dyn RngCore) -> TestRecord<E> {
        loop {
            match std::mem::replace(&mut self.phase, AskPhase::RoundStart) {
                AskPhase::RoundStart => {
                    let batch = self.get_mutated_tests(rng);
                    if batch.is_empty() {
                        debug!("no mutations, generating a random test");
                        self.phase = AskPhase::CrossoverStart;
                        return self.ask_random(rng);
                    }
                    self.phase = AskPhase::MutantBatch {
                        queue: batch.into(),
                        emitted: 0,
                        history_len_at_emit: 0,
                    };
                }
                AskPhase::MutantBatch {
                    mut queue,
                    emitted,
                    history_len_at_emit,
                } => {
                    let previous_failed = emitted > 0
                        && self.history.len() > history_len_at_emit
                        && matches!(
                            self.history.last().and_then(|record| record.outcome),
                            Some(Outcome::Fail)
                        );
                    if previous_failed {
                        debug!("mutant came back FAIL, abandoning the rest of the batch");
                        self.phase = AskPhase::CrossoverStart;
                        continue;
                    }
                    match queue.pop_front() {
                        Some(candidate) => {
                            self.phase = AskPhase::MutantBatch {
                                queue,
                                emitted: emitted + 1,
                                history_len_at_emit: self.history.len(),
                            };
                            return candidate;
                        }
                        None => self.phase = AskPhase::CrossoverStart,
                    }
                }
                AskPhase::CrossoverStart => {
                    let batch = self.get_crossover_tests(rng);
                    self.phase = AskPhase::CrossoverBatch {
                        queue: batch.into(),
                    };
                }
                AskPhase::CrossoverBatch { mut queue } => match queue.pop_front() {
                    Some(candidate) => {
                        self.phase = AskPhase::CrossoverBatch { queue };
                        return candidate;
                    }
                    None => {
                        self.objective.recalculate_dynamic_threshold(&self.history);
                        self.phase = AskPhase::RoundStart;
                    }
                },
            }
        }
    }

    /// Selects the best unvisited parent, exhausts it, and applies the
    /// outcome-appropriate operator batch: exploration for PASS parents,
    /// exploitation for FAIL parents (whose children stop reproducing).
    /// One failing operator only costs its own candidate, never the batch.
    pub fn get_mutated_tests(&mut self, rng: &mut dyn RngCore) -> Vec<TestRecord<E>> {
        let Some(parent_index) = self.best_mutation_parent() else {
            warn!("couldn't find a good parent, skipping");
            return Vec::new();
        };
        debug!("best unvisited parent for mutation is {parent_index}");
        self.history.set_visited(parent_index, 1);

        let (parent_info, generation) = self.parent_info(parent_index);
        let parent_test = self
            .history
            .get(parent_index)
            .expect("parent index points into history")
            .test
            .clone();

        let Some(mutator) = &self.mutator else {
            warn!("no modification was applied because no mutator is configured");
            return Vec::new();
        };
        let Some((operator_set, stop_reproduction)) = mutator.plan_for(parent_info.outcome) else {
            warn!(
                "no modification strategy configured for outcome {}",
                parent_info.outcome
            );
            return Vec::new();
        };
        let visited = if stop_reproduction { 1 } else { 0 };

        let representation = self.representation.as_ref();
        let mut mutants = Vec::new();
        for operator in operator_set.get_all() {
            match operator.apply(representation, &parent_test, rng) {
                Ok(mutated) => {
                    let mutated = if representation.is_valid(&mutated) {
                        mutated
                    } else {
                        let fixed = representation.fix(mutated);
                        if representation.is_valid(&fixed) {
                            fixed
                        } else {
                            warn!(
                                "operator {} produced an unrepairable road, dropping it",
                                operator.name()
                            );
                            continue;
                        }
                    };
                    mutants.push(TestRecord::offspring(
                        mutated,
                        operator.name(),
                        visited,
                        generation,
                        Lineage {
                            parent_1: parent_info.clone(),
                            parent_2: None,
                        },
                    ));
                }
                Err(e) => {
                    error!(
                        "error applying operator {} to parent {parent_index}: {e:#}",
                        operator.name()
                    );
                }
            }
        }
        mutants
    }

    /// Recombines the crossover candidate pool into child candidates,
    /// wearing both parents of every child down by one visit.
    pub fn get_crossover_tests(&mut self, rng: &mut dyn RngCore) -> Vec<TestRecord<E>> {
        let Some(crossover) = &self.crossover else {
            info!("no crossover defined, skipping");
            return Vec::new();
        };
        if self.history.is_empty() {
            warn!("empty history, cannot select crossover candidates");
            return Vec::new();
        }

        let candidates = self.select_crossover_candidates();
        if !crossover.is_applicable(&candidates) {
            warn!(
                "couldn't select enough tests to generate crossover candidates: selected {}, minimum {}",
                candidates.len(),
                crossover.min_number_candidates_for_crossover
            );
            return Vec::new();
        }

        let children = crossover.recombine(self.representation.as_ref(), &candidates, rng);
        let mut child_records = Vec::new();
        for child in children {
            let CrossoverChild {
                test,
                method,
                lineage,
                generation,
                visited,
            } = child;
            self.history.bump_visited(lineage.parent_1.index);
            if let Some(parent_2) = &lineage.parent_2 {
                self.history.bump_visited(parent_2.index);
            }
            child_records.push(TestRecord::offspring(
                test, method, visited, generation, lineage,
            ));
        }
        child_records
    }

    /// The best executed, unvisited, threshold-passing record on which every
    /// exploration operator can run. Ties go to the earliest record.
    fn best_mutation_parent(&self) -> Option<usize> {
        if self.history.is_empty() {
            warn!("empty history, cannot get best parent");
            return None;
        }
        let operators = self
            .mutator
            .as_ref()
            .map(|mutator| mutator.mutation_operators().get_all())
            .unwrap_or(&[]);
        let selection = self
            .history
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                matches!(record.outcome, Some(Outcome::Pass | Outcome::Fail))
                    && record.visited == 0
            })
            .map(|(index, record)| (index, self.executed_feature(index, record), record))
            .filter(|(_, feature, _)| self.objective.passes_threshold(*feature))
            .filter(|(_, _, record)| {
                operators
                    .iter()
                    .all(|operator| operator.is_applicable(&record.test))
            })
            .map(|(index, feature, _)| (index, feature));
        self.objective.best_of(selection)
    }

    /// All executed records below the crossover visit ceiling that pass the
    /// threshold, paired with the lineage info their children would carry.
    fn select_crossover_candidates(&self) -> Vec<CrossoverCandidate<E>> {
        self.history
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                matches!(record.outcome, Some(Outcome::Pass | Outcome::Fail))
                    && record.visited <= self.crossover_max_visits
            })
            .map(|(index, record)| (index, self.executed_feature(index, record), record))
            .filter(|(_, feature, _)| self.objective.passes_threshold(*feature))
            .map(|(index, _, record)| {
                let (parent, generation) = self.parent_info(index);
                CrossoverCandidate {
                    test: record.test.clone(),
                    parent,
                    generation,
                }
            })
            .collect()
    }

    /// Feature value of an executed PASS/FAIL record. A missing value here
    /// is an executor contract violation, so it fails loudly.
    fn executed_feature(&self, index: usize, record: &TestRecord<E>) -> f64 {
        record.feature.unwrap_or_else(|| {
            panic!(
                "objective feature `{}` was not recorded for executed record {index}",
                self.objective.feature()
            )
        })
    }

    /// Lineage stub for the record at `index`, plus the generation its
    /// children get.
    fn parent_info(&self, index: usize) -> (ParentInfo, u32) {
        let record = self
            .history
            .get(index)
            .expect("parent index points into history");
        let outcome = record
            .outcome
            .expect("parent records have been executed");
        (
            ParentInfo {
                index,
                outcome,
                feature: record.feature,
            },
            record.generation + 1,
        )
    }
}

use crate::history::{Lineage, Outcome, ParentInfo};
use crate::representation::RoadRepresentation;
use crate::road::RoadElement;
use anyhow::ensure;
use log::{error, info};
use rand::Rng;
use rand_core::RngCore;

/// A history record eligible to become a crossover parent: its road, its
/// lineage stub and the generation its children would get.
#[derive(Debug, Clone)]
pub struct CrossoverCandidate<E: RoadElement> {
    pub test: Vec<E>,
    pub parent: ParentInfo,
    /// Generation assigned to children of this candidate (parent + 1).
    pub generation: u32,
}

/// One recombined child, ready to be wrapped into a record by the engine.
#[derive(Debug, Clone)]
pub struct CrossoverChild<E: RoadElement> {
    pub test: Vec<E>,
    pub method: &'static str,
    pub lineage: Lineage,
    pub generation: u32,
    pub visited: u32,
}

/// Fraction of positionally equal elements over the shorter length; 0.0 for
/// an empty overlap. Used to refuse crossing near-identical parents.
pub fn test_similarity<E: PartialEq>(parent_1: &[E], parent_2: &[E]) -> f64 {
    let min_len = parent_1.len().min(parent_2.len());
    if min_len == 0 {
        return 0.0;
    }
    let same_count = parent_1
        .iter()
        .zip(parent_2.iter())
        .filter(|(a, b)| a == b)
        .count();
    same_count as f64 / min_len as f64
}

/// Combines the lineage of two parents for their offspring: parent 1's
/// fields carry over, parent 2's are relabeled, the generation is the
/// maximum of both, and a failing parent on either side taints the child
/// with `visited = 1` so the failing lineage is not revisited.
fn combine_parents_info<E: RoadElement>(
    candidate_1: &CrossoverCandidate<E>,
    candidate_2: &CrossoverCandidate<E>,
) -> (Lineage, u32, u32) {
    let lineage = Lineage {
        parent_1: candidate_1.parent.clone(),
        parent_2: Some(candidate_2.parent.clone()),
    };
    let generation = candidate_1.generation.max(candidate_2.generation);
    let tainted = candidate_1.parent.outcome == Outcome::Fail
        || candidate_2.parent.outcome == Outcome::Fail;
    (lineage, generation, if tainted { 1 } else { 0 })
}

/// A two-parent recombination of roads.
pub trait CrossoverOperator<E: RoadElement>: Send + Sync {
    /// Tag recorded as the `method` of every child this operator produces.
    fn name(&self) -> &'static str;

    fn is_applicable(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        _parent_1: &[E],
        _parent_2: &[E],
    ) -> bool {
        true
    }

    /// Produces one or two children from the given parents.
    fn apply(
        &self,
        representation: &dyn RoadRepresentation<E>,
        parent_1: &[E],
        parent_2: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<E>>, anyhow::Error>;
}

/// Crops both parents to the shorter length and randomly exchanges the two
/// values at each position, yielding two element-wise shuffles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromosomeCrossover;

impl<E: RoadElement> CrossoverOperator<E> for ChromosomeCrossover {
    fn name(&self) -> &'static str {
        "chromosome crossover"
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        parent_1: &[E],
        parent_2: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<E>>, anyhow::Error> {
        let min_len = parent_1.len().min(parent_2.len());
        let mut child_1 = parent_1[..min_len].to_vec();
        let mut child_2 = parent_2[..min_len].to_vec();
        for i in 0..min_len {
            if rng.random_bool(0.5) {
                std::mem::swap(&mut child_1[i], &mut child_2[i]);
            }
        }
        Ok(vec![child_1, child_2])
    }
}

/// Splits both parents near their middles (with a bounded random jitter
/// applied to both split points) and swaps the tails:
/// child 1 is parent 1's head plus parent 2's tail, child 2 the reverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePointCrossover;

impl<E: RoadElement> CrossoverOperator<E> for SinglePointCrossover {
    fn name(&self) -> &'static str {
        "single point crossover"
    }

    fn is_applicable(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        parent_1: &[E],
        parent_2: &[E],
    ) -> bool {
        // the jitter range must be non-empty
        parent_1.len().min(parent_2.len()) >= 6
    }

    fn apply(
        &self,
        representation: &dyn RoadRepresentation<E>,
        parent_1: &[E],
        parent_2: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<E>>, anyhow::Error> {
        ensure!(
            self.is_applicable(representation, parent_1, parent_2),
            "parents of lengths {} and {} are too short for a single-point crossover",
            parent_1.len(),
            parent_2.len()
        );
        let amount = (parent_1.len().min(parent_2.len()) / 2 - 2) as i64;
        let variability = rng.random_range(-amount..amount);
        let middle_1 = (parent_1.len() as i64 / 2 + variability) as usize;
        let middle_2 = (parent_2.len() as i64 / 2 + variability) as usize;

        let mut child_1 = parent_1[..middle_1].to_vec();
        child_1.extend_from_slice(&parent_2[middle_2..]);
        let mut child_2 = parent_2[..middle_2].to_vec();
        child_2.extend_from_slice(&parent_1[middle_1..]);
        Ok(vec![child_1, child_2])
    }
}

/// Pairing strategy: repeatedly samples two candidates uniformly at random
/// (independent draws), refuses pairs that are too similar, and applies a
/// uniformly chosen crossover operator to the survivors until the target
/// number of children is reached or the attempt budget runs out.
pub struct RandomCrossover<E: RoadElement> {
    operators: Vec<Box<dyn CrossoverOperator<E>>>,
    pub size: usize,
    pub similarity_threshold: f64,
    pub min_number_candidates_for_crossover: usize,
}

impl<E: RoadElement> RandomCrossover<E> {
    pub fn new(operators: Vec<Box<dyn CrossoverOperator<E>>>) -> Self {
        Self {
            operators,
            size: 20,
            similarity_threshold: 0.95,
            min_number_candidates_for_crossover: 4,
        }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ChromosomeCrossover),
            Box::new(SinglePointCrossover),
        ])
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Crossover only runs on a pool of at least
    /// `min_number_candidates_for_crossover` candidates.
    pub fn is_applicable(&self, candidates: &[CrossoverCandidate<E>]) -> bool {
        candidates.len() >= self.min_number_candidates_for_crossover
    }

    /// Mates the candidate pool into at most `min(size, pool)` children.
    /// Every draw counts against an attempt budget of twice that, so a pool
    /// of mutually similar parents terminates with no children instead of
    /// spinning.
    pub fn recombine(
        &self,
        representation: &dyn RoadRepresentation<E>,
        candidates: &[CrossoverCandidate<E>],
        rng: &mut dyn RngCore,
    ) -> Vec<CrossoverChild<E>> {
        if !self.is_applicable(candidates) {
            return Vec::new();
        }

        let target_children = self.size.min(candidates.len());
        let mut children = Vec::new();
        let mut attempts = 0;
        while children.len() < target_children && attempts < target_children * 2 {
            attempts += 1;
            let candidate_1 = &candidates[rng.random_range(0..candidates.len())];
            let candidate_2 = &candidates[rng.random_range(0..candidates.len())];
            if test_similarity(&candidate_1.test, &candidate_2.test) >= self.similarity_threshold {
                info!("discarding parent combination due to genetic similarity");
                continue;
            }
            let operator = &self.operators[rng.random_range(0..self.operators.len())];
            if !operator.is_applicable(representation, &candidate_1.test, &candidate_2.test) {
                continue;
            }
            let (lineage, generation, visited) = combine_parents_info(candidate_1, candidate_2);
            match operator.apply(representation, &candidate_1.test, &candidate_2.test, rng) {
                Ok(newborns) => {
                    for test in newborns {
                        children.push(CrossoverChild {
                            test,
                            method: operator.name(),
                            lineage: lineage.clone(),
                            generation,
                            visited,
                        });
                    }
                }
                Err(e) => {
                    error!("crossover operator {} failed: {e:#}", operator.name());
                }
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::FixStepKappaRepresentation;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn representation() -> FixStepKappaRepresentation {
        FixStepKappaRepresentation::new(20, 0, 10.0)
    }

    fn candidate(test: Vec<f64>, index: usize, outcome: Outcome) -> CrossoverCandidate<f64> {
        CrossoverCandidate {
            test,
            parent: ParentInfo {
                index,
                outcome,
                feature: Some(0.1 * index as f64),
            },
            generation: 1,
        }
    }

    fn road(length: usize, offset: f64) -> Vec<f64> {
        (0..length).map(|i| offset + 0.001 * i as f64).collect()
    }

    #[test]
    fn similarity_of_identical_parents_is_one() {
        let test = road(10, 0.0);
        assert_eq!(test_similarity(&test, &test), 1.0);
    }

    #[test]
    fn similarity_counts_positional_matches_over_shorter_length() {
        let parent_1 = vec![1.0, 2.0, 3.0, 4.0];
        let parent_2 = vec![1.0, 9.0, 3.0];
        assert!((test_similarity(&parent_1, &parent_2) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(test_similarity(&parent_1, &[]), 0.0);
    }

    #[test]
    fn chromosome_crossover_shuffles_elements_positionwise() {
        let operator = ChromosomeCrossover;
        let mut rng = ChaCha8Rng::from_seed([20; 32]);
        let parent_1 = road(10, 0.0);
        let parent_2 = road(8, 1.0);
        let children = operator
            .apply(&representation(), &parent_1, &parent_2, &mut rng)
            .unwrap();
        assert_eq!(children.len(), 2);
        for child in &children {
            assert_eq!(child.len(), 8);
        }
        for i in 0..8 {
            let pair = [children[0][i], children[1][i]];
            assert!(pair.contains(&parent_1[i]));
            assert!(pair.contains(&parent_2[i]));
        }
    }

    #[test]
    fn single_point_crossover_swaps_tails() {
        let operator = SinglePointCrossover;
        let mut rng = ChaCha8Rng::from_seed([21; 32]);
        let parent_1 = road(12, 0.0);
        let parent_2 = road(10, 1.0);
        let children = operator
            .apply(&representation(), &parent_1, &parent_2, &mut rng)
            .unwrap();
        assert_eq!(children.len(), 2);
        // the two children together contain every element of both parents
        assert_eq!(
            children[0].len() + children[1].len(),
            parent_1.len() + parent_2.len()
        );
        // child 1 starts with parent 1's head and ends with parent 2's tail
        assert_eq!(children[0][0], parent_1[0]);
        assert_eq!(*children[0].last().unwrap(), *parent_2.last().unwrap());
        assert_eq!(children[1][0], parent_2[0]);
        assert_eq!(*children[1].last().unwrap(), *parent_1.last().unwrap());
    }

    #[test]
    fn single_point_crossover_rejects_short_parents() {
        let operator = SinglePointCrossover;
        let representation = representation();
        assert!(!CrossoverOperator::<f64>::is_applicable(
            &operator,
            &representation,
            &road(5, 0.0),
            &road(12, 0.0)
        ));
        let mut rng = ChaCha8Rng::from_seed([22; 32]);
        assert!(
            operator
                .apply(&representation, &road(5, 0.0), &road(12, 0.0), &mut rng)
                .is_err()
        );
    }

    #[test]
    fn combine_parents_info_taints_failing_lineages() {
        let passing = candidate(road(10, 0.0), 0, Outcome::Pass);
        let failing = candidate(road(10, 1.0), 1, Outcome::Fail);

        let (lineage, generation, visited) = combine_parents_info(&passing, &failing);
        assert_eq!(lineage.parent_1.index, 0);
        assert_eq!(lineage.parent_2.as_ref().unwrap().index, 1);
        assert_eq!(generation, 1);
        assert_eq!(visited, 1);

        let (_, _, visited) = combine_parents_info(&passing, &passing);
        assert_eq!(visited, 0);
    }

    #[test]
    fn combine_parents_info_takes_the_larger_generation() {
        let mut older = candidate(road(10, 0.0), 0, Outcome::Pass);
        older.generation = 4;
        let younger = candidate(road(10, 1.0), 1, Outcome::Pass);
        let (_, generation, _) = combine_parents_info(&older, &younger);
        assert_eq!(generation, 4);
    }

    #[test]
    fn recombine_refuses_identical_parents() {
        let crossover: RandomCrossover<f64> = RandomCrossover::standard();
        let mut rng = ChaCha8Rng::from_seed([23; 32]);
        let pool: Vec<_> = (0..4)
            .map(|i| candidate(road(10, 0.0), i, Outcome::Pass))
            .collect();
        let children = crossover.recombine(&representation(), &pool, &mut rng);
        assert!(
            children.is_empty(),
            "identical parents must never be crossed"
        );
    }

    #[test]
    fn recombine_requires_minimum_pool_size() {
        let crossover: RandomCrossover<f64> = RandomCrossover::standard();
        let mut rng = ChaCha8Rng::from_seed([24; 32]);
        let pool: Vec<_> = (0..3)
            .map(|i| candidate(road(10, i as f64), i, Outcome::Pass))
            .collect();
        assert!(!crossover.is_applicable(&pool));
        assert!(
            crossover
                .recombine(&representation(), &pool, &mut rng)
                .is_empty()
        );
    }

    #[test]
    fn recombine_produces_children_from_dissimilar_parents() {
        let crossover: RandomCrossover<f64> = RandomCrossover::standard().with_size(6);
        let mut rng = ChaCha8Rng::from_seed([25; 32]);
        let pool: Vec<_> = (0..6)
            .map(|i| candidate(road(10, i as f64), i, Outcome::Pass))
            .collect();
        let children = crossover.recombine(&representation(), &pool, &mut rng);
        assert!(!children.is_empty());
        for child in &children {
            assert!(
                child.method == "chromosome crossover" || child.method == "single point crossover"
            );
            assert!(child.lineage.parent_2.is_some());
        }
    }
}

use crate::history::Outcome;
use crate::representation::RoadRepresentation;
use crate::road::RoadElement;
use anyhow::{bail, ensure};
use rand::Rng;
use rand_core::RngCore;

/// Retry limit for the non-identity guarantee of [`AlterValues`]. A road
/// whose every value multiplies to itself (all zeros) can never change.
const MAX_ALTERATION_ATTEMPTS: usize = 1000;

/// A single-parent transformation of a road.
///
/// Operators are pure with respect to the engine: they read the parent's
/// road and produce a new one, drawing randomness only from the injected
/// generator. `is_applicable` guards operators that need a minimum road
/// length; the engine only selects parents every operator can run on.
pub trait MutationOperator<E: RoadElement>: Send + Sync {
    /// Tag recorded as the `method` of every child this operator produces.
    fn name(&self) -> &'static str;

    fn is_applicable(&self, _test: &[E]) -> bool {
        true
    }

    fn apply(
        &self,
        representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error>;
}

/// Drops a random number of elements from the front of the road.
#[derive(Debug, Clone)]
pub struct RemoveFront {
    pub remove_at_least: usize,
    pub remove_at_most: usize,
    pub min_length_for_operator: usize,
}

impl Default for RemoveFront {
    fn default() -> Self {
        Self {
            remove_at_least: 1,
            remove_at_most: 5,
            min_length_for_operator: 10,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for RemoveFront {
    fn name(&self) -> &'static str {
        "remove front"
    }

    fn is_applicable(&self, test: &[E]) -> bool {
        test.len() >= self.min_length_for_operator
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        ensure!(
            MutationOperator::<E>::is_applicable(self, test),
            "road of length {} is below the operator minimum {}",
            test.len(),
            self.min_length_for_operator
        );
        let count = rng.random_range(self.remove_at_least..=self.remove_at_most);
        Ok(test[count..].to_vec())
    }
}

/// Drops a random number of elements from the back of the road.
#[derive(Debug, Clone)]
pub struct RemoveBack {
    pub remove_at_least: usize,
    pub remove_at_most: usize,
    pub min_length_for_operator: usize,
}

impl Default for RemoveBack {
    fn default() -> Self {
        Self {
            remove_at_least: 1,
            remove_at_most: 5,
            min_length_for_operator: 10,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for RemoveBack {
    fn name(&self) -> &'static str {
        "remove back"
    }

    fn is_applicable(&self, test: &[E]) -> bool {
        test.len() >= self.min_length_for_operator
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        ensure!(
            MutationOperator::<E>::is_applicable(self, test),
            "road of length {} is below the operator minimum {}",
            test.len(),
            self.min_length_for_operator
        );
        let count = rng.random_range(self.remove_at_least..=self.remove_at_most);
        Ok(test[..test.len() - count].to_vec())
    }
}

/// Removes a random number of elements at random positions, but never
/// shrinks the road below 5 elements.
#[derive(Debug, Clone)]
pub struct RemoveRandom {
    pub remove_at_least: usize,
    pub remove_at_most: usize,
    pub min_length_for_operator: usize,
}

impl Default for RemoveRandom {
    fn default() -> Self {
        Self {
            remove_at_least: 1,
            remove_at_most: 5,
            min_length_for_operator: 10,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for RemoveRandom {
    fn name(&self) -> &'static str {
        "remove random"
    }

    fn is_applicable(&self, test: &[E]) -> bool {
        test.len() >= self.min_length_for_operator
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        ensure!(
            MutationOperator::<E>::is_applicable(self, test),
            "road of length {} is below the operator minimum {}",
            test.len(),
            self.min_length_for_operator
        );
        let mut remaining = rng.random_range(self.remove_at_least..=self.remove_at_most);
        let mut modified = test.to_vec();
        while remaining > 0 && modified.len() > 5 {
            let index = rng.random_range(0..modified.len());
            modified.remove(index);
            remaining -= 1;
        }
        Ok(modified)
    }
}

/// Appends a random number of new elements, each generated through the
/// representation so the extension stays consistent with the prefix.
#[derive(Debug, Clone)]
pub struct AddBack {
    pub add_at_least: usize,
    pub add_at_most: usize,
}

impl Default for AddBack {
    fn default() -> Self {
        Self {
            add_at_least: 1,
            add_at_most: 5,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for AddBack {
    fn name(&self) -> &'static str {
        "add back"
    }

    fn apply(
        &self,
        representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        let count = rng.random_range(self.add_at_least..=self.add_at_most);
        let mut modified = test.to_vec();
        for _ in 0..count {
            let value = representation.get_value(&modified, rng);
            modified.push(value);
        }
        Ok(modified)
    }
}

/// Regenerates the values at a random set of distinct positions, each from
/// the (already modified) prefix before it.
#[derive(Debug, Clone)]
pub struct ReplaceRandom {
    pub replace_at_least: usize,
    pub replace_at_most: usize,
}

impl Default for ReplaceRandom {
    fn default() -> Self {
        Self {
            replace_at_least: 1,
            replace_at_most: 5,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for ReplaceRandom {
    fn name(&self) -> &'static str {
        "replace random"
    }

    fn apply(
        &self,
        representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        let count = rng.random_range(self.replace_at_least..=self.replace_at_most);
        ensure!(
            count <= test.len(),
            "cannot replace {count} values in a road of length {}",
            test.len()
        );
        let mut indices = rand::seq::index::sample(rng, test.len(), count).into_vec();
        indices.sort_unstable();
        let mut modified = test.to_vec();
        for index in indices {
            modified[index] = representation.get_value(&modified[..index], rng);
        }
        Ok(modified)
    }
}

/// Scales elements by independently drawn factors, retrying until the road
/// actually changed. The non-identity guarantee is what makes this operator
/// useful as the last resort when the structural operators are stuck.
#[derive(Debug, Clone)]
pub struct AlterValues {
    pub mutation_factor_low: f64,
    pub mutation_factor_high: f64,
    pub mutation_chance: f64,
}

impl Default for AlterValues {
    fn default() -> Self {
        Self {
            mutation_factor_low: 0.9,
            mutation_factor_high: 1.1,
            mutation_chance: 0.1,
        }
    }
}

impl<E: RoadElement> MutationOperator<E> for AlterValues {
    fn name(&self) -> &'static str {
        "alter values"
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        ensure!(!test.is_empty(), "cannot alter an empty road");
        for _ in 0..MAX_ALTERATION_ATTEMPTS {
            let mutated: Vec<E> = test
                .iter()
                .map(|element| {
                    element
                        .alter(
                            rng,
                            self.mutation_chance,
                            self.mutation_factor_low,
                            self.mutation_factor_high,
                        )
                        .unwrap_or_else(|| element.clone())
                })
                .collect();
            if mutated != test {
                return Ok(mutated);
            }
        }
        bail!("road has no alterable values")
    }
}

/// Exploitation: replays a failing road back to front.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseRoad;

impl<E: RoadElement> MutationOperator<E> for ReverseRoad {
    fn name(&self) -> &'static str {
        "reverse road"
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        Ok(test.iter().rev().cloned().collect())
    }
}

/// Exploitation: swaps the two halves of a failing road around its midpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitAndSwap;

impl<E: RoadElement> MutationOperator<E> for SplitAndSwap {
    fn name(&self) -> &'static str {
        "split and swap"
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        let middle = test.len() / 2;
        let mut modified = test[middle..].to_vec();
        modified.extend_from_slice(&test[..middle]);
        Ok(modified)
    }
}

/// Exploitation: mirrors a failing road by negating every curvature value.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlipSigns;

impl<E: RoadElement> MutationOperator<E> for FlipSigns {
    fn name(&self) -> &'static str {
        "flip signs"
    }

    fn apply(
        &self,
        _representation: &dyn RoadRepresentation<E>,
        test: &[E],
        _rng: &mut dyn RngCore,
    ) -> Result<Vec<E>, anyhow::Error> {
        Ok(test.iter().map(RoadElement::flip_sign).collect())
    }
}

/// An ordered list of mutation operators applied as one batch.
pub struct OperatorSet<E: RoadElement> {
    operators: Vec<Box<dyn MutationOperator<E>>>,
}

impl<E: RoadElement> OperatorSet<E> {
    pub fn new(operators: Vec<Box<dyn MutationOperator<E>>>) -> Self {
        Self { operators }
    }

    /// The default exploration set for PASS parents.
    pub fn standard_mutation() -> Self {
        Self::new(vec![
            Box::new(RemoveFront::default()),
            Box::new(RemoveBack::default()),
            Box::new(RemoveRandom::default()),
            Box::new(AddBack::default()),
            Box::new(ReplaceRandom::default()),
            Box::new(AlterValues::default()),
        ])
    }

    /// The default exploitation set for FAIL parents: aggressive
    /// transformations meant to amplify an already-failing scenario.
    pub fn standard_exploitation() -> Self {
        Self::new(vec![
            Box::new(ReverseRoad),
            Box::new(SplitAndSwap),
            Box::new(FlipSigns),
        ])
    }

    pub fn get_all(&self) -> &[Box<dyn MutationOperator<E>>] {
        &self.operators
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Chooses between exploration and exploitation based on the parent's
/// outcome: a passing road is probed for new failures, a failing road is
/// exploited to deepen the failure, and its children are tagged to halt
/// further reproduction from that lineage.
pub struct RoadMutator<E: RoadElement> {
    mutation: OperatorSet<E>,
    exploitation: OperatorSet<E>,
}

impl<E: RoadElement> RoadMutator<E> {
    pub fn new(mutation: OperatorSet<E>, exploitation: OperatorSet<E>) -> Self {
        Self {
            mutation,
            exploitation,
        }
    }

    pub fn standard() -> Self {
        Self::new(
            OperatorSet::standard_mutation(),
            OperatorSet::standard_exploitation(),
        )
    }

    /// The exploration operators; parent selection requires all of these to
    /// be applicable.
    pub fn mutation_operators(&self) -> &OperatorSet<E> {
        &self.mutation
    }

    /// The operator set to run for a parent with the given outcome, plus
    /// whether the resulting children should stop reproducing
    /// (`visited = 1`). `None` when no strategy is configured for the
    /// outcome.
    pub fn plan_for(&self, outcome: Outcome) -> Option<(&OperatorSet<E>, bool)> {
        match outcome {
            Outcome::Pass if !self.mutation.is_empty() => Some((&self.mutation, false)),
            Outcome::Fail if !self.exploitation.is_empty() => Some((&self.exploitation, true)),
            Outcome::Pass | Outcome::Fail | Outcome::Error | Outcome::Invalid => None,
        }
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

    fn road(length: usize) -> Vec<f64> {
        (0..length).map(|i| 0.001 * (i + 1) as f64).collect()
    }

    #[test]
    fn remove_front_drops_leading_elements() {
        let operator = RemoveFront::default();
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([10; 32]);
        let test = road(12);
        for _ in 0..20 {
            let mutated = operator.apply(&representation, &test, &mut rng).unwrap();
            let dropped = test.len() - mutated.len();
            assert!((1..=5).contains(&dropped));
            assert_eq!(mutated[..], test[dropped..]);
        }
    }

    #[test]
    fn remove_back_drops_trailing_elements() {
        let operator = RemoveBack::default();
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([11; 32]);
        let test = road(12);
        let mutated = operator.apply(&representation, &test, &mut rng).unwrap();
        let dropped = test.len() - mutated.len();
        assert!((1..=5).contains(&dropped));
        assert_eq!(mutated[..], test[..test.len() - dropped]);
    }

    #[test]
    fn removal_operators_reject_short_roads() {
        let test = road(9);
        assert!(!MutationOperator::<f64>::is_applicable(&RemoveFront::default(), &test));
        assert!(!MutationOperator::<f64>::is_applicable(&RemoveBack::default(), &test));
        assert!(!MutationOperator::<f64>::is_applicable(&RemoveRandom::default(), &test));
        assert!(MutationOperator::<f64>::is_applicable(&RemoveFront::default(), &road(10)));

        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([12; 32]);
        assert!(
            RemoveFront::default()
                .apply(&representation, &test, &mut rng)
                .is_err()
        );
    }

    #[test]
    fn remove_random_never_shrinks_below_five() {
        let operator = RemoveRandom {
            remove_at_least: 5,
            remove_at_most: 5,
            min_length_for_operator: 10,
        };
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([13; 32]);
        // removing 5 from 10 would go below the floor after the 5th removal
        let mutated = operator.apply(&representation, &road(10), &mut rng).unwrap();
        assert_eq!(mutated.len(), 5);

        let mutated = operator.apply(&representation, &road(20), &mut rng).unwrap();
        assert_eq!(mutated.len(), 15);
    }

    #[test]
    fn add_back_extends_through_the_representation() {
        let operator = AddBack::default();
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([14; 32]);
        let test = road(10);
        let mutated = operator.apply(&representation, &test, &mut rng).unwrap();
        let added = mutated.len() - test.len();
        assert!((1..=5).contains(&added));
        assert_eq!(mutated[..test.len()], test[..]);
        // appended values respect the representation's bounds
        assert!(representation.is_valid(&mutated[test.len() - 1..]));
    }

    #[test]
    fn replace_random_keeps_length() {
        let operator = ReplaceRandom::default();
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([15; 32]);
        let test = road(10);
        let mutated = operator.apply(&representation, &test, &mut rng).unwrap();
        assert_eq!(mutated.len(), test.len());
        assert_ne!(mutated, test);
    }

    #[test]
    fn alter_values_never_returns_the_input() {
        let operator = AlterValues::default();
        let representation = representation();
        for seed in 0..1000u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let test = road(8);
            let mutated = operator.apply(&representation, &test, &mut rng).unwrap();
            assert_ne!(mutated, test, "identity mutation with seed {seed}");
            assert_eq!(mutated.len(), test.len());
        }
    }

    #[test]
    fn alter_values_rejects_empty_and_unalterable_roads() {
        let operator = AlterValues::default();
        let representation = representation();
        let mut rng = ChaCha8Rng::from_seed([16; 32]);
        assert!(operator.apply(&representation, &[], &mut rng).is_err());
        // all-zero roads can never change under multiplicative alteration
        assert!(operator.apply(&representation, &[0.0; 8], &mut rng).is_err());
    }

    #[test]
    fn reverse_road_reverses() {
        let mut rng = ChaCha8Rng::from_seed([17; 32]);
        let mutated = ReverseRoad
            .apply(&representation(), &[1.0, 2.0, 3.0], &mut rng)
            .unwrap();
        assert_eq!(mutated, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn split_and_swap_exchanges_halves() {
        let mut rng = ChaCha8Rng::from_seed([18; 32]);
        let mutated = SplitAndSwap
            .apply(&representation(), &[1.0, 2.0, 3.0, 4.0, 5.0], &mut rng)
            .unwrap();
        assert_eq!(mutated, vec![3.0, 4.0, 5.0, 1.0, 2.0]);
    }

    #[test]
    fn flip_signs_negates_every_value() {
        let mut rng = ChaCha8Rng::from_seed([19; 32]);
        let mutated = FlipSigns
            .apply(&representation(), &[0.01, -0.02, 0.0], &mut rng)
            .unwrap();
        assert_eq!(mutated, vec![-0.01, 0.02, 0.0]);
    }

    #[test]
    fn road_mutator_dispatches_on_outcome() {
        let mutator: RoadMutator<f64> = RoadMutator::standard();

        let (set, stop) = mutator.plan_for(Outcome::Pass).unwrap();
        assert_eq!(set.get_all().len(), 6);
        assert!(!stop);

        let (set, stop) = mutator.plan_for(Outcome::Fail).unwrap();
        assert_eq!(set.get_all().len(), 3);
        assert!(stop);

        assert!(mutator.plan_for(Outcome::Error).is_none());
        assert!(mutator.plan_for(Outcome::Invalid).is_none());
    }

    #[test]
    fn road_mutator_without_exploiters_skips_fail_parents() {
        let mutator: RoadMutator<f64> =
            RoadMutator::new(OperatorSet::standard_mutation(), OperatorSet::new(vec![]));
        assert!(mutator.plan_for(Outcome::Pass).is_some());
        assert!(mutator.plan_for(Outcome::Fail).is_none());
    }
}

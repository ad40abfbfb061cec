use rand::Rng;
use rand_core::RngCore;
use serde::Serialize;

/// An element of a road encoding. The engine treats roads as opaque ordered
/// sequences of these; only the operators that scale or negate values need
/// to look inside, which they do through this trait.
pub trait RoadElement:
    Clone + PartialEq + std::fmt::Debug + Serialize + Send + Sync + 'static
{
    /// Multiply each numeric component by an independently drawn factor in
    /// `factor_low..factor_high`, each with probability `chance`.
    /// Returns `None` if no component was actually altered.
    fn alter(
        &self,
        rng: &mut dyn RngCore,
        chance: f64,
        factor_low: f64,
        factor_high: f64,
    ) -> Option<Self>;

    /// Negate the curvature component, mirroring the road across the lane axis.
    fn flip_sign(&self) -> Self;
}

/// Plain curvature value.
impl RoadElement for f64 {
    fn alter(
        &self,
        rng: &mut dyn RngCore,
        chance: f64,
        factor_low: f64,
        factor_high: f64,
    ) -> Option<Self> {
        if rng.random::<f64>() < chance {
            Some(self * rng.random_range(factor_low..factor_high))
        } else {
            None
        }
    }

    fn flip_sign(&self) -> Self {
        -self
    }
}

/// Curvature paired with a per-segment step length. Only the curvature is
/// sign-flipped; the step length must stay positive.
impl RoadElement for (f64, f64) {
    fn alter(
        &self,
        rng: &mut dyn RngCore,
        chance: f64,
        factor_low: f64,
        factor_high: f64,
    ) -> Option<Self> {
        let mut changed = false;
        let kappa = if rng.random::<f64>() < chance {
            changed = true;
            self.0 * rng.random_range(factor_low..factor_high)
        } else {
            self.0
        };
        let step = if rng.random::<f64>() < chance {
            changed = true;
            self.1 * rng.random_range(factor_low..factor_high)
        } else {
            self.1
        };
        changed.then_some((kappa, step))
    }

    fn flip_sign(&self) -> Self {
        (-self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    #[test]
    fn f64_flip_sign_negates() {
        assert_eq!(RoadElement::flip_sign(&0.05), -0.05);
        assert_eq!(RoadElement::flip_sign(&-0.02), 0.02);
    }

    #[test]
    fn pair_flip_sign_keeps_step() {
        assert_eq!((0.05, 10.0).flip_sign(), (-0.05, 10.0));
    }

    #[test]
    fn alter_with_zero_chance_never_changes() {
        let mut rng = ChaCha8Rng::from_seed([7; 32]);
        for _ in 0..50 {
            assert!(0.03f64.alter(&mut rng, 0.0, 0.9, 1.1).is_none());
            assert!((0.03, 10.0).alter(&mut rng, 0.0, 0.9, 1.1).is_none());
        }
    }

    #[test]
    fn alter_with_full_chance_always_changes() {
        let mut rng = ChaCha8Rng::from_seed([8; 32]);
        for _ in 0..50 {
            let altered = 0.03f64.alter(&mut rng, 1.0, 0.9, 1.1).unwrap();
            assert_ne!(altered, 0.03);
            assert!((altered / 0.03) >= 0.9 && (altered / 0.03) < 1.1);
        }
    }
}

use crate::road::RoadElement;
use rand::Rng;
use rand_core::RngCore;
use std::f64::consts::FRAC_PI_2;

/// How roads are encoded, generated, validated and mapped to world
/// coordinates. The search engine only talks to roads through this trait.
pub trait RoadRepresentation<E: RoadElement>: Send + Sync {
    /// Produces a fresh random road. Must return a valid road; the engine
    /// treats an invalid result as a contract violation and fails fast.
    fn generate(&self, rng: &mut dyn RngCore) -> Vec<E>;

    /// Produces one new element consistent with the given prefix. Used by
    /// the operators that append or replace elements.
    fn get_value(&self, previous: &[E], rng: &mut dyn RngCore) -> E;

    /// Maps the road into Cartesian `(x, y)` points.
    fn to_cartesian(&self, test: &[E]) -> Vec<(f64, f64)>;

    fn is_valid(&self, _test: &[E]) -> bool {
        true
    }

    /// Best-effort repair; the result may still be invalid.
    fn fix(&self, test: Vec<E>) -> Vec<E> {
        test
    }
}

/// Trapezoidal integration of curvature values into Cartesian points,
/// starting at the origin heading along the positive y axis.
pub fn frenet_to_cartesian(arc_lengths: &[f64], kappas: &[f64]) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(kappas.len());
    if kappas.is_empty() {
        return points;
    }
    let (mut x, mut y, mut theta) = (0.0f64, 0.0f64, FRAC_PI_2);
    points.push((x, y));
    for i in 0..kappas.len() - 1 {
        let half_step = (arc_lengths[i + 1] - arc_lengths[i]) / 2.0;
        let next_theta = theta + (kappas[i + 1] + kappas[i]) * half_step;
        x += (next_theta.cos() + theta.cos()) * half_step;
        y += (next_theta.sin() + theta.sin()) * half_step;
        theta = next_theta;
        points.push((x, y));
    }
    points
}

/// Curvature-sequence road representation with a fixed arc-length step
/// between consecutive values.
///
/// Curvatures are bounded globally (maximum turn sharpness) and locally
/// (maximum change between neighbouring values), which keeps generated
/// roads drivable in principle.
#[derive(Debug, Clone)]
pub struct FixStepKappaRepresentation {
    pub length: usize,
    pub variation: usize,
    pub step: f64,
    pub global_bound: f64,
    pub local_bound: f64,
}

impl FixStepKappaRepresentation {
    pub fn new(length: usize, variation: usize, step: f64) -> Self {
        Self {
            length,
            variation,
            step,
            global_bound: 0.0698,
            local_bound: 0.05,
        }
    }

    fn target_length(&self, rng: &mut dyn RngCore) -> usize {
        if self.variation == 0 {
            return self.length;
        }
        let variation = self.variation as i64;
        let offset = rng.random_range(-variation..=variation);
        (self.length as i64 + offset).max(1) as usize
    }

    fn next_kappa(&self, last_kappa: f64, rng: &mut dyn RngCore) -> f64 {
        let low = (-self.global_bound).max(last_kappa - self.local_bound);
        let high = self.global_bound.min(last_kappa + self.local_bound);
        rng.random_range(low..high)
    }
}

impl RoadRepresentation<f64> for FixStepKappaRepresentation {
    fn generate(&self, rng: &mut dyn RngCore) -> Vec<f64> {
        let target = self.target_length(rng);
        let mut test = vec![self.get_value(&[], rng)];
        while test.len() < target {
            test.push(self.get_value(&test, rng));
        }
        test
    }

    fn get_value(&self, previous: &[f64], rng: &mut dyn RngCore) -> f64 {
        let last_kappa = previous.last().copied().unwrap_or(0.0);
        self.next_kappa(last_kappa, rng)
    }

    fn to_cartesian(&self, test: &[f64]) -> Vec<(f64, f64)> {
        let arc_lengths: Vec<f64> = (0..test.len()).map(|i| i as f64 * self.step).collect();
        frenet_to_cartesian(&arc_lengths, test)
    }

    fn is_valid(&self, test: &[f64]) -> bool {
        if test.iter().any(|kappa| kappa.abs() > self.global_bound) {
            return false;
        }
        test.windows(2)
            .all(|pair| (pair[1] - pair[0]).abs() <= self.local_bound)
    }

    fn fix(&self, mut test: Vec<f64>) -> Vec<f64> {
        if test.is_empty() {
            return test;
        }
        test[0] = test[0].clamp(-self.global_bound, self.global_bound);
        for i in 1..test.len() {
            let previous = test[i - 1];
            let low = (-self.global_bound).max(previous - self.local_bound);
            let high = self.global_bound.min(previous + self.local_bound);
            test[i] = test[i].clamp(low, high);
        }
        test
    }
}

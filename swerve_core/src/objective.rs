use crate::history::{History, Outcome};
use crate::road::RoadElement;
use log::info;
use serde::Deserialize;

/// Whether the search drives the objective feature up or down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    #[default]
    Maximize,
    Minimize,
}

/// Ranks and filters execution records by a single numeric feature.
///
/// The objective owns the feature's column name, the optimization direction,
/// and an optional threshold that gates which records may become parents.
/// With a dynamic threshold quantile configured, the threshold is
/// recalculated after each search round and only ever moves in the more
/// selective direction: up when maximizing, down when minimizing.
#[derive(Debug, Clone)]
pub struct Objective {
    feature: String,
    direction: Direction,
    threshold: Option<f64>,
    dynamic_threshold_quantile: Option<f64>,
}

impl Objective {
    pub fn new(feature: impl Into<String>, direction: Direction) -> Self {
        Self {
            feature: feature.into(),
            direction,
            threshold: None,
            dynamic_threshold_quantile: None,
        }
    }

    pub fn maximize(feature: impl Into<String>) -> Self {
        Self::new(feature, Direction::Maximize)
    }

    pub fn minimize(feature: impl Into<String>) -> Self {
        Self::new(feature, Direction::Minimize)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_dynamic_threshold_quantile(mut self, quantile: f64) -> Self {
        self.dynamic_threshold_quantile = Some(quantile);
        self
    }

    /// The history/export column this objective optimizes.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Whether `value` survives the threshold filter. Without a threshold
    /// every value passes; otherwise values must be at least (maximize) or
    /// at most (minimize) the threshold.
    pub fn passes_threshold(&self, value: f64) -> bool {
        match self.threshold {
            None => true,
            Some(threshold) => match self.direction {
                Direction::Maximize => value >= threshold,
                Direction::Minimize => value <= threshold,
            },
        }
    }

    /// Whether `candidate` is strictly better than `incumbent`. Strict
    /// comparison keeps selection stable: among ties, the first record in
    /// iteration order wins.
    pub fn is_improvement(&self, candidate: f64, incumbent: f64) -> bool {
        match self.direction {
            Direction::Maximize => candidate > incumbent,
            Direction::Minimize => candidate < incumbent,
        }
    }

    /// Picks the index with the best feature value from `(index, value)`
    /// pairs. Returns `None` for an empty selection. Ties are broken by
    /// iteration order (first encountered wins).
    pub fn best_of(&self, selection: impl IntoIterator<Item = (usize, f64)>) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, value) in selection {
            match best {
                Some((_, incumbent)) if !self.is_improvement(value, incumbent) => {}
                _ => best = Some((index, value)),
            }
        }
        best.map(|(index, _)| index)
    }

    /// Recomputes the threshold as the configured quantile of the feature
    /// over executed PASS and FAIL records. The threshold is only replaced
    /// when the new value is more restrictive than the current one, so over
    /// a run it tightens monotonically and never loosens.
    pub fn recalculate_dynamic_threshold<E: RoadElement>(&mut self, history: &History<E>) {
        let Some(quantile) = self.dynamic_threshold_quantile else {
            return;
        };
        let mut values: Vec<f64> = history
            .iter()
            .filter(|record| matches!(record.outcome, Some(Outcome::Pass | Outcome::Fail)))
            .filter_map(|record| record.feature)
            .collect();
        let Some(new_value) = quantile_of(&mut values, quantile) else {
            return;
        };
        let tightens = match self.threshold {
            None => true,
            Some(current) => self.is_improvement(new_value, current),
        };
        if tightens {
            info!(
                "objective threshold updated from {:?} to {new_value}",
                self.threshold
            );
            self.threshold = Some(new_value);
        }
    }
}

/// Linearly interpolated quantile of `values`; `None` when empty.
fn quantile_of(values: &mut [f64], quantile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("feature values must be comparable"));
    let position = quantile.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    if below == above {
        return Some(values[below]);
    }
    let weight = position - below as f64;
    Some(values[below] * (1.0 - weight) + values[above] * weight)
}

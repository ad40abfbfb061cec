use crate::crossovers::RandomCrossover;
use crate::objective::{Direction, Objective};
use crate::representation::FixStepKappaRepresentation;
use crate::road::RoadElement;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SearchSettings {
    #[serde(default = "default_n_total")]
    pub n_total: u64,
    #[serde(default = "default_n_random")]
    pub n_random: u64,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub results_path: Option<PathBuf>,
}

pub fn default_n_total() -> u64 {
    200
}
pub fn default_n_random() -> u64 {
    40
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            n_total: default_n_total(),
            n_random: default_n_random(),
            seed: None,
            results_path: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ObjectiveSettings {
    #[serde(default = "default_feature")]
    pub feature: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub dynamic_threshold_quantile: Option<f64>,
}

fn default_feature() -> String {
    "distance_from_center".to_string()
}

impl Default for ObjectiveSettings {
    fn default() -> Self {
        Self {
            feature: default_feature(),
            direction: Direction::Maximize,
            threshold: None,
            dynamic_threshold_quantile: None,
        }
    }
}

impl ObjectiveSettings {
    pub fn build(&self) -> Objective {
        let mut objective = Objective::new(self.feature.clone(), self.direction);
        if let Some(threshold) = self.threshold {
            objective = objective.with_threshold(threshold);
        }
        if let Some(quantile) = self.dynamic_threshold_quantile {
            objective = objective.with_dynamic_threshold_quantile(quantile);
        }
        objective
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RepresentationSettings {
    #[serde(default = "default_length")]
    pub length: usize,
    #[serde(default = "default_variation")]
    pub variation: usize,
    #[serde(default = "default_step")]
    pub step: f64,
}

fn default_length() -> usize {
    20
}
fn default_variation() -> usize {
    5
}
fn default_step() -> f64 {
    10.0
}

impl Default for RepresentationSettings {
    fn default() -> Self {
        Self {
            length: default_length(),
            variation: default_variation(),
            step: default_step(),
        }
    }
}

impl RepresentationSettings {
    pub fn build(&self) -> FixStepKappaRepresentation {
        FixStepKappaRepresentation::new(self.length, self.variation, self.step)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct CrossoverSettings {
    #[serde(default = "default_crossover_size")]
    pub size: usize,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_crossover_size() -> usize {
    20
}
fn default_similarity_threshold() -> f64 {
    0.95
}

impl Default for CrossoverSettings {
    fn default() -> Self {
        Self {
            size: default_crossover_size(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

impl CrossoverSettings {
    pub fn build<E: RoadElement>(&self) -> RandomCrossover<E> {
        RandomCrossover::standard()
            .with_size(self.size)
            .with_similarity_threshold(self.similarity_threshold)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SwerveConfig {
    #[serde(default)]
    pub search: Option<SearchSettings>,
    #[serde(default)]
    pub objective: Option<ObjectiveSettings>,
    #[serde(default)]
    pub representation: Option<RepresentationSettings>,
    #[serde(default)]
    pub crossover: Option<CrossoverSettings>,
}

impl SwerveConfig {
    pub fn load_from_file(path: &PathBuf) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        let config: SwerveConfig = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config: SwerveConfig = toml::from_str(
            r#"
            [search]
            n-total = 100
            n-random = 20
            seed = 7

            [objective]
            feature = "max_oob_percentage"
            direction = "minimize"
            threshold = 0.5
            dynamic-threshold-quantile = 0.75

            [representation]
            length = 30
            variation = 0
            step = 5.0

            [crossover]
            size = 10
            similarity-threshold = 0.9
            "#,
        )
        .unwrap();

        let search = config.search.unwrap();
        assert_eq!(search.n_total, 100);
        assert_eq!(search.seed, Some(7));

        let objective = config.objective.unwrap().build();
        assert_eq!(objective.feature(), "max_oob_percentage");
        assert_eq!(objective.direction(), Direction::Minimize);
        assert_eq!(objective.threshold(), Some(0.5));

        assert_eq!(config.representation.unwrap().length, 30);
        assert_eq!(config.crossover.unwrap().size, 10);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: SwerveConfig = toml::from_str("").unwrap();
        assert!(config.search.is_none());
        assert_eq!(SearchSettings::default().n_total, 200);
        assert_eq!(ObjectiveSettings::default().feature, "distance_from_center");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<SwerveConfig, _> = toml::from_str(
            r#"
            [search]
            n-total = 100
            typo-field = 1
            "#,
        );
        assert!(result.is_err());
    }
}

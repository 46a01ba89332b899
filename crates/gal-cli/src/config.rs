use std::{num::NonZeroUsize, path::Path, thread};

use anyhow::Context as _;
use gal_automaton::AutomatonParams;
use gal_evaluator::FitnessParams;
use gal_search::{cellular::CellularSearchParams, genetic::FlatSearchParams};
use serde::{Deserialize, Serialize};

use crate::util;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Toroidal grid with neighborhood mating
    #[default]
    Cellular,
    /// Globally ranked population with discard/replace
    Flat,
}

/// Learner configuration, read from a JSON file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct LearnerConfig {
    pub engine: EngineKind,
    pub side: usize,
    pub cross_over_probability: f64,
    pub population_size: usize,
    pub discard_percent: f64,
    pub mutate_percent: f64,
    pub initial_mutation: usize,
    pub generations: usize,
    pub seed: u64,
    /// Defaults to the available parallelism.
    pub workers: Option<usize>,
    pub new_instance_min: usize,
    pub new_instance_max: usize,
    pub offset_minus: i32,
    pub offset_plus: i32,
    pub use_targeted_mutations: bool,
    pub no_transition_probability: f64,
    pub lower_state_probability: f64,
    pub weight_consistency: f64,
    pub weight_size: f64,
    pub weight_generalization: f64,
    pub target_size_multiplier: f64,
    pub generalization_limit: f64,
    pub generalization_m1: f64,
    pub generalization_m2: f64,
    pub generalization_max: f64,
    pub size_max: f64,
    pub dump_best_per_generation: bool,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        let automaton = AutomatonParams::default();
        let fitness = FitnessParams::default();
        let flat = FlatSearchParams::default();
        let cellular = CellularSearchParams::default();
        Self {
            engine: EngineKind::default(),
            side: cellular.side,
            cross_over_probability: cellular.cross_over_probability,
            population_size: flat.population_size,
            discard_percent: flat.discard_percent,
            mutate_percent: flat.mutate_percent,
            initial_mutation: 0,
            generations: 10_000,
            seed: 1234,
            workers: None,
            new_instance_min: automaton.new_instance_min,
            new_instance_max: automaton.new_instance_max,
            offset_minus: automaton.offset_minus,
            offset_plus: automaton.offset_plus,
            use_targeted_mutations: automaton.targeted_mutations,
            no_transition_probability: automaton.no_transition_probability,
            lower_state_probability: automaton.lower_state_probability,
            weight_consistency: fitness.weight_consistency,
            weight_size: fitness.weight_size,
            weight_generalization: fitness.weight_generalization,
            target_size_multiplier: fitness.target_size_multiplier,
            generalization_limit: fitness.generalization_limit,
            generalization_m1: fitness.generalization_m1,
            generalization_m2: fitness.generalization_m2,
            generalization_max: fitness.generalization_max,
            size_max: fitness.size_max,
            dump_best_per_generation: false,
        }
    }
}

impl LearnerConfig {
    /// Reads the configuration file, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => util::read_json_file("config", path)?,
            None => Self::default(),
        };
        Ok(config)
    }

    /// Checks every parameter group before any generation runs.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.automaton_params()
            .validate()
            .context("Invalid automaton parameters")?;
        self.fitness_params()
            .validate()
            .context("Invalid fitness parameters")?;
        match self.engine {
            EngineKind::Cellular => self
                .cellular_params()
                .validate()
                .context("Invalid cellular search parameters")?,
            EngineKind::Flat => self
                .flat_params()
                .validate()
                .context("Invalid flat search parameters")?,
        }
        if self.workers == Some(0) {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }

    pub fn automaton_params(&self) -> AutomatonParams {
        AutomatonParams {
            new_instance_min: self.new_instance_min,
            new_instance_max: self.new_instance_max,
            offset_minus: self.offset_minus,
            offset_plus: self.offset_plus,
            targeted_mutations: self.use_targeted_mutations,
            no_transition_probability: self.no_transition_probability,
            lower_state_probability: self.lower_state_probability,
        }
    }

    pub fn fitness_params(&self) -> FitnessParams {
        FitnessParams {
            weight_consistency: self.weight_consistency,
            weight_size: self.weight_size,
            weight_generalization: self.weight_generalization,
            target_size_multiplier: self.target_size_multiplier,
            generalization_limit: self.generalization_limit,
            generalization_m1: self.generalization_m1,
            generalization_m2: self.generalization_m2,
            generalization_max: self.generalization_max,
            size_max: self.size_max,
        }
    }

    pub fn flat_params(&self) -> FlatSearchParams {
        FlatSearchParams {
            population_size: self.population_size,
            discard_percent: self.discard_percent,
            mutate_percent: self.mutate_percent,
        }
    }

    pub fn cellular_params(&self) -> CellularSearchParams {
        CellularSearchParams {
            side: self.side,
            cross_over_probability: self.cross_over_probability,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let config: LearnerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LearnerConfig::default());
        assert_eq!(config.engine, EngineKind::Cellular);
        assert_eq!(config.side, 200);
        assert_eq!(config.generations, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_camel_case_keys() {
        let config: LearnerConfig = serde_json::from_str(
            r#"{
                "engine": "flat",
                "populationSize": 50,
                "noTransitionProbability": 0.1,
                "generalizationM2": 0.5,
                "useTargetedMutations": true,
                "workers": 3
            }"#,
        )
        .unwrap();
        assert_eq!(config.engine, EngineKind::Flat);
        assert_eq!(config.flat_params().population_size, 50);
        assert!((config.automaton_params().no_transition_probability - 0.1).abs() < 1e-12);
        assert!((config.fitness_params().generalization_m2 - 0.5).abs() < 1e-12);
        assert!(config.automaton_params().targeted_mutations);
        assert_eq!(config.worker_count(), 3);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = serde_json::from_str::<LearnerConfig>(r#"{"populationSise": 10}"#).unwrap_err();
        assert!(err.to_string().contains("populationSise"));
    }

    #[test]
    fn test_validate_reports_group() {
        let config = LearnerConfig {
            lower_state_probability: 2.0,
            ..LearnerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("lowerStateProbability"));

        let config = LearnerConfig {
            engine: EngineKind::Cellular,
            side: 0,
            ..LearnerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LearnerConfig {
            workers: Some(0),
            ..LearnerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_params_match_libraries() {
        let config = LearnerConfig::default();
        assert_eq!(config.automaton_params(), AutomatonParams::default());
        assert_eq!(config.fitness_params(), FitnessParams::default());
        assert_eq!(config.flat_params(), FlatSearchParams::default());
        assert_eq!(config.cellular_params(), CellularSearchParams::default());
    }
}

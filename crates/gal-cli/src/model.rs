use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use gal_automaton::{Alphabet, Automaton, AutomatonContext, AutomatonRecord};
use gal_search::instance::Instance as _;
use serde::{Deserialize, Serialize};

use crate::config::EngineKind;

/// Best automaton of a finished run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LearnedModel {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub generations: usize,
    pub final_fitness: f64,
    pub alphabet: Alphabet,
    pub automaton: AutomatonRecord,
}

impl LearnedModel {
    pub fn new(name: String, generations: usize, automaton: &Automaton) -> Self {
        Self {
            name,
            trained_at: Utc::now(),
            generations,
            final_fitness: automaton.fitness(),
            alphabet: automaton.alphabet().clone(),
            automaton: automaton.to_record(),
        }
    }

    pub fn to_automaton(&self, context: Arc<AutomatonContext>) -> anyhow::Result<Automaton> {
        Automaton::from_record(context, &self.automaton)
            .with_context(|| format!("Invalid automaton in model {}", self.name))
    }
}

/// Whole population of a run, in engine order, for resuming or inspection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PopulationSnapshot {
    pub engine: EngineKind,
    pub generation: usize,
    pub alphabet: Alphabet,
    pub population: Vec<AutomatonRecord>,
}

impl PopulationSnapshot {
    pub fn new(
        engine: EngineKind,
        generation: usize,
        alphabet: &Alphabet,
        population: &[Automaton],
    ) -> Self {
        Self {
            engine,
            generation,
            alphabet: alphabet.clone(),
            population: population.iter().map(Automaton::to_record).collect(),
        }
    }

    pub fn to_population(
        &self,
        context: &Arc<AutomatonContext>,
    ) -> anyhow::Result<Vec<Automaton>> {
        self.population
            .iter()
            .enumerate()
            .map(|(i, record)| {
                Automaton::from_record(Arc::clone(context), record)
                    .with_context(|| format!("Invalid automaton #{i} in population snapshot"))
            })
            .collect()
    }
}

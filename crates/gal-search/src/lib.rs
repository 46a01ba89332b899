//! Population-based stochastic search with asynchronous fitness evaluation.
//!
//! This crate is independent of any particular candidate representation. Candidates
//! implement the [`Instance`](instance::Instance) capability trait, and the engines
//! only ever use that interface.
//!
//! # Architecture
//!
//! ```text
//! SearchEngine (GeneticSearch | CellularSearch)
//!     ↓ submits unscored instances
//! Scorer + GenerationBarrier (pending-task map, waits until empty)
//!     ↓ schedule(id, instance)
//! FitnessService (worker threads)
//!     ↓ FitnessFunction::compute
//! ComputationEvent { id, fitness, instance }
//!     ↓ back to the barrier
//! rank / replace, next generation
//! ```
//!
//! # Engines
//!
//! - [`genetic::GeneticSearch`] - globally ranked population with discard/replace
//!   reproduction
//! - [`cellular::CellularSearch`] - toroidal grid with Moore-neighborhood mating and
//!   per-cell elitist replacement
//!
//! Both engines own a seeded PCG generator and consume randomness only on the calling
//! thread, so a fixed seed reproduces a run regardless of worker scheduling.
//!
//! # Concurrency
//!
//! Engine logic is single-threaded. The only suspension points are the generation
//! barrier (until every submitted computation has reported back) and each worker's
//! queue wait (until a task arrives or the [`StopToken`](service::StopToken) is
//! cancelled). A stalled worker stalls the generation; there are no timeouts.

pub mod barrier;
pub mod cellular;
pub mod genetic;
pub mod instance;
pub mod service;
pub mod stats;

#[cfg(test)]
mod test_instance;

use self::instance::{Instance, UNSCORED};

/// Common interface of the search engines.
pub trait SearchEngine<I>
where
    I: Instance,
{
    /// Runs one generation.
    fn step(&mut self);

    /// Number of completed generations.
    fn generation(&self) -> usize;

    fn best_instance(&self) -> Option<&I>;

    /// Fitness of the best instance, or [`UNSCORED`] before the population exists.
    fn best_fitness(&self) -> f64 {
        self.best_instance().map_or(UNSCORED, Instance::fitness)
    }

    fn population(&self) -> &[I];

    /// The `rank` fittest instances, best first.
    fn top_rank(&self, rank: usize) -> Vec<&I>;
}

/// Invalid search parameters or initial population.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParamsError {
    #[display("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
    #[display(
        "population of {population} keeps only {survivors} survivors per generation, at least 2 are needed"
    )]
    TooFewSurvivors { population: usize, survivors: usize },
    #[display("grid side must be positive")]
    EmptyGrid,
    #[display("population has {actual} instances, expected {expected}")]
    PopulationSize { expected: usize, actual: usize },
}

pub(crate) fn check_unit_interval(name: &'static str, value: f64) -> Result<(), ParamsError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange { name, value })
    }
}

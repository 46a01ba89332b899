//! Flat genetic search over a globally ranked population.
//!
//! # Generation cycle
//!
//! 1. **Discard** - remove `discard_percent` of the population, biased toward the very
//!    lowest ranks (a random rank inside a window anchored at the bottom that widens
//!    after every pick)
//! 2. **Mutate** - refill `mutate_percent` of the vacated slots with mutated clones of
//!    top-biased survivors, retrying until the mutation actually changed something
//! 3. **Cross over** - fill the remaining slots with children of two distinct,
//!    top-biased survivors, inheriting genes in proportion to parent fitness
//! 4. **Score** - submit the new instances to the fitness service and wait on the
//!    generation barrier
//! 5. **Rank** - sort the population by fitness, best first
//!
//! Survivors keep their cached fitness, so only the refilled slots cost a fitness
//! computation.

use std::fmt::{self, Write as _};

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::{
    ParamsError, SearchEngine,
    barrier::Scorer,
    check_unit_interval,
    instance::{self, Instance, InstanceFactory},
    service::FitnessScheduler,
};

/// Upper bound on clone-and-mutate attempts for a single refill slot.
const MAX_MUTATION_ATTEMPTS: usize = 1000;

/// Parameters of the flat genetic search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatSearchParams {
    /// Total population size, fixed for the whole run.
    pub population_size: usize,
    /// Fraction of the population replaced each generation.
    pub discard_percent: f64,
    /// Fraction of the replacements produced by mutation (the rest by crossover).
    pub mutate_percent: f64,
}

impl Default for FlatSearchParams {
    fn default() -> Self {
        Self {
            population_size: 2000,
            discard_percent: 0.25,
            mutate_percent: 0.4,
        }
    }
}

impl FlatSearchParams {
    /// Number of instances discarded (and refilled) per generation.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    #[must_use]
    pub fn discard_count(&self) -> usize {
        (self.population_size as f64 * self.discard_percent) as usize
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        check_unit_interval("discardPercent", self.discard_percent)?;
        check_unit_interval("mutatePercent", self.mutate_percent)?;
        let survivors = self.population_size - self.discard_count();
        if survivors < 2 {
            return Err(ParamsError::TooFewSurvivors {
                population: self.population_size,
                survivors,
            });
        }
        Ok(())
    }
}

/// Genetic search with global ranking and discard/replace reproduction.
pub struct GeneticSearch<I>
where
    I: Instance,
{
    params: FlatSearchParams,
    /// Sorted by fitness, best first.
    population: Vec<I>,
    scorer: Scorer<I>,
    rng: Pcg32,
    generation: usize,
}

impl<I> fmt::Debug for GeneticSearch<I>
where
    I: Instance,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneticSearch")
            .field("params", &self.params)
            .field("population", &self.population.len())
            .field("generation", &self.generation)
            .field("best_fitness", &self.best_fitness())
            .finish_non_exhaustive()
    }
}

impl<I> GeneticSearch<I>
where
    I: Instance,
{
    pub fn new(
        scheduler: FitnessScheduler<I>,
        params: FlatSearchParams,
        seed: u64,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            params,
            population: vec![],
            scorer: Scorer::new(scheduler),
            rng: Pcg32::seed_from_u64(seed),
            generation: 0,
        })
    }

    #[must_use]
    pub fn params(&self) -> &FlatSearchParams {
        &self.params
    }

    /// Fills the population with fresh instances, scores and ranks them.
    ///
    /// Each new instance first receives `initial_mutation` rounds of grow + shuffle
    /// mutations.
    pub fn start_population<F>(&mut self, factory: &F, initial_mutation: usize)
    where
        F: InstanceFactory<I>,
    {
        let population = (0..self.params.population_size)
            .map(|_| {
                let mut instance = factory.new_instance(&mut self.rng);
                for _ in 0..initial_mutation {
                    instance.point_mutation_grow(&mut self.rng);
                    instance.point_mutation_shuffle(&mut self.rng);
                }
                instance
            })
            .collect();
        self.rank(population);
    }

    /// Installs an existing population (for example a resumed snapshot).
    ///
    /// Unscored members are scored before ranking.
    pub fn set_initial_population(&mut self, population: Vec<I>) -> Result<(), ParamsError> {
        if population.len() != self.params.population_size {
            return Err(ParamsError::PopulationSize {
                expected: self.params.population_size,
                actual: population.len(),
            });
        }
        self.rank(population);
        Ok(())
    }

    fn rank(&mut self, population: Vec<I>) {
        self.population = self.scorer.score(population);
        instance::sort_descending(&mut self.population);
        self.dump_population();
    }

    /// Removes `discard_count` instances, favouring the lowest ranks, and returns the
    /// survivors in rank order.
    fn discard(&mut self) -> Vec<I> {
        let population = std::mem::take(&mut self.population);
        let len = population.len();
        let mut pool = population.into_iter().map(Some).collect::<Vec<_>>();

        let mut to_discard = self.params.discard_count();
        let mut window = 1;
        while to_discard > 0 {
            let rank = self.rng.random_range(0..window);
            if pool[len - rank - 1].take().is_some() {
                to_discard -= 1;
            }
            if window < len - 2 {
                window += 1;
            }
        }
        pool.into_iter().flatten().collect()
    }

    /// Clones a top-biased survivor and mutates it until a mutation sticks.
    fn mutated_child(&mut self, survivors: &[I], window: usize) -> I {
        let mut attempts = 0;
        loop {
            let index = self.rng.random_range(0..window);
            let mut child = survivors[index].clone();
            child.point_mutation(&mut self.rng);
            attempts += 1;
            if !child.last_mutation().is_no_mutation() || attempts >= MAX_MUTATION_ATTEMPTS {
                if attempts >= MAX_MUTATION_ATTEMPTS {
                    log::debug!("no effective mutation after {attempts} attempts");
                }
                return child;
            }
        }
    }

    /// Crosses two distinct top-biased survivors.
    fn crossover_child(&mut self, survivors: &[I], window: usize) -> I {
        let first = self.rng.random_range(0..window);
        let mut second = self.rng.random_range(0..window);
        while first == second {
            second = self.rng.random_range(0..window);
        }
        let (a, b) = (&survivors[first], &survivors[second]);
        let preference = instance::fitness_preference(a.fitness(), b.fitness());
        a.cross_over(b, preference, &mut self.rng)
    }

    /// Logs the ranked fitness values, collapsing runs of equal values into `=`.
    pub fn dump_population(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let mut line = String::new();
        let mut last = None;
        for instance in &self.population {
            let fitness = instance.fitness();
            if last == Some(fitness) {
                line.push('=');
            } else {
                if last.is_some() {
                    line.push(' ');
                }
                let _ = write!(line, "{fitness:.3}");
                last = Some(fitness);
            }
        }
        log::debug!("population: {line}");
    }
}

impl<I> SearchEngine<I> for GeneticSearch<I>
where
    I: Instance,
{
    fn step(&mut self) {
        if self.population.is_empty() {
            log::warn!("step called before the population was started");
            return;
        }
        let survivors = self.discard();
        let refill = self.params.population_size - survivors.len();
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let to_mutate = (refill.saturating_sub(1) as f64 * self.params.mutate_percent) as usize;

        let mut children = Vec::with_capacity(refill);
        let mut window = 1;
        while children.len() < to_mutate {
            children.push(self.mutated_child(&survivors, window));
            if window < survivors.len() {
                window += 1;
            }
        }
        let mut window = 2;
        while children.len() < refill {
            children.push(self.crossover_child(&survivors, window));
            if window < survivors.len() {
                window += 1;
            }
        }

        // children fill the vacated top slots from the bottom up
        children.reverse();
        children.extend(survivors);
        self.rank(children);
        self.generation += 1;
    }

    fn generation(&self) -> usize {
        self.generation
    }

    fn best_instance(&self) -> Option<&I> {
        self.population.first()
    }

    fn population(&self) -> &[I] {
        &self.population
    }

    fn top_rank(&self, rank: usize) -> Vec<&I> {
        self.population.iter().take(rank).collect()
    }
}

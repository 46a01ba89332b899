//! Cellular genetic search on a toroidal grid.
//!
//! The population lives on a `side × side` torus. Every cell reproduces with the
//! fittest member of its Moore neighborhood (itself plus the 8 surrounding cells,
//! wrapping at the edges), and the child replaces the cell only if it is at least as
//! fit. Selection pressure is purely local, which keeps distant regions of the grid
//! exploring different solutions for longer than a globally ranked population would.
//!
//! # Generation cycle
//!
//! 1. Score the whole grid (a no-op once every cell carries a fitness)
//! 2. For every cell, pick the best neighbor as mate; clone the cell with probability
//!    `1 - cross_over_probability`, otherwise cross it with the mate; point-mutate the
//!    child
//! 3. Score all children in a second buffer
//! 4. Keep each parent whose fitness is strictly greater than its child's, otherwise
//!    adopt the child
//! 5. Rescan for the best cell

use std::fmt;

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::{
    ParamsError, SearchEngine,
    barrier::Scorer,
    check_unit_interval,
    instance::{self, Instance, InstanceFactory},
    service::FitnessScheduler,
};

/// Number of cells in a Moore neighborhood, the center included.
pub const NEIGHBORHOOD_SIZE: usize = 9;

/// Parameters of the cellular search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellularSearchParams {
    /// Grid side; the population holds `side * side` instances.
    pub side: usize,
    /// Probability of producing a child by crossover instead of cloning.
    pub cross_over_probability: f64,
}

impl Default for CellularSearchParams {
    fn default() -> Self {
        Self {
            side: 200,
            cross_over_probability: 0.7,
        }
    }
}

impl CellularSearchParams {
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.side * self.side
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.side == 0 {
            return Err(ParamsError::EmptyGrid);
        }
        check_unit_interval("crossOverProbability", self.cross_over_probability)
    }
}

/// Toroidal grid geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Torus {
    side: usize,
}

impl Torus {
    #[must_use]
    pub fn new(side: usize) -> Self {
        Self { side }
    }

    /// Grid coordinates `(x, y)` of a cell index.
    #[must_use]
    pub fn coordinates(&self, index: usize) -> (usize, usize) {
        (index / self.side, index % self.side)
    }

    #[must_use]
    pub fn index(&self, x: usize, y: usize) -> usize {
        (x % self.side) * self.side + y % self.side
    }

    /// Moore neighborhood of `index`, starting with the cell itself.
    #[must_use]
    pub fn neighborhood(&self, index: usize) -> [usize; NEIGHBORHOOD_SIZE] {
        let side = self.side;
        let (x, y) = self.coordinates(index);
        let (up, down) = (x + 1, side + x - 1);
        let (right, left) = (y + 1, side + y - 1);
        [
            index,
            self.index(x, right),
            self.index(x, left),
            self.index(up, y),
            self.index(up, right),
            self.index(up, left),
            self.index(down, y),
            self.index(down, right),
            self.index(down, left),
        ]
    }
}

/// Index of the fittest member of `neighborhood`; ties go to the later member.
fn select<I>(population: &[I], neighborhood: &[usize]) -> usize
where
    I: Instance,
{
    let mut best = neighborhood[0];
    for &candidate in &neighborhood[1..] {
        if population[candidate].fitness() >= population[best].fitness() {
            best = candidate;
        }
    }
    best
}

/// Cellular genetic search with synchronous, elitist per-cell replacement.
pub struct CellularSearch<I>
where
    I: Instance,
{
    params: CellularSearchParams,
    torus: Torus,
    population: Vec<I>,
    best: Option<usize>,
    scorer: Scorer<I>,
    rng: Pcg32,
    generation: usize,
}

impl<I> fmt::Debug for CellularSearch<I>
where
    I: Instance,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellularSearch")
            .field("params", &self.params)
            .field("generation", &self.generation)
            .field("best_fitness", &self.best_fitness())
            .finish_non_exhaustive()
    }
}

impl<I> CellularSearch<I>
where
    I: Instance,
{
    pub fn new(
        scheduler: FitnessScheduler<I>,
        params: CellularSearchParams,
        seed: u64,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        Ok(Self {
            params,
            torus: Torus::new(params.side),
            population: vec![],
            best: None,
            scorer: Scorer::new(scheduler),
            rng: Pcg32::seed_from_u64(seed),
            generation: 0,
        })
    }

    #[must_use]
    pub fn params(&self) -> &CellularSearchParams {
        &self.params
    }

    #[must_use]
    pub fn torus(&self) -> Torus {
        self.torus
    }

    /// Fills the grid with fresh instances and scores them.
    pub fn start_population<F>(&mut self, factory: &F)
    where
        F: InstanceFactory<I>,
    {
        let population = (0..self.params.population_size())
            .map(|_| factory.new_instance(&mut self.rng))
            .collect();
        self.install(population);
    }

    /// Installs an existing grid (row-major) and scores unscored cells.
    pub fn set_initial_population(&mut self, population: Vec<I>) -> Result<(), ParamsError> {
        if population.len() != self.params.population_size() {
            return Err(ParamsError::PopulationSize {
                expected: self.params.population_size(),
                actual: population.len(),
            });
        }
        self.install(population);
        Ok(())
    }

    fn install(&mut self, population: Vec<I>) {
        self.population = self.scorer.score(population);
        self.update_best();
        self.dump_population();
    }

    fn update_best(&mut self) {
        let mut best: Option<usize> = None;
        for (index, instance) in self.population.iter().enumerate() {
            if best.is_none_or(|b| instance.fitness() > self.population[b].fitness()) {
                best = Some(index);
            }
        }
        self.best = best;
    }

    /// Produces the child of every cell.
    fn reproduce(&mut self) -> Vec<I> {
        let population = &self.population;
        let rng = &mut self.rng;
        let torus = self.torus;
        let cross_over_probability = self.params.cross_over_probability;
        (0..population.len())
            .map(|index| {
                let parent = &population[index];
                let mate = &population[select(population, &torus.neighborhood(index))];
                let mut child = if rng.random::<f64>() > cross_over_probability {
                    parent.clone()
                } else {
                    let preference = instance::fitness_preference(parent.fitness(), mate.fitness());
                    parent.cross_over(mate, preference, rng)
                };
                child.point_mutation(rng);
                child
            })
            .collect()
    }

    /// Logs the fitness grid, one row per line.
    pub fn dump_population(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for row in self.population.chunks(self.params.side) {
            let line = row
                .iter()
                .map(|instance| format!("{:.3}", instance.fitness()))
                .collect::<Vec<_>>()
                .join(" ");
            log::debug!("{line}");
        }
    }
}

impl<I> SearchEngine<I> for CellularSearch<I>
where
    I: Instance,
{
    fn step(&mut self) {
        if self.population.is_empty() {
            log::warn!("step called before the population was started");
            return;
        }
        let parents = std::mem::take(&mut self.population);
        self.population = self.scorer.score(parents);

        let children = self.reproduce();
        let children = self.scorer.score(children);

        for (parent, child) in self.population.iter_mut().zip(children) {
            if parent.fitness() <= child.fitness() {
                *parent = child;
            }
        }
        self.update_best();
        self.dump_population();
        self.generation += 1;
    }

    fn generation(&self) -> usize {
        self.generation
    }

    fn best_instance(&self) -> Option<&I> {
        self.best.map(|index| &self.population[index])
    }

    fn population(&self) -> &[I] {
        &self.population
    }

    fn top_rank(&self, rank: usize) -> Vec<&I> {
        let mut ranked = self.population.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.compare_fitness(a));
        ranked.truncate(rank);
        ranked
    }
}

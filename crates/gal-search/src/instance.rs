//! Capability interface shared by every candidate representation.
//!
//! The engines in this crate never look inside a candidate. They rank instances by
//! [`Instance::fitness`], reproduce them through [`Instance::point_mutation`] and
//! [`Instance::cross_over`], and hand them to a [`FitnessFunction`] for scoring. A new
//! representation only needs to implement [`Instance`] and [`InstanceFactory`].

use std::cmp::Ordering;

use rand::Rng;

/// Sentinel stored in an instance whose fitness has not been computed yet.
pub const UNSCORED: f64 = f64::NAN;

/// The kind of the last mutation applied to an instance.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, derive_more::IsVariant)]
pub enum MutationKind {
    /// Nothing changed (fresh instance, or a mutation that touched no gene).
    #[default]
    NoMutation,
    /// The instance grew.
    Grow,
    /// The instance shrank.
    Shrink,
    /// Genes were re-rolled in place.
    Shuffle,
}

/// A candidate solution in a genetic search.
///
/// Instances are value-like: [`Clone`] and [`Instance::cross_over`] always produce
/// independent instances, while the mutation operators work in place.
pub trait Instance: Clone + Send + 'static {
    /// Returns the cached fitness, or [`UNSCORED`].
    fn fitness(&self) -> f64;

    /// Stores a computed fitness.
    fn set_fitness(&mut self, fitness: f64);

    /// Returns `true` once a fitness value has been stored.
    fn is_scored(&self) -> bool {
        !self.fitness().is_nan()
    }

    /// Returns the kind of the last mutation applied.
    fn last_mutation(&self) -> MutationKind;

    /// Performs the default point mutation.
    fn point_mutation<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized;

    /// Point mutation that grows the instance.
    fn point_mutation_grow<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.point_mutation(rng);
    }

    /// Point mutation that shrinks the instance.
    fn point_mutation_shrink<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.point_mutation(rng);
    }

    /// Point mutation that reshuffles the instance without changing its size.
    fn point_mutation_shuffle<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.point_mutation(rng);
    }

    /// Crosses this instance with `other`, producing a new child.
    ///
    /// `prefer_this` is the probability of inheriting a gene from `self` where both
    /// parents carry one. Parents are left untouched.
    #[must_use]
    fn cross_over<R>(&self, other: &Self, prefer_this: f64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized;

    /// Orders two instances by fitness (ascending, NaN-safe).
    fn compare_fitness(&self, other: &Self) -> Ordering {
        self.fitness().total_cmp(&other.fitness())
    }
}

/// Creates fresh random instances for an initial population.
pub trait InstanceFactory<I> {
    fn new_instance<R>(&self, rng: &mut R) -> I
    where
        R: Rng + ?Sized;
}

/// Scores one instance.
///
/// Called from worker threads, so implementations must be shareable. Computing fitness
/// may mutate the instance being scored (and nothing else).
pub trait FitnessFunction<I>: Send + Sync {
    fn compute(&self, instance: &mut I) -> f64;
}

/// Fitness-proportional preference of `a` over `b`.
///
/// Falls back to an even split when the fitness sum is not a positive finite number
/// (negative generalization scores can push fitness below zero).
#[must_use]
pub fn fitness_preference(a: f64, b: f64) -> f64 {
    let sum = a + b;
    if sum.is_finite() && sum > 0.0 {
        (a / sum).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Sorts instances by fitness, best first.
pub fn sort_descending<I>(instances: &mut [I])
where
    I: Instance,
{
    instances.sort_by(|a, b| b.compare_fitness(a));
}

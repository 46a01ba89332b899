//! Minimal instance used to exercise the engines without a real representation.

use rand::Rng;

use crate::instance::{FitnessFunction, Instance, InstanceFactory, MutationKind, UNSCORED};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BitString {
    bits: Vec<bool>,
    fitness: f64,
    last_mutation: MutationKind,
    /// Probability that a point mutation leaves the bits untouched.
    stuck: f64,
}

impl BitString {
    pub(crate) fn with_ones(ones: u32, len: usize) -> Self {
        let bits = (0..len).map(|i| i < ones as usize).collect();
        Self {
            bits,
            fitness: UNSCORED,
            last_mutation: MutationKind::NoMutation,
            stuck: 0.0,
        }
    }

    pub(crate) fn ones(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

impl Instance for BitString {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    fn last_mutation(&self) -> MutationKind {
        self.last_mutation
    }

    fn point_mutation<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if self.stuck > 0.0 && rng.random_bool(self.stuck) {
            self.last_mutation = MutationKind::NoMutation;
            return;
        }
        let i = rng.random_range(0..self.bits.len());
        self.bits[i] = !self.bits[i];
        self.fitness = UNSCORED;
        self.last_mutation = MutationKind::Shuffle;
    }

    fn cross_over<R>(&self, other: &Self, prefer_this: f64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let bits = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| if rng.random_bool(prefer_this) { *a } else { *b })
            .collect();
        Self {
            bits,
            fitness: UNSCORED,
            last_mutation: MutationKind::NoMutation,
            stuck: self.stuck,
        }
    }
}

#[derive(Debug)]
pub(crate) struct RandomBits(pub(crate) usize);

impl InstanceFactory<BitString> for RandomBits {
    fn new_instance<R>(&self, rng: &mut R) -> BitString
    where
        R: Rng + ?Sized,
    {
        StickyBits {
            len: self.0,
            stuck: 0.0,
        }
        .new_instance(rng)
    }
}

/// Random bit strings whose point mutations often change nothing.
#[derive(Debug)]
pub(crate) struct StickyBits {
    pub(crate) len: usize,
    pub(crate) stuck: f64,
}

impl InstanceFactory<BitString> for StickyBits {
    fn new_instance<R>(&self, rng: &mut R) -> BitString
    where
        R: Rng + ?Sized,
    {
        BitString {
            bits: (0..self.len).map(|_| rng.random_bool(0.5)).collect(),
            fitness: UNSCORED,
            last_mutation: MutationKind::NoMutation,
            stuck: self.stuck,
        }
    }
}

/// Fitness = number of set bits.
#[derive(Debug)]
pub(crate) struct OnesFitness;

impl FitnessFunction<BitString> for OnesFitness {
    #[expect(clippy::cast_precision_loss)]
    fn compute(&self, instance: &mut BitString) -> f64 {
        instance.ones() as f64
    }
}

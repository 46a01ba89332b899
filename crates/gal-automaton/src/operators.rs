//! Genetic operators: random transitions, point mutations, crossover and the random factory.

use std::sync::Arc;

use gal_search::instance::{Instance, InstanceFactory, MutationKind, UNSCORED};
use rand::Rng;

use crate::{
    automaton::{Automaton, AutomatonContext},
    params::AutomatonParams,
};

/// Draws a random transition for `state` in an automaton of `states` states.
///
/// `None` with probability `no_transition_probability`; otherwise a state below `state`
/// with probability `lower_state_probability` (state `0` can only point to itself), else a
/// state in `[state, states - 1)`, or `state` itself when it is the accepting state.
fn random_transition<R>(
    params: &AutomatonParams,
    rng: &mut R,
    state: usize,
    states: usize,
) -> Option<usize>
where
    R: Rng + ?Sized,
{
    if rng.random::<f64>() < params.no_transition_probability {
        return None;
    }
    if rng.random::<f64>() < params.lower_state_probability {
        return Some(if state == 0 {
            0
        } else {
            rng.random_range(0..state)
        });
    }
    let above = states - 1 - state;
    Some(if above == 0 {
        state
    } else {
        state + rng.random_range(0..above)
    })
}

impl Automaton {
    /// Re-rolls one cell, returning whether its value changed.
    fn reroll<R>(&mut self, rng: &mut R, cell: usize) -> bool
    where
        R: Rng + ?Sized,
    {
        let state = cell / self.symbol_count();
        let value = random_transition(&self.context.params, rng, state, self.states);
        let changed = self.transitions[cell] != value;
        self.transitions[cell] = value;
        changed
    }

    fn mark_mutated(&mut self, kind: MutationKind) {
        self.last_mutation = kind;
        if !kind.is_no_mutation() {
            self.fitness = UNSCORED;
        }
    }

    /// Inserts a fresh state just before the accepting state.
    ///
    /// Transitions into the accepting state keep pointing at it. The new state gets a random
    /// row, and one random existing transition is redirected to it so that it can be reached.
    fn grow<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let symbols = self.symbol_count();
        let inserted = self.states - 1;
        let states = self.states + 1;
        for target in self.transitions.iter_mut().flatten() {
            if *target >= inserted {
                *target += 1;
            }
        }
        let row = (0..symbols)
            .map(|_| random_transition(&self.context.params, rng, inserted, states))
            .collect::<Vec<_>>();
        let at = inserted * symbols;
        self.transitions.splice(at..at, row).for_each(drop);
        self.states = states;

        if at > 0 {
            let cell = rng.random_range(0..at);
            self.transitions[cell] = Some(inserted);
        }
    }

    /// Removes a random state that is neither initial nor accepting. Needs three states.
    fn shrink<R>(&mut self, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        if self.states < 3 {
            return false;
        }
        let symbols = self.symbol_count();
        let removed = rng.random_range(1..self.states - 1);
        self.transitions
            .drain(removed * symbols..(removed + 1) * symbols)
            .for_each(drop);
        for cell in &mut self.transitions {
            *cell = match *cell {
                Some(target) if target == removed => None,
                Some(target) if target > removed => Some(target - 1),
                other => other,
            };
        }
        self.states -= 1;
        true
    }
}

impl Instance for Automaton {
    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    fn last_mutation(&self) -> MutationKind {
        self.last_mutation
    }

    /// Shuffle mutation.
    ///
    /// In targeted mode exactly one uniformly chosen transition is re-rolled; otherwise each
    /// transition is re-rolled independently with probability `1 / chromosome_len`. Reports
    /// [`MutationKind::NoMutation`] when no transition changed.
    fn point_mutation<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let cells = self.transitions.len();
        let mut changed = false;
        if cells > 0 {
            if self.context.params.targeted_mutations {
                let cell = rng.random_range(0..cells);
                changed = self.reroll(rng, cell);
            } else {
                #[expect(clippy::cast_precision_loss)]
                let p = 1.0 / self.chromosome_len() as f64;
                for cell in 0..cells {
                    if rng.random::<f64>() < p {
                        changed |= self.reroll(rng, cell);
                    }
                }
            }
        }
        self.mark_mutated(if changed {
            MutationKind::Shuffle
        } else {
            MutationKind::NoMutation
        });
    }

    fn point_mutation_grow<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.grow(rng);
        self.mark_mutated(MutationKind::Grow);
    }

    fn point_mutation_shrink<R>(&mut self, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        let kind = if self.shrink(rng) {
            MutationKind::Shrink
        } else {
            MutationKind::NoMutation
        };
        self.mark_mutated(kind);
    }

    /// Fitness-proportional uniform crossover.
    ///
    /// The child has `N' = max(1, N + drift)` states with `drift` drawn from
    /// `[offset_minus, offset_plus)`. Cells covered by both parents come from `self` with
    /// probability `prefer_this`, cells covered by only one parent come from that parent,
    /// and the rest are drawn at random. Inherited targets are reduced modulo `N'`.
    fn cross_over<R>(&self, other: &Self, prefer_this: f64, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        debug_assert_eq!(self.alphabet(), other.alphabet());
        let params = &self.context.params;
        let prefer_this = if prefer_this.is_nan() {
            0.5
        } else {
            prefer_this.clamp(0.0, 1.0)
        };

        let drift = rng.random_range(params.offset_minus..params.offset_plus);
        let states = i64::try_from(self.states).unwrap_or(i64::MAX) + i64::from(drift);
        let states = usize::try_from(states.max(1)).unwrap_or(1);
        let symbols = self.symbol_count();
        let parent1 = self.to_chromosome();
        let parent2 = other.to_chromosome();
        #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let modulus = states as i32;

        let genes = (1..=states * symbols)
            .map(|i| match (parent1.get(i), parent2.get(i)) {
                (Some(&a), Some(&b)) => {
                    let gene = if rng.random_bool(prefer_this) { a } else { b };
                    gene % modulus
                }
                (Some(&gene), None) | (None, Some(&gene)) => gene % modulus,
                (None, None) => {
                    let state = (i - 1) / symbols;
                    random_transition(params, rng, state, states)
                        .map_or(-1, |t| t.try_into().unwrap_or(-1))
                }
            })
            .collect::<Vec<i32>>();
        Self::decode(Arc::clone(&self.context), states, &genes)
    }
}

/// Random automata with a state count drawn from `[new_instance_min, new_instance_max)`.
#[derive(Debug, Clone)]
pub struct AutomatonFactory {
    context: Arc<AutomatonContext>,
}

impl AutomatonFactory {
    #[must_use]
    pub fn new(context: Arc<AutomatonContext>) -> Self {
        Self { context }
    }
}

impl InstanceFactory<Automaton> for AutomatonFactory {
    fn new_instance<R>(&self, rng: &mut R) -> Automaton
    where
        R: Rng + ?Sized,
    {
        let params = &self.context.params;
        let states = rng.random_range(params.new_instance_min..params.new_instance_max);
        let symbols = self.context.alphabet.len();
        let transitions = (0..states * symbols)
            .map(|cell| random_transition(params, rng, cell / symbols, states))
            .collect();
        Automaton::with_table(Arc::clone(&self.context), states, transitions)
    }
}

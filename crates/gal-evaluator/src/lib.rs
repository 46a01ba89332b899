//! Fitness evaluation of candidate automata against a training corpus.
//!
//! [`GalFitness`] implements [`gal_search::instance::FitnessFunction`] for
//! [`gal_automaton::Automaton`] and is meant to be shared by the workers of a
//! [`gal_search::service::FitnessService`]. Scoring an unscored automaton first severs its
//! cycles (so the language it accepts is finite), then combines three normalized scores:
//!
//! 1. **Consistency** - how far the automaton follows each training sequence, and whether it
//!    ends in the accepting state
//! 2. **Size** - fewer states score higher
//! 3. **Generalization** - how close the accepted language size is to a multiple of the
//!    corpus size
//!
//! See [`fitness`] for the exact formulas and [`FitnessParams`] for the knobs.
//!
//! [`GalFitness::debug`] returns a [`FitnessBreakdown`] of the components without touching the
//! scored instance, for reporting.

pub use self::{
    fitness::{FitnessBreakdown, GalFitness},
    params::{FitnessParams, ParamsError},
};

pub mod fitness;
pub mod params;

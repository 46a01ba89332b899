//! Finite-state automaton candidates for genetic automata learning.
//!
//! An [`Automaton`] has states `0..N`, with state `0` initial and state `N - 1` the single
//! accepting state, and one optional transition per (state, symbol). It implements
//! [`gal_search::instance::Instance`], so either search engine can evolve it:
//!
//! - [`Instance::point_mutation`](gal_search::instance::Instance::point_mutation) re-rolls
//!   transitions, biased toward lower-indexed targets
//! - grow/shrink mutations add or remove an interior state
//! - [`Instance::cross_over`](gal_search::instance::Instance::cross_over) mixes two transition
//!   tables cell by cell while drifting the state count
//!
//! Fitness scoring relies on [`Automaton::traverse`], [`Automaton::remove_cycles`] and
//! [`Automaton::language_size`].
//!
//! # Example
//!
//! ```
//! use gal_automaton::{Alphabet, Automaton, AutomatonContext, AutomatonParams, Traversal};
//!
//! let context = AutomatonContext::new(Alphabet::from_symbols(["a", "b"]), AutomatonParams::default());
//! // 0 -a-> 1, state 1 accepts
//! let fsa = Automaton::from_transitions(context, 2, vec![Some(1), None, None, None]).unwrap();
//! assert_eq!(fsa.traverse(&[0, 1], 1), Traversal::Accepted);
//! assert_eq!(fsa.traverse(&[0, 1], 2), Traversal::Rejected);
//! ```

pub use self::{
    automaton::{Automaton, AutomatonContext, AutomatonError, LanguageSize, Traversal},
    corpus::{Alphabet, Corpus, CorpusError},
    operators::AutomatonFactory,
    params::{AutomatonParams, ParamsError},
    persist::{AutomatonRecord, ParseAutomatonError},
};

pub mod automaton;
pub mod corpus;
pub mod operators;
pub mod params;
pub mod persist;

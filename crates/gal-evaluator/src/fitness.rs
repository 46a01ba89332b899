//! The three-axis automaton fitness function.
//!
//! ```text
//! fitness = w_c·consistency + w_s·size + w_g·generalization
//! ```
//!
//! # Consistency
//!
//! For each training sequence, the longest prefix the automaton can follow (searching down
//! from the full length, never below one symbol) earns `prefix_len / seq_len`, minus half a
//! symbol (`1 / (2·seq_len)`) when that prefix ends outside the accepting state. An empty
//! sequence earns `1.0` if the initial state is accepting and `0.5` otherwise. The score is
//! the mean over the corpus, or `0.0` for an empty corpus.
//!
//! # Size
//!
//! `sqrt(1 − N / size_max)`, clamped to `0.0` once `N` exceeds `size_max`.
//!
//! # Generalization
//!
//! Compares the language size with `target = ⌊corpus_len × target_size_multiplier⌋`:
//!
//! ```text
//! |d| ≤ limit:  max / (1 + m1·d²)
//! |d| > limit:  max / (1 + m1·limit²) − m2·(|d| − limit)
//! ```
//!
//! divided by `max`. Far from the target the linear branch goes negative, and the score is
//! kept negative.

use std::fmt;

use gal_automaton::{Automaton, Corpus, LanguageSize, Traversal};
use gal_search::instance::{FitnessFunction, Instance as _};

use crate::params::{FitnessParams, ParamsError};

/// Component scores of one automaton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessBreakdown {
    pub consistency: f64,
    /// Sequences whose longest followed prefix ends in the accepting state.
    pub fully_recognized: usize,
    pub size: f64,
    pub states: usize,
    pub generalization: f64,
    pub language_size: LanguageSize,
    pub target_language_size: u64,
    pub fitness: f64,
}

impl fmt::Display for FitnessBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let language_size = match self.language_size {
            LanguageSize::Finite(n) => n.to_string(),
            LanguageSize::Infinite => "infinite".to_owned(),
        };
        write!(
            f,
            "fitness {:.6} (consistency {:.6}, fully recognized {}; size {:.6} [{} states]; \
             generalization {:.6} [{} / {}])",
            self.fitness,
            self.consistency,
            self.fully_recognized,
            self.size,
            self.states,
            self.generalization,
            language_size,
            self.target_language_size,
        )
    }
}

/// Scores automata against a training corpus.
#[derive(Debug, Clone)]
pub struct GalFitness {
    corpus: Corpus,
    params: FitnessParams,
    target_language_size: u64,
}

impl GalFitness {
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(corpus: Corpus, params: FitnessParams) -> Result<Self, ParamsError> {
        params.validate()?;
        let target_language_size = (corpus.len() as f64 * params.target_size_multiplier) as u64;
        Ok(Self {
            corpus,
            params,
            target_language_size,
        })
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub fn params(&self) -> &FitnessParams {
        &self.params
    }

    #[must_use]
    pub fn target_language_size(&self) -> u64 {
        self.target_language_size
    }

    /// Recomputes every component on a copy of `automaton`.
    ///
    /// Neither the automaton's transitions nor its cached fitness are touched.
    #[must_use]
    pub fn debug(&self, automaton: &Automaton) -> FitnessBreakdown {
        let mut copy = automaton.clone();
        copy.remove_cycles();
        self.breakdown(&copy)
    }

    /// Scores an automaton whose cycles were already removed.
    fn breakdown(&self, automaton: &Automaton) -> FitnessBreakdown {
        let (consistency, fully_recognized) = self.consistency(automaton);
        let size = self.size_score(automaton.size());
        let language_size = automaton.language_size();
        let generalization = self.generalization_score(language_size);
        let p = &self.params;
        FitnessBreakdown {
            consistency,
            fully_recognized,
            size,
            states: automaton.size(),
            generalization,
            language_size,
            target_language_size: self.target_language_size,
            fitness: consistency * p.weight_consistency
                + size * p.weight_size
                + generalization * p.weight_generalization,
        }
    }

    /// Mean prefix reward and number of accepted prefixes.
    #[expect(clippy::cast_precision_loss)]
    fn consistency(&self, automaton: &Automaton) -> (f64, usize) {
        if self.corpus.is_empty() {
            return (0.0, 0);
        }
        let mut total = 0.0;
        let mut fully = 0;
        for seq in self.corpus.sequences() {
            if seq.is_empty() {
                match automaton.traverse(seq, 0) {
                    Traversal::Accepted => {
                        total += 1.0;
                        fully += 1;
                    }
                    Traversal::Matched => total += 0.5,
                    Traversal::Rejected => {}
                }
                continue;
            }
            let len = seq.len() as f64;
            let longest = (1..=seq.len())
                .rev()
                .map(|l| (l, automaton.traverse(seq, l)))
                .find(|(_, t)| t.matches());
            match longest {
                Some((l, Traversal::Accepted)) => {
                    total += l as f64 / len;
                    fully += 1;
                }
                Some((l, _)) => total += l as f64 / len - 1.0 / (2.0 * len),
                None => {}
            }
        }
        (total / self.corpus.len() as f64, fully)
    }

    #[expect(clippy::cast_precision_loss)]
    fn size_score(&self, states: usize) -> f64 {
        (1.0 - states as f64 / self.params.size_max).max(0.0).sqrt()
    }

    #[expect(clippy::cast_precision_loss)]
    fn generalization_score(&self, language_size: LanguageSize) -> f64 {
        let p = &self.params;
        let diff = self.target_language_size as f64 - language_size.saturated() as f64;
        let abs_diff = diff.abs();
        let score = if abs_diff <= p.generalization_limit {
            p.generalization_max / (1.0 + p.generalization_m1 * diff * diff)
        } else {
            let at_limit = p.generalization_max
                / (1.0 + p.generalization_m1 * p.generalization_limit * p.generalization_limit);
            at_limit - p.generalization_m2 * (abs_diff - p.generalization_limit)
        };
        score / p.generalization_max
    }
}

impl FitnessFunction<Automaton> for GalFitness {
    /// Returns the cached fitness, or removes cycles from the automaton and scores it.
    fn compute(&self, automaton: &mut Automaton) -> f64 {
        if automaton.is_scored() {
            return automaton.fitness();
        }
        automaton.remove_cycles();
        let fitness = self.breakdown(automaton).fitness;
        log::trace!("{} states scored {fitness}", automaton.size());
        automaton.set_fitness(fitness);
        fitness
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gal_automaton::{Alphabet, AutomatonContext, AutomatonParams};

    use super::*;

    const EPS: f64 = 1e-9;

    fn ab_automaton(states: usize, edges: &[(usize, usize, usize)]) -> Automaton {
        let context = AutomatonContext::new(
            Alphabet::from_symbols(["a", "b"]),
            AutomatonParams::default(),
        );
        let mut transitions = vec![None; states * 2];
        for &(state, symbol, target) in edges {
            transitions[state * 2 + symbol] = Some(target);
        }
        Automaton::from_transitions(Arc::clone(&context), states, transitions).unwrap()
    }

    fn fitness(sequences: Vec<Vec<usize>>) -> GalFitness {
        GalFitness::new(Corpus::new(2, sequences).unwrap(), FitnessParams::default()).unwrap()
    }

    mod consistency {
        use super::*;

        #[test]
        fn test_full_acceptance() {
            let fsa = ab_automaton(3, &[(0, 0, 1), (1, 1, 2)]);
            let (score, fully) = fitness(vec![vec![0, 1]]).consistency(&fsa);
            assert!((score - 1.0).abs() < EPS);
            assert_eq!(fully, 1);
        }

        #[test]
        fn test_accepted_prefix() {
            // 0 -a-> 1 (accepting): "a b" fails at b, prefix "a" is accepted
            let fsa = ab_automaton(2, &[(0, 0, 1)]);
            let (score, fully) = fitness(vec![vec![0, 1]]).consistency(&fsa);
            assert!((score - 0.5).abs() < EPS);
            assert_eq!(fully, 1);
        }

        #[test]
        fn test_matched_prefix_is_penalized() {
            // 0 -a-> 1, accepting state 2 unreachable
            let fsa = ab_automaton(3, &[(0, 0, 1)]);
            let (score, fully) = fitness(vec![vec![0, 1]]).consistency(&fsa);
            assert!((score - 0.25).abs() < EPS);
            assert_eq!(fully, 0);
        }

        #[test]
        fn test_nothing_matches() {
            let (score, _) = fitness(vec![vec![1, 1]]).consistency(&ab_automaton(2, &[(0, 0, 1)]));
            assert!(score.abs() < EPS);
        }

        #[test]
        fn test_empty_sequence_and_corpus() {
            let fsa = ab_automaton(1, &[]);
            let (score, fully) = fitness(vec![vec![]]).consistency(&fsa);
            assert!((score - 1.0).abs() < EPS);
            assert_eq!(fully, 1);
            let (score, _) = fitness(vec![vec![]]).consistency(&ab_automaton(2, &[]));
            assert!((score - 0.5).abs() < EPS);
            let (score, _) = fitness(vec![]).consistency(&ab_automaton(2, &[]));
            assert!(score.abs() < EPS);
        }

        #[test]
        fn test_mean_over_corpus() {
            let fsa = ab_automaton(3, &[(0, 0, 1), (1, 1, 2)]);
            let (score, fully) = fitness(vec![vec![0, 1], vec![1]]).consistency(&fsa);
            assert!((score - 0.5).abs() < EPS);
            assert_eq!(fully, 1);
        }
    }

    mod size {
        use super::*;

        #[test]
        fn test_fewer_states_score_higher() {
            let f = fitness(vec![vec![0]]);
            assert!((f.size_score(2) - 0.9f64.sqrt()).abs() < EPS);
            assert!(f.size_score(2) > f.size_score(10));
            assert!(f.size_score(20).abs() < EPS);
        }

        #[test]
        fn test_clamped_above_max() {
            assert!(fitness(vec![vec![0]]).size_score(25).abs() < EPS);
        }
    }

    mod generalization {
        use super::*;

        #[test]
        fn test_peak_at_target() {
            // one sequence × 2.0 → target 2
            let f = fitness(vec![vec![0]]);
            assert_eq!(f.target_language_size(), 2);
            assert!((f.generalization_score(LanguageSize::Finite(2)) - 1.0).abs() < EPS);
        }

        #[test]
        fn test_linear_branch() {
            let f = fitness(vec![vec![0]]);
            let at_limit = 20.0 / (1.0 + 2.0 * 0.25);
            let expected = (at_limit - 0.025 * 0.5) / 20.0;
            assert!((f.generalization_score(LanguageSize::Finite(1)) - expected).abs() < EPS);
            assert!((f.generalization_score(LanguageSize::Finite(3)) - expected).abs() < EPS);
        }

        #[test]
        fn test_far_from_target_goes_negative() {
            let f = fitness(vec![vec![0]]);
            let score = f.generalization_score(LanguageSize::Finite(1000));
            let expected = (20.0 / 1.5 - 0.025 * 997.5) / 20.0;
            assert!((score - expected).abs() < EPS);
            assert!(score < 0.0);
            assert!(f.generalization_score(LanguageSize::Infinite) < score);
        }
    }

    #[test]
    fn test_compute_removes_cycles_and_caches() {
        let f = fitness(vec![vec![0, 1]]);
        // 0 -a-> 1 -a-> 0 closes a cycle, 0 -b-> 1
        let mut fsa = ab_automaton(2, &[(0, 0, 1), (1, 0, 0), (0, 1, 1)]);
        let value = f.compute(&mut fsa);

        assert_eq!(fsa.transition(1, 0), None);
        assert!((fsa.fitness() - value).abs() < EPS);
        // consistency 0.5, size sqrt(0.9), language {a, b} hits the target exactly
        let expected = 0.33 * (0.5 + 0.9f64.sqrt() + 1.0);
        assert!((value - expected).abs() < EPS);

        let mut cached = ab_automaton(2, &[(1, 0, 0)]);
        cached.set_fitness(-4.0);
        assert!((f.compute(&mut cached) + 4.0).abs() < EPS);
        assert_eq!(cached.transition(1, 0), Some(0));
    }

    #[test]
    fn test_debug_leaves_instance_alone() {
        let f = fitness(vec![vec![0, 1]]);
        let mut fsa = ab_automaton(2, &[(0, 0, 1), (1, 0, 0)]);
        fsa.set_fitness(0.1);

        let breakdown = f.debug(&fsa);
        assert_eq!(fsa.transition(1, 0), Some(0));
        assert!((fsa.fitness() - 0.1).abs() < EPS);
        assert_eq!(breakdown.states, 2);
        assert_eq!(breakdown.language_size, LanguageSize::Finite(1));
        assert_eq!(breakdown.fully_recognized, 1);
        let weighted = 0.33 * (breakdown.consistency + breakdown.size + breakdown.generalization);
        assert!((breakdown.fitness - weighted).abs() < EPS);
        assert!(breakdown.to_string().contains("[1 / 2]"));
    }
}

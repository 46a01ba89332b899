//! Transition-table representation of a candidate automaton.
//!
//! State `0` is the initial state and state `N - 1` the single accepting state. Each state
//! has one transition slot per alphabet symbol, stored row-major as `Option<usize>` where
//! `None` means "no transition".
//!
//! # Chromosome
//!
//! The flat integer encoding is `[N, t(0, 0), t(0, 1), ..., t(N-1, |A|-1)]` with `-1`
//! standing for "no transition", so its length is `1 + N * |A|`.

use std::sync::Arc;

use gal_search::instance::{MutationKind, UNSCORED};

use crate::{corpus::Alphabet, params::AutomatonParams};

/// Alphabet and operator parameters shared by every automaton of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonContext {
    pub alphabet: Alphabet,
    pub params: AutomatonParams,
}

impl AutomatonContext {
    #[must_use]
    pub fn new(alphabet: Alphabet, params: AutomatonParams) -> Arc<Self> {
        Arc::new(Self { alphabet, params })
    }
}

/// A transition table that cannot describe an automaton.
#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum AutomatonError {
    #[display("automaton needs at least one state")]
    NoStates,
    #[display("transition table has {actual} cells, expected {expected}")]
    TableSize { expected: usize, actual: usize },
    #[display("state {state} has {actual} transitions, alphabet has {expected} symbols")]
    RowWidth {
        state: usize,
        expected: usize,
        actual: usize,
    },
    #[display("transition {state}/{symbol} targets state {target}, automaton has {states} states")]
    TargetOutOfRange {
        state: usize,
        symbol: usize,
        target: i64,
        states: usize,
    },
}

/// Outcome of following a prefix through the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum Traversal {
    /// Some symbol had no transition.
    Rejected,
    /// The prefix was consumed, ending in a non-accepting state.
    Matched,
    /// The prefix was consumed, ending in the accepting state.
    Accepted,
}

impl Traversal {
    /// `-1`, `0` or `1`.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Rejected => -1,
            Self::Matched => 0,
            Self::Accepted => 1,
        }
    }

    #[must_use]
    pub fn matches(self) -> bool {
        !self.is_rejected()
    }

    #[must_use]
    pub fn accepts(self) -> bool {
        self.is_accepted()
    }
}

/// Number of sequences an automaton accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum LanguageSize {
    /// Saturates at `u64::MAX`.
    Finite(u64),
    /// A path from the initial state runs into a cycle.
    Infinite,
}

impl LanguageSize {
    /// Finite sizes as-is, `Infinite` as `u64::MAX`.
    #[must_use]
    pub fn saturated(self) -> u64 {
        match self {
            Self::Finite(n) => n,
            Self::Infinite => u64::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Automaton {
    pub(crate) context: Arc<AutomatonContext>,
    pub(crate) states: usize,
    pub(crate) transitions: Vec<Option<usize>>,
    pub(crate) fitness: f64,
    pub(crate) last_mutation: MutationKind,
}

impl PartialEq for Automaton {
    /// Structural equality: alphabet, state count and transition table. Fitness is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.states == other.states
            && self.transitions == other.transitions
            && self.context.alphabet == other.context.alphabet
    }
}

impl Automaton {
    /// Builds an automaton from a row-major transition table.
    pub fn from_transitions(
        context: Arc<AutomatonContext>,
        states: usize,
        transitions: Vec<Option<usize>>,
    ) -> Result<Self, AutomatonError> {
        if states == 0 {
            return Err(AutomatonError::NoStates);
        }
        let symbols = context.alphabet.len();
        if transitions.len() != states * symbols {
            return Err(AutomatonError::TableSize {
                expected: states * symbols,
                actual: transitions.len(),
            });
        }
        if let Some((cell, target)) = transitions
            .iter()
            .enumerate()
            .find_map(|(cell, t)| t.filter(|t| *t >= states).map(|t| (cell, t)))
        {
            return Err(AutomatonError::TargetOutOfRange {
                state: cell / symbols,
                symbol: cell % symbols,
                target: i64::try_from(target).unwrap_or(i64::MAX),
                states,
            });
        }
        Ok(Self::with_table(context, states, transitions))
    }

    pub(crate) fn with_table(
        context: Arc<AutomatonContext>,
        states: usize,
        transitions: Vec<Option<usize>>,
    ) -> Self {
        debug_assert_eq!(transitions.len(), states * context.alphabet.len());
        Self {
            context,
            states,
            transitions,
            fitness: UNSCORED,
            last_mutation: MutationKind::NoMutation,
        }
    }

    /// Decodes a chromosome.
    ///
    /// Only a missing or non-positive state count is an error. A chromosome with more or
    /// fewer genes than the state count implies is decoded best-effort with a warning:
    /// missing genes become "no transition" and extra genes are ignored. Genes outside
    /// `{-1} ∪ [0, N-1]` are also read as "no transition".
    pub fn from_chromosome(
        context: Arc<AutomatonContext>,
        chromosome: &[i32],
    ) -> Result<Self, AutomatonError> {
        let (&header, genes) = chromosome.split_first().ok_or(AutomatonError::NoStates)?;
        let states = usize::try_from(header)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(AutomatonError::NoStates)?;
        Ok(Self::decode(context, states, genes))
    }

    pub(crate) fn decode(context: Arc<AutomatonContext>, states: usize, genes: &[i32]) -> Self {
        let cells = states * context.alphabet.len();
        if genes.len() != cells {
            log::warn!(
                "chromosome length {} does not match {} states (expected {})",
                genes.len() + 1,
                states,
                cells + 1
            );
        }
        let transitions = (0..cells)
            .map(|cell| {
                let gene = genes.get(cell).copied().unwrap_or(-1);
                match usize::try_from(gene) {
                    Ok(target) if target < states => Some(target),
                    _ if gene == -1 => None,
                    _ => {
                        log::warn!("gene {gene} at {cell} is outside {states} states, dropped");
                        None
                    }
                }
            })
            .collect();
        Self::with_table(context, states, transitions)
    }

    /// Encodes the automaton as a chromosome.
    #[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    #[must_use]
    pub fn to_chromosome(&self) -> Vec<i32> {
        std::iter::once(self.states as i32)
            .chain(self.transitions.iter().map(|t| t.map_or(-1, |t| t as i32)))
            .collect()
    }

    #[must_use]
    pub fn chromosome_len(&self) -> usize {
        1 + self.transitions.len()
    }

    #[must_use]
    pub fn context(&self) -> &Arc<AutomatonContext> {
        &self.context
    }

    #[must_use]
    pub fn alphabet(&self) -> &Alphabet {
        &self.context.alphabet
    }

    /// Number of states.
    #[must_use]
    pub fn size(&self) -> usize {
        self.states
    }

    #[must_use]
    pub fn accepting_state(&self) -> usize {
        self.states - 1
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.context.alphabet.len()
    }

    /// Target of `state` on `symbol`; `None` also for a state or symbol out of range.
    #[must_use]
    pub fn transition(&self, state: usize, symbol: usize) -> Option<usize> {
        if state >= self.states || symbol >= self.symbol_count() {
            return None;
        }
        self.transitions[state * self.symbol_count() + symbol]
    }

    /// Row-major transition table.
    #[must_use]
    pub fn transitions(&self) -> &[Option<usize>] {
        &self.transitions
    }

    /// Transitions of one state, indexed by symbol.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<usize>]> {
        // chunks(0) panics, an empty alphabet has empty rows
        let width = self.symbol_count().max(1);
        self.transitions
            .chunks(width)
            .chain(std::iter::repeat_n(&[][..], self.states))
            .take(self.states)
    }

    /// Follows the first `len` symbols of `seq` from the initial state.
    ///
    /// A symbol outside the alphabet has no transition and rejects the sequence.
    #[must_use]
    pub fn traverse(&self, seq: &[usize], len: usize) -> Traversal {
        let mut state = 0;
        for &symbol in &seq[..len] {
            match self.transition(state, symbol) {
                Some(next) => state = next,
                None => return Traversal::Rejected,
            }
        }
        if state == self.accepting_state() {
            Traversal::Accepted
        } else {
            Traversal::Matched
        }
    }

    #[must_use]
    pub fn matches(&self, seq: &[usize]) -> bool {
        self.traverse(seq, seq.len()).matches()
    }

    #[must_use]
    pub fn accepts(&self, seq: &[usize]) -> bool {
        self.traverse(seq, seq.len()).accepts()
    }

    /// Severs every transition that closes a cycle on some path from the initial state.
    ///
    /// The visited set is the current path only, so a state reachable through several
    /// branches is walked once per branch and only true back-edges are cut. Transitions are
    /// examined in symbol order; a cut made deeper in one branch is visible to later
    /// branches. Returns the number of severed transitions.
    pub fn remove_cycles(&mut self) -> usize {
        let symbols = self.symbol_count();
        let mut on_path = vec![false; self.states];
        let mut stack = vec![(0, 0)];
        on_path[0] = true;
        let mut removed = 0;

        while let Some(frame) = stack.last_mut() {
            let (state, symbol) = *frame;
            if symbol == symbols {
                on_path[state] = false;
                stack.pop();
                continue;
            }
            frame.1 += 1;
            let cell = state * symbols + symbol;
            let Some(target) = self.transitions[cell] else {
                continue;
            };
            if on_path[target] {
                self.transitions[cell] = None;
                removed += 1;
            } else {
                on_path[target] = true;
                stack.push((target, 0));
            }
        }

        if removed > 0 {
            log::trace!("removed {removed} cyclic transitions");
        }
        removed
    }

    /// Counts the accepted sequences by enumerating simple paths to the accepting state.
    ///
    /// Walking stops at the accepting state. Any transition back onto the current path makes
    /// the language infinite, which cannot happen after [`Automaton::remove_cycles`]. The
    /// enumeration is exhaustive and exponential in the number of paths.
    #[must_use]
    pub fn language_size(&self) -> LanguageSize {
        struct Frame {
            state: usize,
            symbol: usize,
            count: u64,
        }

        let accepting = self.accepting_state();
        if accepting == 0 {
            return LanguageSize::Finite(1);
        }
        let symbols = self.symbol_count();
        let mut on_path = vec![false; self.states];
        let mut stack = vec![Frame {
            state: 0,
            symbol: 0,
            count: 0,
        }];
        on_path[0] = true;
        let mut total = 0;

        while let Some(frame) = stack.last_mut() {
            if frame.symbol == symbols {
                let Frame { state, count, .. } = *frame;
                on_path[state] = false;
                stack.pop();
                match stack.last_mut() {
                    Some(parent) => parent.count = parent.count.saturating_add(count),
                    None => total = count,
                }
                continue;
            }
            let cell = frame.state * symbols + frame.symbol;
            frame.symbol += 1;
            let Some(target) = self.transitions[cell] else {
                continue;
            };
            if target == accepting {
                frame.count = frame.count.saturating_add(1);
            } else if on_path[target] {
                return LanguageSize::Infinite;
            } else {
                on_path[target] = true;
                stack.push(Frame {
                    state: target,
                    symbol: 0,
                    count: 0,
                });
            }
        }
        LanguageSize::Finite(total)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;

    use super::*;

    pub(crate) fn context(symbols: &[&str]) -> Arc<AutomatonContext> {
        AutomatonContext::new(
            Alphabet::from_symbols(symbols.iter().copied()),
            AutomatonParams::default(),
        )
    }

    /// Builds an automaton over `{a, b}` from `(state, symbol, target)` edges.
    pub(crate) fn ab_automaton(states: usize, edges: &[(usize, usize, usize)]) -> Automaton {
        let mut transitions = vec![None; states * 2];
        for &(state, symbol, target) in edges {
            transitions[state * 2 + symbol] = Some(target);
        }
        Automaton::from_transitions(context(&["a", "b"]), states, transitions).unwrap()
    }

    pub(crate) fn arb_automaton(max_states: usize) -> impl Strategy<Value = Automaton> {
        (1..=max_states).prop_flat_map(|states| {
            prop::collection::vec(prop::option::of(0..states), states * 3).prop_map(
                move |transitions| {
                    Automaton::from_transitions(context(&["a", "b", "c"]), states, transitions)
                        .unwrap()
                },
            )
        })
    }

    mod chromosome {
        use super::*;

        #[test]
        fn test_encode_layout() {
            let fsa = ab_automaton(2, &[(0, 0, 1)]);
            assert_eq!(fsa.to_chromosome(), [2, 1, -1, -1, -1]);
            assert_eq!(fsa.chromosome_len(), 5);
        }

        #[test]
        fn test_decode_short_chromosome_pads() {
            let fsa = Automaton::from_chromosome(context(&["a", "b"]), &[2, 1, 0]).unwrap();
            assert_eq!(fsa.transitions(), [Some(1), Some(0), None, None]);
        }

        #[test]
        fn test_decode_long_chromosome_truncates() {
            let fsa = Automaton::from_chromosome(context(&["a"]), &[1, 0, 0, 0]).unwrap();
            assert_eq!(fsa.transitions(), [Some(0)]);
        }

        #[test]
        fn test_decode_drops_out_of_range_genes() {
            let fsa = Automaton::from_chromosome(context(&["a", "b"]), &[1, 5, -3]).unwrap();
            assert_eq!(fsa.transitions(), [None, None]);
        }

        #[test]
        fn test_decode_requires_states() {
            let ctx = context(&["a"]);
            assert!(matches!(
                Automaton::from_chromosome(ctx.clone(), &[]),
                Err(AutomatonError::NoStates)
            ));
            assert!(matches!(
                Automaton::from_chromosome(ctx, &[0]),
                Err(AutomatonError::NoStates)
            ));
        }

        #[test]
        fn test_from_transitions_validates() {
            let ctx = context(&["a", "b"]);
            assert!(matches!(
                Automaton::from_transitions(ctx.clone(), 2, vec![None; 3]),
                Err(AutomatonError::TableSize {
                    expected: 4,
                    actual: 3
                })
            ));
            assert!(matches!(
                Automaton::from_transitions(ctx, 2, vec![None, None, Some(2), None]),
                Err(AutomatonError::TargetOutOfRange {
                    state: 1,
                    symbol: 0,
                    target: 2,
                    states: 2
                })
            ));
        }

        proptest! {
            #[test]
            fn test_round_trip(fsa in arb_automaton(8)) {
                let chromosome = fsa.to_chromosome();
                let decoded = Automaton::from_chromosome(fsa.context().clone(), &chromosome).unwrap();
                prop_assert_eq!(decoded, fsa);
            }
        }
    }

    mod traversal {
        use super::*;

        #[test]
        fn test_two_state_scenario() {
            // 0 -a-> 1, everything else missing
            let fsa = ab_automaton(2, &[(0, 0, 1)]);
            assert_eq!(fsa.traverse(&[0, 1], 2), Traversal::Rejected);
            assert_eq!(fsa.traverse(&[0, 1], 2).code(), -1);
            assert_eq!(fsa.traverse(&[0, 1], 1), Traversal::Accepted);
            assert_eq!(fsa.traverse(&[0, 1], 1).code(), 1);
            assert_eq!(fsa.traverse(&[0, 1], 0), Traversal::Matched);
            assert!(fsa.accepts(&[0]));
            assert!(!fsa.matches(&[0, 1]));
        }

        #[test]
        fn test_single_state_accepts_empty() {
            let fsa = ab_automaton(1, &[]);
            assert_eq!(fsa.traverse(&[], 0), Traversal::Accepted);
            assert_eq!(fsa.traverse(&[1], 1), Traversal::Rejected);
            assert!(!fsa.matches(&[0, 0]));
        }

        #[test]
        fn test_unknown_symbol_rejects() {
            // 0 -a-> 1 -a-> 1: symbol 2 would index into state 1's row without a bound check
            let fsa = ab_automaton(2, &[(0, 0, 1), (1, 0, 1)]);
            assert_eq!(fsa.transition(0, 2), None);
            assert_eq!(fsa.transition(2, 0), None);
            assert_eq!(fsa.traverse(&[2], 1), Traversal::Rejected);
            assert!(!fsa.matches(&[0, 5]));
        }

        #[test]
        fn test_traversal_codes() {
            assert!(Traversal::Matched.matches());
            assert!(!Traversal::Matched.accepts());
            assert!(Traversal::Accepted.matches());
            assert!(!Traversal::Rejected.matches());
            assert_eq!(Traversal::Matched.code(), 0);
        }

        proptest! {
            #[test]
            fn test_prefix_monotonicity(
                fsa in arb_automaton(6),
                seq in prop::collection::vec(0usize..3, 0..12),
            ) {
                let mut fsa = fsa;
                fsa.remove_cycles();
                for len in 0..=seq.len() {
                    if fsa.traverse(&seq, len).matches() {
                        for shorter in 0..len {
                            prop_assert!(fsa.traverse(&seq, shorter).matches());
                        }
                    }
                }
            }
        }
    }

    mod cycles {
        use super::*;

        #[test]
        fn test_self_loop_is_cut() {
            let mut fsa = ab_automaton(2, &[(0, 0, 0), (0, 1, 1)]);
            assert_eq!(fsa.remove_cycles(), 1);
            assert_eq!(fsa.transition(0, 0), None);
            assert_eq!(fsa.transition(0, 1), Some(1));
        }

        #[test]
        fn test_back_edge_is_cut_but_shared_state_kept() {
            // 0 -a-> 1, 0 -b-> 2, 1 -a-> 2, 2 -a-> 0 (back edge), 2 -b-> 3
            let mut fsa = ab_automaton(4, &[(0, 0, 1), (0, 1, 2), (1, 0, 2), (2, 0, 0), (2, 1, 3)]);
            assert_eq!(fsa.remove_cycles(), 1);
            assert_eq!(fsa.transition(2, 0), None);
            // state 2 is reached through two branches, both edges into it survive
            assert_eq!(fsa.transition(0, 1), Some(2));
            assert_eq!(fsa.transition(1, 0), Some(2));
            assert_eq!(fsa.language_size(), LanguageSize::Finite(2));
        }

        #[test]
        fn test_unreachable_cycles_are_kept() {
            let mut fsa = ab_automaton(3, &[(1, 0, 1)]);
            assert_eq!(fsa.remove_cycles(), 0);
            assert_eq!(fsa.transition(1, 0), Some(1));
        }

        #[test]
        fn test_language_size_detects_cycle() {
            let fsa = ab_automaton(3, &[(0, 0, 1), (1, 0, 0), (1, 1, 2)]);
            assert_eq!(fsa.language_size(), LanguageSize::Infinite);
            assert_eq!(fsa.language_size().saturated(), u64::MAX);
        }

        #[test]
        fn test_language_size_counts_paths() {
            // 0 -a-> 1 -a-> 2, 0 -b-> 2, 1 -b-> 2
            let fsa = ab_automaton(3, &[(0, 0, 1), (0, 1, 2), (1, 0, 2), (1, 1, 2)]);
            assert_eq!(fsa.language_size(), LanguageSize::Finite(3));
            assert_eq!(ab_automaton(1, &[(0, 0, 0)]).language_size(), LanguageSize::Finite(1));
            assert_eq!(ab_automaton(2, &[]).language_size(), LanguageSize::Finite(0));
        }

        proptest! {
            #[test]
            fn test_remove_cycles_is_idempotent(fsa in arb_automaton(7)) {
                let mut once = fsa;
                once.remove_cycles();
                let mut twice = once.clone();
                prop_assert_eq!(twice.remove_cycles(), 0);
                prop_assert_eq!(twice, once);
            }

            #[test]
            fn test_language_size_finite_after_removal(fsa in arb_automaton(7)) {
                let mut fsa = fsa;
                fsa.remove_cycles();
                prop_assert!(fsa.language_size().is_finite());
            }
        }
    }

    #[test]
    fn test_rows_split_table() {
        let fsa = ab_automaton(2, &[(1, 1, 0)]);
        let rows = fsa.rows().collect::<Vec<_>>();
        assert_eq!(rows, [&[None, None][..], &[None, Some(0)][..]]);

        let empty = Automaton::from_transitions(context(&[]), 3, vec![]).unwrap();
        assert_eq!(empty.rows().count(), 3);
    }
}

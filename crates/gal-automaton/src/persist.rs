//! Persisted forms of an automaton: the line-oriented text format and a serde record.
//!
//! The text format carries its own alphabet:
//!
//! ```text
//! numberOfNodes=2
//! numberOfSymbols=2
//! fitness=0.5
//! symbol_0=a
//! symbol_1=b
//! transitionTable[0][0/ 'a']=1
//! transitionTable[0][1/ 'b']=
//! transitionTable[1][0/ 'a']=
//! transitionTable[1][1/ 'b']=
//! ```
//!
//! An empty value means "no transition".

use std::{
    fmt::Write as _,
    num::{ParseFloatError, ParseIntError},
    sync::Arc,
};

use gal_search::instance::Instance as _;
use serde::{Deserialize, Serialize};

use crate::{
    automaton::{Automaton, AutomatonContext, AutomatonError},
    corpus::Alphabet,
    params::AutomatonParams,
};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum ParseAutomatonError {
    #[display("line {line}: expected `{expected}=`, found end of input")]
    MissingLine { line: usize, expected: String },
    #[display("line {line}: expected `{expected}=`, found `{found}`")]
    UnexpectedKey {
        line: usize,
        expected: String,
        found: String,
    },
    #[display("line {line}: invalid integer")]
    InvalidInteger { line: usize, source: ParseIntError },
    #[display("line {line}: invalid fitness")]
    InvalidFloat {
        line: usize,
        source: ParseFloatError,
    },
    #[display("line {line}: symbol `{symbol}` appears twice")]
    DuplicateSymbol { line: usize, symbol: String },
    #[display("line {line}: {source}")]
    Invalid {
        line: usize,
        source: AutomatonError,
    },
}

/// `key=value` lines read in a fixed order.
struct KeyValueLines<'a> {
    lines: std::str::Lines<'a>,
    line: usize,
}

impl<'a> KeyValueLines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            line: 0,
        }
    }

    fn value(&mut self, key: &str) -> Result<&'a str, ParseAutomatonError> {
        self.line += 1;
        let Some(line) = self.lines.next() else {
            return Err(ParseAutomatonError::MissingLine {
                line: self.line,
                expected: key.to_owned(),
            });
        };
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or_else(|| ParseAutomatonError::UnexpectedKey {
                line: self.line,
                expected: key.to_owned(),
                found: line.to_owned(),
            })
    }

    fn count(&mut self, key: &str) -> Result<usize, ParseAutomatonError> {
        self.value(key)?
            .trim()
            .parse()
            .map_err(|source| ParseAutomatonError::InvalidInteger {
                line: self.line,
                source,
            })
    }
}

impl Automaton {
    /// Renders the automaton in the text format.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "numberOfNodes={}", self.size());
        let _ = writeln!(out, "numberOfSymbols={}", self.symbol_count());
        let _ = writeln!(out, "fitness={}", self.fitness());
        for (i, symbol) in self.alphabet().iter().enumerate() {
            let _ = writeln!(out, "symbol_{i}={symbol}");
        }
        for (state, row) in self.rows().enumerate() {
            for (code, (target, symbol)) in row.iter().zip(self.alphabet().iter()).enumerate() {
                let _ = write!(out, "transitionTable[{state}][{code}/ '{symbol}']=");
                if let Some(target) = target {
                    let _ = write!(out, "{target}");
                }
                out.push('\n');
            }
        }
        out
    }

    /// Parses the text format. The alphabet is taken from the text.
    pub fn parse_text(text: &str, params: AutomatonParams) -> Result<Self, ParseAutomatonError> {
        let mut lines = KeyValueLines::new(text);

        let states = lines.count("numberOfNodes")?;
        if states == 0 {
            return Err(ParseAutomatonError::Invalid {
                line: lines.line,
                source: AutomatonError::NoStates,
            });
        }
        let symbols = lines.count("numberOfSymbols")?;
        let fitness = lines
            .value("fitness")?
            .trim()
            .parse::<f64>()
            .map_err(|source| ParseAutomatonError::InvalidFloat {
                line: lines.line,
                source,
            })?;

        let mut alphabet = Vec::with_capacity(symbols);
        for i in 0..symbols {
            let symbol = lines.value(&format!("symbol_{i}"))?;
            if alphabet.iter().any(|s| s == symbol) {
                return Err(ParseAutomatonError::DuplicateSymbol {
                    line: lines.line,
                    symbol: symbol.to_owned(),
                });
            }
            alphabet.push(symbol.to_owned());
        }

        let mut transitions = Vec::with_capacity(states * symbols);
        for state in 0..states {
            for (code, symbol) in alphabet.iter().enumerate() {
                let value = lines.value(&format!("transitionTable[{state}][{code}/ '{symbol}']"))?;
                let value = value.trim();
                if value.is_empty() {
                    transitions.push(None);
                    continue;
                }
                let target = value.parse::<i64>().map_err(|source| {
                    ParseAutomatonError::InvalidInteger {
                        line: lines.line,
                        source,
                    }
                })?;
                match usize::try_from(target) {
                    Ok(target) if target < states => transitions.push(Some(target)),
                    _ if target == -1 => transitions.push(None),
                    _ => {
                        return Err(ParseAutomatonError::Invalid {
                            line: lines.line,
                            source: AutomatonError::TargetOutOfRange {
                                state,
                                symbol: code,
                                target,
                                states,
                            },
                        });
                    }
                }
            }
        }

        let context = AutomatonContext::new(Alphabet::from(alphabet), params);
        let mut automaton = Self::with_table(context, states, transitions);
        automaton.set_fitness(fitness);
        Ok(automaton)
    }
}

/// Serializable automaton without its alphabet, used in model and population files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatonRecord {
    pub states: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fitness: Option<f64>,
    /// One row per state, one entry per symbol, `null` for "no transition".
    pub transitions: Vec<Vec<Option<usize>>>,
}

impl Automaton {
    #[must_use]
    pub fn to_record(&self) -> AutomatonRecord {
        AutomatonRecord {
            states: self.size(),
            fitness: self.is_scored().then(|| self.fitness()),
            transitions: self.rows().map(<[_]>::to_vec).collect(),
        }
    }

    /// Rebuilds an automaton from a record, restoring its fitness if it was scored.
    pub fn from_record(
        context: Arc<AutomatonContext>,
        record: &AutomatonRecord,
    ) -> Result<Self, AutomatonError> {
        if record.transitions.len() != record.states {
            return Err(AutomatonError::TableSize {
                expected: record.states * context.alphabet.len(),
                actual: record.transitions.iter().map(Vec::len).sum(),
            });
        }
        let symbols = context.alphabet.len();
        if let Some((state, row)) = record
            .transitions
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != symbols)
        {
            return Err(AutomatonError::RowWidth {
                state,
                expected: symbols,
                actual: row.len(),
            });
        }
        let transitions = record.transitions.concat();
        let mut automaton = Self::from_transitions(context, record.states, transitions)?;
        if let Some(fitness) = record.fitness {
            automaton.set_fitness(fitness);
        }
        Ok(automaton)
    }
}

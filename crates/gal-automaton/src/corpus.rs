//! Alphabet and integer-encoded training corpus.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated symbol tokens. A symbol's position is its numeric code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Alphabet {
    symbols: Vec<String>,
    codes: HashMap<String, usize>,
}

impl Alphabet {
    /// Builds an alphabet from tokens, keeping the first occurrence of each.
    pub fn from_symbols<S, T>(symbols: S) -> Self
    where
        S: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut alphabet = Self::default();
        for symbol in symbols {
            alphabet.insert(symbol.into());
        }
        alphabet
    }

    fn insert(&mut self, symbol: String) -> usize {
        if let Some(&code) = self.codes.get(&symbol) {
            return code;
        }
        let code = self.symbols.len();
        self.codes.insert(symbol.clone(), code);
        self.symbols.push(symbol);
        code
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    #[must_use]
    pub fn symbol(&self, code: usize) -> Option<&str> {
        self.symbols.get(code).map(String::as_str)
    }

    #[must_use]
    pub fn code(&self, symbol: &str) -> Option<usize> {
        self.codes.get(symbol).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for Alphabet {
    fn from(symbols: Vec<String>) -> Self {
        Self::from_symbols(symbols)
    }
}

impl From<Alphabet> for Vec<String> {
    fn from(alphabet: Alphabet) -> Self {
        alphabet.symbols
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CorpusError {
    #[display("line {line}: token `{token}` is not in the alphabet")]
    UnknownToken { line: usize, token: String },
    #[display(
        "sequence {sequence}, position {position}: symbol {symbol} is outside an alphabet of {alphabet_len} symbols"
    )]
    SymbolOutOfRange {
        sequence: usize,
        position: usize,
        symbol: usize,
        alphabet_len: usize,
    },
}

/// Training sequences over alphabet codes. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    sequences: Vec<Vec<usize>>,
}

impl Corpus {
    /// Wraps already-encoded sequences, checking every symbol against the alphabet size.
    pub fn new(alphabet_len: usize, sequences: Vec<Vec<usize>>) -> Result<Self, CorpusError> {
        for (sequence, seq) in sequences.iter().enumerate() {
            if let Some((position, &symbol)) =
                seq.iter().enumerate().find(|(_, s)| **s >= alphabet_len)
            {
                return Err(CorpusError::SymbolOutOfRange {
                    sequence,
                    position,
                    symbol,
                    alphabet_len,
                });
            }
        }
        Ok(Self { sequences })
    }

    /// Tokenizes a training text and induces its alphabet.
    ///
    /// One sequence per line, tokens separated by whitespace, blank lines skipped. Symbols are
    /// numbered in first-seen order.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gal_automaton::corpus::Corpus;
    /// let (alphabet, corpus) = Corpus::tokenize("a b\nb c a\n");
    /// assert_eq!(alphabet.iter().collect::<Vec<_>>(), ["a", "b", "c"]);
    /// assert_eq!(corpus.sequences(), [vec![0, 1], vec![1, 2, 0]]);
    /// ```
    #[must_use]
    pub fn tokenize(text: &str) -> (Alphabet, Self) {
        let mut alphabet = Alphabet::default();
        let sequences = lines(text)
            .map(|(_, tokens)| {
                tokens
                    .map(|token| alphabet.insert(token.to_owned()))
                    .collect()
            })
            .collect();
        (alphabet, Self { sequences })
    }

    /// Tokenizes a training text against a fixed alphabet.
    pub fn encode(alphabet: &Alphabet, text: &str) -> Result<Self, CorpusError> {
        let sequences = lines(text)
            .map(|(line, mut tokens)| {
                tokens.try_fold(vec![], |mut seq, token| {
                    let code = alphabet.code(token).ok_or_else(|| CorpusError::UnknownToken {
                        line,
                        token: token.to_owned(),
                    })?;
                    seq.push(code);
                    Ok(seq)
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { sequences })
    }

    #[must_use]
    pub fn sequences(&self) -> &[Vec<usize>] {
        &self.sequences
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

/// Non-blank lines with their 1-based line numbers.
fn lines(text: &str) -> impl Iterator<Item = (usize, std::str::SplitWhitespace<'_>)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, line.split_whitespace()))
}

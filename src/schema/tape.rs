//! Tapes, tape metrics and the sample corpus used for scoring.

use std::fmt::Write as _;

use super::{BLANK, ConfigError, Symbol};

/// Number of cells on every tape.
pub const TAPE_CAPACITY: usize = 1000;

/// Built-in sample tapes over the alphabet `{BLANK, 1, 2, 3}`.
pub const BUILTIN_SAMPLE_TAPES: [&[Symbol]; 3] = [
    &[0, 3, 1, 2, 1, 2, 3, 2, 3, 3, 3, 2, 2, 2, 1, 1, 1, 0],
    &[0, 3, 2, 1, 3, 2, 1, 3, 2, 1, 3, 2, 1, 3, 2, 1, 1, 1, 1, 0],
    &[
        0, 3, 3, 3, 3, 3, 3, 3, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 0,
    ],
];

/// Alphabet size of the built-in sample tapes, blank included.
pub const BUILTIN_SAMPLE_SYMBOLS: usize = 4;

/// Fixed-capacity machine tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    content: Vec<Symbol>,
    input_len: usize,
}

impl Tape {
    /// All-blank tape with no input.
    pub fn blank() -> Self {
        Self {
            content: vec![BLANK; TAPE_CAPACITY],
            input_len: 0,
        }
    }

    /// Tape holding `input` at its start, blank beyond it.
    ///
    /// The input must start with the boundary blank and fit on the tape.
    pub fn from_input(input: &[Symbol]) -> Result<Self, ConfigError> {
        if input.len() < 2 || input.len() > TAPE_CAPACITY {
            return Err(ConfigError::InvalidTapeLength {
                len: input.len(),
                capacity: TAPE_CAPACITY,
            });
        }
        if input[0] != BLANK {
            return Err(ConfigError::MissingBoundaryBlank);
        }
        let mut tape = Self::blank();
        tape.content[..input.len()].copy_from_slice(input);
        tape.input_len = input.len();
        Ok(tape)
    }

    /// Overwrite this tape with a working copy of `source`.
    pub fn reset_from(&mut self, source: &Tape) {
        let len = source.input_len;
        self.content[..len].copy_from_slice(&source.content[..len]);
        self.content[len..].fill(BLANK);
        self.input_len = len;
    }

    /// Number of meaningful leading cells, both boundary blanks included.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.input_len
    }

    /// The meaningful leading cells.
    pub fn input(&self) -> &[Symbol] {
        &self.content[..self.input_len]
    }

    /// Every cell, up to the tape capacity.
    pub fn content(&self) -> &[Symbol] {
        &self.content
    }

    #[inline]
    pub fn get(&self, pos: usize) -> Symbol {
        self.content[pos]
    }

    #[inline]
    pub fn set(&mut self, pos: usize, symbol: Symbol) {
        self.content[pos] = symbol;
    }

    /// Append the input cells as `a,b,c,` plus a newline.
    pub fn write_trace(&self, out: &mut String) {
        for symbol in self.input() {
            let _ = write!(out, "{symbol},");
        }
        out.push('\n');
    }
}

/// Symbol histogram and ordering measure of a tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeMetrics {
    /// Occurrences of each symbol among cells `1..input_len`.
    pub symbol_count: Vec<u32>,
    /// Adjacent non-decreasing pairs among cells `1..input_len`.
    pub correct_order: usize,
}

impl TapeMetrics {
    /// Empty metrics with one histogram bin per symbol.
    pub fn new(symbols: usize) -> Self {
        Self {
            symbol_count: vec![0; symbols],
            correct_order: 0,
        }
    }

    /// Measure `tape` over a `symbols`-sized alphabet.
    pub fn of(tape: &Tape, symbols: usize) -> Self {
        let mut metrics = Self::new(symbols);
        metrics.measure(tape);
        metrics
    }

    /// Re-measure in place, reusing the histogram buffer.
    ///
    /// The trailing boundary blank is part of the measured range, so a
    /// sorted input of `n` cells has `n - 3` ordered pairs.
    pub fn measure(&mut self, tape: &Tape) {
        self.symbol_count.fill(0);
        self.correct_order = 0;

        let cells = &tape.content[1.min(tape.input_len)..tape.input_len];
        for (i, &symbol) in cells.iter().enumerate() {
            if i > 0 && symbol >= cells[i - 1] {
                self.correct_order += 1;
            }
            if let Some(count) = self.symbol_count.get_mut(symbol as usize) {
                *count += 1;
            }
        }
    }
}

/// Sample tapes with their baseline metrics.
#[derive(Debug, Clone)]
pub struct SampleCorpus {
    tapes: Vec<Tape>,
    baselines: Vec<TapeMetrics>,
    symbol_count: usize,
}

impl SampleCorpus {
    /// Build a corpus over a `symbol_count`-sized alphabet.
    pub fn new<I, T>(inputs: I, symbol_count: usize) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[Symbol]>,
    {
        let mut tapes = Vec::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let input = input.as_ref();
            if let Some(&symbol) = input.iter().find(|&&s| s as usize >= symbol_count) {
                return Err(ConfigError::SampleSymbolOutOfRange {
                    tape: index,
                    symbol,
                    symbols: symbol_count,
                });
            }
            tapes.push(Tape::from_input(input)?);
        }
        if tapes.is_empty() {
            return Err(ConfigError::EmptyCorpus);
        }

        let baselines = tapes
            .iter()
            .map(|tape| TapeMetrics::of(tape, symbol_count))
            .collect();

        Ok(Self {
            tapes,
            baselines,
            symbol_count,
        })
    }

    /// The built-in three-tape corpus measured over `symbol_count` symbols.
    pub fn builtin(symbol_count: usize) -> Result<Self, ConfigError> {
        Self::new(BUILTIN_SAMPLE_TAPES, symbol_count)
    }

    pub fn len(&self) -> usize {
        self.tapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tapes.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_count
    }

    pub fn tapes(&self) -> &[Tape] {
        &self.tapes
    }

    pub fn baselines(&self) -> &[TapeMetrics] {
        &self.baselines
    }

    /// Iterate sample tapes together with their baselines.
    pub fn iter(&self) -> impl Iterator<Item = (&Tape, &TapeMetrics)> {
        self.tapes.iter().zip(&self.baselines)
    }
}

//! Transition table types for the tape machine.

use serde::{Deserialize, Serialize};

/// A machine state index.
pub type State = u8;
/// A tape symbol.
pub type Symbol = u8;

/// The blank symbol. Every tape starts with one at position 0.
pub const BLANK: Symbol = 0;

/// Head movement applied after a transition.
///
/// The discriminants are the codes used in the flat tuple dump format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Shift {
    /// One cell to the right.
    Right = 0,
    /// One cell to the left.
    Left = 1,
    /// Two cells to the right.
    DoubleRight = 2,
    /// Head stays in place.
    Stay = 3,
}

impl Shift {
    /// Every shift, in code order.
    pub const ALL: [Shift; 4] = [Shift::Right, Shift::Left, Shift::DoubleRight, Shift::Stay];

    /// Signed head displacement.
    #[inline]
    pub fn offset(self) -> isize {
        match self {
            Shift::Right => 1,
            Shift::Left => -1,
            Shift::DoubleRight => 2,
            Shift::Stay => 0,
        }
    }

    /// Numeric code used in tuple dumps.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Short mnemonic used in graph labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Shift::Right => "R",
            Shift::Left => "L",
            Shift::DoubleRight => "RR",
            Shift::Stay => "N",
        }
    }
}

impl std::fmt::Display for Shift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codomain entry of the transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionRule {
    /// State entered after this transition.
    pub next_state: State,
    /// Symbol written under the head, or `None` to leave the cell as is.
    pub write: Option<Symbol>,
    /// Head movement.
    pub shift: Shift,
}

impl TransitionRule {
    pub const fn new(next_state: State, write: Option<Symbol>, shift: Shift) -> Self {
        Self {
            next_state,
            write,
            shift,
        }
    }

    /// Written symbol with `-1` standing for "no write".
    pub fn write_code(&self) -> i16 {
        self.write.map_or(-1, i16::from)
    }
}

/// Errors raised by malformed transition tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    #[error(
        "No transition for state={state}, symbol={symbol}: table has {states} states and {symbols} symbols"
    )]
    MissingTransition {
        state: usize,
        symbol: usize,
        states: usize,
        symbols: usize,
    },
    #[error("Table needs {expected} rules ({states} states x {symbols} symbols), got {actual}")]
    RuleCount {
        states: usize,
        symbols: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Rule {index} targets state {state}, beyond the terminal states")]
    InvalidState { index: usize, state: State },
    #[error("Rule {index} writes symbol {symbol}, outside the {symbols}-symbol alphabet")]
    InvalidSymbol {
        index: usize,
        symbol: Symbol,
        symbols: usize,
    },
}

/// Borrowed view of a transition table.
///
/// Rules are laid out row-major: the rule for `(state, symbol)` lives at
/// `state * symbol_count + symbol`. States `state_count` (error) and
/// `state_count + 1` (accept) are implicit and halt the machine.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'a> {
    state_count: usize,
    symbol_count: usize,
    rules: &'a [TransitionRule],
}

impl<'a> TableView<'a> {
    /// Wrap a rule slice. Only the rule count is checked here.
    pub fn new(
        state_count: usize,
        symbol_count: usize,
        rules: &'a [TransitionRule],
    ) -> Result<Self, MachineError> {
        let expected = state_count * symbol_count;
        if rules.len() != expected {
            return Err(MachineError::RuleCount {
                states: state_count,
                symbols: symbol_count,
                expected,
                actual: rules.len(),
            });
        }
        Ok(Self {
            state_count,
            symbol_count,
            rules,
        })
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    #[inline]
    pub fn symbol_count(&self) -> usize {
        self.symbol_count
    }

    #[inline]
    pub fn rules(&self) -> &'a [TransitionRule] {
        self.rules
    }

    /// Terminal state reached on explicit failure.
    #[inline]
    pub fn error_state(&self) -> usize {
        self.state_count
    }

    /// Terminal state reached on success.
    #[inline]
    pub fn accept_state(&self) -> usize {
        self.state_count + 1
    }

    /// Look up the rule for `(state, symbol)`.
    #[inline]
    pub fn rule(&self, state: usize, symbol: usize) -> Result<&'a TransitionRule, MachineError> {
        if state < self.state_count && symbol < self.symbol_count {
            Ok(&self.rules[state * self.symbol_count + symbol])
        } else {
            Err(MachineError::MissingTransition {
                state,
                symbol,
                states: self.state_count,
                symbols: self.symbol_count,
            })
        }
    }

    /// Check every rule targets a known state and writes a known symbol.
    pub fn validate(&self) -> Result<(), MachineError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.next_state as usize > self.accept_state() {
                return Err(MachineError::InvalidState {
                    index,
                    state: rule.next_state,
                });
            }
            if let Some(symbol) = rule.write
                && symbol as usize >= self.symbol_count
            {
                return Err(MachineError::InvalidSymbol {
                    index,
                    symbol,
                    symbols: self.symbol_count,
                });
            }
        }
        Ok(())
    }

    /// Iterate `(state, symbol, rule)` triples in table order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, &'a TransitionRule)> + 'a {
        let symbols = self.symbol_count;
        self.rules
            .iter()
            .enumerate()
            .map(move |(i, rule)| (i / symbols, i % symbols, rule))
    }
}

/// Owned transition table.
///
/// Deserialized tables go through [`TransitionTable::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TransitionTable {
    state_count: usize,
    symbol_count: usize,
    rules: Vec<TransitionRule>,
}

/// Unvalidated serde form of [`TransitionTable`].
#[derive(Deserialize)]
struct RawTable {
    state_count: usize,
    symbol_count: usize,
    rules: Vec<TransitionRule>,
}

impl TryFrom<RawTable> for TransitionTable {
    type Error = MachineError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Self::new(raw.state_count, raw.symbol_count, raw.rules)
    }
}

impl TransitionTable {
    /// Build a table, validating shape and every rule.
    pub fn new(
        state_count: usize,
        symbol_count: usize,
        rules: Vec<TransitionRule>,
    ) -> Result<Self, MachineError> {
        TableView::new(state_count, symbol_count, &rules)?.validate()?;
        Ok(Self {
            state_count,
            symbol_count,
            rules,
        })
    }

    /// Copy a borrowed view into an owned table.
    pub fn from_view(view: TableView<'_>) -> Self {
        Self {
            state_count: view.state_count,
            symbol_count: view.symbol_count,
            rules: view.rules.to_vec(),
        }
    }

    #[inline]
    pub fn view(&self) -> TableView<'_> {
        TableView {
            state_count: self.state_count,
            symbol_count: self.symbol_count,
            rules: &self.rules,
        }
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_count
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Hand-written bubble sorter over the alphabet `{BLANK, 1, 2, 3}`.
    ///
    /// It scans right remembering the last symbol, swaps each descending
    /// pair it meets, and after a pass with swaps walks back to the left
    /// boundary to start over. A pass without swaps ends in the accept
    /// state.
    pub fn demo_bubble() -> Self {
        use Shift::{DoubleRight as RR, Left as L, Right as R, Stay as N};

        const START: State = 0;
        const WAS_1: State = 1;
        const WAS_2: State = 2;
        const WAS_3: State = 3;
        const S2_1: State = 4;
        const S3_1: State = 5;
        const S3_2: State = 6;
        const WAS_2_SWAP: State = 7;
        const WAS_3_SWAP: State = 8;
        const SEARCH_BLANK: State = 9;
        const ERROR: State = 10;
        const END: State = 11;

        let t = TransitionRule::new;
        #[rustfmt::skip]
        let rules = vec![
            // start
            t(END, None, N), t(WAS_1, None, R), t(WAS_2, None, R), t(WAS_3, None, R),
            // was_1
            t(END, None, N), t(WAS_1, None, R), t(WAS_2, None, R), t(WAS_3, None, R),
            // was_2
            t(END, None, N), t(S2_1, Some(2), L), t(WAS_2, None, R), t(WAS_3, None, R),
            // was_3
            t(END, None, N), t(S3_1, Some(3), L), t(S3_2, Some(3), L), t(WAS_3, None, R),
            // s2_1
            t(ERROR, None, N), t(ERROR, None, N), t(WAS_2_SWAP, Some(1), RR), t(ERROR, None, N),
            // s3_1
            t(ERROR, None, N), t(ERROR, None, N), t(ERROR, None, N), t(WAS_3_SWAP, Some(1), RR),
            // s3_2
            t(ERROR, None, N), t(ERROR, None, N), t(ERROR, None, N), t(WAS_3_SWAP, Some(2), RR),
            // was_2_swap
            t(SEARCH_BLANK, None, L), t(S2_1, Some(2), L), t(WAS_2_SWAP, None, R), t(WAS_3_SWAP, None, R),
            // was_3_swap
            t(SEARCH_BLANK, None, L), t(S3_1, Some(3), L), t(S3_2, Some(3), L), t(WAS_3_SWAP, None, R),
            // search_blank
            t(START, None, R), t(SEARCH_BLANK, None, L), t(SEARCH_BLANK, None, L), t(SEARCH_BLANK, None, L),
        ];

        Self {
            state_count: 10,
            symbol_count: 4,
            rules,
        }
    }
}

//! Rule universe and table mutation for evolutionary search.

use crate::schema::{ConfigError, Shift, State, Symbol, TransitionRule};
use rand::prelude::*;

/// Every legal rule for a given table shape.
///
/// Next states run over `0..=state_count`, so the error state is the only
/// terminal state a random rule can reach. Writes run over "no write" and
/// every symbol.
#[derive(Debug, Clone)]
pub struct RuleUniverse {
    rules: Vec<TransitionRule>,
}

impl RuleUniverse {
    /// Fails when the error state or a symbol does not fit its index type.
    pub fn new(state_count: usize, symbol_count: usize) -> Result<Self, ConfigError> {
        let error_state =
            State::try_from(state_count).map_err(|_| ConfigError::InvalidStates(state_count))?;
        let symbols =
            Symbol::try_from(symbol_count).map_err(|_| ConfigError::InvalidSymbols(symbol_count))?;

        let mut rules = Vec::with_capacity((state_count + 1) * (symbol_count + 1) * Shift::ALL.len());
        for shift in Shift::ALL {
            for write in std::iter::once(None).chain((0..symbols).map(Some)) {
                for state in 0..=error_state {
                    rules.push(TransitionRule::new(state, write, shift));
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[TransitionRule] {
        &self.rules
    }

    /// Uniform draw.
    #[inline]
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> TransitionRule {
        self.rules[rng.gen_range(0..self.rules.len())]
    }
}

/// Random number generator bundled with a search instance's rule universe.
pub struct TableRng {
    rng: StdRng,
    universe: RuleUniverse,
}

impl TableRng {
    /// Create from seed.
    pub fn new(seed: u64, state_count: usize, symbol_count: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            universe: RuleUniverse::new(state_count, symbol_count)?,
        })
    }

    pub fn universe(&self) -> &RuleUniverse {
        &self.universe
    }

    /// Fill `table` with uniformly drawn rules.
    pub fn randomize(&mut self, table: &mut [TransitionRule]) {
        for rule in table.iter_mut() {
            *rule = self.universe.draw(&mut self.rng);
        }
    }

    /// Number of point mutations for a table of `table_size` rules, in `1..=table_size`.
    pub fn mutation_count(&mut self, table_size: usize) -> usize {
        self.rng.gen_range(1..=table_size.max(1))
    }

    /// Replace `count` randomly chosen entries with fresh draws.
    ///
    /// Entries may be hit more than once, and a draw may equal the rule it
    /// replaces.
    pub fn mutate(&mut self, table: &mut [TransitionRule], count: usize) {
        if table.is_empty() {
            return;
        }
        for _ in 0..count {
            let index = self.rng.gen_range(0..table.len());
            table[index] = self.universe.draw(&mut self.rng);
        }
    }
}

//! Configuration types for the evolutionary search.

use serde::{Deserialize, Serialize};

use super::{SampleCorpus, State, Symbol};
use crate::control::Verbosity;

/// Top-level search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of candidate tables per search instance.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Number of non-terminal machine states.
    #[serde(default = "default_states")]
    pub states: usize,
    /// Alphabet size, blank included.
    #[serde(default = "default_symbols")]
    pub symbols: usize,
    /// Top-ranked candidates promoted every generation.
    #[serde(default = "default_best_cnt")]
    pub best_cnt: usize,
    /// Offspring spawned per promoted candidate.
    #[serde(default = "default_kids_cnt")]
    pub kids_cnt: usize,
    /// Generations without improvement before the population restarts.
    #[serde(default = "default_degeneration_cnt")]
    pub degeneration_cnt: u64,
    /// Directory receiving dumps of new best candidates.
    #[serde(default = "default_output")]
    pub output: String,
    /// Diagnostic verbosity, 0 (silent) to 3 (per-tape detail).
    #[serde(default)]
    pub log_level: u8,
    /// Base for the per-worker seed sequence (None = entropy).
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Worker threads (0 = one per available CPU).
    #[serde(default)]
    pub workers: usize,
    /// Stop each worker after this many generations (None = run until stopped).
    #[serde(default)]
    pub max_generations: Option<u64>,
    /// Replacement sample tapes, each including both boundary blanks.
    #[serde(default)]
    pub sample_tapes: Option<Vec<Vec<Symbol>>>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            states: default_states(),
            symbols: default_symbols(),
            best_cnt: default_best_cnt(),
            kids_cnt: default_kids_cnt(),
            degeneration_cnt: default_degeneration_cnt(),
            output: default_output(),
            log_level: 0,
            random_seed: None,
            workers: 0,
            max_generations: None,
            sample_tapes: None,
        }
    }
}

fn default_population_size() -> usize {
    10000
}
fn default_states() -> usize {
    12
}
fn default_symbols() -> usize {
    4
}
fn default_best_cnt() -> usize {
    5000
}
fn default_kids_cnt() -> usize {
    10
}
fn default_degeneration_cnt() -> u64 {
    1000
}
fn default_output() -> String {
    "output".to_string()
}

/// Immutable per-run parameters of one search instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameters {
    pub population_size: usize,
    pub state_count: usize,
    pub symbol_count: usize,
    pub best_cnt: usize,
    pub kids_cnt: usize,
    pub degeneration_cnt: u64,
}

impl SearchParameters {
    /// Check the population size and that every state and symbol index,
    /// terminal states included, fits its integer type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size < 2 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.state_count == 0 || self.state_count + 1 > State::MAX as usize {
            return Err(ConfigError::InvalidStates(self.state_count));
        }
        if self.symbol_count < 2 || self.symbol_count > Symbol::MAX as usize {
            return Err(ConfigError::InvalidSymbols(self.symbol_count));
        }
        Ok(())
    }

    /// Rules per transition table.
    #[inline]
    pub fn table_size(&self) -> usize {
        self.state_count * self.symbol_count
    }
}

impl SearchConfig {
    /// Extract the engine parameters.
    pub fn parameters(&self) -> SearchParameters {
        SearchParameters {
            population_size: self.population_size,
            state_count: self.states,
            symbol_count: self.symbols,
            best_cnt: self.best_cnt,
            kids_cnt: self.kids_cnt,
            degeneration_cnt: self.degeneration_cnt,
        }
    }

    /// Configured verbosity, clamped to the highest level.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.log_level).unwrap_or(Verbosity::Debug)
    }

    /// Worker thread count, resolving 0 to the available parallelism.
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism().map_or(1, |n| n.get())
        }
    }

    /// Sample corpus: the configured tapes or the built-in ones.
    pub fn corpus(&self) -> Result<SampleCorpus, ConfigError> {
        match &self.sample_tapes {
            Some(tapes) => SampleCorpus::new(tapes, self.symbols),
            None => SampleCorpus::builtin(self.symbols),
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parameters().validate()?;
        if self.best_cnt == 0 || self.kids_cnt == 0 || self.degeneration_cnt == 0 {
            return Err(ConfigError::ZeroCount);
        }
        if self.kids_cnt > self.best_cnt {
            return Err(ConfigError::KidsExceedBest {
                kids: self.kids_cnt,
                best: self.best_cnt,
            });
        }
        if self.log_level > Verbosity::Debug as u8 {
            return Err(ConfigError::InvalidLogLevel(self.log_level));
        }
        if self.output.is_empty() {
            return Err(ConfigError::EmptyOutput);
        }
        self.corpus()?;
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be at least 2")]
    PopulationTooSmall,
    #[error("State count {0} must be between 1 and {max}", max = State::MAX - 1)]
    InvalidStates(usize),
    #[error("Symbol count {0} must be between 2 and {max}", max = Symbol::MAX)]
    InvalidSymbols(usize),
    #[error("best_cnt, kids_cnt and degeneration_cnt must be non-zero")]
    ZeroCount,
    #[error("kids_cnt ({kids}) must not exceed best_cnt ({best})")]
    KidsExceedBest { kids: usize, best: usize },
    #[error("Log level {0} must be in range 0..=3")]
    InvalidLogLevel(u8),
    #[error("Output directory must be set")]
    EmptyOutput,
    #[error("No sample tapes given")]
    EmptyCorpus,
    #[error("Sample tape length {len} must be between 2 and {capacity}")]
    InvalidTapeLength { len: usize, capacity: usize },
    #[error("Sample tapes must begin with the blank symbol")]
    MissingBoundaryBlank,
    #[error("Sample tape {tape} holds symbol {symbol}, outside the {symbols}-symbol alphabet")]
    SampleSymbolOutOfRange {
        tape: usize,
        symbol: Symbol,
        symbols: usize,
    },
    #[error("Sample corpus has {corpus} symbols but tables use {tables}")]
    AlphabetMismatch { corpus: usize, tables: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.parameters().table_size(), 48);
    }

    #[test]
    fn test_kids_exceeding_best_rejected() {
        let config = SearchConfig {
            best_cnt: 3,
            kids_cnt: 4,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::KidsExceedBest { kids: 4, best: 3 })
        ));
    }

    #[test]
    fn test_state_and_symbol_limits() {
        let config = SearchConfig {
            states: 255,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStates(255))));

        let config = SearchConfig {
            symbols: 3,
            ..Default::default()
        };
        // The built-in tapes use symbol 3.
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SampleSymbolOutOfRange { symbol: 3, .. })
        ));
    }

    #[test]
    fn test_parameters_validate_shape() {
        let params = SearchConfig::default().parameters();
        assert!(params.validate().is_ok());

        let wide = SearchParameters {
            state_count: 300,
            ..params
        };
        assert!(matches!(wide.validate(), Err(ConfigError::InvalidStates(300))));

        let largest = SearchParameters {
            state_count: 254,
            symbol_count: 255,
            ..params
        };
        assert!(largest.validate().is_ok());

        let unary = SearchParameters {
            symbol_count: 1,
            ..params
        };
        assert!(matches!(unary.validate(), Err(ConfigError::InvalidSymbols(1))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SearchConfig =
            serde_json::from_str(r#"{ "population_size": 50, "states": 6 }"#).unwrap();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.states, 6);
        assert_eq!(config.best_cnt, 5000);
        assert_eq!(config.output, "output");
        assert!(config.sample_tapes.is_none());
    }

    #[test]
    fn test_custom_sample_tapes() {
        let config = SearchConfig {
            sample_tapes: Some(vec![vec![0, 2, 1, 0]]),
            ..Default::default()
        };
        let corpus = config.corpus().unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.symbol_count(), 4);
    }

    #[test]
    fn test_serialization() {
        let config = SearchConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SearchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.population_size, config.population_size);
        assert_eq!(parsed.degeneration_cnt, config.degeneration_cnt);
    }
}

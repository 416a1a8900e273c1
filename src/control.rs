//! Runtime control shared between the operator and running search workers.
//!
//! Workers never block on the control: they read a [`ControlSnapshot`] once
//! per generation and check the stop flag between generations. Changes are
//! made through [`SearchControl`] setters or by applying a parsed
//! [`ControlCommand`] line.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};

use log::LevelFilter;

use crate::schema::SearchParameters;

/// Diagnostic output volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Verbosity {
    /// Only warnings and errors.
    Silent = 0,
    /// New best candidates and generation progress.
    Best = 1,
    /// Every evaluation trace.
    All = 2,
    /// Per-tape fitness detail.
    Debug = 3,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Silent),
            1 => Some(Self::Best),
            2 => Some(Self::All),
            3 => Some(Self::Debug),
            _ => None,
        }
    }

    /// Matching `log` filter.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Silent => LevelFilter::Warn,
            Self::Best => LevelFilter::Info,
            Self::All => LevelFilter::Debug,
            Self::Debug => LevelFilter::Trace,
        }
    }
}

/// Values a worker reads at the start of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub best_cnt: usize,
    pub kids_cnt: usize,
    pub degeneration_cnt: u64,
}

/// Rejected control input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("Log level must be in range <0,3>, got {0}")]
    InvalidLogLevel(u64),
    #[error("Expected a number after '{verb}', got {input:?}")]
    InvalidNumber { verb: char, input: String },
    #[error("{name} must be positive")]
    Zero { name: &'static str },
    #[error("KIDS_CNT ({kids}) must not exceed BEST_CNT ({best})")]
    KidsExceedBest { kids: usize, best: usize },
}

/// One line of operator input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    LogLevel(Verbosity),
    BestCount(usize),
    KidsCount(usize),
    DegenerationCount(u64),
    Continue,
    Exit,
}

impl ControlCommand {
    /// Parse an operator line.
    ///
    /// A leading digit sets the log level; `b N`, `k N` and `d N` set the
    /// best, kids and degeneration counts; `c` continues; anything else
    /// (including an empty line) asks to exit.
    pub fn parse(line: &str) -> Result<Self, ControlError> {
        let line = line.trim();
        let Some(first) = line.chars().next() else {
            return Ok(Self::Exit);
        };

        if first.is_ascii_digit() {
            let level: u64 = line.parse().map_err(|_| ControlError::InvalidNumber {
                verb: first,
                input: line.to_string(),
            })?;
            return u8::try_from(level)
                .ok()
                .and_then(Verbosity::from_level)
                .map(Self::LogLevel)
                .ok_or(ControlError::InvalidLogLevel(level));
        }

        let verb = first.to_ascii_lowercase();
        let rest = line[first.len_utf8()..].trim();
        let number = || {
            rest.parse::<u64>().map_err(|_| ControlError::InvalidNumber {
                verb,
                input: rest.to_string(),
            })
        };

        match verb {
            'b' => Ok(Self::BestCount(number()? as usize)),
            'k' => Ok(Self::KidsCount(number()? as usize)),
            'd' => Ok(Self::DegenerationCount(number()?)),
            'c' => Ok(Self::Continue),
            _ => Ok(Self::Exit),
        }
    }
}

/// Shared, lock-free runtime configuration.
#[derive(Debug)]
pub struct SearchControl {
    best_cnt: AtomicUsize,
    kids_cnt: AtomicUsize,
    degeneration_cnt: AtomicU64,
    verbosity: AtomicU8,
    stop: AtomicBool,
}

impl SearchControl {
    pub fn new(params: &SearchParameters, verbosity: Verbosity) -> Self {
        Self {
            best_cnt: AtomicUsize::new(params.best_cnt),
            kids_cnt: AtomicUsize::new(params.kids_cnt),
            degeneration_cnt: AtomicU64::new(params.degeneration_cnt),
            verbosity: AtomicU8::new(verbosity as u8),
            stop: AtomicBool::new(false),
        }
    }

    /// Current adjustable counts.
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            best_cnt: self.best_cnt.load(Ordering::Relaxed),
            kids_cnt: self.kids_cnt.load(Ordering::Relaxed),
            degeneration_cnt: self.degeneration_cnt.load(Ordering::Relaxed),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.verbosity.load(Ordering::Relaxed)).unwrap_or(Verbosity::Debug)
    }

    /// Change verbosity and the global `log` filter with it.
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        self.verbosity.store(verbosity as u8, Ordering::Relaxed);
        log::set_max_level(verbosity.level_filter());
    }

    pub fn set_best_cnt(&self, best: usize) -> Result<(), ControlError> {
        if best == 0 {
            return Err(ControlError::Zero { name: "BEST_CNT" });
        }
        let kids = self.kids_cnt.load(Ordering::Relaxed);
        if kids > best {
            return Err(ControlError::KidsExceedBest { kids, best });
        }
        self.best_cnt.store(best, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_kids_cnt(&self, kids: usize) -> Result<(), ControlError> {
        if kids == 0 {
            return Err(ControlError::Zero { name: "KIDS_CNT" });
        }
        let best = self.best_cnt.load(Ordering::Relaxed);
        if kids > best {
            return Err(ControlError::KidsExceedBest { kids, best });
        }
        self.kids_cnt.store(kids, Ordering::Relaxed);
        Ok(())
    }

    pub fn set_degeneration_cnt(&self, generations: u64) -> Result<(), ControlError> {
        if generations == 0 {
            return Err(ControlError::Zero {
                name: "DEGENERATION_CNT",
            });
        }
        self.degeneration_cnt.store(generations, Ordering::Relaxed);
        Ok(())
    }

    /// Drop log output to warnings without changing the stored verbosity.
    pub fn pause_logging(&self) {
        log::set_max_level(Verbosity::Silent.level_filter());
    }

    /// Reapply the stored verbosity after [`pause_logging`](Self::pause_logging).
    pub fn resume_logging(&self) {
        log::set_max_level(self.verbosity().level_filter());
    }

    /// Ask every worker to return after its current generation.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Apply a parsed command.
    pub fn apply(&self, command: ControlCommand) -> Result<(), ControlError> {
        match command {
            ControlCommand::LogLevel(verbosity) => self.set_verbosity(verbosity),
            ControlCommand::BestCount(best) => self.set_best_cnt(best)?,
            ControlCommand::KidsCount(kids) => self.set_kids_cnt(kids)?,
            ControlCommand::DegenerationCount(generations) => {
                self.set_degeneration_cnt(generations)?
            }
            ControlCommand::Continue => {}
            ControlCommand::Exit => self.request_stop(),
        }
        Ok(())
    }
}

impl std::fmt::Display for SearchControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "log_level={}, best_cnt={}, kids_cnt={}, degeneration_cnt={}",
            self.verbosity() as u8,
            snapshot.best_cnt,
            snapshot.kids_cnt,
            snapshot.degeneration_cnt
        )
    }
}

//! Turing Sort - evolutionary search for sorting Turing machines.
//!
//! This crate searches, by mutation and selection, for finite-state
//! transition tables that make a bounded-tape Turing machine sort the
//! symbols written on its tape.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Plain data types (configuration, transition tables, tapes)
//! - `compute`: The machine interpreter, fitness evaluation, the selection
//!   engine and the parallel worker driver
//! - `control`: Runtime reconfiguration shared with running workers
//!
//! # Example
//!
//! ```rust,no_run
//! use turing_sort::{
//!     compute::evolution::{FitnessEvaluator, NullSink, SearchEngine},
//!     control::SearchControl,
//!     schema::{SearchConfig, TransitionTable},
//! };
//!
//! let config = SearchConfig::default();
//! let corpus = config.corpus().unwrap();
//!
//! // Score the hand-written bubble sorter on the sample tapes
//! let mut evaluator = FitnessEvaluator::new(&corpus);
//! let fitness = evaluator.evaluate(TransitionTable::demo_bubble().view()).unwrap();
//! println!("Demo bubble fitness: {fitness:.4}");
//!
//! // Run a single search instance for a few generations
//! let params = config.parameters();
//! let control = SearchControl::new(&params, config.verbosity());
//! let mut engine = SearchEngine::new(0, params, &corpus, 42)
//!     .unwrap()
//!     .with_max_generations(Some(10));
//! let summary = engine.run(&control, &mut NullSink).unwrap();
//! println!("Best fitness: {:.4}", summary.best_fitness);
//! ```

pub mod compute;
pub mod control;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{FitnessEvaluator, SearchEngine, SearchSummary};
pub use compute::{ExecutionStatus, run_workers};
pub use control::{SearchControl, Verbosity};
pub use schema::{SampleCorpus, SearchConfig, Tape, TransitionTable};

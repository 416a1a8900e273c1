//! Evolutionary search for tape-sorting transition tables.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): scores a table by running it over the sample corpus
//! - **Genome operations** (`genome`): the rule universe, random tables and point mutation
//! - **Queue** (`queue`): bounded max-heap ranking candidates by fitness
//! - **Search** (`search`): the population arena and the generational engine
//! - **Archive** (`archive`): sinks receiving every new best candidate
//!
//! # Example
//!
//! ```rust,no_run
//! use turing_sort::compute::evolution::{CollectingSink, SearchEngine};
//! use turing_sort::control::SearchControl;
//! use turing_sort::schema::SearchConfig;
//!
//! let config = SearchConfig {
//!     population_size: 100,
//!     best_cnt: 20,
//!     ..Default::default()
//! };
//! let corpus = config.corpus().unwrap();
//! let control = SearchControl::new(&config.parameters(), config.verbosity());
//!
//! let mut sink = CollectingSink::default();
//! let mut engine = SearchEngine::new(0, config.parameters(), &corpus, 1234)
//!     .unwrap()
//!     .with_max_generations(Some(50));
//! let summary = engine.run(&control, &mut sink).unwrap();
//!
//! println!("Best fitness: {:.3}", summary.best_fitness);
//! println!("New bests found: {}", sink.records.len());
//! ```

mod archive;
mod fitness;
mod genome;
mod queue;
mod search;

pub use archive::{
    BestReport, BestSink, CollectingSink, DumpError, GraphDump, NullSink, RecordedBest,
    render_graph, render_tuples,
};
pub use fitness::{FitnessEvaluator, TapeEvaluation, score_run};
pub use genome::{RuleUniverse, TableRng};
pub use queue::{FitnessQueue, QueueEntry, QueueError};
pub use search::{Population, SearchEngine, SearchError, SearchPhase, SearchSummary};

//! Parallel search workers.
//!
//! Each pool thread runs one [`SearchEngine`] with its own population, queue
//! and rule universe. The workers share only the read-only sample corpus,
//! the [`SearchControl`] and a [`SeedSequence`].

use std::sync::atomic::{AtomicU64, Ordering};

use log::{error, info};

use super::evolution::{BestSink, SearchEngine, SearchError, SearchSummary};
use crate::control::SearchControl;
use crate::schema::{SampleCorpus, SearchConfig, SearchParameters};

/// Distance between consecutive worker seeds.
pub const SEED_STRIDE: u64 = 10_000;

/// Process-wide source of per-worker seeds.
#[derive(Debug)]
pub struct SeedSequence {
    next: AtomicU64,
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self {
            next: AtomicU64::new(base),
        }
    }

    /// Take the next seed. Every call returns a distinct value.
    pub fn next_seed(&self) -> u64 {
        self.next.fetch_add(SEED_STRIDE, Ordering::Relaxed)
    }
}

/// Run one engine to completion on the calling thread.
pub fn run_worker<S: BestSink>(
    worker_id: usize,
    params: SearchParameters,
    corpus: &SampleCorpus,
    control: &SearchControl,
    seed: u64,
    max_generations: Option<u64>,
    mut sink: S,
) -> Result<SearchSummary, SearchError> {
    let mut engine =
        SearchEngine::new(worker_id, params, corpus, seed)?.with_max_generations(max_generations);
    let summary = engine.run(control, &mut sink)?;
    info!(
        "Worker {worker_id} finished: generations={}, restarts={}, best fitness={:.6}",
        summary.generations, summary.restarts, summary.best_fitness
    );
    Ok(summary)
}

/// Run `config.worker_count()` independent searches in parallel.
///
/// `make_sink` builds the best-candidate sink of each worker from its id.
/// The first worker to fail stops the others; its error is returned once
/// every worker has returned.
pub fn run_workers<S, F>(
    config: &SearchConfig,
    corpus: &SampleCorpus,
    control: &SearchControl,
    make_sink: F,
) -> Result<Vec<SearchSummary>, SearchError>
where
    S: BestSink,
    F: Fn(usize) -> Result<S, SearchError> + Sync,
{
    let params = config.parameters();
    let workers = config.worker_count();
    let seeds = SeedSequence::new(config.random_seed.unwrap_or_else(rand::random));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("search-{i}"))
        .build()?;
    info!("Starting {workers} search workers");

    let results = pool.broadcast(|ctx| {
        let worker_id = ctx.index();
        let result = make_sink(worker_id).and_then(|sink| {
            run_worker(
                worker_id,
                params,
                corpus,
                control,
                seeds.next_seed(),
                config.max_generations,
                sink,
            )
        });
        if let Err(err) = &result {
            error!("Worker {worker_id} failed: {err}");
            control.request_stop();
        }
        result
    });

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::NullSink;
    use crate::control::Verbosity;
    use crate::schema::ConfigError;

    fn small_config() -> SearchConfig {
        SearchConfig {
            population_size: 8,
            states: 3,
            best_cnt: 4,
            kids_cnt: 2,
            workers: 2,
            random_seed: Some(1),
            max_generations: Some(2),
            ..Default::default()
        }
    }

    #[test]
    fn test_seed_sequence_strides() {
        let seeds = SeedSequence::new(5);
        assert_eq!(seeds.next_seed(), 5);
        assert_eq!(seeds.next_seed(), 10_005);
        assert_eq!(seeds.next_seed(), 20_005);
    }

    #[test]
    fn test_seeds_distinct_across_threads() {
        let seeds = SeedSequence::new(0);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let mut taken = pool.broadcast(|_| seeds.next_seed());
        taken.sort_unstable();
        assert_eq!(taken, vec![0, 10_000, 20_000, 30_000]);
    }

    #[test]
    fn test_workers_run_independently() {
        let config = small_config();
        let corpus = config.corpus().unwrap();
        let control = SearchControl::new(&config.parameters(), Verbosity::Silent);

        let summaries = run_workers(&config, &corpus, &control, |_| Ok(NullSink)).unwrap();
        assert_eq!(summaries.len(), 2);

        let mut ids: Vec<usize> = summaries.iter().map(|s| s.worker_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
        for summary in &summaries {
            assert_eq!(summary.generations, 2);
            assert_eq!(summary.evaluations, 8 + 2 * 4 * 2);
        }
    }

    #[test]
    fn test_worker_failure_stops_search() {
        let config = SearchConfig {
            max_generations: None,
            ..small_config()
        };
        let corpus = config.corpus().unwrap();
        let control = SearchControl::new(&config.parameters(), Verbosity::Silent);

        let result = run_workers(&config, &corpus, &control, |worker_id| {
            if worker_id == 1 {
                Err(ConfigError::EmptyOutput.into())
            } else {
                Ok(NullSink)
            }
        });

        assert!(matches!(
            result,
            Err(SearchError::Config(ConfigError::EmptyOutput))
        ));
        assert!(control.should_stop());
    }
}

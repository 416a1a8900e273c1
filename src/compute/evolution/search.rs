//! Generational search over transition tables.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::control::{ControlSnapshot, SearchControl};
use crate::schema::{
    ConfigError, MachineError, SampleCorpus, SearchParameters, Shift, TableView, TransitionRule,
};

use super::archive::{BestReport, BestSink, DumpError};
use super::fitness::FitnessEvaluator;
use super::genome::TableRng;
use super::queue::{FitnessQueue, QueueError};

/// Fatal failure of a search instance.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Dump(#[from] DumpError),
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Current phase of the engine's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Initializing,
    Evaluating,
    Selecting,
    Mutating,
    Restarting,
}

/// Fixed-size arena of candidate tables and their fitness.
///
/// Candidate `id` owns rules `id * table_size..(id + 1) * table_size`.
#[derive(Debug, Clone)]
pub struct Population {
    state_count: usize,
    symbol_count: usize,
    rules: Vec<TransitionRule>,
    fitness: Vec<f64>,
}

impl Population {
    pub fn new(params: &SearchParameters) -> Self {
        let blank = TransitionRule::new(0, None, Shift::Stay);
        Self {
            state_count: params.state_count,
            symbol_count: params.symbol_count,
            rules: vec![blank; params.population_size * params.table_size()],
            fitness: vec![f64::NEG_INFINITY; params.population_size],
        }
    }

    pub fn len(&self) -> usize {
        self.fitness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fitness.is_empty()
    }

    #[inline]
    pub fn table_size(&self) -> usize {
        self.state_count * self.symbol_count
    }

    #[inline]
    fn span(&self, id: usize) -> std::ops::Range<usize> {
        let size = self.table_size();
        id * size..(id + 1) * size
    }

    pub fn table(&self, id: usize) -> Result<TableView<'_>, MachineError> {
        TableView::new(self.state_count, self.symbol_count, &self.rules[self.span(id)])
    }

    pub fn table_mut(&mut self, id: usize) -> &mut [TransitionRule] {
        let span = self.span(id);
        &mut self.rules[span]
    }

    pub fn fitness(&self, id: usize) -> f64 {
        self.fitness[id]
    }

    pub fn set_fitness(&mut self, id: usize, fitness: f64) {
        self.fitness[id] = fitness;
    }

    /// Overwrite `kid` with a copy of `parent`, then mutate `kid` in place.
    ///
    /// When `parent == kid` the parent itself is mutated.
    pub fn breed(&mut self, parent: usize, kid: usize, rng: &mut TableRng, mutations: usize) {
        if parent != kid {
            let kid_start = self.span(kid).start;
            let parent_span = self.span(parent);
            self.rules.copy_within(parent_span, kid_start);
        }
        let span = self.span(kid);
        rng.mutate(&mut self.rules[span], mutations);
    }
}

/// Outcome of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub worker_id: usize,
    pub generations: u64,
    pub restarts: u64,
    pub evaluations: u64,
    /// Best fitness seen over all restarts.
    pub best_fitness: f64,
}

/// One independent search instance.
///
/// Every generation, each of the top `best_cnt` heap positions spawns
/// `kids_cnt` mutated copies. Each copy overwrites the candidate in the
/// heap's last slot and is re-ranked in place. A copy that lands at
/// position 1 is a new best and goes to the sink. After more than
/// `degeneration_cnt` generations without one, the whole population is
/// regenerated.
pub struct SearchEngine<'a> {
    worker_id: usize,
    params: SearchParameters,
    rng: TableRng,
    evaluator: FitnessEvaluator<'a>,
    population: Population,
    queue: FitnessQueue,
    phase: SearchPhase,
    generation: u64,
    last_improvement: u64,
    restarts: u64,
    evaluations: u64,
    best_fitness: f64,
    max_generations: Option<u64>,
}

impl<'a> SearchEngine<'a> {
    /// Create an engine. The population is allocated but not generated.
    pub fn new(
        worker_id: usize,
        params: SearchParameters,
        corpus: &'a SampleCorpus,
        seed: u64,
    ) -> Result<Self, SearchError> {
        params.validate()?;
        if corpus.symbol_count() != params.symbol_count {
            return Err(ConfigError::AlphabetMismatch {
                corpus: corpus.symbol_count(),
                tables: params.symbol_count,
            }
            .into());
        }
        debug!("Worker {worker_id}: seed={seed}");

        Ok(Self {
            worker_id,
            params,
            rng: TableRng::new(seed, params.state_count, params.symbol_count)?,
            evaluator: FitnessEvaluator::new(corpus),
            population: Population::new(&params),
            queue: FitnessQueue::new(params.population_size),
            phase: SearchPhase::Initializing,
            generation: 0,
            last_improvement: 0,
            restarts: 0,
            evaluations: 0,
            best_fitness: f64::NEG_INFINITY,
            max_generations: None,
        })
    }

    /// Stop [`run`](Self::run) after this many generations.
    pub fn with_max_generations(mut self, max_generations: Option<u64>) -> Self {
        self.max_generations = max_generations;
        self
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn params(&self) -> &SearchParameters {
        &self.params
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the latest new best, or of the latest restart.
    pub fn last_improvement(&self) -> u64 {
        self.last_improvement
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn best_fitness(&self) -> f64 {
        self.best_fitness
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn queue(&self) -> &FitnessQueue {
        &self.queue
    }

    /// Whether every candidate is generated and ranked.
    pub fn is_initialized(&self) -> bool {
        self.queue.len() == self.params.population_size
    }

    /// Generate a random population, score it and rank it.
    pub fn initialize(&mut self) -> Result<(), SearchError> {
        self.phase = SearchPhase::Initializing;
        for id in 0..self.population.len() {
            self.rng.randomize(self.population.table_mut(id));
        }

        self.phase = SearchPhase::Evaluating;
        self.queue.reset();
        for id in 0..self.population.len() {
            let fitness = self.evaluator.evaluate(self.population.table(id)?)?;
            self.population.set_fitness(id, fitness);
            self.evaluations += 1;
            self.best_fitness = self.best_fitness.max(fitness);
            self.queue.insert(id, fitness)?;
        }

        self.phase = SearchPhase::Selecting;
        Ok(())
    }

    /// Run one generation with the counts in `control`.
    pub fn step_generation(
        &mut self,
        control: &ControlSnapshot,
        sink: &mut dyn BestSink,
    ) -> Result<(), SearchError> {
        if !self.is_initialized() {
            self.initialize()?;
        }

        let last = self.queue.len();
        let parents = control.best_cnt.min(last);
        let table_size = self.population.table_size();

        for rank in 1..=parents {
            self.phase = SearchPhase::Selecting;
            let parent = self
                .queue
                .get(rank)
                .ok_or(QueueError::PositionOutOfRange {
                    position: rank,
                    len: last,
                })?;

            self.phase = SearchPhase::Mutating;
            for _ in 0..control.kids_cnt {
                let evicted = self
                    .queue
                    .get(last)
                    .ok_or(QueueError::PositionOutOfRange {
                        position: last,
                        len: last,
                    })?;
                let mutations = self.rng.mutation_count(table_size);
                self.population
                    .breed(parent.id, evicted.id, &mut self.rng, mutations);
                self.rank_last(sink)?;
            }
        }

        info!("Worker {}: generation {} finished", self.worker_id, self.generation);
        self.generation += 1;

        if self.generation - self.last_improvement > control.degeneration_cnt {
            self.restart()?;
        }
        self.phase = SearchPhase::Selecting;
        Ok(())
    }

    /// Throw the population away and generate a new one.
    pub fn restart(&mut self) -> Result<(), SearchError> {
        self.phase = SearchPhase::Restarting;
        warn!(
            "Worker {}: point of degeneration reached. Generating the whole new population",
            self.worker_id
        );
        self.restarts += 1;
        self.last_improvement = self.generation;
        self.initialize()
    }

    /// Loop generations until the control asks to stop or the generation
    /// limit is reached.
    pub fn run(
        &mut self,
        control: &SearchControl,
        sink: &mut dyn BestSink,
    ) -> Result<SearchSummary, SearchError> {
        if !self.is_initialized() {
            self.initialize()?;
        }

        while !control.should_stop()
            && self.max_generations.is_none_or(|max| self.generation < max)
        {
            self.step_generation(&control.snapshot(), sink)?;
        }

        Ok(self.summary())
    }

    pub fn summary(&self) -> SearchSummary {
        SearchSummary {
            worker_id: self.worker_id,
            generations: self.generation,
            restarts: self.restarts,
            evaluations: self.evaluations,
            best_fitness: self.best_fitness,
        }
    }

    /// Score the candidate at the last heap position and re-rank it. One
    /// that rises to position 1 goes to `sink`.
    fn rank_last(&mut self, sink: &mut dyn BestSink) -> Result<(), SearchError> {
        let last = self.queue.len();
        let entry = self.queue.get(last).ok_or(QueueError::PositionOutOfRange {
            position: last,
            len: last,
        })?;

        let fitness = self.evaluator.evaluate(self.population.table(entry.id)?)?;
        self.population.set_fitness(entry.id, fitness);
        self.evaluations += 1;

        if self.queue.priority_changed(last, fitness)? == 1 {
            self.record_best(entry.id, fitness, sink)?;
        }
        Ok(())
    }

    fn record_best(
        &mut self,
        id: usize,
        fitness: f64,
        sink: &mut dyn BestSink,
    ) -> Result<(), SearchError> {
        self.last_improvement = self.generation;
        self.best_fitness = self.best_fitness.max(fitness);
        info!(
            "Worker {}: new best fitness={fitness:.6} in generation {}",
            self.worker_id, self.generation
        );

        let report = BestReport {
            worker_id: self.worker_id,
            generation: self.generation,
            restarts: self.restarts,
            fitness,
            table: self.population.table(id)?,
            trace: self.evaluator.trace(),
            params: &self.params,
        };
        sink.record(&report)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::evolution::{CollectingSink, NullSink};
    use crate::control::Verbosity;
    use crate::schema::{BUILTIN_SAMPLE_SYMBOLS, TransitionTable};

    fn small_params() -> SearchParameters {
        SearchParameters {
            population_size: 8,
            state_count: 3,
            symbol_count: 4,
            best_cnt: 4,
            kids_cnt: 2,
            degeneration_cnt: 1000,
        }
    }

    fn corpus() -> SampleCorpus {
        SampleCorpus::builtin(BUILTIN_SAMPLE_SYMBOLS).unwrap()
    }

    fn snapshot(params: &SearchParameters) -> ControlSnapshot {
        ControlSnapshot {
            best_cnt: params.best_cnt,
            kids_cnt: params.kids_cnt,
            degeneration_cnt: params.degeneration_cnt,
        }
    }

    #[test]
    fn test_initialize_fills_population() {
        let corpus = corpus();
        let mut engine = SearchEngine::new(0, small_params(), &corpus, 42).unwrap();
        assert!(!engine.is_initialized());

        engine.initialize().unwrap();
        assert!(engine.is_initialized());
        assert_eq!(engine.phase(), SearchPhase::Selecting);
        assert_eq!(engine.evaluations(), 8);
        assert!(engine.queue().is_valid());

        let mut ids: Vec<usize> = engine.queue().iter().map(|e| e.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
        for entry in engine.queue().iter() {
            assert_eq!(engine.population().fitness(entry.id), entry.fitness);
        }
    }

    #[test]
    fn test_generation_keeps_queue_in_sync() {
        let corpus = corpus();
        let params = small_params();
        let mut engine = SearchEngine::new(0, params, &corpus, 7).unwrap();
        engine.initialize().unwrap();

        for _ in 0..5 {
            engine.step_generation(&snapshot(&params), &mut NullSink).unwrap();
            assert_eq!(engine.queue().len(), params.population_size);
            assert!(engine.queue().is_valid());
            for entry in engine.queue().iter() {
                assert_eq!(engine.population().fitness(entry.id), entry.fitness);
            }
        }
        assert_eq!(engine.generation(), 5);
        assert_eq!(engine.evaluations(), 8 + 5 * 4 * 2);
    }

    #[test]
    fn test_best_is_heap_root() {
        let corpus = corpus();
        let params = small_params();
        let mut engine = SearchEngine::new(1, params, &corpus, 11).unwrap();
        engine.initialize().unwrap();
        for _ in 0..10 {
            engine.step_generation(&snapshot(&params), &mut NullSink).unwrap();
        }

        let root = engine.queue().peek().unwrap();
        assert_eq!(root.fitness, engine.best_fitness());
        assert!(engine.queue().iter().all(|e| e.fitness <= root.fitness));
    }

    #[test]
    fn test_improvements_reach_sink() {
        let corpus = corpus();
        let params = small_params();
        let mut engine = SearchEngine::new(2, params, &corpus, 3).unwrap();
        let mut sink = CollectingSink::default();
        engine.initialize().unwrap();
        for _ in 0..30 {
            engine.step_generation(&snapshot(&params), &mut sink).unwrap();
        }

        assert!(!sink.records.is_empty());
        let mut evaluator = FitnessEvaluator::new(&corpus);
        for pair in sink.records.windows(2) {
            assert!(pair[1].generation >= pair[0].generation);
            assert!(pair[1].fitness >= pair[0].fitness);
        }
        for record in &sink.records {
            assert_eq!(record.worker_id, 2);
            assert_eq!(evaluator.evaluate(record.table.view()).unwrap(), record.fitness);
            assert_eq!(record.trace.lines().count(), corpus.len());
        }
        let last = sink.records.last().unwrap();
        assert_eq!(engine.last_improvement(), last.generation);
    }

    #[test]
    fn test_new_root_is_recorded() {
        let corpus = corpus();
        let demo = TransitionTable::demo_bubble();
        let params = SearchParameters {
            state_count: demo.state_count(),
            ..small_params()
        };
        let mut engine = SearchEngine::new(4, params, &corpus, 21).unwrap();
        let mut sink = CollectingSink::default();
        engine.initialize().unwrap();
        let before = engine.evaluations();

        let planted = engine.queue().get(params.population_size).unwrap().id;
        engine
            .population
            .table_mut(planted)
            .copy_from_slice(demo.rules());
        engine.rank_last(&mut sink).unwrap();

        assert_eq!(engine.evaluations(), before + 1);
        assert_eq!(engine.queue().peek().unwrap().id, planted);
        assert!(engine.queue().is_valid());
        assert_eq!(sink.records.len(), 1);
        let record = &sink.records[0];
        assert_eq!(record.worker_id, 4);
        assert_eq!(record.table, demo);
        assert!((record.fitness - 2.968_034_856_578_961).abs() < 1e-9);
        assert_eq!(record.fitness, engine.best_fitness());
        assert_eq!(record.trace.lines().count(), corpus.len());
        assert_eq!(engine.last_improvement(), engine.generation());

        // A halting table at the bottom cannot displace the sorter.
        let bottom = engine.queue().get(params.population_size).unwrap().id;
        let halting = TransitionRule::new(params.state_count as u8, None, Shift::Stay);
        engine.population.table_mut(bottom).fill(halting);
        engine.rank_last(&mut sink).unwrap();

        assert_eq!(sink.records.len(), 1);
        assert_eq!(engine.queue().peek().unwrap().id, planted);
    }

    #[test]
    fn test_state_count_beyond_index_type_rejected() {
        let corpus = corpus();
        let params = SearchParameters {
            state_count: 300,
            ..small_params()
        };
        assert!(matches!(
            SearchEngine::new(0, params, &corpus, 0),
            Err(SearchError::Config(ConfigError::InvalidStates(300)))
        ));
    }

    #[test]
    fn test_stagnation_triggers_restart() {
        let corpus = corpus();
        let params = SearchParameters {
            degeneration_cnt: 1,
            ..small_params()
        };
        let mut engine = SearchEngine::new(0, params, &corpus, 3).unwrap();
        engine.initialize().unwrap();

        for _ in 0..100 {
            engine.step_generation(&snapshot(&params), &mut NullSink).unwrap();
            assert!(engine.generation() - engine.last_improvement() <= 1);
            assert_eq!(engine.queue().len(), params.population_size);
        }
        assert!(engine.restarts() > 0);
    }

    #[test]
    fn test_restart_regenerates_population() {
        let corpus = corpus();
        let params = small_params();
        let mut engine = SearchEngine::new(0, params, &corpus, 9).unwrap();
        engine.initialize().unwrap();
        engine.step_generation(&snapshot(&params), &mut NullSink).unwrap();
        engine.step_generation(&snapshot(&params), &mut NullSink).unwrap();

        engine.restart().unwrap();
        assert_eq!(engine.restarts(), 1);
        assert_eq!(engine.generation(), 2);
        assert_eq!(engine.last_improvement(), 2);
        assert_eq!(engine.queue().len(), params.population_size);
        assert!(engine.queue().is_valid());
    }

    #[test]
    fn test_run_honours_generation_limit() {
        let corpus = corpus();
        let params = small_params();
        let control = SearchControl::new(&params, Verbosity::Silent);
        let mut engine = SearchEngine::new(0, params, &corpus, 1)
            .unwrap()
            .with_max_generations(Some(3));

        let summary = engine.run(&control, &mut NullSink).unwrap();
        assert_eq!(summary.generations, 3);
        assert_eq!(summary.evaluations, 8 + 3 * 4 * 2);
        assert!(summary.best_fitness.is_finite());
    }

    #[test]
    fn test_run_honours_stop_request() {
        let corpus = corpus();
        let params = small_params();
        let control = SearchControl::new(&params, Verbosity::Silent);
        control.request_stop();
        let mut engine = SearchEngine::new(0, params, &corpus, 1).unwrap();

        let summary = engine.run(&control, &mut NullSink).unwrap();
        assert_eq!(summary.generations, 0);
        assert_eq!(summary.evaluations, 8);
    }

    #[test]
    fn test_same_seed_same_search() {
        let corpus = corpus();
        let params = small_params();
        let control = SearchControl::new(&params, Verbosity::Silent);
        let run = |seed| {
            SearchEngine::new(0, params, &corpus, seed)
                .unwrap()
                .with_max_generations(Some(4))
                .run(&control, &mut NullSink)
                .unwrap()
        };
        assert_eq!(run(77), run(77));
    }

    #[test]
    fn test_alphabet_mismatch_rejected() {
        let corpus = corpus();
        let params = SearchParameters {
            symbol_count: 5,
            ..small_params()
        };
        assert!(matches!(
            SearchEngine::new(0, params, &corpus, 0),
            Err(SearchError::Config(ConfigError::AlphabetMismatch {
                corpus: 4,
                tables: 5
            }))
        ));
    }

    #[test]
    fn test_breed_copies_parent_before_mutating() {
        let params = small_params();
        let mut population = Population::new(&params);
        let mut rng = TableRng::new(0, params.state_count, params.symbol_count).unwrap();
        rng.randomize(population.table_mut(2));
        let parent = population.table_mut(2).to_vec();

        population.breed(2, 5, &mut rng, 0);
        assert_eq!(population.table(5).unwrap().rules(), parent.as_slice());
        assert_eq!(population.table(2).unwrap().rules(), parent.as_slice());

        population.breed(2, 6, &mut rng, 12);
        assert_eq!(population.table(2).unwrap().rules(), parent.as_slice());
        assert!(population.table(6).unwrap().validate().is_ok());
        assert!(population.table(7).unwrap().rules().iter().all(|r| r.shift == Shift::Stay));
    }
}

//! Sorting fitness of a transition table over the sample corpus.
//!
//! Each sample tape is copied to a scratch tape, run through the
//! interpreter, and scored on three components:
//!
//! - **Correctness**: the mean of the fraction of symbols whose count is
//!   unchanged and the normalized gain in ordered adjacent pairs
//! - **Time**: `1 - (steps + writes) / (2 * max_steps)`
//! - **Space**: how little tape was written beyond the input
//!
//! Per-tape fitness is `0.5 * correctness + 0.25 * time + 0.25 * space`,
//! and a table's fitness is the sum over all sample tapes.

use log::{debug, trace};

use crate::compute::{ExecutionStatus, max_steps, run};
use crate::schema::{MachineError, SampleCorpus, TAPE_CAPACITY, TableView, Tape, TapeMetrics};

/// Weight of the correctness component.
const CORRECTNESS_WEIGHT: f64 = 0.5;
/// Weight of the time component.
const TIME_WEIGHT: f64 = 0.25;
/// Weight of the space component.
const SPACE_WEIGHT: f64 = 0.25;

/// Score breakdown of one sample tape.
#[derive(Debug, Clone, PartialEq)]
pub struct TapeEvaluation {
    pub correctness: f64,
    pub time: f64,
    pub space: f64,
    /// Weighted combination of the three components.
    pub fitness: f64,
    pub status: ExecutionStatus,
    /// Metrics of the tape after the run.
    pub metrics: TapeMetrics,
}

/// Score a finished run against the tape's baseline.
///
/// `tape` holds the post-run content and `metrics` its measurement.
pub fn score_run(
    tape: &Tape,
    status: &ExecutionStatus,
    baseline: &TapeMetrics,
    metrics: &TapeMetrics,
    symbols: usize,
) -> (f64, f64, f64) {
    let input_len = tape.input_len() as i64;
    let budget = max_steps(tape.input_len()) as f64;

    let preserved = baseline
        .symbol_count
        .iter()
        .zip(&metrics.symbol_count)
        .take(symbols)
        .filter(|(before, after)| before == after)
        .count();

    // Two boundary blanks, and one pair fewer than cells.
    let mut unordered = input_len - baseline.correct_order as i64 - 3;
    let mut gained = metrics.correct_order as i64 - baseline.correct_order as i64;
    if unordered < 1 {
        unordered = 1;
        if gained >= 0 {
            gained = 1;
        }
    }

    let correctness = (preserved as f64 / symbols as f64 + gained as f64 / unordered as f64) / 2.0;
    let time = 1.0 - (status.steps + status.writes) as f64 / (2.0 * budget);
    let space = 1.0
        - (2 + status.head_max as i64 - input_len) as f64
            / (2 + TAPE_CAPACITY as i64 - input_len) as f64;

    (correctness, time, space)
}

/// Evaluates transition tables against a fixed sample corpus.
///
/// Holds the scratch tape and the text trace of the latest evaluation, so
/// one evaluator is meant to be reused for many tables.
pub struct FitnessEvaluator<'a> {
    corpus: &'a SampleCorpus,
    scratch: Tape,
    metrics: TapeMetrics,
    trace: String,
}

impl<'a> FitnessEvaluator<'a> {
    /// Create a new fitness evaluator.
    pub fn new(corpus: &'a SampleCorpus) -> Self {
        Self {
            corpus,
            scratch: Tape::blank(),
            metrics: TapeMetrics::new(corpus.symbol_count()),
            trace: String::new(),
        }
    }

    pub fn corpus(&self) -> &'a SampleCorpus {
        self.corpus
    }

    /// Final tape contents of the latest evaluation, one line per tape.
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// Total fitness of `table` over every sample tape.
    pub fn evaluate(&mut self, table: TableView<'_>) -> Result<f64, MachineError> {
        self.trace.clear();
        let corpus = self.corpus;
        let mut total = 0.0;

        for (sample, baseline) in corpus.iter() {
            let (_, (correctness, time, space)) = self.run_sample(sample, baseline, table)?;
            trace!(
                "Fitness: correctness={correctness:.2}, time complexity={time:.2}, space complexity={space:.2}"
            );
            total += combine(correctness, time, space);

            self.scratch.write_trace(&mut self.trace);
        }

        debug!("{}Fitness sum={total:.2}", self.trace);
        Ok(total)
    }

    /// Per-tape breakdown of `table`, without touching the trace.
    pub fn evaluate_detailed(
        &mut self,
        table: TableView<'_>,
    ) -> Result<Vec<TapeEvaluation>, MachineError> {
        let corpus = self.corpus;
        let mut results = Vec::with_capacity(corpus.len());

        for (sample, baseline) in corpus.iter() {
            let (status, (correctness, time, space)) = self.run_sample(sample, baseline, table)?;
            results.push(TapeEvaluation {
                correctness,
                time,
                space,
                fitness: combine(correctness, time, space),
                status,
                metrics: self.metrics.clone(),
            });
        }

        Ok(results)
    }

    /// Run `table` on a copy of `sample` and score it.
    ///
    /// Leaves the final tape in `scratch` and its measurement in `metrics`.
    fn run_sample(
        &mut self,
        sample: &Tape,
        baseline: &TapeMetrics,
        table: TableView<'_>,
    ) -> Result<(ExecutionStatus, (f64, f64, f64)), MachineError> {
        self.scratch.reset_from(sample);
        let budget = max_steps(self.scratch.input_len());
        let status = run(&mut self.scratch, table, budget)?;
        self.metrics.measure(&self.scratch);

        let scores = score_run(
            &self.scratch,
            &status,
            baseline,
            &self.metrics,
            table.symbol_count(),
        );
        Ok((status, scores))
    }
}

#[inline]
fn combine(correctness: f64, time: f64, space: f64) -> f64 {
    CORRECTNESS_WEIGHT * correctness + TIME_WEIGHT * time + SPACE_WEIGHT * space
}

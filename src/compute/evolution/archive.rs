//! Sinks receiving each new best candidate of a search instance.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::schema::{SearchParameters, TableView, TransitionTable};

/// Failure to persist a best candidate.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A candidate that just reached heap position 1.
#[derive(Debug, Clone, Copy)]
pub struct BestReport<'a> {
    pub worker_id: usize,
    pub generation: u64,
    pub restarts: u64,
    pub fitness: f64,
    pub table: TableView<'a>,
    /// Final tape contents from the candidate's evaluation.
    pub trace: &'a str,
    pub params: &'a SearchParameters,
}

impl BestReport<'_> {
    /// Fitness scaled to an integer for file names, saturating at the bounds.
    pub fn quantized_fitness(&self) -> u64 {
        // Float-to-int casts saturate and map NaN to 0.
        (1e8 * self.fitness) as u64
    }

    /// File stem unique per worker, generation and restart.
    pub fn file_stem(&self) -> String {
        format!(
            "{:09}-{}-{}-{}",
            self.quantized_fitness(),
            self.worker_id,
            self.generation,
            self.restarts
        )
    }
}

/// Receiver of new best candidates.
pub trait BestSink {
    fn record(&mut self, report: &BestReport<'_>) -> Result<(), DumpError>;
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl BestSink for NullSink {
    fn record(&mut self, _report: &BestReport<'_>) -> Result<(), DumpError> {
        Ok(())
    }
}

/// Owned copy of a [`BestReport`].
#[derive(Debug, Clone)]
pub struct RecordedBest {
    pub worker_id: usize,
    pub generation: u64,
    pub restarts: u64,
    pub fitness: f64,
    pub table: TransitionTable,
    pub trace: String,
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<RecordedBest>,
}

impl BestSink for CollectingSink {
    fn record(&mut self, report: &BestReport<'_>) -> Result<(), DumpError> {
        self.records.push(RecordedBest {
            worker_id: report.worker_id,
            generation: report.generation,
            restarts: report.restarts,
            fitness: report.fitness,
            table: TransitionTable::from_view(report.table),
            trace: report.trace.to_string(),
        });
        Ok(())
    }
}

/// Writes each best candidate as a Graphviz digraph plus a tuple listing.
#[derive(Debug, Clone)]
pub struct GraphDump {
    output_dir: PathBuf,
}

impl GraphDump {
    /// Dump into `dir`, creating it when missing.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let output_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths of the graph file and the tuple file for `report`.
    pub fn paths(&self, report: &BestReport<'_>) -> (PathBuf, PathBuf) {
        let stem = report.file_stem();
        (
            self.output_dir.join(format!("{stem}.gv")),
            self.output_dir.join(format!("{stem}.gv.txt")),
        )
    }
}

impl BestSink for GraphDump {
    fn record(&mut self, report: &BestReport<'_>) -> Result<(), DumpError> {
        let (graph_path, tuple_path) = self.paths(report);
        info!(
            "Fitness={:.6}, worker={}, generation={}, restarts={}",
            report.fitness, report.worker_id, report.generation, report.restarts
        );

        fs::write(&graph_path, render_graph(report)).map_err(|source| DumpError::Io {
            path: graph_path,
            source,
        })?;
        fs::write(&tuple_path, render_tuples(report)).map_err(|source| DumpError::Io {
            path: tuple_path,
            source,
        })?;
        Ok(())
    }
}

/// Graphviz source with one labelled edge per (state, symbol).
pub fn render_graph(report: &BestReport<'_>) -> String {
    let params = report.params;
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "digraph \"Finite state machine, fitness={:.6}, population_size={}, states={}, \
         symbols={}, best_cnt={}, kids_cnt={}\" {{\n\
         \trankdir=LR;\n\
         \tsize=\"8,5\"\n\
         S{} [shape=doublecircle];\n\
         \tnode [shape = circle];\n",
        report.fitness,
        params.population_size,
        params.state_count,
        params.symbol_count,
        params.best_cnt,
        params.kids_cnt,
        report.table.error_state(),
    );
    for (state, symbol, rule) in report.table.entries() {
        let _ = writeln!(
            out,
            "\tS{} -> S{} [ label = \"{} / {}, {}\" ];",
            state,
            rule.next_state,
            symbol,
            rule.write_code(),
            rule.shift
        );
    }
    out.push_str("}\n");
    out
}

/// Flat `{ next, write, shift }` tuples followed by the evaluation trace.
pub fn render_tuples(report: &BestReport<'_>) -> String {
    let mut out = String::new();
    for (_, _, rule) in report.table.entries() {
        let _ = writeln!(
            out,
            "{{ {}, {}, {} }},",
            rule.next_state,
            rule.write_code(),
            rule.shift.code()
        );
    }
    out.push_str("Tape content:\n");
    out.push_str(report.trace);
    out
}

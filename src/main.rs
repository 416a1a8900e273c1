//! Turing Sort CLI - Evolve sorting Turing machines from a JSON configuration.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};

use turing_sort::{
    compute::evolution::{DumpError, FitnessEvaluator, GraphDump, SearchError},
    control::{ControlCommand, SearchControl},
    run_workers,
    schema::{SearchConfig, TransitionTable},
};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().skip(1).any(|a| a == "--help" || a == "-h") {
        print_usage(&args[0]);
        return;
    }

    if args.get(1).is_some_and(|a| a == "--example") {
        print_example_config();
        return;
    }

    let config = match args.get(1) {
        Some(path) => load_config(Path::new(path)),
        None => SearchConfig::default(),
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }
    log::set_max_level(config.verbosity().level_filter());

    let corpus = config.corpus().unwrap_or_else(|e| {
        eprintln!("Error building sample corpus: {}", e);
        std::process::exit(1);
    });

    println!("Turing Sort");
    println!("===========");
    println!(
        "Parameters: population size={}, states={}, symbols={}, best_cnt={}, kids_cnt={}, degeneration_cnt={}",
        config.population_size,
        config.states,
        config.symbols,
        config.best_cnt,
        config.kids_cnt,
        config.degeneration_cnt
    );
    println!("Sample tapes: {}", corpus.len());
    println!("Workers: {}", config.worker_count());
    println!("Output: {}", config.output);
    println!();

    let demo = TransitionTable::demo_bubble();
    if demo.symbol_count() == corpus.symbol_count() {
        let mut evaluator = FitnessEvaluator::new(&corpus);
        match evaluator.evaluate(demo.view()) {
            Ok(fitness) => info!("Demo bubble sort fitness={fitness:.6}"),
            Err(e) => warn!("Demo bubble sort failed: {e}"),
        }
    }

    let control = Arc::new(SearchControl::new(
        &config.parameters(),
        config.verbosity(),
    ));
    spawn_control_reader(Arc::clone(&control));

    println!("Running search... (press Enter to pause logging, then type 0-3, b N, k N, d N or q)");
    let start = Instant::now();

    let output = PathBuf::from(&config.output);
    let result = run_workers(&config, &corpus, &control, |_| {
        GraphDump::new(&output).map_err(|source| {
            SearchError::from(DumpError::Io {
                path: output.clone(),
                source,
            })
        })
    });

    let summaries = result.unwrap_or_else(|e| {
        eprintln!("Search failed: {}", e);
        std::process::exit(1);
    });

    println!();
    println!("Search finished in {:.2}s", start.elapsed().as_secs_f64());
    match serde_json::to_string_pretty(&summaries) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing summaries: {}", e),
    }
}

fn load_config(path: &Path) -> SearchConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

/// Apply operator commands from stdin until it closes or asks to exit.
///
/// An empty line opens a prompt: logging drops to warnings until the next
/// command is entered.
fn spawn_control_reader(control: Arc<SearchControl>) {
    let spawned = std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || {
            let mut prompting = false;
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    if !prompting {
                        control.pause_logging();
                        prompting = true;
                        println!("Parameters: {}", control);
                        print!("Command: ");
                        let _ = io::stdout().flush();
                    }
                    continue;
                }

                let applied = ControlCommand::parse(&line)
                    .and_then(|command| control.apply(command).map(|()| command));
                if prompting {
                    control.resume_logging();
                    prompting = false;
                }
                match applied {
                    Ok(ControlCommand::Exit) => {
                        println!("Stopping after the current generation");
                        break;
                    }
                    Ok(_) => println!("Parameters: {}", control),
                    Err(e) => eprintln!("{}", e),
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Runtime control unavailable: {e}");
    }
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} [config.json]", program);
    eprintln!();
    eprintln!("Evolve Turing machine transition tables that sort their tape.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Path to search configuration file (default: built-in defaults)");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn print_example_config() {
    let config = SearchConfig {
        workers: 4,
        random_seed: Some(42),
        ..Default::default()
    };
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing example config: {}", e),
    }
}

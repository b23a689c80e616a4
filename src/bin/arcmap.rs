//! Diagnostic CLI for the analyzer core. Not a reporting front-end — it
//! prints raw `AnalysisResult`s and annotated source for debugging the
//! parser itself, in the spirit of `coverage/parser.py`'s `AdHocMain`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use arcmap::{Analyzer, CodeUnit, ExclusionConfig};
use clap::Parser;

/// Analyze a source file and print its executable lines, excluded lines,
/// and control-flow arcs.
#[derive(Parser)]
#[command(name = "arcmap")]
#[command(version)]
#[command(about = "Diagnostic CLI for the static coverage-analysis core")]
struct Cli {
    /// Source file to analyze
    source: PathBuf,

    /// Print the full arc set
    #[arg(short = 'a', long)]
    arcs: bool,

    /// Print the excluded-lines set
    #[arg(short = 'd', long)]
    excluded: bool,

    /// Print source annotated with executable/excluded markers
    #[arg(short = 's', long)]
    source_annotated: bool,

    /// Path to a TOML file with `exclude`/`partial_branch` patterns
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// A single exclusion regex, overriding --config's `exclude`
    #[arg(short = 't', long)]
    trace: Option<String>,

    /// Recompute even if the session cache already has this file
    #[arg(short = 'R', long)]
    recompute: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match (&cli.config, &cli.trace) {
        (Some(path), _) => ExclusionConfig::from_path(path),
        (None, Some(pattern)) => Ok(ExclusionConfig::single(pattern.clone())),
        (None, None) => Ok(ExclusionConfig::default()),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let analyzer = Analyzer::new(config);
    let unit = match CodeUnit::from_path(&cli.source) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if cli.recompute {
        analyzer.clear_cache();
    }

    let result = match analyzer.analyze(&unit) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let executable = result.executable_statements();
    println!("statements: {executable:?}");

    if cli.excluded {
        println!("excluded: {:?}", result.excluded_lines());
    }

    if cli.arcs {
        println!("arcs:");
        for arc in result.arc_possibilities() {
            println!("  {} -> {}", arc.from, arc.to);
        }
    }

    if cli.source_annotated {
        let executable: BTreeSet<u32> = executable.into_iter().collect();
        let excluded: BTreeSet<u32> = result.excluded_lines().into_iter().collect();
        for (i, line) in unit.source().lines().enumerate() {
            let lineno = i as u32 + 1;
            let marker = if excluded.contains(&lineno) {
                '!'
            } else if executable.contains(&lineno) {
                '>'
            } else {
                ' '
            };
            println!("{marker} {lineno:>4} {line}");
        }
    }
}

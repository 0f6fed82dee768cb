use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod run;

use run::{run_conditions, run_trace, write_points, RunConfig};

#[derive(Parser)]
#[command(name = "critline")]
#[command(about = "Critical-locus tracer for binary mixtures", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trace the critical locus from a starting critical point
    Trace {
        /// Run file (JSON) with the model, T0, rhovec0 and options
        run: PathBuf,

        /// Write the trace JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Mirror each point as a CSV line into this file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Evaluate the criticality conditions at the run's starting state
    Conditions {
        /// Run file (JSON)
        run: PathBuf,
    },
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Trace { run, output, csv } => {
            let config = RunConfig::load(&run)?;
            let trace = run_trace(&config, csv.as_deref())?;
            write_points(&trace.points, output.as_deref())?;
            eprintln!(
                "Traced {} points ({})",
                trace.points.len(),
                trace.termination
            );
        }
        Commands::Conditions { run } => {
            let config = RunConfig::load(&run)?;
            let report = run_conditions(&config)?;
            let text = serde_json::to_string_pretty(&report)
                .context("Failed to serialize the conditions report.")?;
            println!("{text}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_arguments_parse() {
        let cli = Cli::try_parse_from([
            "critline", "-vv", "trace", "run.json", "-o", "out.json", "--csv", "p.csv",
        ])
        .expect("arguments should parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Trace { run, output, csv } => {
                assert_eq!(run, PathBuf::from("run.json"));
                assert_eq!(output, Some(PathBuf::from("out.json")));
                assert_eq!(csv, Some(PathBuf::from("p.csv")));
            }
            Commands::Conditions { .. } => panic!("expected trace"),
        }
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(log_level(0), Level::WARN);
        assert_eq!(log_level(1), Level::INFO);
        assert_eq!(log_level(5), Level::TRACE);
    }
}

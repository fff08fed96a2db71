//! bench-plot CLI - Plot concurrency benchmark logs

use anyhow::{Context, Result};
use bench_plot::chart::{ArtifactKind, WrittenArtifact};
use bench_plot::{run, RunOptions};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

/// bench-plot: log-scale comparison charts from a benchmark log
#[derive(Parser, Debug)]
#[command(name = "bench-plot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Benchmark log to plot
    #[arg(value_name = "INPUT")]
    input: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let summary = run(&cli.input, &RunOptions::default())
        .with_context(|| format!("Failed to plot benchmark log {:?}", cli.input))?;

    debug!(
        "{} records, {} skipped lines",
        summary.records,
        summary.diagnostics.skipped_lines()
    );

    for artifact in &summary.report.written {
        println!("{}", confirmation(artifact));
    }

    Ok(())
}

/// Line printed once an artifact is on disk
fn confirmation(artifact: &WrittenArtifact) -> String {
    let path = artifact.path.display();
    match artifact.kind {
        ArtifactKind::Composite => format!("Saved mega page graph as {}", path),
        ArtifactKind::Record(index) => format!("Saved graph for test {} as {}", index, path),
        ArtifactKind::Records => format!("Saved parsed records as {}", path),
    }
}

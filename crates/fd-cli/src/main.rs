//! FastDet CLI

mod source;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fd_modules::{
    BTagging, Calorimeter, CyclicPileUpSource, Isolation, JetFinder, Merger, ParticlePropagator,
    PileUpMerger, TauTagging,
};
use fd_output::{JsonLinesSink, TreeWriter};
use fd_pipeline::{Config, Pipeline};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "fastdet")]
#[command(about = "FastDet - fast detector-response simulation")]
#[command(version)]
struct Cli {
    /// Run configuration (JSON, one block per module)
    #[arg(short, long)]
    config: PathBuf,

    /// Generator events (JSON array)
    #[arg(short, long)]
    input: PathBuf,

    /// Output tree (JSON lines). Required when the pipeline has a TreeWriter.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed override. Determines the full stochastic trajectory.
    #[arg(long)]
    seed: Option<u64>,
}

fn build_module(
    class: &str,
    output: &Option<PathBuf>,
) -> Result<Box<dyn fd_pipeline::Module>> {
    Ok(match class {
        "ParticlePropagator" => Box::new(ParticlePropagator::new()),
        "PileUpMerger" => {
            // The minimum-bias sample reader is an external collaborator;
            // the driver wires an empty source, so only the vertex count
            // machinery runs.
            Box::new(PileUpMerger::new(Box::new(CyclicPileUpSource::default())))
        }
        "Calorimeter" => Box::new(Calorimeter::new()),
        "JetFinder" => Box::new(JetFinder::new()),
        "BTagging" => Box::new(BTagging::new()),
        "TauTagging" => Box::new(TauTagging::new()),
        "Isolation" => Box::new(Isolation::new()),
        "Merger" => Box::new(Merger::new()),
        "TreeWriter" => {
            let Some(path) = output else {
                bail!("a TreeWriter is configured but no --output was given");
            };
            let sink = JsonLinesSink::create(path)
                .with_context(|| format!("creating output {}", path.display()))?;
            Box::new(TreeWriter::new(Box::new(sink)))
        }
        other => bail!("unknown module class '{other}'"),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_path(&cli.config)
        .with_context(|| format!("loading configuration {}", cli.config.display()))?;

    // The pipeline order is the declaration order of the Modules list.
    let modules = config.module("Run").get_param("Modules");
    if modules.size() == 0 {
        bail!("configuration has no Run.Modules list");
    }

    let mut pipeline = Pipeline::new(config.clone())?;
    if let Some(seed) = cli.seed {
        pipeline.set_seed(seed);
    }
    for i in 0..modules.size() {
        let entry = modules.at(i)?;
        let name = entry.at(0)?.as_string()?;
        let class = entry.at(1)?.as_string()?;
        pipeline.add_module(&name, build_module(&class, &cli.output)?);
    }

    let mut events = source::load_events(&cli.input)?;
    let summary = pipeline.run(&mut events)?;
    info!(
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped,
        "done"
    );
    Ok(())
}

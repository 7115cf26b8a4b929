use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rpod_analysis::impingement::{CaseDirectorySink, Verdict, load_case};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Plume-impingement strike and constraint analysis for a jet firing history"
)]
struct Cli {
    /// Case directory containing config.toml
    #[arg(long)]
    case: PathBuf,

    /// Write results/checkpoint.json after every firing
    #[arg(long, default_value_t = false)]
    checkpoint: bool,

    /// Continue from results/checkpoint.json instead of firing 0
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// Log run progress (RUST_LOG overrides)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let case = load_case(&cli.case)
        .with_context(|| format!("failed to load case {}", cli.case.display()))?;
    let results_dir = case.results_dir();
    let mut engine = case.engine().context("failed to set up impingement engine")?;

    let sink = if cli.resume {
        let state = CaseDirectorySink::read_checkpoint(&results_dir)
            .with_context(|| format!("no usable checkpoint in {}", results_dir.display()))?;
        let next_firing = state.next_firing;
        engine.restore(state).context("checkpoint does not fit this case")?;
        CaseDirectorySink::resume(&results_dir, &case.name, next_firing)?
    } else {
        CaseDirectorySink::create(&results_dir, &case.name)?
    };
    let mut sink = sink.with_checkpoints(cli.checkpoint);

    let summary = engine
        .run(&case.sequence, &mut sink)
        .with_context(|| format!("impingement run failed for case {}", case.name))?;

    let verdict = match &summary.verdict {
        Verdict::AllMet => "all impingement constraints met".to_string(),
        Verdict::Violated(record) => format!(
            "{} constraint failed at cell #{} during firing {}",
            record.kind.label(),
            record.cell_index,
            record.firing_index
        ),
        Verdict::NotEvaluated(reason) => format!("constraint evaluation not performed ({reason})"),
    };
    println!(
        "{}: {} firings, {} of {} faces struck; {}",
        case.name,
        summary.next_firing,
        engine.accumulator().struck_faces(),
        case.mesh.len(),
        verdict
    );
    println!("Results written to {}", results_dir.display());
    Ok(())
}

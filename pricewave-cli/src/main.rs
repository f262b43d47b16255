//! Price Wave CLI — build the monthly panel and run the study.
//!
//! Commands:
//! - `build`: decode raw sources, integrate, write `panel.csv`
//! - `analyze`: run the study over an existing `panel.csv`
//! - `run`: `build` then `analyze`
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); summaries go to stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricewave_core::panel::Panel;
use pricewave_runner::export::{load_panel_csv, save_build_artifacts, save_study_artifacts};
use pricewave_runner::{build_panel, run_study, PanelBuild, StudyConfig, StudyOutput};

#[derive(Parser)]
#[command(
    name = "pricewave",
    about = "Price Wave: monthly CPI, energy, labor and news-sentiment panel with lead-lag analysis"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode raw sources and build the monthly panel.
    Build {
        /// Path to the study TOML. Relative source paths resolve against its directory.
        #[arg(long)]
        config: PathBuf,

        /// Output directory.
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Run the study over an existing panel CSV.
    Analyze {
        #[arg(long)]
        config: PathBuf,

        /// Panel CSV written by `build`.
        #[arg(long)]
        panel: PathBuf,

        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Build the panel, then run the study.
    Run {
        #[arg(long)]
        config: PathBuf,

        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { config, out } => {
            let config = load_config(&config)?;
            run_build(&config, &out).map(|_| ())
        }
        Commands::Analyze { config, panel, out } => {
            let config = load_config(&config)?;
            let panel = load_panel_csv(&panel)?;
            run_analyze(panel, &config, &out)
        }
        Commands::Run { config, out } => {
            let config = load_config(&config)?;
            let build = run_build(&config, &out)?;
            run_analyze(build.panel, &config, &out)
        }
    }
}

fn load_config(path: &Path) -> Result<StudyConfig> {
    let config = StudyConfig::from_file(path)
        .with_context(|| format!("failed to load study config {}", path.display()))?;
    tracing::info!(config = %path.display(), hash = config.config_hash().as_str(), "config loaded");
    Ok(config)
}

fn run_build(config: &StudyConfig, out: &Path) -> Result<PanelBuild> {
    let build = build_panel(config).context("panel build failed")?;
    let panel_path = save_build_artifacts(&build, out)?;
    print_build(&build, &panel_path);
    Ok(build)
}

fn run_analyze(panel: Panel, config: &StudyConfig, out: &Path) -> Result<()> {
    let output = run_study(panel, config);
    save_study_artifacts(&output, config.lag.max_lag, out)?;
    print_study(&output, out);
    Ok(())
}

fn print_build(build: &PanelBuild, panel_path: &Path) {
    let summary = &build.report.panel;
    println!(
        "Panel {} to {}: {} months, {} metrics",
        summary.start,
        summary.end,
        summary.months,
        summary.metrics.len()
    );
    for status in &build.report.sources {
        match &status.error {
            None => println!("  ok   {:<7} {}", status.kind, status.path.display()),
            Some(e) => println!("  FAIL {:<7} {e}", status.kind),
        }
    }
    for d in &build.report.dropped {
        println!("  dropped {}: {}", d.metric, d.reason);
    }
    if let Some(fear) = &build.report.fear {
        println!(
            "  news: {} counted, {} duplicates, {} undated",
            fear.articles_counted, fear.duplicates_dropped, fear.undated
        );
    }
    println!("Wrote {}", panel_path.display());
}

fn print_study(output: &StudyOutput, out: &Path) {
    let report = &output.report;
    println!("Causal chain:");
    for chain in &report.chains {
        let best = chain.scan.as_ref().ok().and_then(|s| s.best());
        match (best, &chain.scan) {
            (Some(b), _) => println!(
                "  {:<24} lag {} r = {:+.3} (n = {})",
                chain.label, b.lag, b.correlation, b.pairs
            ),
            (None, Err(e)) => println!("  {:<24} skipped: {e}", chain.label),
            (None, Ok(_)) => println!("  {:<24} no lag had enough data", chain.label),
        }
    }
    println!("Structural breaks:");
    for test in &report.breaks {
        match test {
            Ok(t) => match t.difference {
                Some(d) => println!(
                    "  {} vs {} at {}: change {:+.3}{}",
                    t.series_a,
                    t.series_b,
                    t.boundary,
                    d,
                    if t.regime_shift == Some(true) { " (regime shift)" } else { "" }
                ),
                None => println!(
                    "  {} vs {} at {}: not enough data on both sides",
                    t.series_a, t.series_b, t.boundary
                ),
            },
            Err(e) => println!("  skipped: {e}"),
        }
    }
    let skipped = report.failures().len();
    if skipped > 0 {
        println!("{skipped} combination(s) skipped; see report.md");
    }
    println!("Wrote study artifacts to {}", out.display());
}

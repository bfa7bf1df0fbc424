use std::path::{Path, PathBuf};
use std::time::Instant;

use absence_panel::error::AbsenceError;
use absence_panel::pipeline::{self, RunOutputs};
use absence_panel::{AnalysisConfig, io};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

#[derive(Parser)]
#[command(name = "absence-panel")]
#[command(about = "Own-illness absence panel and parent DiD estimates from CPS microdata")]
#[command(version)]
struct Cli {
    /// Analysis configuration (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (0 = all cores). Overrides the configuration.
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the cohort panel from microdata
    Panel {
        /// CPS extract (Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Panel output (.parquet or .csv)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Estimate per-period parent effects from a panel
    Estimate {
        /// Panel written by `panel` (.parquet or .csv)
        #[arg(short, long)]
        panel: PathBuf,

        /// Effects output (.parquet or .csv)
        #[arg(short, long)]
        output: PathBuf,

        /// Pooled parent × period interactions output
        #[arg(long)]
        interactions: Option<PathBuf>,

        /// Exit successfully even if some periods could not be estimated
        #[arg(long)]
        allow_partial: bool,
    },

    /// Build the panel, estimate effects and write a run summary
    Run {
        /// CPS extract (Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Panel output (.parquet or .csv)
        #[arg(long)]
        panel_output: PathBuf,

        /// Effects output (.parquet or .csv)
        #[arg(long)]
        effects_output: PathBuf,

        /// Pooled parent × period interactions output
        #[arg(long)]
        interactions_output: Option<PathBuf>,

        /// Run summary (JSON)
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Exit successfully even if some periods could not be estimated
        #[arg(long)]
        allow_partial: bool,
    },
}

fn load_config(path: Option<&Path>, threads: Option<usize>) -> Result<AnalysisConfig> {
    let mut config = match path {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(threads) = threads {
        config.threads = threads;
    }
    config.validate().context("validating configuration")?;
    Ok(config)
}

fn finish(failed_periods: Vec<String>, allow_partial: bool) -> Result<()> {
    if failed_periods.is_empty() {
        return Ok(());
    }
    if allow_partial {
        warn!(
            "Continuing with partial estimates; failed periods: {}",
            failed_periods.join(", ")
        );
        return Ok(());
    }
    Err(AbsenceError::IncompleteEstimates {
        periods: failed_periods,
    })
    .context("rerun with --allow-partial to accept missing periods")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.threads)?;
    let start = Instant::now();

    match cli.command {
        Commands::Panel { input, output } => {
            let build = pipeline::build_panel(&input, &config)
                .with_context(|| format!("building panel from {}", input.display()))?;
            io::write_panel(&output, &build.rows, &config)
                .with_context(|| format!("writing panel to {}", output.display()))?;
            info!(
                "Panel: {} rows, {} records read, {} invalid, {} empty cells dropped",
                build.rows.len(),
                build.counts.read,
                build.counts.invalid(),
                build.empty_cells
            );
        }
        Commands::Estimate {
            panel,
            output,
            interactions,
            allow_partial,
        } => {
            let panel_file = io::read_panel(&panel)
                .with_context(|| format!("reading panel from {}", panel.display()))?;
            pipeline::check_panel_settings(&panel_file, &config);

            let estimates =
                pipeline::estimate(&panel_file.rows, &config).context("estimating period effects")?;
            io::write_effects(&output, &estimates.effects.to_effect_rows())
                .with_context(|| format!("writing estimates to {}", output.display()))?;
            if let Some(path) = interactions {
                io::write_effects(&path, &estimates.interaction_rows())
                    .with_context(|| format!("writing interactions to {}", path.display()))?;
            }
            finish(estimates.effects.failed_periods(), allow_partial)?;
        }
        Commands::Run {
            input,
            panel_output,
            effects_output,
            interactions_output,
            summary,
            allow_partial,
        } => {
            let outputs = RunOutputs {
                panel: panel_output,
                effects: effects_output,
                interactions: interactions_output,
                summary,
            };
            let summary = pipeline::run(&input, &outputs, &config)
                .with_context(|| format!("running pipeline on {}", input.display()))?;
            info!(
                "Records: {} read, {} eligible, {} ineligible, {} invalid",
                summary.records.read,
                summary.records.eligible,
                summary.records.ineligible,
                summary.records.invalid()
            );
            for (field, count) in &summary.records.invalid_by_field {
                info!("  invalid {field}: {count}");
            }
            finish(summary.failed_periods, allow_partial)?;
        }
    }

    info!("Done in {:?}", start.elapsed());
    Ok(())
}

//! Race Prophet CLI - train the top-10 model and predict events

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use race_prophet::data::DatasetBuilder;
use race_prophet::error::PipelineError;
use race_prophet::providers::{
    ClientConfig, ErgastClient, ErgastScheduleProvider, ErgastSessionResultProvider,
    ErgastStandingsProvider, ScheduleProvider,
};
use race_prophet::training::{train, TrainConfig};
use race_prophet::PredictionService;

const DEFAULT_MODEL_DIR: &str = "models";

#[derive(Parser)]
#[command(name = "race-prophet")]
#[command(author, version, about = "Pre-race top-10 finish probability prediction", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the trained model artifact
    #[arg(long, default_value = DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    /// Base URL of the Ergast-compatible API
    #[arg(long)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the historical dataset and train the model
    Train {
        /// First season to include
        #[arg(long, default_value = "2018")]
        from: u16,

        /// Last season to include
        #[arg(long, default_value = "2025")]
        to: u16,

        /// Concurrent event fetches during the build
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },

    /// Predict top-10 probabilities for one event
    Predict {
        /// Season year
        #[arg(short, long)]
        season: u16,

        /// Event name (e.g. "Monaco Grand Prix"; a unique fragment works)
        #[arg(short, long)]
        event: String,
    },

    /// List the events of a season
    Schedule {
        /// Season year
        #[arg(short, long)]
        season: u16,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::default();
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    let client = Arc::new(ErgastClient::new(config).context("failed to create HTTP client")?);
    let schedule = Arc::new(ErgastScheduleProvider::new(client.clone()));
    let builder = DatasetBuilder::new(
        schedule.clone(),
        Arc::new(ErgastStandingsProvider::new(client.clone())),
        Arc::new(ErgastSessionResultProvider::new(client)),
    );

    match cli.command {
        Commands::Train {
            from,
            to,
            concurrency,
        } => run_train(builder.with_concurrency(concurrency), &cli.model_dir, from, to).await,
        Commands::Predict { season, event } => {
            run_predict(builder, &cli.model_dir, season, &event).await
        }
        Commands::Schedule { season } => run_schedule(schedule.as_ref(), season).await,
    }
}

async fn run_train(
    builder: DatasetBuilder,
    model_dir: &std::path::Path,
    from: u16,
    to: u16,
) -> Result<()> {
    anyhow::ensure!(from <= to, "--from must not be after --to");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("building dataset for seasons {}-{}", from, to));

    let dataset = builder.build_historical(from..=to).await?;
    spinner.finish_with_message(format!("dataset built: {} rows", dataset.len()));

    let model = train(&dataset, &TrainConfig::default())?;
    model.save(model_dir)?;

    println!(
        "\n{} holdout accuracy {} ({} rows, {:.1}% top-10)",
        "Model trained.".green().bold(),
        format!("{:.3}", model.metadata.holdout_accuracy).bold(),
        model.metadata.rows_total,
        model.metadata.positive_rate * 100.0
    );
    println!("Artifact: {}", model_dir.join("top10_logreg.json").display());
    Ok(())
}

async fn run_predict(
    builder: DatasetBuilder,
    model_dir: &std::path::Path,
    season: u16,
    event: &str,
) -> Result<()> {
    let service = match PredictionService::load(model_dir, builder) {
        Ok(service) => service,
        Err(e @ PipelineError::ModelNotFound { .. }) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            eprintln!("hint: run {} first", "race-prophet train".bold());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let predictions = service.predict(season, event).await?;

    println!(
        "\n{}",
        format!("Top-10 probabilities: {} {}", season, event).bold()
    );
    println!(
        "{:<5} {:<8} {:<28} {:>5} {:>7} {:>9}",
        "Rank", "Driver", "Team", "Grid", "Final", "P(top10)"
    );
    for (i, p) in predictions.iter().enumerate() {
        let grid = p
            .grid_position
            .map(|g| g.to_string())
            .unwrap_or_else(|| "-".to_string());
        let final_pos = p
            .final_position
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        let prob = format!("{:.3}", p.top10_probability);
        let prob = if p.top10_probability >= 0.5 {
            prob.green()
        } else {
            prob.normal()
        };
        println!(
            "{:<5} {:<8} {:<28} {:>5} {:>7} {:>9}",
            i + 1,
            p.driver_code,
            p.team,
            grid,
            final_pos,
            prob
        );
    }
    Ok(())
}

async fn run_schedule(schedule: &dyn ScheduleProvider, season: u16) -> Result<()> {
    let events = schedule
        .schedule(season)
        .await
        .with_context(|| format!("failed to fetch the {} schedule", season))?;

    println!("\n{}", format!("{} season: {} events", season, events.len()).bold());
    for event in events {
        println!("{:>3}  {}", event.round, event.name);
    }
    Ok(())
}

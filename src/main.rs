use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use gridsentry::application::alerts::alerts;
use gridsentry::application::anomaly_service::{AnomalyService, ArtifactStores};
use gridsentry::application::ml::monthly_trainer::TrainingResult;
use gridsentry::config::Config;
use gridsentry::domain::ports::ForecastSource;
use gridsentry::infrastructure::artifacts::{BaselineStore, ModelStore, PredictionWriter};
use gridsentry::infrastructure::forecast::{CsvForecastSource, read_series_csv};
use gridsentry::infrastructure::observability::{Metrics, init_tracing};
use gridsentry::infrastructure::persistence::{Database, SqliteSeriesRepository};
use gridsentry::infrastructure::repositories::StaticForecastSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Seasonal anomaly detection for grid demand and price forecasts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a `timestamp,value` CSV into the historical store
    Ingest {
        /// CSV file with RFC 3339 timestamps
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Build and save baseline profiles (all data plus one per month)
    Baseline,
    /// Train one model per calendar month
    Train,
    /// Score the upcoming forecast horizon
    Predict {
        /// Hours of forecast to score
        #[arg(long, default_value_t = 30)]
        hours: u32,
        /// Reference time (RFC 3339); defaults to now
        #[arg(long)]
        as_of: Option<String>,
        /// Forecast CSV; overrides FORECAST_CSV
        #[arg(long)]
        forecast: Option<PathBuf>,
        /// Print Prometheus metrics after scoring
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    let series = config.detection.series;

    let db = Database::new(&config.storage.database_url).await?;
    let repository = Arc::new(SqliteSeriesRepository::new(db.pool.clone()));

    match cli.command {
        Commands::Ingest { file } => {
            let points = read_series_csv(&file)?;
            let inserted = repository.insert(series, &points).await?;
            let total = repository.count(series).await?;
            println!("Imported {} {} points ({} stored)", inserted, series, total);
        }
        Commands::Baseline => {
            let service = build_service(&config, repository, None)?;
            let profile = service.build_baselines().await?;
            println!(
                "Baseline for {} built from {} points ({} days)",
                series, profile.overall.count, profile.data_period.days
            );
            println!("Peak hours: {:?}", profile.peak_hours);
            for (hour, stats) in &profile.hourly {
                println!(
                    "  {:02}:00  mean {:>9.1}  std {:>7.1}  p95 {:>9.1}",
                    hour, stats.mean, stats.std, stats.p95
                );
            }
            if let Some(c) = service.build_correlation().await? {
                println!(
                    "Price-demand correlation: {:.3} over {} hours",
                    c.correlation, c.matched_hours
                );
            }
        }
        Commands::Train => {
            let service = build_service(&config, repository, None)?;
            let results = service.train_all_months().await?;
            println!("{:<10} {:<18} details", "month", "status");
            for (month, result) in &results {
                let details = match result {
                    TrainingResult::Success(s) => format!(
                        "{} samples, {} training anomalies, contamination {}",
                        s.n_samples, s.n_anomalies_detected, s.contamination
                    ),
                    TrainingResult::InsufficientData { available, required } => {
                        format!("{} of {} required samples", available, required)
                    }
                    TrainingResult::Error { reason } => reason.clone(),
                };
                println!("{:<10} {:<18} {}", month.name(), result.outcome_label(), details);
            }
        }
        Commands::Predict {
            hours,
            as_of,
            forecast,
            metrics: print_metrics,
        } => {
            let service = build_service(&config, repository, forecast)?;
            let as_of = match as_of {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .context("--as-of must be RFC 3339")?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            info!("Predicting {} hours of {} from {}", hours, series, as_of);

            let batch = service.predict_future(hours, as_of).await?;
            println!(
                "{} model ({}): {} points, {} anomalies ({:.2}%)",
                batch.model_scope,
                batch.model_month,
                batch.total_points,
                batch.anomalies_detected,
                batch.anomaly_rate
            );
            for (i, alert) in alerts(&batch, Utc::now()).iter().enumerate() {
                println!(
                    "{}. {} (in {}) {} {:.0} confidence {:.1}%",
                    i + 1,
                    alert.timestamp,
                    alert.time_until,
                    alert.severity,
                    alert.value,
                    alert.confidence
                );
            }

            if print_metrics && let Some(m) = service.metrics() {
                println!("{}", m.render());
            }
        }
    }

    Ok(())
}

fn build_service(
    config: &Config,
    repository: Arc<SqliteSeriesRepository>,
    forecast_override: Option<PathBuf>,
) -> anyhow::Result<AnomalyService> {
    let forecast: Arc<dyn ForecastSource> = match forecast_override.or(config.storage.forecast_csv.clone()) {
        Some(path) => Arc::new(CsvForecastSource::new(path)),
        None => Arc::new(StaticForecastSource::new("none", Vec::new())),
    };

    let artifacts = ArtifactStores {
        models: ModelStore::new(&config.storage.models_dir),
        baselines: BaselineStore::new(&config.storage.baseline_dir),
        predictions: Some(PredictionWriter::new(&config.storage.predictions_dir)),
    };

    let service = AnomalyService::new(
        repository,
        forecast,
        artifacts,
        config.detection.clone(),
        config.suppression.clone(),
        Some(Metrics::new()?),
    )?;
    Ok(service)
}

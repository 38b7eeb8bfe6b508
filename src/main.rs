use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::info;

use daytrace::anomaly::{ActivityAnomalyModel, AnomalyConfig};
use daytrace::error::AnalysisError;
use daytrace::focus::ReferenceStore;
use daytrace::vision::{train_autoencoder, trainer::load_training_frames, Autoencoder, TrainingConfig};
use daytrace::{AnalysisService, Database};

#[derive(Parser)]
#[command(name = "daytrace")]
#[command(about = "Ambient desktop activity log with focus scoring and anomaly detection", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding the database, model artifacts and screenshots
    #[arg(long, default_value = "daytrace-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database (or migrate an existing one) and report its size.
    Init,

    /// Fit the tabular anomaly model on the full activity log.
    TrainActivity,

    /// Train the visual autoencoder on stored screenshots.
    TrainVisual {
        /// Screenshot directory; defaults to <data-dir>/screenshots
        #[arg(long)]
        screenshots_dir: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        epochs: usize,
    },

    /// Use the most recent capture's embedding as the focus reference.
    SetAnchor,

    /// Print the day's focus series, category breakdown and anomalies.
    Report {
        /// UTC date, YYYY-MM-DD; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// How many visual anomalies to show
        #[arg(short, long, default_value_t = 5)]
        k: usize,
    },

    /// Rank one day of activity against a query embedding.
    Search {
        /// JSON file containing the query embedding (an array of floats)
        embedding_file: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(short = 'n', long, default_value_t = 10)]
        top_n: usize,
    },
}

struct Paths {
    database: PathBuf,
    anchor: PathBuf,
    activity_model: PathBuf,
    autoencoder: PathBuf,
    screenshots: PathBuf,
}

impl Paths {
    fn in_dir(data_dir: &Path) -> Self {
        Self {
            database: data_dir.join("daytrace.sqlite3"),
            anchor: data_dir.join("anchor.json"),
            activity_model: data_dir.join("activity_model.json"),
            autoencoder: data_dir.join("autoencoder.json"),
            screenshots: data_dir.join("screenshots"),
        }
    }
}

const CAPTURE_INTERVAL_SECS: u64 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let paths = Paths::in_dir(&cli.data_dir);

    match cli.command {
        Command::Init => {
            let db = Database::new(paths.database.clone())?;
            let count = db.count_activity_records().await?;
            println!(
                "Database ready at {} ({count} records)",
                paths.database.display()
            );
        }

        Command::TrainActivity => {
            let db = Database::new(paths.database)?;
            let records = db.all_activity_records().await?;
            info!("Fitting anomaly model on {} records", records.len());

            let model = ActivityAnomalyModel::fit(&records, &AnomalyConfig::default())?;
            model.save(&paths.activity_model)?;
            println!(
                "Anomaly model fitted on {} records, saved to {}",
                records.len(),
                paths.activity_model.display()
            );
        }

        Command::TrainVisual {
            screenshots_dir,
            epochs,
        } => {
            let dir = screenshots_dir.unwrap_or(paths.screenshots);
            let config = TrainingConfig {
                epochs,
                ..TrainingConfig::default()
            };

            let frames = load_training_frames(&dir, config.side)
                .with_context(|| format!("failed to load screenshots from {}", dir.display()))?;
            let model = train_autoencoder(&frames, &config)?;
            model.save(&paths.autoencoder)?;
            println!(
                "Autoencoder trained on {} screenshots, saved to {}",
                frames.len(),
                paths.autoencoder.display()
            );
        }

        Command::SetAnchor => {
            let service = analysis_service(&paths)?;
            let embedding = service.set_reference_from_latest().await?;
            println!(
                "Reference embedding set from the latest capture ({} dimensions)",
                embedding.len()
            );
        }

        Command::Report { date, k } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let service = analysis_service(&paths)?;

            let series = service.focus_score_series(date).await?;
            println!("Focus on {date}:");
            if !series.reference_set {
                println!("  (no reference set; run `daytrace set-anchor` first)");
            } else if series.points.is_empty() {
                println!("  no records");
            } else {
                let mean: f32 = series.points.iter().map(|p| p.score).sum::<f32>()
                    / series.points.len() as f32;
                println!("  {} records, mean score {mean:.3}", series.points.len());
            }

            println!("\nTime per category:");
            for entry in service.daily_breakdown(date).await? {
                println!("  {:<15} {:6.1} min", entry.category, entry.minutes);
            }

            println!("\nTimeline (10-minute blocks):");
            for block in service.activity_timeline(date).await? {
                println!("  {} {}", block.block_start.format("%H:%M"), block.category);
            }

            println!("\nUnusual activity patterns:");
            let flagged = match ActivityAnomalyModel::load(&paths.activity_model) {
                Ok(model) => service.tabular_anomalies_with(&model, date).await?,
                Err(AnalysisError::ModelNotTrained { .. }) => {
                    println!("  (no saved model; fitting on this day only)");
                    service.tabular_anomalies(date).await?
                }
                Err(err) => return Err(err.into()),
            };
            if flagged.is_empty() {
                println!("  none");
            }
            for anomaly in flagged {
                println!(
                    "  {} {} / {} (score {:.3})",
                    anomaly.record.timestamp.format("%H:%M:%S"),
                    anomaly.record.app_name,
                    anomaly.record.window_title,
                    anomaly.score
                );
            }

            println!("\nVisually unusual moments:");
            match Autoencoder::load(&paths.autoencoder) {
                Ok(model) => {
                    for anomaly in service.visual_anomalies(&model, date, k).await? {
                        println!(
                            "  {} error {:.5} ({})",
                            anomaly.record.timestamp.format("%H:%M:%S"),
                            anomaly.reconstruction_error,
                            anomaly
                                .record
                                .screenshot_path
                                .as_deref()
                                .unwrap_or("no screenshot")
                        );
                    }
                }
                Err(AnalysisError::ModelNotTrained { .. }) => {
                    println!("  (no autoencoder; run `daytrace train-visual` first)");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Command::Search {
            embedding_file,
            date,
            top_n,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let raw = std::fs::read_to_string(&embedding_file).with_context(|| {
                format!("failed to read embedding from {}", embedding_file.display())
            })?;
            let query: Vec<f32> = serde_json::from_str(&raw).with_context(|| {
                format!("malformed embedding file {}", embedding_file.display())
            })?;

            let service = analysis_service(&paths)?;
            for hit in service.semantic_search(&query, date, top_n).await? {
                println!(
                    "  {:.3} {} {} / {}",
                    hit.score,
                    hit.record.timestamp.format("%H:%M:%S"),
                    hit.record.app_name,
                    hit.record.window_title
                );
            }
        }
    }

    Ok(())
}

fn analysis_service(paths: &Paths) -> Result<AnalysisService> {
    let db = Database::new(paths.database.clone())?;
    let reference = ReferenceStore::new(paths.anchor.clone());
    Ok(AnalysisService::new(db, reference, CAPTURE_INTERVAL_SECS))
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trialstore_core::{TrialRecord, DEFAULT_MAINTENANCE_INTERVAL_HOURS, DEFAULT_QUERY_LIMIT};
use trialstore_service::{
    start_maintenance_loop, BackupKind, IngestService, MaintenanceConfig, MaintenanceService,
    QualityService, SearchService,
};
use trialstore_storage::{PgStorage, TrialFilter};

#[derive(Parser)]
#[command(name = "trialstore")]
#[command(about = "Clinical-trials ingestion and storage service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Filter flags shared by `list` and `search`.
#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    phase: Option<String>,
    #[arg(long)]
    study_type: Option<String>,
    /// Case-insensitive substring match on the organization name.
    #[arg(long)]
    organization: Option<String>,
    /// Earliest start date (YYYY-MM-DD).
    #[arg(long)]
    start_from: Option<NaiveDate>,
    /// Latest start date (YYYY-MM-DD).
    #[arg(long)]
    start_to: Option<NaiveDate>,
}

impl From<FilterArgs> for TrialFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            status: args.status,
            phase: args.phase,
            study_type: args.study_type,
            organization: args.organization,
            start_date_from: args.start_from,
            start_date_to: args.start_to,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest trial records from a JSON file (one object or an array).
    Ingest {
        file: PathBuf,
    },
    /// Print complete info for one trial.
    Get {
        nct_id: String,
    },
    /// List stored trials, newest first.
    List {
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
        #[arg(short, long, default_value = "0")]
        offset: usize,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Full-text search over titles, summaries, conditions, and keywords.
    Search {
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_QUERY_LIMIT)]
        limit: usize,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Aggregate statistics.
    Stats,
    /// Export every trial's complete info as JSON.
    Export {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the four-axis data-quality check.
    Quality {
        /// Render the operator text report instead of JSON.
        #[arg(long)]
        text: bool,
    },
    /// Run the maintenance pass; with --interval-hours, keep running on a schedule.
    Maintain {
        #[arg(long)]
        interval_hours: Option<u64>,
    },
    /// Create a backup artifact.
    Backup {
        #[arg(long, default_value = "full")]
        kind: String,
    },
    /// List backup artifacts, newest first.
    Backups,
    /// Restore a backup artifact (name or path) into the database.
    Restore {
        backup: PathBuf,
        /// Restore into this database instead of the live one.
        #[arg(long)]
        target_url: Option<String>,
    },
    /// Restore the newest backup into a scratch database and report row counts.
    VerifyBackup {
        /// Scratch database URL; defaults to TRIALSTORE_SCRATCH_DATABASE_URL.
        #[arg(long)]
        scratch_url: Option<String>,
    },
    /// Delete a trial and all of its child rows.
    Delete {
        nct_id: String,
    },
}

fn database_url() -> Result<String> {
    std::env::var("DATABASE_URL")
        .context("DATABASE_URL environment variable must be set")
}

fn load_records(path: &PathBuf) -> Result<Vec<TrialRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let records = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(records)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let url = database_url()?;
    let storage = Arc::new(PgStorage::new(&url).await?);

    match cli.command {
        Commands::Ingest { file } => {
            let records = load_records(&file)?;
            let service = IngestService::new(storage);
            let outcome = service.ingest_batch(&records).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if outcome.failed > 0 {
                std::process::exit(1);
            }
        },
        Commands::Get { nct_id } => {
            let service = SearchService::new(storage);
            match service.get_trial(&nct_id).await? {
                Some(detail) => println!("{}", serde_json::to_string_pretty(&detail)?),
                None => {
                    eprintln!("Trial not found: {nct_id}");
                    std::process::exit(1);
                },
            }
        },
        Commands::List { limit, offset, filter } => {
            let service = SearchService::new(storage);
            let page = service.list_trials(&filter.into(), offset, limit).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        },
        Commands::Search { query, limit, filter } => {
            let service = SearchService::new(storage);
            let hits = service.search(&query, &filter.into(), limit).await?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        },
        Commands::Stats => {
            let service = SearchService::new(storage);
            let stats = service.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        },
        Commands::Export { output } => {
            let service = SearchService::new(storage);
            let trials = service.export_all().await?;
            let json = serde_json::to_string_pretty(&trials)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("Exported {} trials to {}", trials.len(), path.display());
                },
                None => println!("{json}"),
            }
        },
        Commands::Quality { text } => {
            let service = QualityService::new(storage);
            let report = service.run_checks().await?;
            if text {
                print!("{}", report.render_text());
            } else {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        },
        Commands::Maintain { interval_hours } => {
            let service =
                Arc::new(MaintenanceService::new(storage, MaintenanceConfig::from_env(url)));
            match interval_hours {
                None => {
                    let log = service.run().await;
                    println!("{}", serde_json::to_string_pretty(&log)?);
                    if log.fatal {
                        std::process::exit(1);
                    }
                },
                Some(hours) => {
                    let hours = if hours == 0 { DEFAULT_MAINTENANCE_INTERVAL_HOURS } else { hours };
                    tracing::info!(interval_hours = hours, "starting maintenance loop");
                    start_maintenance_loop(
                        Arc::clone(&service),
                        std::time::Duration::from_secs(hours * 3600),
                    );
                    tokio::signal::ctrl_c().await?;
                },
            }
        },
        Commands::Backup { kind } => {
            let kind: BackupKind = kind.parse()?;
            let service = MaintenanceService::new(storage, MaintenanceConfig::from_env(url));
            let info = service.create_backup(kind).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        },
        Commands::Backups => {
            let service = MaintenanceService::new(storage, MaintenanceConfig::from_env(url));
            let backups = service.list_backups().await?;
            println!("{}", serde_json::to_string_pretty(&backups)?);
        },
        Commands::Restore { backup, target_url } => {
            let service = MaintenanceService::new(storage, MaintenanceConfig::from_env(url));
            service.restore_backup(&backup, target_url.as_deref()).await?;
            println!("Restore completed from {}", backup.display());
        },
        Commands::VerifyBackup { scratch_url } => {
            let scratch = scratch_url
                .or_else(|| std::env::var("TRIALSTORE_SCRATCH_DATABASE_URL").ok())
                .context("pass --scratch-url or set TRIALSTORE_SCRATCH_DATABASE_URL")?;
            let service = MaintenanceService::new(storage, MaintenanceConfig::from_env(url));
            let verification = service.verify_latest_backup(&scratch).await?;
            println!("{}", serde_json::to_string_pretty(&verification)?);
        },
        Commands::Delete { nct_id } => {
            let service = SearchService::new(storage);
            if service.delete_trial(&nct_id).await? {
                println!("Deleted {nct_id} and all dependent rows");
            } else {
                eprintln!("Trial not found: {nct_id}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use ledgerlift::backup;
use ledgerlift::config::MigrationConfig;
use ledgerlift::db;
use ledgerlift::idmap::HashIdMapper;
use ledgerlift::import::{write_import_report, BatchImporter, CancelToken, ImportStats};
use ledgerlift::logging;
use ledgerlift::verify::{
    generate_rollback_script, write_rollback_script, write_verify_report, CheckToggles,
    IntegrityValidator, VerifyStatus,
};

#[derive(Parser)]
#[command(
    name = "ledgerlift",
    about = "Migrate JSON collection exports into a normalized SQLite store and verify the result",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import source collections into the destination database.
    Import(ImportArgs),
    /// Verify a migrated database against the source exports.
    Verify(VerifyArgs),
    /// Import, then verify, in one invocation.
    Run(RunArgs),
}

#[derive(Args)]
struct SharedArgs {
    /// Directory holding the JSON collection exports.
    #[arg(long, value_name = "DIR", default_value = "data")]
    source: PathBuf,
    /// Destination SQLite database file.
    #[arg(long, value_name = "PATH", default_value = "ledger.sqlite3")]
    db: PathBuf,
    /// Directory for reports, backups and rollback scripts.
    #[arg(long, value_name = "DIR", default_value = "reports")]
    out: PathBuf,
}

#[derive(Args)]
struct ImportArgs {
    #[command(flatten)]
    shared: SharedArgs,
    /// Validate and plan without writing to the database.
    #[arg(long)]
    dry_run: bool,
    /// Skip the pre-import database snapshot.
    #[arg(long)]
    skip_backup: bool,
    /// Import even when destination tables already hold rows.
    #[arg(long)]
    force_rerun: bool,
    /// Records per batch transaction.
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    shared: SharedArgs,
    /// Skip record-count parity checks.
    #[arg(long)]
    skip_counts: bool,
    /// Skip relationship (orphan) checks.
    #[arg(long)]
    skip_relationships: bool,
    /// Skip sampled field comparison.
    #[arg(long)]
    skip_samples: bool,
    /// Skip domain compliance queries.
    #[arg(long)]
    skip_compliance: bool,
    /// Skip performance probes.
    #[arg(long)]
    skip_performance: bool,
    /// Migration run start (RFC 3339) used to scope a rollback script.
    #[arg(long, value_name = "TIMESTAMP")]
    since: Option<DateTime<Utc>>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    import: ImportArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logging();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Import(args) => run_import(&args).await.map(|stats| {
            if stats.failed_imports() > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }),
        Command::Verify(args) => run_verify(&args, None).await,
        Command::Run(args) => run_pipeline(args).await,
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            error!(target: "ledgerlift", "fatal: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn build_config(args: &ImportArgs) -> MigrationConfig {
    let mut config = MigrationConfig::default();
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size.max(1);
    }
    config
}

fn cancel_on_ctrl_c() -> CancelToken {
    let token = CancelToken::default();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "ledgerlift", "interrupt received, stopping after the current batch");
            handle.cancel();
        }
    });
    token
}

async fn run_import(args: &ImportArgs) -> Result<ImportStats> {
    let config = build_config(args);
    anyhow::ensure!(
        args.shared.source.is_dir(),
        "source directory {} does not exist",
        args.shared.source.display()
    );

    if !args.skip_backup && !args.dry_run {
        backup::snapshot_database(&args.shared.db, &args.shared.out)
            .context("snapshot database before import")?;
    }

    let pool = db::open_pool(&args.shared.db, config.pool_size, true)
        .await
        .with_context(|| format!("open database {}", args.shared.db.display()))?;

    let mapper = HashIdMapper;
    let mut importer = BatchImporter::new(&pool, &config, &mapper)
        .dry_run(args.dry_run)
        .with_cancel_token(cancel_on_ctrl_c());

    let stats = importer
        .run(&args.shared.source, args.force_rerun)
        .await
        .context("import source collections")?;

    let (json_path, md_path) = write_import_report(&args.shared.out, &stats, &config)?;
    info!(
        target: "ledgerlift",
        records = stats.total_records(),
        imported = stats.successful_imports(),
        failed = stats.failed_imports(),
        duplicates = stats.duplicates_skipped(),
        report = %json_path.display(),
        summary = %md_path.display(),
        "import finished"
    );
    pool.close().await;
    Ok(stats)
}

async fn run_verify(args: &VerifyArgs, run_started_at: Option<DateTime<Utc>>) -> Result<ExitCode> {
    let config = MigrationConfig::default();
    let pool = db::open_pool(&args.shared.db, config.pool_size, false)
        .await
        .with_context(|| format!("open database {}", args.shared.db.display()))?;

    let toggles = CheckToggles {
        counts: !args.skip_counts,
        relationships: !args.skip_relationships,
        samples: !args.skip_samples,
        compliance: !args.skip_compliance,
        performance: !args.skip_performance,
    };

    let mapper = HashIdMapper;
    let report = IntegrityValidator::new(&pool, &config, &args.shared.source, &mapper)
        .with_toggles(toggles)
        .validate()
        .await
        .context("run integrity checks")?;

    let (json_path, md_path) = write_verify_report(&args.shared.out, &report)?;
    info!(
        target: "ledgerlift",
        report = %json_path.display(),
        summary = %md_path.display(),
        "verification report written"
    );

    if report.critical_issues() > 0 {
        match run_started_at.or(args.since) {
            Some(cutoff) => {
                if let Some(script) = generate_rollback_script(&report, cutoff)? {
                    let path = write_rollback_script(&args.shared.out, &script)?;
                    warn!(
                        target: "ledgerlift",
                        script = %path.display(),
                        "critical issues found, rollback script written"
                    );
                }
            }
            None => warn!(
                target: "ledgerlift",
                "critical issues found but no --since timestamp given, rollback script not generated"
            ),
        }
    }

    pool.close().await;
    Ok(match report.status {
        VerifyStatus::Passed => ExitCode::SUCCESS,
        VerifyStatus::Failed => ExitCode::from(1),
    })
}

async fn run_pipeline(args: RunArgs) -> Result<ExitCode> {
    let stats = run_import(&args.import).await?;
    if args.import.dry_run {
        return Ok(ExitCode::SUCCESS);
    }

    let verify_args = VerifyArgs {
        shared: SharedArgs {
            source: args.import.shared.source.clone(),
            db: args.import.shared.db.clone(),
            out: args.import.shared.out.clone(),
        },
        skip_counts: false,
        skip_relationships: false,
        skip_samples: false,
        skip_compliance: false,
        skip_performance: false,
        since: None,
    };
    run_verify(&verify_args, Some(stats.started_at)).await
}

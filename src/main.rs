use std::{io::Read as _, path::PathBuf, process::ExitCode};

use anyhow::Context;
use builder_migrate::{
    MigrationDriver, MigrationResult,
    config::MigrationConfig,
    migrate::{RESULT_TTL_SECS, render_summary},
    progress::{MigrationPhase, create_reporter},
    store::{ResultChannel as _, sqlite::LocalDatabase},
};
use clap::{Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser)]
struct Opts {
    #[clap(short, long, env = "BUILDER_MIGRATE_DATABASE")]
    database: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate builder data of every matching record into its content
    Run {
        #[clap(short, long, env = "BUILDER_MIGRATE_CONFIG")]
        config: Option<PathBuf>,
        /// Record type to migrate (repeatable); replaces the configured list
        #[clap(long = "post-type")]
        post_types: Vec<String>,
        /// Leave records whose content is already non-empty untouched
        #[clap(long)]
        no_overwrite: bool,
        #[clap(long)]
        page_size: Option<u32>,
        #[clap(long)]
        concurrency: Option<usize>,
        /// Print the result as JSON
        #[clap(long)]
        json: bool,
    },
    /// Show the result of the last run, if it has not expired or been shown yet
    LastResult {
        #[clap(long)]
        json: bool,
    },
    /// Normalize a single encoded blob and print the markup
    Normalize {
        /// File holding the blob, or `-` for stdin
        input: PathBuf,
    },
}

fn print_result(result: &MigrationResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        println!("{}", render_summary(result));
    }
    Ok(())
}

async fn open_database(database: Option<String>) -> anyhow::Result<LocalDatabase> {
    let url = database.context("no database given (--database or BUILDER_MIGRATE_DATABASE)")?;
    LocalDatabase::open(&url)
        .await
        .with_context(|| format!("open database {url}"))
}

async fn run(opts: Opts) -> anyhow::Result<ExitCode> {
    match opts.command {
        Command::Run {
            config,
            post_types,
            no_overwrite,
            page_size,
            concurrency,
            json,
        } => {
            let reporter = create_reporter();
            reporter.set_phase(MigrationPhase::LoadingConfig);
            let mut config = match config {
                Some(path) => MigrationConfig::load(&path)
                    .await
                    .with_context(|| format!("load config from {}", path.display()))?,
                None => MigrationConfig::default(),
            };
            if !post_types.is_empty() {
                config.post_types = post_types;
            }
            if no_overwrite {
                config.overwrite_nonempty = false;
            }
            if let Some(page_size) = page_size {
                config.page_size = page_size;
            }
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            config.validate()?;

            reporter.set_phase(MigrationPhase::OpeningDatabase);
            let db = open_database(opts.database).await?;
            let result = MigrationDriver::new(db.client(), db.client(), config)
                .with_reporter(reporter.clone())
                .run()
                .await;

            reporter.set_phase(MigrationPhase::StoringResult);
            db.client()
                .put_result(&result, RESULT_TTL_SECS)
                .await
                .context("store migration result")?;
            if result.has_errors() {
                reporter.set_phase(MigrationPhase::Failed(format!(
                    "{} record(s) failed",
                    result.errors
                )));
            } else {
                reporter.set_phase(MigrationPhase::Completed);
            }
            reporter.finish();

            print_result(&result, json)?;
            Ok(if result.has_errors() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::LastResult { json } => {
            let db = open_database(opts.database).await?;
            match db.client().take_result().await? {
                Some(result) => print_result(&result, json)?,
                None => info!("no recent migration result"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Normalize { input } => {
            let blob = if input.as_os_str() == "-" {
                let mut blob = String::new();
                std::io::stdin()
                    .read_to_string(&mut blob)
                    .context("read stdin")?;
                blob
            } else {
                tokio::fs::read_to_string(&input)
                    .await
                    .with_context(|| format!("read {}", input.display()))?
            };
            let document = builder_migrate::normalize(&blob)?;
            println!("{document}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(?e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(run(opts)) {
        Ok(code) => code,
        Err(e) => {
            error!(?e, "critical error");
            ExitCode::FAILURE
        }
    }
}

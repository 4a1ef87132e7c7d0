//! cinesync - movie catalog ingestion CLI.

/// Application configuration (TOML).
mod config;
/// Daily job schedule.
mod schedule;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use tracing_subscriber::filter::EnvFilter;
#[cfg(not(feature = "otel"))]
use tracing_subscriber::fmt;
#[cfg(feature = "otel")]
use tracing_subscriber::layer::SubscriberExt;
#[cfg(feature = "otel")]
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{AppConfig, resolve_config_path};
use crate::schedule::{DailySchedule, Job};
use cinesync_api::kofic::KoficClient;
use cinesync_api::tmdb::{LocalTmdbApi, SearchMovieParams, TmdbClient, TmdbMovieSummary};
use cinesync_db::{check_integrity, open_db, table_counts};
use cinesync_ingest::{
    BatchSettings, IngestContext, KoficJob, KoficOptions, RunReport, Stage, TmdbJob, TmdbOptions,
    WorkerPool, default_target_date, select_stages,
};

/// User agent sent to every provider.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// CLI argument parser.
#[derive(Parser)]
#[command(about, version)]
struct Cli {
    /// Override config/data directory.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run an ingestion job once.
    Sync(SyncCommand),
    /// Run the TMDB and KOFIC jobs daily at the configured times.
    Daemon,
    /// Local database operations.
    Db(DbCommand),
    /// Query TMDB API.
    Tmdb(TmdbCommand),
}

/// Arguments for the `sync` subcommand.
#[derive(clap::Args)]
struct SyncCommand {
    /// Sync subcommand to run.
    #[command(subcommand)]
    command: SyncSubcommands,
}

/// Available sync subcommands.
#[derive(Subcommand)]
enum SyncSubcommands {
    /// Sync genres, platforms, movies and per-movie resources from TMDB.
    Tmdb(SyncTmdbArgs),
    /// Sync the KOFIC daily box office and map it to catalog movies.
    Kofic(SyncKoficArgs),
}

/// Arguments for the `sync tmdb` subcommand.
#[derive(clap::Args)]
struct SyncTmdbArgs {
    /// Comma-separated stages to run (default: all).
    /// Stages: genres, platforms, movies, availability, images, videos, credits, details.
    #[arg(long)]
    stages: Option<String>,

    /// Page cap per movie list (overrides `[tmdb] max_pages`).
    #[arg(long)]
    max_pages: Option<u32>,

    /// Pause between batches in seconds (overrides `[batch] inter_batch_delay_secs`).
    #[arg(long)]
    delay_secs: Option<u64>,
}

/// Arguments for the `sync kofic` subcommand.
#[derive(clap::Args)]
struct SyncKoficArgs {
    /// Ranking date as YYYYMMDD (default: yesterday).
    #[arg(long, value_parser = parse_target_date)]
    date: Option<NaiveDate>,

    /// Comma-separated stages to run (default: all).
    /// Stages: box_office, kofic_mapping.
    #[arg(long)]
    stages: Option<String>,
}

/// Arguments for the `db` subcommand.
#[derive(clap::Args)]
struct DbCommand {
    /// Db subcommand to run.
    #[command(subcommand)]
    command: DbSubcommands,
}

/// Available database subcommands.
#[derive(Subcommand)]
enum DbSubcommands {
    /// Scan for orphaned references and print row counts.
    Check,
}

/// Arguments for the `tmdb` subcommand.
#[derive(clap::Args)]
struct TmdbCommand {
    /// TMDB subcommand to run.
    #[command(subcommand)]
    command: TmdbSubcommands,
}

/// Available TMDB subcommands.
#[derive(Subcommand)]
enum TmdbSubcommands {
    /// Search for movies on TMDB.
    SearchMovie(TmdbSearchMovieArgs),
}

/// Arguments for the `tmdb search-movie` subcommand.
#[derive(clap::Args)]
struct TmdbSearchMovieArgs {
    /// Search query (e.g. "서울의 봄").
    #[arg(long, required = true)]
    query: String,
    /// Response language (default: "ko-KR").
    #[arg(long, default_value = "ko-KR")]
    language: String,
    /// Filter by year.
    #[arg(long)]
    year: Option<u32>,
}

/// Parses a KOFIC `YYYYMMDD` date.
fn parse_target_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

/// Config, store and shared run state of one process.
struct Session {
    config: AppConfig,
    conn: Connection,
    pool: WorkerPool,
    batch: BatchSettings,
    cancel: CancellationToken,
}

impl Session {
    /// Loads the config and opens the catalog store.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the store cannot be opened.
    fn open(dir: Option<&PathBuf>) -> Result<Self> {
        let config_path = resolve_config_path(dir)?;
        let config = AppConfig::load(&config_path)?;
        let conn = open_db(dir).context("failed to open database")?;
        let pool = config.batch.pool();
        let batch = config.batch.settings();
        Ok(Self {
            config,
            conn,
            pool,
            batch,
            cancel: CancellationToken::new(),
        })
    }

    const fn context(&self) -> IngestContext<'_> {
        IngestContext {
            conn: &self.conn,
            pool: &self.pool,
            batch: &self.batch,
            cancel: &self.cancel,
        }
    }

    /// Cancels the session on Ctrl-C. In-flight stages stop between tasks.
    fn cancel_on_interrupt(&self) {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after in-flight requests");
                cancel.cancel();
            }
        });
    }

    /// Builds a TMDB client from `TMDB_API_TOKEN` and the `[tmdb]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if `TMDB_API_TOKEN` is not set or the client fails to build.
    fn tmdb_client(&self) -> Result<Arc<TmdbClient>> {
        let api_token = tmdb_api_token()?;
        let tmdb = &self.config.tmdb;
        let client = TmdbClient::builder()
            .api_token(api_token)
            .user_agent(USER_AGENT)
            .language(tmdb.language.as_str())
            .region(tmdb.region.as_str())
            .rate_limiter(tmdb.rate_limiter())
            .cancel_token(self.cancel.clone())
            .build()
            .context("failed to build TMDB client")?;
        Ok(Arc::new(client))
    }

    /// Builds a KOFIC client from `KOFIC_API_KEY` and the `[kofic]` section.
    ///
    /// # Errors
    ///
    /// Returns an error if `KOFIC_API_KEY` is not set or the client fails to build.
    fn kofic_client(&self) -> Result<Arc<KoficClient>> {
        let api_key =
            std::env::var("KOFIC_API_KEY").context("KOFIC_API_KEY environment variable is required")?;
        let client = KoficClient::builder()
            .api_key(api_key)
            .user_agent(USER_AGENT)
            .rate_limiter(self.config.kofic.rate_limiter())
            .cancel_token(self.cancel.clone())
            .build()
            .context("failed to build KOFIC client")?;
        Ok(Arc::new(client))
    }

    /// Runs the TMDB job and logs its summary.
    async fn run_tmdb(
        &self,
        client: &Arc<TmdbClient>,
        stages: &[Stage],
        options: TmdbOptions,
    ) -> RunReport {
        let job = TmdbJob::new(Arc::clone(client), self.context(), options);
        let report = job.run(stages).await;
        report.log_summary();
        report
    }

    /// Runs the KOFIC job and logs its summary.
    async fn run_kofic(
        &self,
        kofic: &Arc<KoficClient>,
        tmdb: &Arc<TmdbClient>,
        stages: &[Stage],
        options: KoficOptions,
    ) -> RunReport {
        let job = KoficJob::new(Arc::clone(kofic), Arc::clone(tmdb), self.context(), options);
        let report = job.run(stages).await;
        report.log_summary();
        report
    }

    fn kofic_options(&self, target_date: NaiveDate) -> KoficOptions {
        KoficOptions {
            target_date,
            language: self.config.tmdb.language.clone(),
        }
    }
}

/// Reads `TMDB_API_TOKEN`.
///
/// # Errors
///
/// Returns an error if the variable is not set.
fn tmdb_api_token() -> Result<String> {
    std::env::var("TMDB_API_TOKEN").context("TMDB_API_TOKEN environment variable is required")
}

/// Turns a finished run into the process result.
///
/// # Errors
///
/// Returns an error if any stage failed or the run was cancelled.
fn finish(report: &RunReport) -> Result<()> {
    let failed = report
        .stages
        .iter()
        .filter(|r| r.status.is_failure())
        .count();
    if failed > 0 {
        bail!("{failed} stage(s) failed");
    }
    if report.was_cancelled() {
        bail!("run cancelled");
    }
    Ok(())
}

/// Runs the `sync tmdb` subcommand.
///
/// # Errors
///
/// Returns an error if setup fails or any stage fails.
#[instrument(skip_all)]
async fn run_sync_tmdb(args: &SyncTmdbArgs, dir: Option<&PathBuf>) -> Result<()> {
    let stages = select_stages(&Stage::TMDB, args.stages.as_deref())?;
    let mut session = Session::open(dir)?;
    if let Some(secs) = args.delay_secs {
        session.batch.inter_batch_delay = Duration::from_secs(secs);
    }
    let mut options = session.config.tmdb.options()?;
    if let Some(max_pages) = args.max_pages {
        options.max_pages = max_pages;
    }

    let client = session.tmdb_client()?;
    session.cancel_on_interrupt();
    let report = session.run_tmdb(&client, &stages, options).await;
    finish(&report)
}

/// Runs the `sync kofic` subcommand.
///
/// # Errors
///
/// Returns an error if setup fails or any stage fails.
#[instrument(skip_all)]
async fn run_sync_kofic(args: &SyncKoficArgs, dir: Option<&PathBuf>) -> Result<()> {
    let stages = select_stages(&Stage::KOFIC, args.stages.as_deref())?;
    let session = Session::open(dir)?;
    let kofic = session.kofic_client()?;
    let tmdb = session.tmdb_client()?;
    let options = session.kofic_options(args.date.unwrap_or_else(default_target_date));

    session.cancel_on_interrupt();
    let report = session.run_kofic(&kofic, &tmdb, &stages, options).await;
    finish(&report)
}

/// Runs the TMDB and KOFIC jobs every day until interrupted.
///
/// A failed run is logged and the next run is scheduled as usual.
///
/// # Errors
///
/// Returns an error if setup fails.
#[instrument(skip_all)]
async fn run_daemon(dir: Option<&PathBuf>) -> Result<()> {
    let session = Session::open(dir)?;
    let tmdb_options = session.config.tmdb.options()?;
    let schedule = DailySchedule::new(vec![
        (Job::Tmdb, session.config.schedule.tmdb_time()?),
        (Job::Kofic, session.config.schedule.kofic_time()?),
    ]);
    let tmdb = session.tmdb_client()?;
    let kofic = session.kofic_client()?;
    session.cancel_on_interrupt();

    loop {
        let now = Local::now().naive_local();
        let Some((job, due)) = schedule.next_due(now) else {
            bail!("nothing to schedule");
        };
        let wait = due.signed_duration_since(now).to_std().unwrap_or(Duration::ZERO);
        tracing::info!(%job, at = %due, wait_secs = wait.as_secs(), "next run scheduled");

        tokio::select! {
            () = session.cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        let report = match job {
            Job::Tmdb => {
                session
                    .run_tmdb(&tmdb, &Stage::TMDB, tmdb_options.clone())
                    .await
            }
            Job::Kofic => {
                let options = session.kofic_options(default_target_date());
                session.run_kofic(&kofic, &tmdb, &Stage::KOFIC, options).await
            }
        };
        if let Err(e) = finish(&report) {
            tracing::error!(%job, "scheduled run did not complete: {e:#}");
        }
        if session.cancel.is_cancelled() {
            break;
        }
    }

    tracing::info!("daemon stopped");
    Ok(())
}

/// Runs the `db check` subcommand.
///
/// # Errors
///
/// Returns an error if the store cannot be read or holds orphaned rows.
#[instrument(skip_all)]
fn run_db_check(dir: Option<&PathBuf>) -> Result<()> {
    let conn = open_db(dir).context("failed to open database")?;

    for (table, rows) in table_counts(&conn)? {
        tracing::info!(table, rows, "table");
    }

    let report = check_integrity(&conn)?;
    if !report.is_clean() {
        let orphans: u64 = report.orphans.iter().map(|o| o.count).sum();
        bail!(
            "{orphans} orphaned row(s) across {} reference(s)",
            report.orphans.len()
        );
    }
    tracing::info!("no orphaned references");
    Ok(())
}

/// Runs the `tmdb search-movie` subcommand.
///
/// # Errors
///
/// Returns an error if the TMDB client fails to build or the API request fails.
#[instrument(skip_all)]
async fn run_tmdb_search_movie(args: &TmdbSearchMovieArgs) -> Result<()> {
    let client = TmdbClient::builder()
        .api_token(tmdb_api_token()?)
        .user_agent(USER_AGENT)
        .language(args.language.as_str())
        .build()
        .context("failed to build TMDB client")?;

    let mut params = SearchMovieParams::new(&args.query).language(&args.language);
    if let Some(year) = args.year {
        params = params.year(year);
    }

    let response = client
        .search_movie(&params)
        .await
        .context("TMDB search/movie request failed")?;

    tracing::info!("Total results: {}", response.total_results);
    tracing::info!("ID\tTitle\t\t\tOrigTitle\t\tReleaseDate");
    for item in response.results {
        let Ok(movie) = serde_json::from_value::<TmdbMovieSummary>(item) else {
            continue;
        };
        tracing::info!(
            "{}\t{}\t{}\t\t{}",
            movie.id,
            movie.title,
            movie.original_title.as_deref().unwrap_or("-"),
            movie.release_date.as_deref().unwrap_or("-"),
        );
    }

    Ok(())
}

/// Entry point.
///
/// # Errors
///
/// Returns an error if subcommand execution fails.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    #[cfg(not(feature = "otel"))]
    {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }

    #[cfg(feature = "otel")]
    {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

        let otel_layer = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .and_then(|_| {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .build()
                    .ok()?;

                let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
                    .with_simple_exporter(exporter)
                    .build();

                let tracer = opentelemetry::trace::TracerProvider::tracer(
                    &tracer_provider,
                    env!("CARGO_PKG_NAME"),
                );
                opentelemetry::global::set_tracer_provider(tracer_provider);

                Some(tracing_opentelemetry::layer().with_tracer(tracer))
            });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();
    }

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(cmd) => match cmd.command {
            SyncSubcommands::Tmdb(args) => run_sync_tmdb(&args, cli.dir.as_ref()).await,
            SyncSubcommands::Kofic(args) => run_sync_kofic(&args, cli.dir.as_ref()).await,
        },
        Commands::Daemon => run_daemon(cli.dir.as_ref()).await,
        Commands::Db(db) => match db.command {
            DbSubcommands::Check => run_db_check(cli.dir.as_ref()),
        },
        Commands::Tmdb(tmdb) => match tmdb.command {
            TmdbSubcommands::SearchMovie(args) => run_tmdb_search_movie(&args).await,
        },
    }
}

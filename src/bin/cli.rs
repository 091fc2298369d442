//! UFF Relatórios CLI
//!
//! Batch generation, monitoring and consolidation of enrollment reports.
//! Authentication is external: pass an already established portal session
//! cookie via `--cookie` or the `UFF_SESSION_COOKIE` environment variable.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use uff_relatorios::{
    error::{AppError, Result},
    models::{Config, PollOutcome, Program},
    pipeline::{self, Pacing},
    services::{pages::StatusPageModel, PortalSession, ReportDownloader, StatusPoller},
    stats,
    utils::clock::SystemClock,
};

/// UFF Relatórios - Enrollment Report Automation
#[derive(Parser, Debug)]
#[command(
    name = "uff-relatorios",
    version,
    about = "Enrollment report generation and statistics for the UFF portal"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Authenticated portal session cookie (or set UFF_SESSION_COOKIE)
    #[arg(long)]
    cookie: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate reports for every configured program across a term range
    Generate {
        /// First term, e.g. 20231
        #[arg(long)]
        start_term: String,

        /// Last term (inclusive), e.g. 20251
        #[arg(long)]
        end_term: String,

        /// Restrict to programs whose name contains this text (repeatable)
        #[arg(long)]
        program: Vec<String>,

        /// Use the shorter interactive pacing between jobs
        #[arg(long)]
        interactive: bool,
    },

    /// Show (or wait for) the status of one report job
    Status {
        /// Numeric report id
        report_id: String,

        /// Poll until the report is ready or the timeout passes
        #[arg(long)]
        wait: bool,
    },

    /// Download one report that is already ready
    Download {
        /// Numeric report id
        report_id: String,
    },

    /// Consolidate downloaded reports into the statistics spreadsheet
    Consolidate {
        /// Batch results manifest (default: {output_dir}/results.json)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Output spreadsheet path
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Build the portal session from the externally obtained cookie.
fn open_session(cookie: &Option<String>, config: &Config) -> Result<PortalSession> {
    let cookie = cookie
        .clone()
        .or_else(|| std::env::var("UFF_SESSION_COOKIE").ok())
        .ok_or_else(|| {
            AppError::config("No session cookie: pass --cookie or set UFF_SESSION_COOKIE")
        })?;
    PortalSession::with_cookie(&config.portal, &cookie)
}

/// Select configured programs by name fragment; all when no filter given.
fn select_programs(config: &Config, filters: &[String]) -> Result<Vec<Program>> {
    if filters.is_empty() {
        return Ok(config.programs.clone());
    }

    let selected: Vec<Program> = config
        .programs
        .iter()
        .filter(|program| {
            filters
                .iter()
                .any(|f| program.name.to_lowercase().contains(&f.to_lowercase()))
        })
        .cloned()
        .collect();

    if selected.is_empty() {
        return Err(AppError::validation(format!(
            "No configured program matches {:?}",
            filters
        )));
    }
    Ok(selected)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Generate {
            start_term,
            end_term,
            program,
            interactive,
        } => {
            config.validate()?;

            let terms = pipeline::expand_term_range(&start_term, &end_term);
            if terms.is_empty() {
                return Err(AppError::validation(format!(
                    "Invalid term range {start_term}..{end_term} (terms are YYYYS with S in 1..2, start <= end)"
                )));
            }

            let programs = select_programs(&config, &program)?;
            let session = open_session(&cli.cookie, &config)?;
            let pacing = if interactive {
                Pacing::Interactive
            } else {
                Pacing::Batch
            };

            let results = pipeline::run_batch(
                &config,
                &session,
                &SystemClock,
                &programs,
                &terms,
                pacing,
            )
            .await?;

            for (program, outcomes) in &results {
                for outcome in outcomes {
                    if outcome.success {
                        log::info!(
                            "{} / {}: OK ({})",
                            program,
                            outcome.term,
                            outcome
                                .file
                                .as_ref()
                                .map(|p| p.display().to_string())
                                .unwrap_or_default()
                        );
                    } else {
                        log::error!(
                            "{} / {}: FAILED ({})",
                            program,
                            outcome.term,
                            outcome.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
            }
        }

        Command::Status { report_id, wait } => {
            let session = open_session(&cli.cookie, &config)?;
            let page = StatusPageModel::new(&config.selectors)?;
            let poller = StatusPoller::new(&session, &config.portal, page);

            let record = if wait {
                let interval = Duration::from_secs(config.polling.interval_secs);
                let timeout = Duration::from_secs(config.polling.timeout_secs);
                let mut on_progress = |progress: f64, message: &str, _done: bool| {
                    log::info!("Progress {:.0}%: {}", progress * 100.0, message);
                };

                match poller
                    .poll(&report_id, interval, timeout, &SystemClock, &mut on_progress)
                    .await
                {
                    PollOutcome::Ready(record) => record,
                    PollOutcome::TimedOut => {
                        log::warn!("Report #{} did not become ready in time", report_id);
                        poller.fetch(&report_id).await?
                    }
                }
            } else {
                poller.fetch(&report_id).await?
            };

            println!("{}", record.summary());
        }

        Command::Download { report_id } => {
            let session = open_session(&cli.cookie, &config)?;
            let page = StatusPageModel::new(&config.selectors)?;
            let poller = StatusPoller::new(&session, &config.portal, page);

            let record = poller.fetch(&report_id).await?;
            if record.download_url.is_none() {
                return Err(AppError::download(
                    &report_id,
                    format!("report is not ready (status: {})", record.state),
                ));
            }

            let downloader = ReportDownloader::new(&session, &config.batch.output_dir);
            let program = record
                .filters
                .get("Curso")
                .cloned()
                .unwrap_or_else(|| "desconhecido".to_string());
            let term = record
                .filters
                .get("Ano/Semestre de Ingresso")
                .and_then(|text| pipeline::term_from_text(text))
                .unwrap_or_default();

            let report = downloader.download(&record, &program, &term).await?;
            log::info!(
                "Saved {} ({} bytes, valid spreadsheet: {})",
                report.path.display(),
                report.bytes,
                report.valid
            );
        }

        Command::Consolidate { manifest, out } => {
            let manifest_path = manifest
                .unwrap_or_else(|| PathBuf::from(&config.batch.output_dir).join("results.json"));
            if !manifest_path.exists() {
                return Err(AppError::config(format!(
                    "Manifest not found at {}. Run 'generate' first.",
                    manifest_path.display()
                )));
            }

            let results = pipeline::load_manifest(&manifest_path).await?;
            let report = stats::consolidate(&results, &config.modality);

            let out_path = out.unwrap_or_else(|| {
                PathBuf::from(&config.batch.output_dir).join(format!(
                    "estatisticas_{}.xlsx",
                    Local::now().format("%Y%m%d_%H%M%S")
                ))
            });
            stats::write_consolidated(&report, &out_path)?;

            log::info!(
                "Consolidated {} programs over {} terms: {} enrollments, {} cancellations, {} graduated, {} active",
                report.summary.total_programs,
                report.summary.total_terms,
                report.summary.total_enrollments,
                report.summary.total_cancellations,
                report.summary.total_graduated,
                report.summary.total_active
            );
            log::info!("Spreadsheet: {}", out_path.display());
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "Config OK ({} programs, output dir '{}')",
                config.programs.len(),
                config.batch.output_dir
            );
        }
    }

    log::info!("Done!");

    Ok(())
}

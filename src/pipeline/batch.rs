// src/pipeline/batch.rs

//! Batch report generation across programs and terms.
//!
//! Drives submit -> poll -> download for every (program, term) combination,
//! strictly one job at a time. The upstream portal is rate-sensitive, so the
//! orchestrator paces jobs with a fixed sleep instead of parallelizing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::models::{BatchConfig, Config, FilterSet, JobOutcome, PollOutcome, Program, SubmissionOutcome};
use crate::services::pages::StatusPageModel;
use crate::services::{FormSubmitter, ReportDownloader, Session, StatusPoller};
use crate::utils::clock::Clock;

/// Per-program job outcomes, keyed by program name.
pub type BatchResults = BTreeMap<String, Vec<JobOutcome>>;

/// Pause applied between consecutive jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Full batch runs (longer pause)
    Batch,
    /// Interactive single-shot runs (shorter pause)
    Interactive,
}

impl Pacing {
    fn delay(self, config: &BatchConfig) -> Duration {
        let secs = match self {
            Self::Batch => config.batch_delay_secs,
            Self::Interactive => config.interactive_delay_secs,
        };
        Duration::from_secs(secs)
    }
}

/// Filter values for one (program, term) report request.
pub fn build_filters(config: &Config, program: &Program, term: &str) -> FilterSet {
    let mut filters: FilterSet = config
        .filters
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    filters.set("idcurso", &program.course_code);
    filters.set("iddesdobramento", &program.subtrack_code);
    filters.set("idformaingresso", config.intake.code_for_term(term));
    filters.set("anosem_ingresso", term);
    filters
}

/// Run the full batch over `programs` x `terms`.
///
/// One job's failure is recorded in its outcome and never aborts the batch.
/// Outcomes are also written as a JSON manifest in the output directory for
/// later consolidation.
pub async fn run_batch(
    config: &Config,
    session: &dyn Session,
    clock: &dyn Clock,
    programs: &[Program],
    terms: &[String],
    pacing: Pacing,
) -> Result<BatchResults> {
    log::info!(
        "Starting batch: {} programs x {} terms",
        programs.len(),
        terms.len()
    );

    let submitter = FormSubmitter::new(session, &config.portal)?;
    let page = StatusPageModel::new(&config.selectors)?;
    let poller = StatusPoller::new(session, &config.portal, page);
    let downloader = ReportDownloader::new(session, &config.batch.output_dir);

    let delay = pacing.delay(&config.batch);
    let mut results = BatchResults::new();

    for program in programs {
        let mut outcomes = Vec::with_capacity(terms.len());

        for term in terms {
            log::info!("Generating report: {} - term {}", program.name, term);
            let outcome =
                run_job(config, &submitter, &poller, &downloader, clock, program, term).await;

            if let Some(error) = &outcome.error {
                log::error!(
                    "Job failed ({} / {}): {}",
                    outcome.program,
                    outcome.term,
                    error
                );
            }
            outcomes.push(outcome);

            // Pace requests against the upstream server regardless of outcome.
            clock.sleep(delay).await;
        }

        results.insert(program.name.clone(), outcomes);
    }

    let succeeded = results
        .values()
        .flatten()
        .filter(|outcome| outcome.success)
        .count();
    let total = results.values().map(Vec::len).sum::<usize>();
    log::info!("Batch finished: {}/{} jobs succeeded", succeeded, total);

    let manifest = write_manifest(&results, Path::new(&config.batch.output_dir)).await?;
    log::info!("Results manifest written to {}", manifest.display());

    Ok(results)
}

/// Submit, poll and download one report.
async fn run_job(
    config: &Config,
    submitter: &FormSubmitter<'_>,
    poller: &StatusPoller<'_>,
    downloader: &ReportDownloader<'_>,
    clock: &dyn Clock,
    program: &Program,
    term: &str,
) -> JobOutcome {
    let filters = build_filters(config, program, term);

    let submission = match submitter.generate(&filters).await {
        Ok(submission) => submission,
        Err(error) => return JobOutcome::failure(&program.name, term, error.to_string()),
    };

    let report_id = match submission {
        SubmissionOutcome::Accepted { report_id, .. } => report_id,
        SubmissionOutcome::Rejected { reason } => {
            return JobOutcome::failure(&program.name, term, reason)
        }
    };

    let interval = Duration::from_secs(config.polling.interval_secs);
    let timeout = Duration::from_secs(config.polling.job_timeout_secs);
    let mut on_progress = |progress: f64, message: &str, _done: bool| {
        log::info!("Progress {:.0}%: {}", progress * 100.0, message);
    };

    let record = match poller
        .poll(&report_id, interval, timeout, clock, &mut on_progress)
        .await
    {
        PollOutcome::Ready(record) => record,
        PollOutcome::TimedOut => {
            let mut outcome = JobOutcome::failure(
                &program.name,
                term,
                format!(
                    "processing timed out after {}s",
                    config.polling.job_timeout_secs
                ),
            );
            outcome.report_id = Some(report_id);
            return outcome;
        }
    };

    match downloader.download(&record, &program.name, term).await {
        Ok(report) => JobOutcome {
            program: program.name.clone(),
            term: term.to_string(),
            success: true,
            report_id: Some(report_id),
            file: Some(report.path),
            file_valid: report.valid,
            error: None,
        },
        Err(error) => {
            let mut outcome = JobOutcome::failure(&program.name, term, error.to_string());
            outcome.report_id = Some(report_id);
            outcome
        }
    }
}

/// Write the batch results manifest next to the downloaded files.
pub async fn write_manifest(results: &BatchResults, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join("results.json");
    let bytes = serde_json::to_vec_pretty(results)?;
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Load a previously written batch results manifest.
pub async fn load_manifest(path: &Path) -> Result<BatchResults> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::testing::{page, FakeSession};
    use crate::utils::clock::testing::ManualClock;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    const FORM_PAGE: &str = r#"
        <html><body>
        <form action="/graduacao/administracaoacademica/relatorios/listagens_alunos" method="post">
            <input type="hidden" name="authenticity_token" value="tok"/>
            <select name="idcurso"><option value="12700">Química</option></select>
        </form>
        </body></html>"#;

    const ACCEPTED_PAGE: &str =
        r#"<div class="alert-success">Relatório solicitado com sucesso</div>"#;

    const READY_PAGE: &str = r#"
        <html><body>
        <div class="card-info">
            <div class="row"><div>Curso:</div><div>Química</div></div>
        </div>
        <a href="/relatorios/55/download">Baixar</a>
        </body></html>"#;

    fn xlsx_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "SITUAÇÃO").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn test_config(output_dir: &Path) -> Config {
        let mut config = Config::default();
        config.batch.output_dir = output_dir.to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_build_filters() {
        let config = Config::default();
        let program = &config.programs[0];

        let filters = build_filters(&config, program, "20251");
        assert_eq!(filters.get("idcurso"), Some("12700"));
        assert_eq!(filters.get("iddesdobramento"), Some("12700"));
        assert_eq!(filters.get("idformaingresso"), Some("125"));
        assert_eq!(filters.get("anosem_ingresso"), Some("20251"));
        // Defaults carried through.
        assert_eq!(filters.get("idlocalidade"), Some("1"));
        assert_eq!(filters.get("format"), Some("xls"));

        let second = build_filters(&config, program, "20252");
        assert_eq!(second.get("idformaingresso"), Some("124"));
    }

    #[tokio::test]
    async fn test_run_batch_happy_path() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new(vec![
            page("https://app.uff.br/listagem", FORM_PAGE),
            page(
                "https://app.uff.br/graduacao/administracaoacademica/relatorios/55",
                ACCEPTED_PAGE,
            ),
            page(
                "https://app.uff.br/graduacao/administracaoacademica/relatorios/55",
                READY_PAGE,
            ),
        ])
        .with_file_bytes(xlsx_bytes());
        let clock = ManualClock::new();

        let config = test_config(tmp.path());
        let programs = vec![config.programs[0].clone()];
        let terms = vec!["20251".to_string()];

        let results = run_batch(
            &config,
            &session,
            &clock,
            &programs,
            &terms,
            Pacing::Batch,
        )
        .await
        .unwrap();

        let outcomes = &results["Química (Licenciatura)"];
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[0].report_id.as_deref(), Some("55"));
        assert!(outcomes[0].file_valid);
        assert!(outcomes[0].file.as_ref().unwrap().exists());

        // Manifest is written and loads back.
        let manifest = tmp.path().join("results.json");
        assert!(manifest.exists());
        let loaded = load_manifest(&manifest).await.unwrap();
        assert_eq!(loaded, results);
    }

    #[tokio::test]
    async fn test_run_batch_isolates_job_failures() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::scripted(vec![
            // First job: listing page fetch fails.
            Err("connection refused".to_string()),
            // Second job succeeds end to end.
            Ok(page("https://app.uff.br/listagem", FORM_PAGE)),
            Ok(page(
                "https://app.uff.br/graduacao/administracaoacademica/relatorios/56",
                ACCEPTED_PAGE,
            )),
            Ok(page(
                "https://app.uff.br/graduacao/administracaoacademica/relatorios/56",
                READY_PAGE,
            )),
        ])
        .with_file_bytes(xlsx_bytes());
        let clock = ManualClock::new();

        let config = test_config(tmp.path());
        let programs = vec![config.programs[0].clone()];
        let terms = vec!["20241".to_string(), "20242".to_string()];

        let results = run_batch(
            &config,
            &session,
            &clock,
            &programs,
            &terms,
            Pacing::Interactive,
        )
        .await
        .unwrap();

        let outcomes = &results["Química (Licenciatura)"];
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert!(outcomes[0].error.as_deref().unwrap().contains("connection refused"));
        assert!(outcomes[1].success);
        assert_eq!(outcomes[1].term, "20242");
    }
}

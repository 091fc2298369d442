// src/services/status.rs

//! Report status fetching and polling.

use std::time::Duration;

use scraper::Html;

use crate::error::Result;
use crate::models::{PollOutcome, PortalConfig, ReportState, StatusRecord};
use crate::services::pages::StatusPageModel;
use crate::services::session::Session;
use crate::utils::clock::Clock;

/// Progress callback: fraction in `[0, 1]`, message, terminal-success flag.
///
/// A timeout reports `(1.0, message, false)`: finished waiting, not done.
pub type ProgressFn<'a> = dyn FnMut(f64, &str, bool) + Send + 'a;

/// Service that watches a report job until it is ready.
pub struct StatusPoller<'a> {
    session: &'a dyn Session,
    page: StatusPageModel,
    base_url: String,
}

impl<'a> StatusPoller<'a> {
    /// Create a poller bound to a session and portal configuration.
    pub fn new(
        session: &'a dyn Session,
        portal: &PortalConfig,
        page: StatusPageModel,
    ) -> Self {
        Self {
            session,
            page,
            base_url: portal.base_url.clone(),
        }
    }

    /// Fetch and parse the status page once.
    pub async fn fetch(&self, report_id: &str) -> Result<StatusRecord> {
        let url = format!(
            "{}/relatorios/{}",
            self.base_url.trim_end_matches('/'),
            report_id
        );
        log::info!("Checking status of report #{}", report_id);

        let response = self.session.get(&url).await?;
        let document = Html::parse_document(&response.body);
        Ok(self.page.parse(&document, report_id, &self.base_url))
    }

    /// Poll the status page until the report is ready or the deadline passes.
    ///
    /// A failed fetch reports zero progress and is retried on the next
    /// scheduled iteration; it is never terminal. Progress between polls is
    /// time-based, capped at 0.95 until the report is actually ready.
    pub async fn poll(
        &self,
        report_id: &str,
        interval: Duration,
        timeout: Duration,
        clock: &dyn Clock,
        on_progress: &mut ProgressFn<'_>,
    ) -> PollOutcome {
        log::info!(
            "Monitoring report #{} (interval {}s, timeout {}s)",
            report_id,
            interval.as_secs(),
            timeout.as_secs()
        );

        let started = clock.now();
        let mut last_state: Option<ReportState> = None;

        while clock.now() - started < timeout {
            let record = match self.fetch(report_id).await {
                Ok(record) => record,
                Err(error) => {
                    log::error!("Status check for report {} failed: {}", report_id, error);
                    on_progress(0.0, "Erro ao verificar status", false);
                    clock.sleep(interval).await;
                    continue;
                }
            };

            let elapsed = clock.now() - started;
            let progress = (elapsed.as_secs_f64() / timeout.as_secs_f64()).min(0.95);

            let mut message = format!("Status: {}", record.state);
            if let Some(step) = record.last_step() {
                message.push_str(&format!(" | {}", step.label));
            }
            on_progress(progress, &message, false);

            if record.state == ReportState::Ready {
                on_progress(1.0, "Relatório pronto para download", true);
                log::info!("Report #{} is ready", report_id);
                return PollOutcome::Ready(record);
            }

            if last_state != Some(record.state) {
                log::info!("Report #{} status: {}", report_id, record.state);
                last_state = Some(record.state);
            }

            clock.sleep(interval).await;
        }

        let message = format!("Timeout após {} minutos", timeout.as_secs() / 60);
        log::warn!("{}", message);
        on_progress(1.0, &message, false);
        PollOutcome::TimedOut
    }
}

//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Portal URLs and HTTP behavior settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Report processing poll settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Batch pacing and output settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Default filter values submitted with every listing request
    #[serde(default = "defaults::default_filters")]
    pub filters: BTreeMap<String, String>,

    /// Program and sub-track code table
    #[serde(default = "defaults::default_programs")]
    pub programs: Vec<Program>,

    /// Admission intake codes per semester
    #[serde(default)]
    pub intake: IntakeConfig,

    /// Admission modality code prefixes
    #[serde(default)]
    pub modality: ModalityConfig,

    /// CSS selectors for the known portal page layouts
    #[serde(default)]
    pub selectors: PageSelectors,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.portal.base_url.trim().is_empty() {
            return Err(AppError::validation("portal.base_url is empty"));
        }
        if self.portal.user_agent.trim().is_empty() {
            return Err(AppError::validation("portal.user_agent is empty"));
        }
        if self.portal.timeout_secs == 0 {
            return Err(AppError::validation("portal.timeout_secs must be > 0"));
        }
        if self.polling.interval_secs == 0 {
            return Err(AppError::validation("polling.interval_secs must be > 0"));
        }
        if self.polling.timeout_secs < self.polling.interval_secs {
            return Err(AppError::validation(
                "polling.timeout_secs must be >= polling.interval_secs",
            ));
        }
        if self.programs.is_empty() {
            return Err(AppError::validation("No programs defined"));
        }
        for program in &self.programs {
            if program.course_code.trim().is_empty() || program.subtrack_code.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "Program '{}' is missing course or sub-track code",
                    program.name
                )));
            }
        }
        if self.intake.first_semester_code.trim().is_empty()
            || self.intake.second_semester_code.trim().is_empty()
        {
            return Err(AppError::validation("Intake codes must not be empty"));
        }
        Ok(())
    }

    /// Full URL of the student listing page.
    pub fn listing_url(&self) -> String {
        format!(
            "{}/{}",
            self.portal.base_url.trim_end_matches('/'),
            self.portal.listing_path.trim_start_matches('/')
        )
    }

    /// Full URL of the status page for a report id.
    pub fn report_url(&self, report_id: &str) -> String {
        format!(
            "{}/relatorios/{}",
            self.portal.base_url.trim_end_matches('/'),
            report_id
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            polling: PollingConfig::default(),
            batch: BatchConfig::default(),
            filters: defaults::default_filters(),
            programs: defaults::default_programs(),
            intake: IntakeConfig::default(),
            modality: ModalityConfig::default(),
            selectors: PageSelectors::default(),
        }
    }
}

/// Portal URLs and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the academic administration application
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path of the student listing report form, relative to the base URL
    #[serde(default = "defaults::listing_path")]
    pub listing_path: String,

    /// Fragment that identifies the listing form's action URL
    #[serde(default = "defaults::form_action_fragment")]
    pub form_action_fragment: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            listing_path: defaults::listing_path(),
            form_action_fragment: defaults::form_action_fragment(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Report processing poll settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between status checks
    #[serde(default = "defaults::poll_interval")]
    pub interval_secs: u64,

    /// Overall processing deadline in seconds
    #[serde(default = "defaults::poll_timeout")]
    pub timeout_secs: u64,

    /// Per-job deadline used by the batch orchestrator, in seconds
    #[serde(default = "defaults::job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::poll_interval(),
            timeout_secs: defaults::poll_timeout(),
            job_timeout_secs: defaults::job_timeout(),
        }
    }
}

/// Batch pacing and output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Seconds to wait between consecutive jobs in batch mode
    #[serde(default = "defaults::batch_delay")]
    pub batch_delay_secs: u64,

    /// Seconds to wait between consecutive jobs in interactive mode
    #[serde(default = "defaults::interactive_delay")]
    pub interactive_delay_secs: u64,

    /// Directory where downloaded reports and the manifest are written
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_delay_secs: defaults::batch_delay(),
            interactive_delay_secs: defaults::interactive_delay(),
            output_dir: defaults::output_dir(),
        }
    }
}

/// A degree program with its sub-track (desdobramento) code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Display name (e.g. "Química (Licenciatura)")
    pub name: String,

    /// Course code submitted as `idcurso`
    pub course_code: String,

    /// Sub-track code submitted as `iddesdobramento`
    pub subtrack_code: String,

    /// Degree type label (e.g. "Licenciatura")
    #[serde(default)]
    pub kind: String,
}

/// Admission intake codes, keyed by the term's semester digit.
///
/// The portal runs two intakes per year; the code scheme is specific to the
/// institution's calendar and therefore lives in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Intake code for terms ending in "1" (first semester)
    #[serde(default = "defaults::first_intake")]
    pub first_semester_code: String,

    /// Intake code for terms ending in "2" (second semester)
    #[serde(default = "defaults::second_intake")]
    pub second_semester_code: String,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            first_semester_code: defaults::first_intake(),
            second_semester_code: defaults::second_intake(),
        }
    }
}

impl IntakeConfig {
    /// Intake code for a term, chosen by its trailing semester digit.
    pub fn code_for_term(&self, term: &str) -> &str {
        if term.ends_with('1') {
            &self.first_semester_code
        } else {
            &self.second_semester_code
        }
    }
}

/// Admission modality code prefixes.
///
/// The leading character of the portal's modality codes distinguishes
/// open-competition from affirmative-action admissions. Institution-specific,
/// so configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityConfig {
    /// Prefix of open-competition modality codes
    #[serde(default = "defaults::open_prefix")]
    pub open_competition_prefix: String,

    /// Prefix of affirmative-action modality codes
    #[serde(default = "defaults::affirmative_prefix")]
    pub affirmative_action_prefix: String,
}

impl Default for ModalityConfig {
    fn default() -> Self {
        Self {
            open_competition_prefix: defaults::open_prefix(),
            affirmative_action_prefix: defaults::affirmative_prefix(),
        }
    }
}

/// CSS selectors for the known portal page layouts.
///
/// Markup coupling is isolated here so upstream drift only requires new
/// selector values, not code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Steps bar container on the report status page
    #[serde(default = "defaults::steps_bar")]
    pub steps_bar: String,

    /// Individual step inside the steps bar
    #[serde(default = "defaults::step")]
    pub step: String,

    /// Label of a completed step
    #[serde(default = "defaults::label_done")]
    pub label_done: String,

    /// Label of the step currently in progress
    #[serde(default = "defaults::label_active")]
    pub label_active: String,

    /// Details panel with term-definition pairs
    #[serde(default = "defaults::details_card")]
    pub details_card: String,

    /// Applied-filters panel
    #[serde(default = "defaults::filters_card")]
    pub filters_card: String,

    /// Label/value row inside the filters panel
    #[serde(default = "defaults::filters_row")]
    pub filters_row: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            steps_bar: defaults::steps_bar(),
            step: defaults::step(),
            label_done: defaults::label_done(),
            label_active: defaults::label_active(),
            details_card: defaults::details_card(),
            filters_card: defaults::filters_card(),
            filters_row: defaults::filters_row(),
        }
    }
}

mod defaults {
    use std::collections::BTreeMap;

    use super::Program;

    // Portal defaults
    pub fn base_url() -> String {
        "https://app.uff.br/graduacao/administracaoacademica".into()
    }
    pub fn listing_path() -> String {
        "relatorios/listagens_alunos".into()
    }
    pub fn form_action_fragment() -> String {
        "listagens_alunos".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Polling defaults
    pub fn poll_interval() -> u64 {
        30
    }
    pub fn poll_timeout() -> u64 {
        3600
    }
    pub fn job_timeout() -> u64 {
        1800
    }

    // Batch defaults
    pub fn batch_delay() -> u64 {
        5
    }
    pub fn interactive_delay() -> u64 {
        2
    }
    pub fn output_dir() -> String {
        "relatorios".into()
    }

    // Intake defaults (SISU first/second edition)
    pub fn first_intake() -> String {
        "125".into()
    }
    pub fn second_intake() -> String {
        "124".into()
    }

    // Modality defaults
    pub fn open_prefix() -> String {
        "A".into()
    }
    pub fn affirmative_prefix() -> String {
        "L".into()
    }

    // Status page selectors
    pub fn steps_bar() -> String {
        "div#relatorioStepsBar".into()
    }
    pub fn step() -> String {
        "div.step".into()
    }
    pub fn label_done() -> String {
        "span.label-done".into()
    }
    pub fn label_active() -> String {
        "span.label-active".into()
    }
    pub fn details_card() -> String {
        "div.card-body".into()
    }
    pub fn filters_card() -> String {
        "div.card-info".into()
    }
    pub fn filters_row() -> String {
        "div.row".into()
    }

    /// Filter values applied to every listing request unless overridden.
    pub fn default_filters() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("idlocalidade".to_string(), "1".to_string()),
            ("idturno".to_string(), String::new()),
            ("idstatusaluno".to_string(), String::new()),
            ("idsituacaoaluno".to_string(), String::new()),
            ("idacaoafirmativa".to_string(), String::new()),
            ("anosem_desvinculacao".to_string(), String::new()),
            ("format".to_string(), "xls".to_string()),
        ])
    }

    pub fn default_programs() -> Vec<Program> {
        vec![
            Program {
                name: "Química (Licenciatura)".to_string(),
                course_code: "12700".to_string(),
                subtrack_code: "12700".to_string(),
                kind: "Licenciatura".to_string(),
            },
            Program {
                name: "Química (Bacharelado)".to_string(),
                course_code: "12700".to_string(),
                subtrack_code: "312700".to_string(),
                kind: "Bacharelado".to_string(),
            },
            Program {
                name: "Química Industrial".to_string(),
                course_code: "12709".to_string(),
                subtrack_code: "12709".to_string(),
                kind: "Bacharelado".to_string(),
            },
        ]
    }
}

// src/services/forms.rs

//! Listing form handling: extract, fill and submit the report request form.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::models::{FilterSet, FormDescriptor, PortalConfig, SubmissionOutcome};
use crate::services::pages::FormPageModel;
use crate::services::session::Session;
use crate::utils::{resolve, truncate_graphemes};

/// Maximum length of a rejection reason sourced from scraped banner text.
const REASON_MAX_GRAPHEMES: usize = 200;

/// Report-detail URL pattern carrying the numeric job id.
fn report_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/relatorios/(\d+)").expect("valid report id pattern"))
}

/// Extract the report id from a report-detail URL.
pub fn extract_report_id(url: &str) -> Option<String> {
    report_id_pattern()
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Service that drives the listing form through one submission.
pub struct FormSubmitter<'a> {
    session: &'a dyn Session,
    page: FormPageModel,
    listing_url: String,
    base_url: String,
}

impl<'a> FormSubmitter<'a> {
    /// Create a submitter bound to a session and portal configuration.
    pub fn new(session: &'a dyn Session, portal: &PortalConfig) -> Result<Self> {
        Ok(Self {
            session,
            page: FormPageModel::new(&portal.form_action_fragment)?,
            listing_url: format!(
                "{}/{}",
                portal.base_url.trim_end_matches('/'),
                portal.listing_path.trim_start_matches('/')
            ),
            base_url: portal.base_url.clone(),
        })
    }

    /// Fetch the listing page and extract the form structure.
    pub async fn extract(&self) -> Result<FormDescriptor> {
        let response = self.session.get(&self.listing_url).await?;
        let document = Html::parse_document(&response.body);
        self.page.extract(&document)
    }

    /// Fill the form: token first, then input defaults, then filters.
    ///
    /// A filter addressing a select field is matched against option values
    /// and display texts; an unmatched value is dropped with a warning
    /// rather than failing the submission.
    pub fn fill(&self, descriptor: &FormDescriptor, filters: &FilterSet) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();

        if let Some(token) = &descriptor.authenticity_token {
            data.insert("authenticity_token".to_string(), token.clone());
        }

        for (name, input) in &descriptor.inputs {
            if !input.value.is_empty() {
                data.insert(name.clone(), input.value.clone());
            }
        }

        for (field, value) in filters.iter() {
            if let Some(options) = descriptor.selects.get(field) {
                match options
                    .iter()
                    .find(|option| option.value == *value || option.text == *value)
                {
                    Some(option) => {
                        log::info!(
                            "Filter applied: {} = {} (value: {})",
                            field,
                            value,
                            option.value
                        );
                        data.insert(field.clone(), option.value.clone());
                    }
                    None => {
                        log::warn!("Value '{}' not found for select field '{}'", value, field);
                    }
                }
            } else if descriptor.inputs.contains_key(field) {
                log::info!("Input applied: {} = {}", field, value);
                data.insert(field.clone(), value.clone());
            } else {
                log::warn!("Filter field '{}' not present in form", field);
            }
        }

        data
    }

    /// Submit the filled form and classify the portal's response.
    ///
    /// Transport failures are folded into a `Rejected` outcome so one bad
    /// submission never aborts a batch.
    pub async fn submit(
        &self,
        data: BTreeMap<String, String>,
        action: &str,
    ) -> SubmissionOutcome {
        let action_url = if action.starts_with("http") {
            action.to_string()
        } else {
            resolve(&self.base_url, action).unwrap_or_else(|| action.to_string())
        };

        log::info!("Submitting listing form to {}", action_url);

        match self.session.post_form(&action_url, &data).await {
            Ok(response) => classify_submission(&response.body, &response.final_url, &action_url),
            Err(error) => {
                log::error!("Form submission failed: {}", error);
                SubmissionOutcome::Rejected {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// Full flow: fetch the listing page, extract, fill and submit.
    pub async fn generate(&self, filters: &FilterSet) -> Result<SubmissionOutcome> {
        log::info!("Fetching listing page...");
        let descriptor = self.extract().await?;

        log::info!("Filling form with {} filters...", filters.len());
        let data = self.fill(&descriptor, filters);

        let action = descriptor.action.clone();
        Ok(self.submit(data, &action).await)
    }
}

/// Classify a submission response body and final URL.
///
/// Priority: success banner, error banner, redirect to a report-detail URL,
/// then indeterminate.
pub fn classify_submission(body: &str, final_url: &str, action_url: &str) -> SubmissionOutcome {
    let document = Html::parse_document(body);

    let success_sel = Selector::parse("div.alert-success").expect("valid selector");
    if let Some(banner) = document.select(&success_sel).next() {
        let text: String = banner.text().collect();
        if text.to_lowercase().contains("sucesso") {
            if let Some(report_id) = extract_report_id(final_url) {
                log::info!("Submission accepted, report id {}", report_id);
                return SubmissionOutcome::Accepted {
                    report_id,
                    redirect_url: final_url.to_string(),
                };
            }
        }
    }

    let error_sel =
        Selector::parse("div.alert-error, div.alert-danger").expect("valid selector");
    if let Some(banner) = document.select(&error_sel).next() {
        let text: String = banner.text().collect();
        let reason = truncate_graphemes(text.trim(), REASON_MAX_GRAPHEMES);
        log::error!("Form error banner: {}", reason);
        return SubmissionOutcome::Rejected { reason };
    }

    if final_url != action_url {
        if let Some(report_id) = extract_report_id(final_url) {
            return SubmissionOutcome::Accepted {
                report_id,
                redirect_url: final_url.to_string(),
            };
        }
    }

    log::warn!("Could not determine submission result");
    SubmissionOutcome::Rejected {
        reason: "indeterminate result".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputField, SelectOption};
    use crate::services::session::testing::{page, FakeSession};

    fn portal() -> PortalConfig {
        PortalConfig::default()
    }

    fn descriptor_with_select() -> FormDescriptor {
        let mut descriptor = FormDescriptor {
            action: "/graduacao/administracaoacademica/relatorios/listagens_alunos".to_string(),
            method: "post".to_string(),
            authenticity_token: Some("tok".to_string()),
            ..FormDescriptor::default()
        };
        descriptor.inputs.insert(
            "authenticity_token".to_string(),
            InputField {
                kind: "hidden".to_string(),
                value: "tok".to_string(),
            },
        );
        descriptor.inputs.insert(
            "anosem_ingresso".to_string(),
            InputField {
                kind: "text".to_string(),
                value: String::new(),
            },
        );
        descriptor.selects.insert(
            "idcurso".to_string(),
            vec![
                SelectOption {
                    value: String::new(),
                    text: "Selecione".to_string(),
                    selected: true,
                },
                SelectOption {
                    value: "12700".to_string(),
                    text: "Química".to_string(),
                    selected: false,
                },
            ],
        );
        descriptor
    }

    fn submitter(session: &FakeSession) -> FormSubmitter<'_> {
        FormSubmitter::new(session, &portal()).unwrap()
    }

    #[test]
    fn test_fill_matches_select_by_value() {
        let session = FakeSession::new(vec![]);
        let submitter = submitter(&session);
        let descriptor = descriptor_with_select();

        let mut filters = FilterSet::new();
        filters.set("idcurso", "12700");
        let data = submitter.fill(&descriptor, &filters);

        assert_eq!(data.get("idcurso").map(String::as_str), Some("12700"));
    }

    #[test]
    fn test_fill_matches_select_by_display_text() {
        let session = FakeSession::new(vec![]);
        let submitter = submitter(&session);
        let descriptor = descriptor_with_select();

        let mut filters = FilterSet::new();
        filters.set("idcurso", "Química");
        let data = submitter.fill(&descriptor, &filters);

        // Display-text match substitutes the official option value.
        assert_eq!(data.get("idcurso").map(String::as_str), Some("12700"));
    }

    #[test]
    fn test_fill_drops_unmatched_select_value() {
        let session = FakeSession::new(vec![]);
        let submitter = submitter(&session);
        let descriptor = descriptor_with_select();

        let mut filters = FilterSet::new();
        filters.set("idcurso", "99999");
        let data = submitter.fill(&descriptor, &filters);

        assert!(!data.contains_key("idcurso"));
    }

    #[test]
    fn test_fill_carries_token_and_writes_inputs_verbatim() {
        let session = FakeSession::new(vec![]);
        let submitter = submitter(&session);
        let descriptor = descriptor_with_select();

        let mut filters = FilterSet::new();
        filters.set("anosem_ingresso", "20251");
        let data = submitter.fill(&descriptor, &filters);

        assert_eq!(
            data.get("authenticity_token").map(String::as_str),
            Some("tok")
        );
        assert_eq!(
            data.get("anosem_ingresso").map(String::as_str),
            Some("20251")
        );
    }

    #[test]
    fn test_classify_success_banner() {
        let body = r#"<div class="alert-success">Relatório solicitado com sucesso</div>"#;
        let outcome = classify_submission(
            body,
            "https://app.uff.br/graduacao/administracaoacademica/relatorios/4821",
            "https://app.uff.br/graduacao/administracaoacademica/relatorios/listagens_alunos",
        );
        assert_eq!(outcome.report_id(), Some("4821"));
    }

    #[test]
    fn test_classify_error_banner() {
        let body = r#"<div class="alert-danger">Período de ingresso inválido</div>"#;
        let outcome = classify_submission(
            body,
            "https://app.uff.br/x",
            "https://app.uff.br/x",
        );
        match outcome {
            SubmissionOutcome::Rejected { reason } => {
                assert_eq!(reason, "Período de ingresso inválido")
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_redirect_to_report_url() {
        let outcome = classify_submission(
            "<html><body>ok</body></html>",
            "https://app.uff.br/graduacao/administracaoacademica/relatorios/99",
            "https://app.uff.br/graduacao/administracaoacademica/relatorios/listagens_alunos",
        );
        assert_eq!(outcome.report_id(), Some("99"));
    }

    #[test]
    fn test_classify_indeterminate() {
        let outcome = classify_submission(
            "<html><body>nada</body></html>",
            "https://app.uff.br/x",
            "https://app.uff.br/x",
        );
        assert_eq!(
            outcome,
            SubmissionOutcome::Rejected {
                reason: "indeterminate result".to_string()
            }
        );
    }

    #[test]
    fn test_extract_report_id() {
        assert_eq!(
            extract_report_id("https://app.uff.br/graduacao/administracaoacademica/relatorios/123"),
            Some("123".to_string())
        );
        assert_eq!(extract_report_id("https://app.uff.br/relatorios/"), None);
    }

    #[tokio::test]
    async fn test_generate_full_flow() {
        let form_page = r#"
            <html><body>
            <form action="/graduacao/administracaoacademica/relatorios/listagens_alunos" method="post">
                <input type="hidden" name="authenticity_token" value="tok"/>
                <select name="idcurso"><option value="12700">Química</option></select>
            </form>
            </body></html>"#;
        let result_page =
            r#"<div class="alert-success">Relatório solicitado com sucesso</div>"#;

        let session = FakeSession::new(vec![
            page("https://app.uff.br/listagem", form_page),
            page(
                "https://app.uff.br/graduacao/administracaoacademica/relatorios/55",
                result_page,
            ),
        ]);
        let submitter = FormSubmitter::new(&session, &portal()).unwrap();

        let mut filters = FilterSet::new();
        filters.set("idcurso", "12700");
        let outcome = submitter.generate(&filters).await.unwrap();

        assert_eq!(outcome.report_id(), Some("55"));
        let posted = session.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(
            posted[0].get("authenticity_token").map(String::as_str),
            Some("tok")
        );
    }
}

// src/services/download.rs

//! Report file download with descriptive naming and advisory validation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use calamine::Reader;
use chrono::Local;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{DownloadedReport, StatusRecord};
use crate::services::session::Session;
use crate::utils::sanitize_file_name;

/// Parenthesized numeric sub-track code, e.g. "Química (Licenciatura) (12700)".
fn code_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d+)\)").expect("valid code pattern"))
}

/// Service that stores a ready report locally.
pub struct ReportDownloader<'a> {
    session: &'a dyn Session,
    output_dir: PathBuf,
}

impl<'a> ReportDownloader<'a> {
    /// Create a downloader writing into `output_dir`.
    pub fn new(session: &'a dyn Session, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            output_dir: output_dir.into(),
        }
    }

    /// Download the report referenced by a ready status record.
    ///
    /// The file name is generated from the applied-filters echo. After
    /// writing, the file is checked to parse as a spreadsheet; a failed
    /// check is reported through `DownloadedReport::valid` and a warning but
    /// does not discard the file.
    pub async fn download(
        &self,
        record: &StatusRecord,
        program: &str,
        term: &str,
    ) -> Result<DownloadedReport> {
        let url = record.download_url.as_ref().ok_or_else(|| {
            AppError::download(&record.id, "download URL not available")
        })?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let name = file_name_for(&record.filters, &timestamp);
        let path = self.output_dir.join(name);

        log::info!("Starting download of report #{}: {}", record.id, url);
        let bytes = self.session.download_to(url, &path).await?;
        log::info!(
            "Download finished: {} ({:.1} MB)",
            path.display(),
            bytes as f64 / (1024.0 * 1024.0)
        );

        let valid = validate_spreadsheet(&path);
        if !valid {
            log::warn!(
                "Downloaded file failed spreadsheet validation: {}",
                path.display()
            );
        }

        Ok(DownloadedReport {
            path,
            program: program.to_string(),
            term: term.to_string(),
            bytes,
            valid,
        })
    }
}

/// Build the descriptive file name from the applied-filters echo.
///
/// Pattern: `relatorio_{program}_{subtrack}_{code}_{term}_{timestamp}.xlsx`,
/// invalid filesystem characters stripped.
pub fn file_name_for(filters: &BTreeMap<String, String>, timestamp: &str) -> String {
    let program = filters
        .get("Curso")
        .map(String::as_str)
        .unwrap_or("desconhecido")
        .replace([' ', '/'], "_");

    let subtrack_raw = filters
        .get("Desdobramento")
        .map(String::as_str)
        .unwrap_or("desconhecido");
    let code = code_pattern()
        .captures(subtrack_raw)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| "sem_codigo".to_string());
    let subtrack = subtrack_raw
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .replace(' ', "_");

    let term = filters
        .get("Ano/Semestre de Ingresso")
        .map(String::as_str)
        .unwrap_or("sem_ingresso")
        .replace('/', "-")
        .replace([' ', 'º', '°'], "");

    sanitize_file_name(&format!(
        "relatorio_{program}_{subtrack}_{code}_{term}_{timestamp}.xlsx"
    ))
}

/// Check that a file parses as a spreadsheet with a readable first sheet.
fn validate_spreadsheet(path: &Path) -> bool {
    match calamine::open_workbook_auto(path) {
        Ok(mut workbook) => match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => {
                log::info!(
                    "Spreadsheet validated: {} rows, {} columns",
                    range.height(),
                    range.width()
                );
                true
            }
            Some(Err(error)) => {
                log::warn!("Spreadsheet sheet unreadable: {}", error);
                false
            }
            None => {
                log::warn!("Spreadsheet has no sheets");
                false
            }
        },
        Err(error) => {
            log::warn!("File is not a readable spreadsheet: {}", error);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportState;
    use crate::services::session::testing::FakeSession;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;

    fn ready_record() -> StatusRecord {
        let mut record = StatusRecord::empty("77");
        record.state = ReportState::Ready;
        record.download_url =
            Some("https://app.uff.br/relatorios/77/download".to_string());
        record
            .filters
            .insert("Curso".to_string(), "Química".to_string());
        record.filters.insert(
            "Desdobramento".to_string(),
            "Química (Licenciatura) (12700)".to_string(),
        );
        record.filters.insert(
            "Ano/Semestre de Ingresso".to_string(),
            "2025/1º Semestre".to_string(),
        );
        record
    }

    fn xlsx_bytes() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "SITUAÇÃO").unwrap();
        sheet.write_string(1, 0, "Inscrito").unwrap();
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_file_name_from_filters() {
        let record = ready_record();
        let name = file_name_for(&record.filters, "20250201_100000");
        assert_eq!(
            name,
            "relatorio_Química_Química_12700_2025-1Semestre_20250201_100000.xlsx"
        );
    }

    #[test]
    fn test_file_name_with_missing_filters() {
        let filters = BTreeMap::new();
        let name = file_name_for(&filters, "20250201_100000");
        assert_eq!(
            name,
            "relatorio_desconhecido_desconhecido_sem_codigo_sem_ingresso_20250201_100000.xlsx"
        );
    }

    #[tokio::test]
    async fn test_download_valid_spreadsheet() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new(vec![]).with_file_bytes(xlsx_bytes());
        let downloader = ReportDownloader::new(&session, tmp.path());

        let report = downloader
            .download(&ready_record(), "Química (Licenciatura)", "20251")
            .await
            .unwrap();

        assert!(report.valid);
        assert!(report.bytes > 0);
        assert!(report.path.exists());
        assert_eq!(report.program, "Química (Licenciatura)");
        assert_eq!(report.term, "20251");
    }

    #[tokio::test]
    async fn test_download_invalid_file_still_returns_path() {
        let tmp = TempDir::new().unwrap();
        let session =
            FakeSession::new(vec![]).with_file_bytes(b"not a spreadsheet".to_vec());
        let downloader = ReportDownloader::new(&session, tmp.path());

        let report = downloader
            .download(&ready_record(), "Química", "20251")
            .await
            .unwrap();

        // Validation is advisory: the path survives, the flag surfaces it.
        assert!(!report.valid);
        assert!(report.path.exists());
    }

    #[tokio::test]
    async fn test_download_without_url_fails() {
        let tmp = TempDir::new().unwrap();
        let session = FakeSession::new(vec![]);
        let downloader = ReportDownloader::new(&session, tmp.path());

        let mut record = ready_record();
        record.download_url = None;
        let result = downloader.download(&record, "Química", "20251").await;
        assert!(matches!(result, Err(AppError::Download { .. })));
    }
}

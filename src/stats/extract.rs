// src/stats/extract.rs

//! Per-report statistics extraction.
//!
//! Raw status and cancellation-reason text is reclassified into a fixed
//! taxonomy; admission modality is split by the code's leading character.

use std::path::Path;

use calamine::Reader;

use crate::error::{AppError, Result};
use crate::models::{CategoryCount, CourseStats, ModalityConfig};

/// Required status column header.
pub const COL_STATUS: &str = "SITUAÇÃO";

/// Optional cancellation-reason column header.
pub const COL_CANCEL_REASON: &str = "MOTIVO DO CANCELAMENTO";

/// Optional admission-modality column header.
pub const COL_MODALITY: &str = "MODALIDADE";

/// Normalized status category: enrolled, pending or graduating candidates.
pub const CAT_ENROLLED: &str = "Inscritos/Pendentes/Concluintes";

/// Normalized status category: enrollment on leave.
pub const CAT_ON_LEAVE: &str = "Trancados";

/// Normalized status category: graduated.
pub const CAT_GRADUATED: &str = "Formados";

/// Status categories in reporting order.
pub const STATUS_CATEGORIES: [&str; 3] = [CAT_ENROLLED, CAT_ON_LEAVE, CAT_GRADUATED];

/// Raw status label -> normalized category.
const STATUS_LABELS: [(&str, &str); 7] = [
    ("Inscrito", CAT_ENROLLED),
    ("Concluinte", CAT_ENROLLED),
    ("Pendente", CAT_ENROLLED),
    ("Trancado", CAT_ON_LEAVE),
    ("Formando", CAT_GRADUATED),
    ("Formado", CAT_GRADUATED),
    ("Permanência de Vínculo", CAT_GRADUATED),
];

/// Cancellation-reason categories in classification priority order; the
/// last entry is the fallback bucket.
pub const CANCEL_CATEGORIES: [&str; 6] = [
    "Solicitação Oficial",
    "Abandono",
    "Insuficiência de Aproveitamento",
    "Ingressante - Insuf. Aproveit.",
    "Mudança de Curso",
    "Outros",
];

/// Substring patterns per cancellation category. First match wins.
const CANCEL_PATTERNS: [(&str, &[&str]); 5] = [
    ("Solicitação Oficial", &["solicitação oficial", "pedido"]),
    ("Abandono", &["abandono", "desistência"]),
    (
        "Insuficiência de Aproveitamento",
        &["insuficiência de aproveitamento", "reprovação"],
    ),
    ("Ingressante - Insuf. Aproveit.", &["ingressante", "calouro"]),
    ("Mudança de Curso", &["mudança de curso", "transferência"]),
];

/// Tabular content of one report: header row plus data rows, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    /// Index of a column by exact (trimmed) header match.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Values of a column across all rows; missing cells read as empty.
    fn column_values(&self, index: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}

/// Read the first worksheet of a spreadsheet file into rows of text.
pub fn read_sheet(path: &Path) -> Result<SheetData> {
    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::structure("read_sheet", "spreadsheet has no sheets"))??;

    let mut rows = range.rows().map(|row| {
        row.iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect::<Vec<String>>()
    });

    let headers = rows.next().unwrap_or_default();
    let data = SheetData {
        headers,
        rows: rows.collect(),
    };

    log::info!(
        "Spreadsheet read: {} rows, {} columns",
        data.rows.len(),
        data.headers.len()
    );
    Ok(data)
}

/// Percentage of `count` over `total`, rounded to 2 decimals; 0 for an
/// empty total.
pub fn percent_of(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = count as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

/// Extract classified statistics from one report's rows.
///
/// Requires the status column; the cancellation-reason and modality columns
/// are optional and contribute nothing when absent.
pub fn extract_stats(
    sheet: &SheetData,
    program: &str,
    term: &str,
    modality: &ModalityConfig,
) -> Result<CourseStats> {
    let status_col = sheet.column(COL_STATUS).ok_or_else(|| {
        AppError::structure("extract", format!("required column '{COL_STATUS}' not found"))
    })?;

    let mut stats = CourseStats {
        program: program.to_string(),
        term: term.to_string(),
        total_records: sheet.rows.len() as u64,
        ..CourseStats::default()
    };

    // Status classification: substring match per known label, counts
    // accumulated into the normalized buckets. Zero buckets stay absent.
    for (label, category) in STATUS_LABELS {
        let label_lower = label.to_lowercase();
        let count = sheet
            .column_values(status_col)
            .filter(|value| value.to_lowercase().contains(&label_lower))
            .count() as u64;
        if count > 0 {
            stats
                .categories
                .entry(category.to_string())
                .or_insert_with(CategoryCount::default)
                .count += count;
        }
    }
    for category in stats.categories.values_mut() {
        category.percent = percent_of(category.count, stats.total_records);
    }

    // Cancellations: non-empty reasons, classified by the pattern table.
    let mut reason_counts = vec![0u64; CANCEL_CATEGORIES.len()];
    if let Some(cancel_col) = sheet.column(COL_CANCEL_REASON) {
        for reason in sheet.column_values(cancel_col).filter(|v| !v.is_empty()) {
            stats.total_cancellations += 1;
            let index = classify_cancellation(reason);
            reason_counts[index] += 1;
        }
    }
    for (category, count) in CANCEL_CATEGORIES.iter().zip(reason_counts) {
        stats.cancel_reasons.insert(
            category.to_string(),
            CategoryCount {
                count,
                percent: percent_of(count, stats.total_cancellations),
            },
        );
    }

    // Admission modality split by code prefix.
    if let Some(modality_col) = sheet.column(COL_MODALITY) {
        for value in sheet.column_values(modality_col) {
            if value.starts_with(&modality.open_competition_prefix) {
                stats.open_competition += 1;
            } else if value.starts_with(&modality.affirmative_action_prefix) {
                stats.affirmative_action += 1;
            }
        }
    }

    stats.active_enrollments =
        stats.category_count(CAT_ENROLLED) + stats.category_count(CAT_ON_LEAVE);

    Ok(stats)
}

/// Index into [`CANCEL_CATEGORIES`] for a raw cancellation reason.
fn classify_cancellation(reason: &str) -> usize {
    let reason_lower = reason.to_lowercase();
    for (index, (_, patterns)) in CANCEL_PATTERNS.iter().enumerate() {
        if patterns.iter().any(|pattern| reason_lower.contains(pattern)) {
            return index;
        }
    }
    CANCEL_CATEGORIES.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> SheetData {
        SheetData {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn modality() -> ModalityConfig {
        ModalityConfig::default()
    }

    #[test]
    fn test_percent_law() {
        assert_eq!(percent_of(1, 3), 33.33);
        assert_eq!(percent_of(2, 3), 66.67);
        assert_eq!(percent_of(5, 10), 50.0);
        assert_eq!(percent_of(3, 0), 0.0);
    }

    #[test]
    fn test_missing_status_column_is_structure_error() {
        let data = sheet(&["NOME"], &[&["Ana"]]);
        let result = extract_stats(&data, "Química", "20251", &modality());
        assert!(matches!(result, Err(AppError::Structure { .. })));
    }

    #[test]
    fn test_status_buckets_and_active() {
        let data = sheet(
            &[COL_STATUS],
            &[
                &["Inscrito"],
                &["Inscrito"],
                &["Concluinte"],
                &["Trancado"],
                &["Formado"],
            ],
        );
        let stats = extract_stats(&data, "Química", "20251", &modality()).unwrap();

        assert_eq!(stats.total_records, 5);
        assert_eq!(stats.category_count(CAT_ENROLLED), 3);
        assert_eq!(stats.category_count(CAT_ON_LEAVE), 1);
        assert_eq!(stats.category_count(CAT_GRADUATED), 1);
        assert_eq!(stats.categories[CAT_ENROLLED].percent, 60.0);
        assert_eq!(stats.active_enrollments, 4);
    }

    #[test]
    fn test_zero_status_buckets_stay_absent() {
        let data = sheet(&[COL_STATUS], &[&["Inscrito"]]);
        let stats = extract_stats(&data, "Química", "20251", &modality()).unwrap();
        assert!(stats.categories.contains_key(CAT_ENROLLED));
        assert!(!stats.categories.contains_key(CAT_GRADUATED));
    }

    #[test]
    fn test_cancellation_classification_scenario() {
        // 10 rows, 3 with a cancellation reason: 2 abandono + 1 unmatched.
        let mut rows: Vec<Vec<String>> = Vec::new();
        for i in 0..10 {
            let reason = match i {
                0 | 1 => "Abandono de curso",
                2 => "motivo raro",
                _ => "",
            };
            rows.push(vec!["Cancelado".to_string(), reason.to_string()]);
        }
        let data = SheetData {
            headers: vec![COL_STATUS.to_string(), COL_CANCEL_REASON.to_string()],
            rows,
        };

        let stats = extract_stats(&data, "Química", "20251", &modality()).unwrap();
        assert_eq!(stats.total_cancellations, 3);

        let abandono = stats.cancel_reasons["Abandono"];
        assert_eq!(abandono.count, 2);
        assert_eq!(abandono.percent, 66.67);

        let outros = stats.cancel_reasons["Outros"];
        assert_eq!(outros.count, 1);
        assert_eq!(outros.percent, 33.33);

        // All six buckets always present.
        assert_eq!(stats.cancel_reasons.len(), CANCEL_CATEGORIES.len());
        assert_eq!(stats.cancel_reasons["Mudança de Curso"].count, 0);
    }

    #[test]
    fn test_cancellation_priority_first_match_wins() {
        // "Ingressante" also matches no earlier pattern, but a reason naming
        // both an official request and abandonment goes to the former.
        assert_eq!(classify_cancellation("Solicitação oficial por abandono"), 0);
        assert_eq!(classify_cancellation("Ingressante - Insuf. Aproveit."), 3);
        assert_eq!(classify_cancellation("Transferência externa"), 4);
        assert_eq!(classify_cancellation("outro motivo"), 5);
    }

    #[test]
    fn test_modality_split_by_prefix() {
        let data = sheet(
            &[COL_STATUS, COL_MODALITY],
            &[
                &["Inscrito", "A0"],
                &["Inscrito", "A1"],
                &["Inscrito", "L2"],
                &["Inscrito", "B9"],
                &["Inscrito", ""],
            ],
        );
        let stats = extract_stats(&data, "Química", "20251", &modality()).unwrap();
        assert_eq!(stats.open_competition, 2);
        assert_eq!(stats.affirmative_action, 1);
    }

    #[test]
    fn test_cancel_percentages_zero_total() {
        let data = sheet(&[COL_STATUS, COL_CANCEL_REASON], &[&["Inscrito", ""]]);
        let stats = extract_stats(&data, "Química", "20251", &modality()).unwrap();
        assert_eq!(stats.total_cancellations, 0);
        assert!(stats
            .cancel_reasons
            .values()
            .all(|c| c.count == 0 && c.percent == 0.0));
    }
}

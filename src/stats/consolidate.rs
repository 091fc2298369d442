// src/stats/consolidate.rs

//! Fold per-report statistics into a consolidated cross-program view.

use crate::models::{ConsolidatedReport, CourseStats, ModalityConfig, ProgramData};
use crate::pipeline::BatchResults;
use crate::stats::extract::{extract_stats, read_sheet, CAT_GRADUATED};

/// Consolidate every successful batch outcome with a downloaded file.
///
/// An unreadable or malformed file contributes nothing: it is logged and
/// skipped, never aborting consolidation.
pub fn consolidate(results: &BatchResults, modality: &ModalityConfig) -> ConsolidatedReport {
    let mut stats_list = Vec::new();

    for (program, outcomes) in results {
        for outcome in outcomes {
            if !outcome.success {
                continue;
            }
            let Some(path) = &outcome.file else {
                continue;
            };

            let sheet = match read_sheet(path) {
                Ok(sheet) => sheet,
                Err(error) => {
                    log::warn!(
                        "Skipping unreadable report {} ({} / {}): {}",
                        path.display(),
                        program,
                        outcome.term,
                        error
                    );
                    continue;
                }
            };

            match extract_stats(&sheet, program, &outcome.term, modality) {
                Ok(stats) => stats_list.push(stats),
                Err(error) => {
                    log::warn!(
                        "Skipping report {} ({} / {}): {}",
                        path.display(),
                        program,
                        outcome.term,
                        error
                    );
                }
            }
        }
    }

    assemble(stats_list)
}

/// Assemble per-report statistics into the consolidated report.
pub fn assemble(stats_list: Vec<CourseStats>) -> ConsolidatedReport {
    let mut report = ConsolidatedReport::default();

    for stats in stats_list {
        let program = report
            .programs
            .entry(stats.program.clone())
            .or_insert_with(ProgramData::default);

        program.totals.enrollments += stats.total_records;
        program.totals.cancellations += stats.total_cancellations;
        program.totals.graduated += stats.category_count(CAT_GRADUATED);
        program.totals.active += stats.active_enrollments;
        program.terms.insert(stats.term.clone(), stats);
    }

    let mut distinct_terms = std::collections::BTreeSet::new();
    for (name, program) in &report.programs {
        report.summary.total_programs += 1;
        report.summary.total_enrollments += program.totals.enrollments;
        report.summary.total_cancellations += program.totals.cancellations;
        report.summary.total_graduated += program.totals.graduated;
        report.summary.total_active += program.totals.active;
        distinct_terms.extend(program.terms.keys().cloned());

        log::info!(
            "Consolidated {}: {} terms, {} enrollments",
            name,
            program.terms.len(),
            program.totals.enrollments
        );
    }
    report.summary.total_terms = distinct_terms.len() as u64;

    report
}

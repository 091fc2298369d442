// src/stats/render.rs

//! Consolidated spreadsheet rendering.
//!
//! Four sheets: program totals, per-term details, cancellation reasons and
//! admission modalities. Percentage cells are stored as fractions with a
//! native percentage number format.

use std::path::Path;

use rust_xlsxwriter::{Color, Format, Workbook, Worksheet};

use crate::error::Result;
use crate::models::ConsolidatedReport;
use crate::pipeline::display_term;
use crate::stats::extract::{percent_of, CANCEL_CATEGORIES, STATUS_CATEGORIES};

const SHEET_SUMMARY: &str = "RESUMO GERAL";
const SHEET_DETAILS: &str = "DETALHES";
const SHEET_CANCELLATIONS: &str = "CANCELAMENTOS";
const SHEET_MODALITIES: &str = "MODALIDADES";

/// Write the consolidated report as a formatted multi-sheet workbook.
pub fn write_consolidated(report: &ConsolidatedReport, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_background_color(0x366092)
        .set_font_color(Color::White);
    let percent_format = Format::new().set_num_format("0.00%");

    write_summary_sheet(workbook.add_worksheet(), report, &header_format, &percent_format)?;
    write_details_sheet(workbook.add_worksheet(), report, &header_format, &percent_format)?;
    write_cancellations_sheet(workbook.add_worksheet(), report, &header_format, &percent_format)?;
    write_modalities_sheet(workbook.add_worksheet(), report, &header_format, &percent_format)?;

    workbook.save(path)?;
    log::info!("Consolidated spreadsheet written to {}", path.display());
    Ok(())
}

/// Write a header row with the distinguished format.
fn write_headers(sheet: &mut Worksheet, headers: &[String], format: &Format) -> Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, format)?;
    }
    Ok(())
}

/// One row per program with totals and rate columns.
fn write_summary_sheet(
    sheet: &mut Worksheet,
    report: &ConsolidatedReport,
    header_format: &Format,
    percent_format: &Format,
) -> Result<()> {
    sheet.set_name(SHEET_SUMMARY)?;

    let headers: Vec<String> = [
        "Curso",
        "Total Matrículas",
        "Total Cancelamentos",
        "Total Formados",
        "Total Ativos",
        "% Cancelamentos",
        "% Formados",
        "% Ativos",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    write_headers(sheet, &headers, header_format)?;

    for (row, (name, program)) in report.programs.iter().enumerate() {
        let row = row as u32 + 1;
        let totals = &program.totals;

        sheet.write_string(row, 0, name)?;
        sheet.write_number(row, 1, totals.enrollments as f64)?;
        sheet.write_number(row, 2, totals.cancellations as f64)?;
        sheet.write_number(row, 3, totals.graduated as f64)?;
        sheet.write_number(row, 4, totals.active as f64)?;

        let rates = [
            percent_of(totals.cancellations, totals.enrollments),
            percent_of(totals.graduated, totals.enrollments),
            percent_of(totals.active, totals.enrollments),
        ];
        for (offset, rate) in rates.iter().enumerate() {
            sheet.write_number_with_format(row, 5 + offset as u16, rate / 100.0, percent_format)?;
        }
    }

    sheet.autofit();
    Ok(())
}

/// One row per program x term with counts, category breakdowns and
/// cancellation-reason counts.
fn write_details_sheet(
    sheet: &mut Worksheet,
    report: &ConsolidatedReport,
    header_format: &Format,
    percent_format: &Format,
) -> Result<()> {
    sheet.set_name(SHEET_DETAILS)?;

    let mut headers: Vec<String> = [
        "Curso",
        "Período",
        "Total Registros",
        "Matrículas Ativas",
        "Ampla Concorrência",
        "Ações Afirmativas",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    for category in STATUS_CATEGORIES {
        headers.push(format!("{category} (qtd)"));
        headers.push(format!("{category} (%)"));
    }
    for reason in CANCEL_CATEGORIES {
        headers.push(format!("Cancel: {reason}"));
    }
    write_headers(sheet, &headers, header_format)?;

    let mut row: u32 = 1;
    for (name, program) in &report.programs {
        for (term, stats) in &program.terms {
            sheet.write_string(row, 0, name)?;
            sheet.write_string(row, 1, &display_term(term))?;
            sheet.write_number(row, 2, stats.total_records as f64)?;
            sheet.write_number(row, 3, stats.active_enrollments as f64)?;
            sheet.write_number(row, 4, stats.open_competition as f64)?;
            sheet.write_number(row, 5, stats.affirmative_action as f64)?;

            let mut col: u16 = 6;
            for category in STATUS_CATEGORIES {
                let entry = stats.categories.get(category).copied().unwrap_or_default();
                sheet.write_number(row, col, entry.count as f64)?;
                sheet.write_number_with_format(
                    row,
                    col + 1,
                    entry.percent / 100.0,
                    percent_format,
                )?;
                col += 2;
            }
            for reason in CANCEL_CATEGORIES {
                let count = stats.cancel_reasons.get(reason).map_or(0, |c| c.count);
                sheet.write_number(row, col, count as f64)?;
                col += 1;
            }

            row += 1;
        }
    }

    sheet.autofit();
    Ok(())
}

/// One row per program x term x cancellation reason.
fn write_cancellations_sheet(
    sheet: &mut Worksheet,
    report: &ConsolidatedReport,
    header_format: &Format,
    percent_format: &Format,
) -> Result<()> {
    sheet.set_name(SHEET_CANCELLATIONS)?;

    let headers: Vec<String> = [
        "Curso",
        "Período",
        "Motivo Cancelamento",
        "Quantidade",
        "Percentual",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    write_headers(sheet, &headers, header_format)?;

    let mut row: u32 = 1;
    for (name, program) in &report.programs {
        for (term, stats) in &program.terms {
            for reason in CANCEL_CATEGORIES {
                let entry = stats.cancel_reasons.get(reason).copied().unwrap_or_default();

                sheet.write_string(row, 0, name)?;
                sheet.write_string(row, 1, &display_term(term))?;
                sheet.write_string(row, 2, reason)?;
                sheet.write_number(row, 3, entry.count as f64)?;
                sheet.write_number_with_format(
                    row,
                    4,
                    entry.percent / 100.0,
                    percent_format,
                )?;
                row += 1;
            }
        }
    }

    sheet.autofit();
    Ok(())
}

/// One row per program x term with modality counts and shares of the total.
fn write_modalities_sheet(
    sheet: &mut Worksheet,
    report: &ConsolidatedReport,
    header_format: &Format,
    percent_format: &Format,
) -> Result<()> {
    sheet.set_name(SHEET_MODALITIES)?;

    let headers: Vec<String> = [
        "Curso",
        "Período",
        "Total",
        "Ampla Concorrência",
        "% Ampla",
        "Ações Afirmativas",
        "% Ações",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    write_headers(sheet, &headers, header_format)?;

    let mut row: u32 = 1;
    for (name, program) in &report.programs {
        for (term, stats) in &program.terms {
            if stats.total_records == 0 {
                continue;
            }

            sheet.write_string(row, 0, name)?;
            sheet.write_string(row, 1, &display_term(term))?;
            sheet.write_number(row, 2, stats.total_records as f64)?;
            sheet.write_number(row, 3, stats.open_competition as f64)?;
            sheet.write_number_with_format(
                row,
                4,
                percent_of(stats.open_competition, stats.total_records) / 100.0,
                percent_format,
            )?;
            sheet.write_number(row, 5, stats.affirmative_action as f64)?;
            sheet.write_number_with_format(
                row,
                6,
                percent_of(stats.affirmative_action, stats.total_records) / 100.0,
                percent_format,
            )?;
            row += 1;
        }
    }

    sheet.autofit();
    Ok(())
}

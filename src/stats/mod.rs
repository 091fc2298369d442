//! Statistics over downloaded reports.
//!
//! - `extract`: per-file classification and counting
//! - `consolidate`: cross-program folding and totals
//! - `render`: consolidated multi-sheet spreadsheet output

pub mod consolidate;
pub mod extract;
pub mod render;

pub use consolidate::{assemble, consolidate};
pub use extract::{extract_stats, percent_of, read_sheet, SheetData};
pub use render::write_consolidated;

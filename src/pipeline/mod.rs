//! Pipeline entry points for report operations.
//!
//! - `terms`: academic term parsing and range expansion
//! - `batch`: submit/poll/download across programs x terms

pub mod batch;
pub mod terms;

pub use batch::{build_filters, load_manifest, run_batch, write_manifest, BatchResults, Pacing};
pub use terms::{display_term, expand_term_range, parse_term, term_from_text};

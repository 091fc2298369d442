//! Aggregated statistics structures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Count with its percentage of a reference total, rounded to 2 decimals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub count: u64,
    pub percent: f64,
}

/// Statistics extracted from one downloaded report (program x term).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseStats {
    pub program: String,
    pub term: String,

    /// Total rows in the report
    pub total_records: u64,

    /// Normalized status category -> count and percentage of total records.
    /// Only categories with at least one record are present.
    pub categories: BTreeMap<String, CategoryCount>,

    /// Rows with a non-empty cancellation reason
    pub total_cancellations: u64,

    /// Cancellation reason category -> count and percentage of cancellations.
    /// All reason buckets are always present, zeros included.
    pub cancel_reasons: BTreeMap<String, CategoryCount>,

    /// Admissions through open competition (modality code prefix)
    pub open_competition: u64,

    /// Admissions through affirmative action (modality code prefix)
    pub affirmative_action: u64,

    /// Continuing + on-leave enrollments
    pub active_enrollments: u64,
}

impl CourseStats {
    /// Count in a status category, zero if absent.
    pub fn category_count(&self, category: &str) -> u64 {
        self.categories.get(category).map_or(0, |c| c.count)
    }
}

/// Running totals for one program across all its terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramTotals {
    pub enrollments: u64,
    pub cancellations: u64,
    pub graduated: u64,
    pub active: u64,
}

/// Per-term statistics and totals for one program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramData {
    /// Term -> extracted statistics
    pub terms: BTreeMap<String, CourseStats>,

    /// Summed totals across the program's terms
    pub totals: ProgramTotals,
}

/// Global summary across all programs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_programs: u64,
    pub total_terms: u64,
    pub total_enrollments: u64,
    pub total_cancellations: u64,
    pub total_graduated: u64,
    pub total_active: u64,
}

/// Consolidated statistics across programs and terms.
///
/// Invariants: the summary totals equal the sum of the per-program totals,
/// and `total_terms` is the number of distinct terms seen in any program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    /// Program name -> per-term statistics and totals
    pub programs: BTreeMap<String, ProgramData>,

    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_count_absent_is_zero() {
        let stats = CourseStats::default();
        assert_eq!(stats.category_count("Formados"), 0);
    }

    #[test]
    fn test_stats_serialize_roundtrip() {
        let mut stats = CourseStats {
            program: "Química Industrial".to_string(),
            term: "20241".to_string(),
            total_records: 10,
            ..CourseStats::default()
        };
        stats.categories.insert(
            "Trancados".to_string(),
            CategoryCount {
                count: 2,
                percent: 20.0,
            },
        );

        let json = serde_json::to_string(&stats).unwrap();
        let back: CourseStats = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}

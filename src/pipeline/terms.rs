// src/pipeline/terms.rs

//! Academic term helpers.
//!
//! A term is encoded `{year}{half}` with half in {1, 2}, e.g. "20251".

use std::sync::OnceLock;

use regex::Regex;

/// Parse a term into (year, half). `None` for malformed input.
pub fn parse_term(term: &str) -> Option<(u16, u8)> {
    if term.len() != 5 || !term.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: u16 = term[..4].parse().ok()?;
    let half: u8 = term[4..].parse().ok()?;
    if half == 1 || half == 2 {
        Some((year, half))
    } else {
        None
    }
}

/// Enumerate every term from `start` to `end`, inclusive.
///
/// Returns an empty list when either bound is malformed or start is after
/// end; callers validate ordering beforehand when they need to distinguish.
pub fn expand_term_range(start: &str, end: &str) -> Vec<String> {
    let Some((start_year, start_half)) = parse_term(start) else {
        return Vec::new();
    };
    let Some((end_year, end_half)) = parse_term(end) else {
        return Vec::new();
    };

    let mut terms = Vec::new();
    let (mut year, mut half) = (start_year, start_half);

    while (year, half) <= (end_year, end_half) {
        terms.push(format!("{year}{half}"));
        if half == 1 {
            half = 2;
        } else {
            half = 1;
            year += 1;
        }
    }

    terms
}

/// Display form of a term, e.g. "20251" -> "2025/1".
pub fn display_term(term: &str) -> String {
    match parse_term(term) {
        Some((year, half)) => format!("{year}/{half}"),
        None => term.to_string(),
    }
}

/// Extract a term value from display text such as "2025/1º Semestre".
pub fn term_from_text(text: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let pattern =
        RE.get_or_init(|| Regex::new(r"(\d{4})\s*/\s*(\d)").expect("valid term pattern"));

    let caps = pattern.captures(text)?;
    let term = format!("{}{}", &caps[1], &caps[2]);
    parse_term(&term).map(|_| term)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_range_across_year_boundary() {
        assert_eq!(
            expand_term_range("20231", "20241"),
            vec!["20231", "20232", "20241"]
        );
    }

    #[test]
    fn test_expand_single_term() {
        assert_eq!(expand_term_range("20251", "20251"), vec!["20251"]);
    }

    #[test]
    fn test_expand_reversed_range_is_empty() {
        assert!(expand_term_range("20252", "20251").is_empty());
    }

    #[test]
    fn test_expand_malformed_is_empty() {
        assert!(expand_term_range("2025", "20251").is_empty());
        assert!(expand_term_range("20253", "20261").is_empty());
        assert!(expand_term_range("abcde", "20261").is_empty());
    }

    #[test]
    fn test_parse_term() {
        assert_eq!(parse_term("20251"), Some((2025, 1)));
        assert_eq!(parse_term("20252"), Some((2025, 2)));
        assert_eq!(parse_term("20253"), None);
        assert_eq!(parse_term("202511"), None);
    }

    #[test]
    fn test_display_term() {
        assert_eq!(display_term("20251"), "2025/1");
        assert_eq!(display_term("invalid"), "invalid");
    }

    #[test]
    fn test_term_from_text() {
        assert_eq!(term_from_text("2025/1º Semestre"), Some("20251".to_string()));
        assert_eq!(term_from_text("2024 / 2"), Some("20242".to_string()));
        assert_eq!(term_from_text("sem período"), None);
    }
}

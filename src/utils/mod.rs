//! Utility functions and helpers.

pub mod clock;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Resolve a URL string against a base URL string.
pub fn resolve(base_url: &str, href: &str) -> Option<String> {
    Url::parse(base_url)
        .ok()
        .map(|base| resolve_url(&base, href))
}

/// Truncate text to at most `max` grapheme clusters.
///
/// Scraped banner text is Portuguese; cutting on a byte boundary could split
/// an accented character.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    text.graphemes(true).take(max).collect()
}

/// Remove characters that are invalid in file names on common filesystems.
///
/// Invalid characters are dropped, duplicate underscores collapsed and the
/// result trimmed of surrounding whitespace and underscores.
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => {}
            c if (c as u32) < 0x20 => {}
            c => cleaned.push(c),
        }
    }

    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }

    cleaned.trim().trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("Solicitação", 8), "Solicita");
        assert_eq!(truncate_graphemes("curto", 200), "curto");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            sanitize_file_name("relatorio_Química/2025:1*.xlsx"),
            "relatorio_Química20251.xlsx"
        );
        assert_eq!(sanitize_file_name("a__b___c"), "a_b_c");
        assert_eq!(sanitize_file_name("  _nome_  "), "nome");
    }
}

pub mod page;
mod parse;
mod serialize;

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use graphscribe_core::EnrichError;

pub use page::{Node, Page};
pub use serialize::serialize_page;

/// Files larger than this are refused rather than truncated; outline
/// documents are hand-written and never come close.
const MAX_PARSE_SIZE: usize = 8 * 1024 * 1024;

static JOURNAL_NAME_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap(),
        Regex::new(r"^\d{4}_\d{2}_\d{2}$").unwrap(),
        Regex::new(r"^[A-Z][a-z]{2} \d{1,2}[a-z]{2}, \d{4}$").unwrap(),
    ]
});

/// Journal pages are named after their date.
pub fn is_journal_name(name: &str) -> bool {
    JOURNAL_NAME_RES.iter().any(|re| re.is_match(name))
}

/// Parse one outline document into `{properties, [Node]}`.
pub fn parse_page(path: &Path) -> Result<Page, EnrichError> {
    let content = std::fs::read_to_string(path)?;
    if content.len() > MAX_PARSE_SIZE {
        return Err(EnrichError::Outline {
            path: path.display().to_string(),
            reason: format!("file exceeds {} bytes", MAX_PARSE_SIZE),
        });
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(parse::parse_content(&content, &name, path))
}

/// Parse from an in-memory buffer; the file variant above delegates here.
pub fn parse_content(content: &str, name: &str, path: &Path) -> Page {
    parse::parse_content(content, name, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_names() {
        assert!(is_journal_name("2024-03-01"));
        assert!(is_journal_name("2024_03_01"));
        assert!(is_journal_name("Jan 1st, 2024"));
        assert!(!is_journal_name("reading-list"));
        assert!(!is_journal_name("2024-3-1"));
    }
}

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use graphscribe_core::{config::PdfConfig, ExtractError, ExtractionRecord, Extractor, JobKind};

use crate::retry::{status_error, transport_error};
use crate::video::capitalize_words;

/// Preview fed to the analyzer; metadata only needs the opening pages.
const MAX_PREVIEW_CHARS: usize = 2000;

static INFO_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Title\s*\(((?:[^()\\]|\\.)*)\)").unwrap());
static INFO_AUTHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/Author\s*\(((?:[^()\\]|\\.)*)\)").unwrap());
static PAGE_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Type\s*/Page[^s]").unwrap());
static PAGES_COUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Count\s+(\d+)").unwrap());
static TEXT_SHOW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(((?:[^()\\]|\\.){4,})\)\s*Tj").unwrap());

pub struct PdfExtractor {
    client: Client,
    max_prefix_bytes: usize,
}

impl PdfExtractor {
    pub fn new(client: Client, config: &PdfConfig) -> Self {
        Self { client, max_prefix_bytes: config.max_prefix_bytes }
    }

    /// HEAD probe: confirm the content type and learn the size. Servers
    /// that refuse HEAD (405/501) fall through to the ranged GET.
    async fn probe(&self, url: &str) -> Result<(Option<String>, Option<u64>), ExtractError> {
        let response = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(e) => return Err(transport_error(e)),
        };
        let status = response.status();
        if status.as_u16() == 405 || status.as_u16() == 501 {
            return Ok((None, None));
        }
        if !status.is_success() {
            return Err(status_error(&response));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        Ok((content_type, content_length))
    }

    /// Size-bounded prefix download. Streams that exceed the cap are
    /// truncated and parsing continues on what arrived.
    async fn fetch_prefix(&self, url: &str) -> Result<Vec<u8>, ExtractError> {
        let mut response = self.client.get(url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            let remaining = self.max_prefix_bytes.saturating_sub(buffer.len());
            if remaining == 0 {
                debug!(url, cap = self.max_prefix_bytes, "prefix cap reached, truncating");
                break;
            }
            let take = remaining.min(chunk.len());
            buffer.extend_from_slice(&chunk[..take]);
        }
        Ok(buffer)
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn kind(&self) -> JobKind {
        JobKind::Pdf
    }

    async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
        let parsed =
            Url::parse(url).map_err(|e| ExtractError::Permanent(format!("invalid url: {e}")))?;

        let mut record = ExtractionRecord::new(JobKind::Pdf, url, "pdf");

        let (content_type, content_length) = self.probe(url).await?;
        if let Some(ct) = &content_type {
            if !ct.contains("pdf") && !ct.contains("octet-stream") {
                return Err(ExtractError::Permanent(format!("not a pdf: {ct}")));
            }
        }
        record.size_bytes = content_length;

        let prefix = self.fetch_prefix(url).await?;
        if !prefix.starts_with(b"%PDF-") {
            return Err(ExtractError::Permanent("missing %PDF header".into()));
        }

        let text = String::from_utf8_lossy(&prefix);
        record.title = INFO_TITLE_RE
            .captures(&text)
            .map(|c| unescape_pdf_string(&c[1]))
            .filter(|t| !t.trim().is_empty())
            .or_else(|| title_from_url(&parsed));
        record.author = INFO_AUTHOR_RE
            .captures(&text)
            .map(|c| unescape_pdf_string(&c[1]))
            .filter(|a| !a.trim().is_empty());
        record.page_count = count_pages(&text);
        record.preview_text = extract_preview(&text, MAX_PREVIEW_CHARS);

        Ok(record)
    }
}

/// Page count from the page-tree `/Count`, falling back to counting page
/// objects in the prefix.
fn count_pages(text: &str) -> Option<u32> {
    if let Some(max) = PAGES_COUNT_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<u32>().ok())
        .max()
    {
        return Some(max);
    }
    let pages = PAGE_TYPE_RE.find_iter(text).count() as u32;
    (pages > 0).then_some(pages)
}

/// Literal strings fed to text-showing operators in uncompressed content
/// streams. A heuristic, not a renderer: enough signal for the analyzer.
fn extract_preview(text: &str, max_chars: usize) -> Option<String> {
    let mut out = String::new();
    for caps in TEXT_SHOW_RE.captures_iter(text) {
        let fragment = unescape_pdf_string(&caps[1]);
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(fragment);
        if out.len() >= max_chars {
            let mut cut = max_chars;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            break;
        }
    }
    (!out.is_empty()).then_some(out)
}

fn unescape_pdf_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Readable title from the URL filename: `attention-is-all_you-need.pdf`
/// becomes "Attention Is All You Need".
fn title_from_url(url: &Url) -> Option<String> {
    let file = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let stem = file.strip_suffix(".pdf").or_else(|| file.strip_suffix(".PDF")).unwrap_or(file);
    let cleaned = stem.replace(['-', '_'], " ");
    if cleaned.trim().is_empty() {
        return None;
    }
    Some(capitalize_words(cleaned.trim()))
}

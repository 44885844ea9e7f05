use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use graphscribe_core::JobKind;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "twitch.tv",
    "dailymotion.com",
];

const SOCIAL_HOSTS: &[&str] = &["twitter.com", "x.com", "t.co"];

/// Markdown and wrapper punctuation that the bare-URL regex drags along.
fn trim_url(raw: &str) -> &str {
    raw.trim_end_matches(['}', ')', ']', '>', '"', '\'', ',', '.', ';', '!', '?'])
}

fn host_matches(host: &str, table: &[&str]) -> bool {
    let host = host.to_ascii_lowercase();
    table
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// Order-sensitive kind classification; first match wins. PDF candidacy is
/// pattern-only here, the extractor confirms the content type later.
pub fn classify_url(url_str: &str) -> Option<JobKind> {
    let parsed = Url::parse(url_str).ok()?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return None;
    }
    let host = parsed.host_str()?;

    if host_matches(host, VIDEO_HOSTS) {
        return Some(JobKind::Video);
    }
    if host_matches(host, SOCIAL_HOSTS) {
        return Some(JobKind::Social);
    }

    let path = parsed.path().to_ascii_lowercase();
    if path.ends_with(".pdf") || path.contains("/pdf/") || url_str.to_ascii_lowercase().contains(".pdf?") {
        return Some(JobKind::Pdf);
    }

    None
}

/// All classified URLs in a node body, emitted in classifier-table order
/// (video, then social, then pdf), text order within a kind, deduplicated
/// per `(url, kind)`.
pub fn classify_node_urls(body: &str) -> Vec<(String, JobKind)> {
    let mut by_kind: [Vec<String>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for m in URL_RE.find_iter(body) {
        let url = trim_url(m.as_str());
        if url.is_empty() {
            continue;
        }
        let Some(kind) = classify_url(url) else {
            continue;
        };
        let bucket = match kind {
            JobKind::Video => &mut by_kind[0],
            JobKind::Social => &mut by_kind[1],
            JobKind::Pdf => &mut by_kind[2],
        };
        if !bucket.iter().any(|u| u == url) {
            bucket.push(url.to_string());
        }
    }

    let [video, social, pdf] = by_kind;
    video
        .into_iter()
        .map(|u| (u, JobKind::Video))
        .chain(social.into_iter().map(|u| (u, JobKind::Social)))
        .chain(pdf.into_iter().map(|u| (u, JobKind::Pdf)))
        .collect()
}

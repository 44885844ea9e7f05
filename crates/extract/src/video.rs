use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use graphscribe_core::{
    config::VideoConfig, ExtractError, ExtractionRecord, Extractor, JobKind,
};

use crate::retry::{rate_limited_from_body, status_error, transport_error};

/// Caption text is analyzer input only; clip it so a three-hour lecture
/// does not balloon the analysis blob.
const MAX_CAPTION_CHARS: usize = 50_000;

static ISO_DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap());
static TIMEDTEXT_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<text[^>]*>([^<]*)</text>").unwrap());

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    author_name: Option<String>,
}

pub struct VideoExtractor {
    client: Client,
    api_token: Option<String>,
    fetch_captions: bool,
}

impl VideoExtractor {
    pub fn new(client: Client, config: &VideoConfig) -> Self {
        Self {
            client,
            api_token: config.api_token.clone(),
            fetch_captions: config.fetch_captions,
        }
    }

    fn platform(url: &Url) -> Option<&'static str> {
        let host = url.host_str()?.to_ascii_lowercase();
        let bare = host.strip_prefix("www.").or_else(|| host.strip_prefix("m.")).unwrap_or(&host);
        match bare {
            "youtube.com" | "youtu.be" => Some("youtube"),
            "vimeo.com" => Some("vimeo"),
            "tiktok.com" => Some("tiktok"),
            "twitch.tv" => Some("twitch"),
            "dailymotion.com" => Some("dailymotion"),
            _ => None,
        }
    }

    fn oembed_endpoint(platform: &str, url: &str) -> Option<String> {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        match platform {
            "youtube" => Some(format!("https://www.youtube.com/oembed?url={encoded}&format=json")),
            "vimeo" => Some(format!("https://vimeo.com/api/oembed.json?url={encoded}")),
            "tiktok" => Some(format!("https://www.tiktok.com/oembed?url={encoded}")),
            "dailymotion" => {
                Some(format!("https://www.dailymotion.com/services/oembed?url={encoded}&format=json"))
            }
            // twitch has no public oEmbed; the record falls back to URL metadata
            _ => None,
        }
    }

    async fn fetch_oembed(&self, endpoint: &str) -> Result<OEmbed, ExtractError> {
        let response = self.client.get(endpoint).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let body = response.text().await.map_err(transport_error)?;
        if let Some(limited) = rate_limited_from_body(&body) {
            return Err(limited);
        }
        serde_json::from_str(&body)
            .map_err(|e| ExtractError::Transient(format!("oembed parse: {e}")))
    }

    /// Duration via the platform data API when a token is configured.
    /// Best-effort: a missing duration never fails the job.
    async fn fetch_duration(&self, video_id: &str) -> Option<String> {
        let token = self.api_token.as_deref()?;
        let endpoint = format!(
            "https://www.googleapis.com/youtube/v3/videos?part=contentDetails&id={video_id}&key={token}"
        );
        let response = self.client.get(&endpoint).send().await.ok()?;
        if !response.status().is_success() {
            debug!(video_id, status = %response.status(), "duration lookup failed");
            return None;
        }
        let body: serde_json::Value = response.json().await.ok()?;
        let iso = body
            .get("items")?
            .get(0)?
            .get("contentDetails")?
            .get("duration")?
            .as_str()?;
        humanize_iso_duration(iso)
    }

    /// Public captions for the analyzer. Best-effort: every failure
    /// degrades to "no preview".
    async fn fetch_captions(&self, video_id: &str) -> Option<String> {
        let endpoint = format!("https://video.google.com/timedtext?lang=en&v={video_id}");
        let response = match self.client.get(&endpoint).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!(video_id, status = %r.status(), "caption fetch refused");
                return None;
            }
            Err(e) => {
                debug!(video_id, "caption fetch failed: {e}");
                return None;
            }
        };
        let body = response.text().await.ok()?;
        let text = timedtext_to_text(&body, MAX_CAPTION_CHARS);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl Extractor for VideoExtractor {
    fn kind(&self) -> JobKind {
        JobKind::Video
    }

    async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
        let parsed =
            Url::parse(url).map_err(|e| ExtractError::Permanent(format!("invalid url: {e}")))?;
        let platform = Self::platform(&parsed)
            .ok_or_else(|| ExtractError::Permanent(format!("unsupported video host: {url}")))?;

        let mut record = ExtractionRecord::new(JobKind::Video, url, platform);

        match Self::oembed_endpoint(platform, url) {
            Some(endpoint) => {
                let oembed = self.fetch_oembed(&endpoint).await?;
                record.title = oembed.title;
                record.author = oembed.author_name;
            }
            None => {
                record.title = title_from_path(&parsed);
            }
        }

        if platform == "youtube" {
            if let Some(video_id) = youtube_video_id(&parsed) {
                if record.duration.is_none() {
                    record.duration = self.fetch_duration(&video_id).await;
                }
                if self.fetch_captions {
                    record.preview_text = self.fetch_captions(&video_id).await;
                }
            } else {
                warn!(url, "youtube url without a recognizable video id");
            }
        }

        Ok(record)
    }
}

/// Video id across the URL variants: `watch?v=`, `youtu.be/<id>`,
/// `/shorts/<id>`, `/embed/<id>`.
pub fn youtube_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();

    if host == "youtu.be" {
        let seg = url.path_segments()?.next()?.trim();
        if !seg.is_empty() {
            return Some(seg.to_string());
        }
    }

    if url.path().starts_with("/watch") {
        for (k, v) in url.query_pairs() {
            if k == "v" && !v.trim().is_empty() {
                return Some(v.trim().to_string());
            }
        }
    }

    let mut segs = url.path_segments()?;
    let a = segs.next().unwrap_or("");
    let b = segs.next().unwrap_or("");
    if (a == "shorts" || a == "embed") && !b.trim().is_empty() {
        return Some(b.to_string());
    }

    None
}

/// "PT1H2M3S" -> "1:02:03", "PT4M20S" -> "4:20".
fn humanize_iso_duration(iso: &str) -> Option<String> {
    let caps = ISO_DURATION_RE.captures(iso)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok()).unwrap_or(0);
    let (h, m, s) = (part(1), part(2), part(3));
    Some(if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    })
}

/// Flatten a timedtext XML payload into plain caption text.
fn timedtext_to_text(xml: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for caps in TIMEDTEXT_LINE_RE.captures_iter(xml) {
        let line = unescape_entities(&caps[1]);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.len() >= max_chars {
            break;
        }
    }
    out
}

fn unescape_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Last resort for platforms without a metadata endpoint: a readable title
/// from the final path segment.
fn title_from_path(url: &Url) -> Option<String> {
    let seg = url.path_segments()?.filter(|s| !s.is_empty()).next_back()?;
    let cleaned = seg.replace(['-', '_'], " ");
    if cleaned.trim().is_empty() {
        return None;
    }
    Some(capitalize_words(cleaned.trim()))
}

pub(crate) fn capitalize_words(text: &str) -> String {
    text.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

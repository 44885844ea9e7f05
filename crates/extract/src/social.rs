use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use graphscribe_core::{
    config::SocialConfig, ExtractError, ExtractionRecord, Extractor, JobKind,
};

use crate::retry::{rate_limited_from_body, status_error, transport_error};

static STATUS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:twitter\.com|x\.com)/([^/]+)/status/(\d+)").unwrap());
static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<title[^>]*>([^<]+)</title>").unwrap());

#[derive(Debug, Deserialize)]
struct OEmbed {
    author_name: Option<String>,
    html: Option<String>,
}

pub struct SocialExtractor {
    client: Client,
    bearer_token: Option<String>,
}

impl SocialExtractor {
    pub fn new(client: Client, config: &SocialConfig) -> Self {
        Self { client, bearer_token: config.api_token.clone() }
    }

    /// Short-URL redirectors resolve before classification of the status id.
    async fn resolve_short_url(&self, url: &str) -> String {
        if !url.contains("t.co/") {
            return url.to_string();
        }
        match self.client.head(url).send().await {
            Ok(response) => response.url().to_string(),
            Err(e) => {
                debug!(url, "short-url resolution failed: {e}");
                url.to_string()
            }
        }
    }

    fn status_id(url: &str) -> Option<(String, String)> {
        let caps = STATUS_RE.captures(url)?;
        Some((caps[1].to_string(), caps[2].to_string()))
    }

    /// API v2 when a bearer token is configured; the richest source.
    async fn via_api(&self, post_id: &str) -> Result<ExtractionFields, ExtractError> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or_else(|| ExtractError::Permanent("no api token".into()))?;
        let endpoint = format!(
            "https://api.twitter.com/2/tweets/{post_id}?expansions=author_id&tweet.fields=created_at&user.fields=name,username"
        );
        let response = self
            .client
            .get(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let body = response.text().await.map_err(transport_error)?;
        if let Some(limited) = rate_limited_from_body(&body) {
            return Err(limited);
        }
        let value: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| ExtractError::Transient(format!("api parse: {e}")))?;
        let data = value
            .get("data")
            .ok_or_else(|| ExtractError::Permanent("post not found".into()))?;
        let user = value
            .get("includes")
            .and_then(|i| i.get("users"))
            .and_then(|u| u.get(0));

        let username = user
            .and_then(|u| u.get("username"))
            .and_then(|v| v.as_str())
            .map(|s| format!("@{s}"));
        Ok(ExtractionFields {
            title: username.as_ref().map(|h| format!("Post by {h}")),
            author: user
                .and_then(|u| u.get("name"))
                .and_then(|v| v.as_str())
                .map(String::from),
            author_handle: username,
            body: data.get("text").and_then(|v| v.as_str()).map(String::from),
            created_at: data.get("created_at").and_then(|v| v.as_str()).map(String::from),
        })
    }

    /// Public oEmbed endpoint; no token needed.
    async fn via_oembed(&self, url: &str) -> Result<ExtractionFields, ExtractError> {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        let endpoint =
            format!("https://publish.twitter.com/oembed?url={encoded}&omit_script=true&dnt=true");
        let response = self.client.get(&endpoint).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let body = response.text().await.map_err(transport_error)?;
        if let Some(limited) = rate_limited_from_body(&body) {
            return Err(limited);
        }
        let oembed: OEmbed = serde_json::from_str(&body)
            .map_err(|e| ExtractError::Transient(format!("oembed parse: {e}")))?;
        let handle = oembed
            .html
            .as_deref()
            .and_then(|h| HANDLE_RE.find(h))
            .map(|m| m.as_str().to_string());
        let text = oembed.html.as_deref().map(strip_tags);
        Ok(ExtractionFields {
            title: oembed.author_name.as_ref().map(|a| format!("Post by {a}")),
            author: oembed.author_name,
            author_handle: handle,
            body: text,
            created_at: None,
        })
    }

    /// Last resort: the page `<title>`.
    async fn via_page(&self, url: &str) -> Result<ExtractionFields, ExtractError> {
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(&response));
        }
        let body = response.text().await.map_err(transport_error)?;
        let title = TITLE_RE
            .captures(&body)
            .map(|c| c[1].trim().to_string())
            .ok_or_else(|| ExtractError::Permanent("no title in page".into()))?;
        Ok(ExtractionFields {
            title: Some(title),
            author: None,
            author_handle: None,
            body: None,
            created_at: None,
        })
    }
}

struct ExtractionFields {
    title: Option<String>,
    author: Option<String>,
    author_handle: Option<String>,
    body: Option<String>,
    created_at: Option<String>,
}

#[async_trait]
impl Extractor for SocialExtractor {
    fn kind(&self) -> JobKind {
        JobKind::Social
    }

    async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
        let resolved = self.resolve_short_url(url).await;
        let (_, post_id) = Self::status_id(&resolved)
            .ok_or_else(|| ExtractError::Permanent(format!("not a status url: {resolved}")))?;

        // best-available chain; a rate limit anywhere stops the chain so
        // the scheduler can gate the resource
        let mut last_err = None;
        let methods: [&str; 3] = ["api", "oembed", "page"];
        let mut fields = None;
        for method in methods {
            let attempt = match method {
                "api" if self.bearer_token.is_some() => self.via_api(&post_id).await,
                "api" => continue,
                "oembed" => self.via_oembed(&resolved).await,
                _ => self.via_page(&resolved).await,
            };
            match attempt {
                Ok(f) => {
                    fields = Some(f);
                    break;
                }
                Err(e @ ExtractError::RateLimited { .. }) => return Err(e),
                Err(e) => {
                    debug!(url, method, "extraction method failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        let fields = match fields {
            Some(f) => f,
            None => return Err(last_err.unwrap_or_else(|| {
                ExtractError::Permanent("all extraction methods failed".into())
            })),
        };

        let mut record = ExtractionRecord::new(JobKind::Social, url, "x-twitter");
        record.title = fields.title;
        record.author = fields.author;
        record.author_handle = fields.author_handle;
        record.created_at = fields.created_at;
        record.preview_text = fields.body;
        Ok(record)
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ids_from_both_hosts() {
        assert_eq!(
            SocialExtractor::status_id("https://twitter.com/alice/status/123456"),
            Some(("alice".to_string(), "123456".to_string()))
        );
        assert_eq!(
            SocialExtractor::status_id("https://x.com/bob/status/789?s=20"),
            Some(("bob".to_string(), "789".to_string()))
        );
        assert_eq!(SocialExtractor::status_id("https://x.com/bob"), None);
    }

    #[test]
    fn strip_tags_flattens_oembed_html() {
        let html = "<blockquote><p>hello world</p>&mdash; Ann (@ann)</blockquote>";
        let text = strip_tags(html);
        assert!(text.contains("hello world"));
        assert!(!text.contains('<'));
    }
}

//! Per-kind metadata extractors.
//!
//! One extractor per `JobKind` behind the shared `Extractor` trait. All of
//! them take an injected HTTP client, bound their downloads, and leave
//! failures through the typed `ExtractError` taxonomy only; the scheduler
//! is the sole consumer of those errors.

pub mod pdf;
pub mod retry;
pub mod social;
pub mod video;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use graphscribe_core::{config::HttpConfig, AppConfig, EnrichError, Extractor, JobKind};

pub use pdf::PdfExtractor;
pub use social::SocialExtractor;
pub use video::VideoExtractor;

/// Build the shared HTTP client every extractor uses: one timeout, one
/// redirect cap, one User-Agent.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, EnrichError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .redirect(reqwest::redirect::Policy::limited(config.redirect_cap))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| EnrichError::Config(format!("http client: {e}")))
}

/// Capability table from kind to extractor. Disabled kinds simply have no
/// entry; the scanner never seeds them either.
pub fn build_extractors(
    config: &AppConfig,
    client: &Client,
) -> HashMap<JobKind, Arc<dyn Extractor>> {
    let mut table: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
    if config.video.enabled {
        table.insert(
            JobKind::Video,
            Arc::new(VideoExtractor::new(client.clone(), &config.video)),
        );
    }
    if config.social.enabled {
        table.insert(
            JobKind::Social,
            Arc::new(SocialExtractor::new(client.clone(), &config.social)),
        );
    }
    if config.pdf.enabled {
        table.insert(
            JobKind::Pdf,
            Arc::new(PdfExtractor::new(client.clone(), &config.pdf)),
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_table_tracks_enabled_kinds() {
        let mut config = AppConfig::default();
        config.social.enabled = false;
        let client = build_http_client(&config.http).unwrap();
        let table = build_extractors(&config, &client);
        assert!(table.contains_key(&JobKind::Video));
        assert!(!table.contains_key(&JobKind::Social));
        assert!(table.contains_key(&JobKind::Pdf));
        assert_eq!(table[&JobKind::Video].kind(), JobKind::Video);
    }
}

use serde::Deserialize;

/// Run configuration. Every field has a default so a missing config file
/// still yields a runnable pipeline; CLI flags override on top.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    /// Pipeline runs but applier and backup skip all writes.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub backup_enabled: bool,
    /// Topic property key prefix and topic-index filename prefix.
    #[serde(default = "default_property_prefix")]
    pub property_prefix: String,
    /// Directories under the graph root the scanner never descends into.
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_enabled: true,
            property_prefix: default_property_prefix(),
            skip_dirs: default_skip_dirs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_redirect_cap")]
    pub redirect_cap: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_http_timeout(),
            redirect_cap: default_redirect_cap(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Worker pool size.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Quiet period when an upstream rate-limits us without a Retry-After.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    /// Admission bound across all three priority queues.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Optional whole-run deadline; past it the run is cancelled gracefully.
    #[serde(default)]
    pub run_timeout_seconds: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            retry_delay_seconds: default_retry_delay(),
            max_queue_size: default_max_queue_size(),
            max_retries: default_max_retries(),
            run_timeout_seconds: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TopicsConfig {
    #[serde(default = "default_max_topics")]
    pub max_topics_per_item: usize,
    /// Minimum characters of caption/preview text before it outranks the
    /// title as analyzer input.
    #[serde(default = "default_min_preview_length")]
    pub min_preview_length: usize,
    /// Extends the built-in english stopword list.
    #[serde(default)]
    pub extra_stopwords: Vec<String>,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            max_topics_per_item: default_max_topics(),
            min_preview_length: default_min_preview_length(),
            extra_stopwords: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional platform API token; upgrades metadata (duration etc.).
    #[serde(default)]
    pub api_token: Option<String>,
    /// Fetch public captions to feed the topic analyzer.
    #[serde(default = "default_true")]
    pub fetch_captions: bool,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self { enabled: true, api_token: None, fetch_captions: true }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SocialConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self { enabled: true, api_token: None }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PdfConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cap on the downloaded document prefix used for metadata and preview.
    #[serde(default = "default_pdf_prefix")]
    pub max_prefix_bytes: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { enabled: true, max_prefix_bytes: default_pdf_prefix() }
    }
}

fn default_true() -> bool {
    true
}
fn default_property_prefix() -> String {
    "topic".to_string()
}
fn default_skip_dirs() -> Vec<String> {
    ["logseq", ".logseq", "assets", ".git", ".recycle"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_http_timeout() -> u64 {
    15
}
fn default_redirect_cap() -> usize {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36".to_string()
}
fn default_max_concurrent() -> usize {
    8
}
fn default_retry_delay() -> u64 {
    60
}
fn default_max_queue_size() -> usize {
    1000
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_topics() -> usize {
    3
}
fn default_min_preview_length() -> usize {
    100
}
fn default_pdf_prefix() -> usize {
    10 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.scheduler.max_concurrent, 8);
        assert_eq!(cfg.scheduler.retry_delay_seconds, 60);
        assert_eq!(cfg.scheduler.max_queue_size, 1000);
        assert_eq!(cfg.general.property_prefix, "topic");
        assert!(cfg.general.backup_enabled);
        assert!(cfg.video.enabled && cfg.social.enabled && cfg.pdf.enabled);
    }

    #[test]
    fn partial_toml_overrides() {
        let cfg: AppConfig = toml::from_str(
            "[scheduler]\nmax_concurrent = 2\n\n[pdf]\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(cfg.scheduler.max_concurrent, 2);
        assert!(!cfg.pdf.enabled);
        assert!(cfg.video.enabled);
    }
}

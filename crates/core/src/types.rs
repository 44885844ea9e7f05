use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ExtractError;

/// Prefix of the backup scratch directories created before apply; the
/// scanner never descends into them.
pub const BACKUP_DIR_PREFIX: &str = "graphscribe-backup-";

/// Kind of external resource a job targets. Doubles as the minimum
/// resource key for rate-limit gating: all jobs of one kind compete for
/// the same upstream quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Video,
    Social,
    Pdf,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Video, JobKind::Social, JobKind::Pdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Video => "video",
            JobKind::Social => "social",
            JobKind::Pdf => "pdf",
        }
    }

    /// The tag used in `{{tag url}}` wrappers when the applier rewrites a
    /// node body.
    pub fn wrapper_tag(&self) -> &'static str {
        match self {
            JobKind::Video => "video",
            JobKind::Social => "tweet",
            JobKind::Pdf => "pdf",
        }
    }

    /// Priority is assigned by kind: videos carry the most metadata per
    /// request, PDFs the least.
    pub fn priority(&self) -> Priority {
        match self {
            JobKind::Video => Priority::High,
            JobKind::Social => Priority::Normal,
            JobKind::Pdf => Priority::Low,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Scan order for job selection.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    RateLimited,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::RateLimited => "rate_limited",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Stable job identifier: hex sha256 over `(kind, url)`. Identical URLs of
/// the same kind collapse onto one job.
pub fn job_id(kind: JobKind, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Where a job's result lands: one node in one document. Workers never
/// hold the node itself, only this address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub document: PathBuf,
    pub node_id: String,
}

/// A unit of scheduler work, keyed by `(kind, url)`.
#[derive(Debug, Clone)]
pub struct UrlJob {
    pub job_id: String,
    pub kind: JobKind,
    pub url: String,
    pub owner: NodeRef,
    pub priority: Priority,
    pub attempts: u32,
    /// When set, the job may not start before this instant (retry-after
    /// window or transient backoff).
    pub next_eligible_at: Option<Instant>,
    pub status: JobStatus,
}

impl UrlJob {
    pub fn new(kind: JobKind, url: impl Into<String>, owner: NodeRef) -> Self {
        let url = url.into();
        Self {
            job_id: job_id(kind, &url),
            kind,
            url,
            owner,
            priority: kind.priority(),
            attempts: 0,
            next_eligible_at: None,
            status: JobStatus::Pending,
        }
    }

    pub fn is_eligible(&self, now: Instant) -> bool {
        match self.next_eligible_at {
            Some(at) => at <= now,
            None => true,
        }
    }
}

/// Normalized extractor output. Everything except `kind`, `url` and
/// `extracted_at` is optional: a missing field means "unknown", not "empty".
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRecord {
    pub kind: JobKind,
    pub url: String,
    pub title: Option<String>,
    pub author: Option<String>,
    /// Platform handle where one exists (`@name` on social posts).
    pub author_handle: Option<String>,
    pub created_at: Option<String>,
    pub duration: Option<String>,
    pub page_count: Option<u32>,
    pub size_bytes: Option<u64>,
    /// Caption / body / document preview fed to the topic analyzer.
    /// Never persisted to the graph.
    #[serde(skip)]
    pub preview_text: Option<String>,
    pub platform_tag: String,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionRecord {
    pub fn new(kind: JobKind, url: impl Into<String>, platform_tag: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            title: None,
            author: None,
            author_handle: None,
            created_at: None,
            duration: None,
            page_count: None,
            size_bytes: None,
            preview_text: None,
            platform_tag: platform_tag.into(),
            extracted_at: Utc::now(),
        }
    }

    /// The blob the topic analyzer sees: preview when long enough,
    /// otherwise the title.
    pub fn analysis_text(&self, min_preview_length: usize) -> Option<&str> {
        match &self.preview_text {
            Some(p) if p.len() >= min_preview_length => Some(p.as_str()),
            _ => self.title.as_deref(),
        }
    }
}

/// An extraction record plus the analyzer's topic tags, queued for apply.
#[derive(Debug, Clone)]
pub struct EnrichedItem {
    pub record: ExtractionRecord,
    pub topics: Vec<String>,
}

/// One extractor per kind. Extractors fetch metadata for one URL and never
/// touch graph state; failures leave through the `ExtractError` taxonomy
/// only.
#[async_trait]
pub trait Extractor: Send + Sync + 'static {
    fn kind(&self) -> JobKind;
    async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_stable_and_kind_scoped() {
        let a = job_id(JobKind::Video, "https://youtu.be/abc");
        let b = job_id(JobKind::Video, "https://youtu.be/abc");
        let c = job_id(JobKind::Pdf, "https://youtu.be/abc");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn priority_follows_kind() {
        assert_eq!(JobKind::Video.priority(), Priority::High);
        assert_eq!(JobKind::Social.priority(), Priority::Normal);
        assert_eq!(JobKind::Pdf.priority(), Priority::Low);
    }

    #[test]
    fn eligibility_respects_deadline() {
        let owner = NodeRef { document: "p.md".into(), node_id: "p:0".into() };
        let mut job = UrlJob::new(JobKind::Video, "https://youtu.be/abc", owner);
        let now = Instant::now();
        assert!(job.is_eligible(now));
        job.next_eligible_at = Some(now + std::time::Duration::from_secs(5));
        assert!(!job.is_eligible(now));
        assert!(job.is_eligible(now + std::time::Duration::from_secs(6)));
    }

    #[test]
    fn analysis_text_prefers_long_preview() {
        let mut rec = ExtractionRecord::new(JobKind::Video, "u", "youtube");
        rec.title = Some("Title".into());
        assert_eq!(rec.analysis_text(10), Some("Title"));
        rec.preview_text = Some("a caption long enough to qualify".into());
        assert_eq!(rec.analysis_text(10), Some("a caption long enough to qualify"));
        rec.preview_text = Some("short".into());
        assert_eq!(rec.analysis_text(10), Some("Title"));
    }
}

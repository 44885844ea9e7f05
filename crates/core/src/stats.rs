use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::JobKind;

/// Monotone run counters shared by the scanner, scheduler workers and the
/// applier. Mutated only through these methods; read once at report time.
#[derive(Debug, Default)]
pub struct RunStats {
    nodes_scanned: AtomicU64,
    videos_found: AtomicU64,
    tweets_found: AtomicU64,
    pdfs_found: AtomicU64,
    videos_enhanced: AtomicU64,
    tweets_enhanced: AtomicU64,
    pdfs_enhanced: AtomicU64,
    previews_extracted: AtomicU64,
    properties_stamped: AtomicU64,
    topic_pages_written: AtomicU64,
    jobs_submitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    rate_limited: AtomicU64,
    retried: AtomicU64,
    errors: AtomicU64,
}

impl RunStats {
    pub fn node_scanned(&self) {
        self.nodes_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn found(&self, kind: JobKind) {
        self.found_counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    pub fn enhanced(&self, kind: JobKind) {
        match kind {
            JobKind::Video => &self.videos_enhanced,
            JobKind::Social => &self.tweets_enhanced,
            JobKind::Pdf => &self.pdfs_enhanced,
        }
        .fetch_add(1, Ordering::Relaxed);
    }

    pub fn preview_extracted(&self) {
        self.previews_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn properties_stamped(&self, n: u64) {
        self.properties_stamped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn topic_page_written(&self) {
        self.topic_pages_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn found_counter(&self, kind: JobKind) -> &AtomicU64 {
        match kind {
            JobKind::Video => &self.videos_found,
            JobKind::Social => &self.tweets_found,
            JobKind::Pdf => &self.pdfs_found,
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            nodes_scanned: self.nodes_scanned.load(Ordering::Relaxed),
            videos_found: self.videos_found.load(Ordering::Relaxed),
            tweets_found: self.tweets_found.load(Ordering::Relaxed),
            pdfs_found: self.pdfs_found.load(Ordering::Relaxed),
            videos_enhanced: self.videos_enhanced.load(Ordering::Relaxed),
            tweets_enhanced: self.tweets_enhanced.load(Ordering::Relaxed),
            pdfs_enhanced: self.pdfs_enhanced.load(Ordering::Relaxed),
            previews_extracted: self.previews_extracted.load(Ordering::Relaxed),
            properties_stamped: self.properties_stamped.load(Ordering::Relaxed),
            topic_pages_written: self.topic_pages_written.load(Ordering::Relaxed),
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the counters, rendered into the end-of-run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub nodes_scanned: u64,
    pub videos_found: u64,
    pub tweets_found: u64,
    pub pdfs_found: u64,
    pub videos_enhanced: u64,
    pub tweets_enhanced: u64,
    pub pdfs_enhanced: u64,
    pub previews_extracted: u64,
    pub properties_stamped: u64,
    pub topic_pages_written: u64,
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub rate_limited: u64,
    pub retried: u64,
    pub errors: u64,
}

//! Shared harness for the end-to-end suites: stub extractors at the
//! `Extractor` trait seam and a pipeline runner wired exactly like the
//! binary, minus the network.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use graphscribe_apply::Applier;
use graphscribe_core::{
    AppConfig, EnrichError, ExtractError, ExtractionRecord, Extractor, JobKind, JobStatus,
    RunStats, StatsSnapshot,
};
use graphscribe_scanner::scan_graph;
use graphscribe_scheduler::{AnalyzeFn, RateLimitedScheduler};

/// A canned successful record: `title: "Hello", author: "Ann"`.
pub fn stub_record(kind: JobKind, url: &str) -> ExtractionRecord {
    let mut record = ExtractionRecord::new(kind, url, "stub");
    record.title = Some("Hello".into());
    record.author = Some("Ann".into());
    record
}

/// Scripted extractor: pops the next outcome per call; an exhausted script
/// yields the canned success record. Records call instants for timing laws.
pub struct StubExtractor {
    kind: JobKind,
    script: Mutex<Vec<Result<ExtractionRecord, ExtractError>>>,
    pub calls: AtomicUsize,
    pub call_times: Mutex<Vec<Instant>>,
    delay: Option<Duration>,
}

impl StubExtractor {
    pub fn ok(kind: JobKind) -> Arc<Self> {
        Self::scripted(kind, Vec::new())
    }

    pub fn scripted(
        kind: JobKind,
        script: Vec<Result<ExtractionRecord, ExtractError>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    pub fn slow(kind: JobKind, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            script: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl Extractor for StubExtractor {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            Ok(stub_record(self.kind, url))
        } else {
            script.remove(0)
        }
    }
}

pub struct RunResult {
    pub stats: StatsSnapshot,
    pub statuses: HashMap<String, JobStatus>,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub documents_written: usize,
    pub topic_pages_written: usize,
    pub partial: bool,
}

/// Scan -> Queue -> Drain -> Apply against a real directory, with stub
/// extractors and a pinned analyzer output.
pub async fn run_stubbed(
    graph: &Path,
    config: &AppConfig,
    extractors: HashMap<JobKind, Arc<dyn Extractor>>,
    topics: Vec<String>,
) -> Result<RunResult, EnrichError> {
    run_stubbed_with_cancel(graph, config, extractors, topics, None).await
}

pub async fn run_stubbed_with_cancel(
    graph: &Path,
    config: &AppConfig,
    extractors: HashMap<JobKind, Arc<dyn Extractor>>,
    topics: Vec<String>,
    cancel_after: Option<Duration>,
) -> Result<RunResult, EnrichError> {
    let stats = Arc::new(RunStats::default());
    let seeds = scan_graph(graph, config, &stats)?;

    let analyze: AnalyzeFn = Arc::new(move |_: &ExtractionRecord| topics.clone());
    let scheduler = Arc::new(RateLimitedScheduler::new(
        &config.scheduler,
        config.topics.min_preview_length,
        extractors,
        analyze,
        Arc::clone(&stats),
    ));
    for seed in seeds {
        scheduler.admit(seed).await?;
    }

    if let Some(delay) = cancel_after {
        let canceller = Arc::clone(&scheduler);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            canceller.cancel();
        });
    }

    let outcome = scheduler.run().await?;
    let statuses = scheduler.job_statuses().await;

    let applier = Applier::new(graph, config, Arc::clone(&stats));
    let apply = applier.apply(outcome.pending_updates);

    Ok(RunResult {
        stats: stats.snapshot(),
        statuses,
        completed: outcome.completed,
        failed: outcome.failed,
        cancelled: outcome.cancelled,
        documents_written: apply.documents_written,
        topic_pages_written: apply.topic_pages_written,
        partial: apply.partial || outcome.cancelled,
    })
}

pub fn extractor_table(
    entries: Vec<(JobKind, Arc<StubExtractor>)>,
) -> HashMap<JobKind, Arc<dyn Extractor>> {
    entries
        .into_iter()
        .map(|(kind, stub)| (kind, stub as Arc<dyn Extractor>))
        .collect()
}

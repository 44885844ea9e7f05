//! Rate-limit-aware job scheduling.
//!
//! Jobs are admitted into three FIFO queues by priority, deduplicated by
//! job id, and executed by a fixed pool of workers. Extractor failures are
//! classified per the error taxonomy: rate limits close a per-resource
//! gate and re-queue the job with a deadline, transient failures back off
//! linearly, permanent failures bury the job. A run drains when every
//! queue is empty and no worker is executing; only then may the applier
//! consume the pending-update set.

mod gate;
mod queue;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use graphscribe_core::{
    config::SchedulerConfig, EnrichError, EnrichedItem, ExtractError, ExtractionRecord,
    Extractor, JobKind, JobStatus, NodeRef, RunStats, UrlJob,
};
use graphscribe_scanner::JobSeed;

pub use gate::GateTable;
pub use queue::JobQueues;

/// Worker nap when no job is eligible; keeps deadline polling cheap while
/// staying well under rate-limit windows.
const IDLE_SLEEP: Duration = Duration::from_millis(100);

/// Topic derivation applied to each completed record before it enters the
/// pending-update set. Injected so tests can pin the analyzer's output.
pub type AnalyzeFn = Arc<dyn Fn(&ExtractionRecord) -> Vec<String> + Send + Sync>;

/// Everything the applier needs once the scheduler has drained.
#[derive(Debug)]
pub struct SchedulerOutcome {
    pub pending_updates: HashMap<NodeRef, Vec<EnrichedItem>>,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: bool,
}

enum Step {
    Run(UrlJob),
    Idle,
    Drained,
}

pub struct RateLimitedScheduler {
    queues: Mutex<JobQueues>,
    gates: GateTable,
    /// Master job table; a job id appears in at most one terminal state.
    statuses: Mutex<HashMap<String, JobStatus>>,
    /// Fan-out: every node referencing a deduplicated job's URL.
    owners: Mutex<HashMap<String, Vec<NodeRef>>>,
    /// Append-only until drain; consumed exactly once by the applier.
    pending: Mutex<HashMap<NodeRef, Vec<EnrichedItem>>>,
    in_flight: AtomicUsize,
    cancelled: AtomicBool,
    extractors: HashMap<JobKind, Arc<dyn Extractor>>,
    analyze: AnalyzeFn,
    stats: Arc<RunStats>,
    max_concurrent: usize,
    max_retries: u32,
    default_retry_delay: Duration,
    min_preview_length: usize,
    shutdown: broadcast::Sender<()>,
}

impl RateLimitedScheduler {
    pub fn new(
        config: &SchedulerConfig,
        min_preview_length: usize,
        extractors: HashMap<JobKind, Arc<dyn Extractor>>,
        analyze: AnalyzeFn,
        stats: Arc<RunStats>,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            queues: Mutex::new(JobQueues::new(config.max_queue_size)),
            gates: GateTable::new(),
            statuses: Mutex::new(HashMap::new()),
            owners: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            extractors,
            analyze,
            stats,
            max_concurrent: config.max_concurrent.max(1),
            max_retries: config.max_retries,
            default_retry_delay: Duration::from_secs(config.retry_delay_seconds),
            min_preview_length,
            shutdown,
        }
    }

    /// Admit one seed. Identical `(kind, url)` pairs collapse onto one job;
    /// the extra owners are recorded for fan-out at completion. Returns
    /// whether a new job was created.
    pub async fn admit(&self, seed: JobSeed) -> Result<bool, EnrichError> {
        let job = UrlJob::new(seed.kind, seed.url, seed.owner.clone());
        let mut owners = self.owners.lock().await;
        if let Some(existing) = owners.get_mut(&job.job_id) {
            if !existing.contains(&seed.owner) {
                existing.push(seed.owner);
            }
            debug!(job_id = %job.job_id, "duplicate url, owner recorded");
            return Ok(false);
        }
        owners.insert(job.job_id.clone(), vec![seed.owner]);
        drop(owners);

        self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Pending);
        self.queues.lock().await.admit(job)?;
        self.stats.job_submitted();
        Ok(true)
    }

    /// Cooperative cancellation: workers finish their current extractor
    /// call, stop pulling new jobs, and the applier runs on whatever
    /// pending updates exist.
    pub fn cancel(&self) {
        let _ = self.shutdown.send(());
    }

    /// Spawn the worker pool and wait until drain: every queue empty and no
    /// worker executing. On ordinary completion every job must have reached
    /// a terminal state; anything else is an invariant violation.
    pub async fn run(self: &Arc<Self>) -> Result<SchedulerOutcome, EnrichError> {
        let queued = self.queues.lock().await.len();
        info!(workers = self.max_concurrent, jobs = queued, "starting scheduler workers");

        let mut handles = Vec::with_capacity(self.max_concurrent);
        for worker_id in 0..self.max_concurrent {
            let scheduler = Arc::clone(self);
            handles.push(tokio::spawn(scheduler.worker_loop(worker_id)));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let cancelled = self.cancelled.load(Ordering::SeqCst);
        let statuses = self.statuses.lock().await;
        let completed = statuses.values().filter(|s| **s == JobStatus::Completed).count();
        let failed = statuses.values().filter(|s| **s == JobStatus::Failed).count();
        if !cancelled {
            if let Some((job_id, status)) = statuses.iter().find(|(_, s)| !s.is_terminal()) {
                return Err(EnrichError::InvalidTransition {
                    job_id: job_id.clone(),
                    from: status.as_str(),
                    to: "terminal",
                });
            }
        }
        drop(statuses);

        let pending_updates = std::mem::take(&mut *self.pending.lock().await);
        info!(completed, failed, cancelled, "scheduler drained");
        Ok(SchedulerOutcome { pending_updates, completed, failed, cancelled })
    }

    /// Terminal-state view of the job table, for reporting and tests.
    pub async fn job_statuses(&self) -> HashMap<String, JobStatus> {
        self.statuses.lock().await.clone()
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        let mut shutdown = self.shutdown.subscribe();
        debug!(worker_id, "worker started");
        loop {
            match shutdown.try_recv() {
                Ok(()) | Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    self.cancelled.store(true, Ordering::SeqCst);
                    debug!(worker_id, "worker cancelled");
                    break;
                }
                Err(_) => {}
            }

            let now = Instant::now();
            let step = {
                let mut queues = self.queues.lock().await;
                match queues.pop_eligible(now, |kind| self.gates.is_open(kind, now)) {
                    Some(job) => {
                        // in_flight rises under the queue lock so the drain
                        // check below never races a popped job
                        self.in_flight.fetch_add(1, Ordering::SeqCst);
                        Step::Run(job)
                    }
                    None if queues.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0 => {
                        Step::Drained
                    }
                    None => Step::Idle,
                }
            };

            match step {
                Step::Drained => {
                    debug!(worker_id, "queues drained, worker stopping");
                    break;
                }
                Step::Idle => {
                    tokio::select! {
                        _ = tokio::time::sleep(IDLE_SLEEP) => {}
                        _ = shutdown.recv() => {
                            self.cancelled.store(true, Ordering::SeqCst);
                            debug!(worker_id, "worker cancelled");
                            break;
                        }
                    }
                }
                Step::Run(job) => {
                    self.execute(job, worker_id).await;
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }

    async fn execute(&self, mut job: UrlJob, worker_id: usize) {
        job.status = JobStatus::Running;
        self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Running);
        debug!(worker_id, url = %job.url, kind = %job.kind, attempt = job.attempts, "executing");

        let Some(extractor) = self.extractors.get(&job.kind).cloned() else {
            // scanner only seeds enabled kinds, so this is a wiring bug
            warn!(kind = %job.kind, "no extractor registered for kind");
            self.fail(job).await;
            return;
        };

        match extractor.extract(&job.url).await {
            Ok(record) => self.complete(job, record).await,
            Err(error) => self.handle_failure(job, error, Instant::now()).await,
        }
    }

    async fn complete(&self, job: UrlJob, record: ExtractionRecord) {
        if record
            .preview_text
            .as_ref()
            .is_some_and(|p| p.len() >= self.min_preview_length)
        {
            self.stats.preview_extracted();
        }

        let topics = (self.analyze)(&record);
        let owners = self
            .owners
            .lock()
            .await
            .get(&job.job_id)
            .cloned()
            .unwrap_or_default();
        {
            let mut pending = self.pending.lock().await;
            for owner in owners {
                pending
                    .entry(owner)
                    .or_default()
                    .push(EnrichedItem { record: record.clone(), topics: topics.clone() });
            }
        }

        self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Completed);
        self.stats.job_completed();
        info!(url = %job.url, kind = %job.kind, "job completed");
    }

    async fn handle_failure(&self, mut job: UrlJob, error: ExtractError, now: Instant) {
        match error {
            ExtractError::RateLimited { retry_after } => {
                let delay = Duration::from_secs(
                    retry_after.unwrap_or(self.default_retry_delay.as_secs()),
                );
                let until = now + delay;
                // every job bound to this resource waits out the window
                self.gates.mark_limited(job.kind, until);
                self.stats.rate_limited();
                self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::RateLimited);
                warn!(url = %job.url, kind = %job.kind, delay_s = delay.as_secs(), "rate limited");

                if job.attempts < self.max_retries {
                    job.attempts += 1;
                    job.status = JobStatus::Pending;
                    job.next_eligible_at = Some(until);
                    self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Pending);
                    self.queues.lock().await.requeue(job);
                    self.stats.retried();
                } else {
                    warn!(url = %job.url, "retry budget exhausted while rate limited");
                    self.fail(job).await;
                }
            }
            ExtractError::Transient(reason) => {
                if job.attempts < self.max_retries {
                    job.attempts += 1;
                    job.status = JobStatus::Pending;
                    job.next_eligible_at =
                        Some(now + Duration::from_secs(5 * u64::from(job.attempts)));
                    warn!(url = %job.url, attempt = job.attempts, "transient failure, will retry: {reason}");
                    self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Pending);
                    self.queues.lock().await.requeue(job);
                    self.stats.retried();
                } else {
                    warn!(url = %job.url, "transient failure, retry budget exhausted: {reason}");
                    self.fail(job).await;
                }
            }
            ExtractError::Permanent(reason) => {
                warn!(url = %job.url, kind = %job.kind, "permanent failure: {reason}");
                self.fail(job).await;
            }
        }
    }

    async fn fail(&self, job: UrlJob) {
        self.statuses.lock().await.insert(job.job_id.clone(), JobStatus::Failed);
        self.stats.job_failed();
        self.stats.error();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Extractor stub with a scripted outcome per call.
    struct ScriptedExtractor {
        kind: JobKind,
        script: StdMutex<Vec<Result<ExtractionRecord, ExtractError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedExtractor {
        fn new(kind: JobKind, script: Vec<Result<ExtractionRecord, ExtractError>>) -> Self {
            Self { kind, script: StdMutex::new(script), calls: Arc::new(AtomicUsize::new(0)) }
        }
    }

    #[async_trait]
    impl Extractor for ScriptedExtractor {
        fn kind(&self) -> JobKind {
            self.kind
        }
        async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(ExtractionRecord::new(self.kind, url, "stub"))
            } else {
                script.remove(0)
            }
        }
    }

    fn record(kind: JobKind, url: &str) -> ExtractionRecord {
        let mut r = ExtractionRecord::new(kind, url, "stub");
        r.title = Some("Stub".into());
        r
    }

    fn seed(kind: JobKind, url: &str, node: &str) -> JobSeed {
        JobSeed {
            kind,
            url: url.to_string(),
            owner: NodeRef { document: "page.md".into(), node_id: node.to_string() },
        }
    }

    fn scheduler_with(
        extractors: HashMap<JobKind, Arc<dyn Extractor>>,
        config: &SchedulerConfig,
    ) -> Arc<RateLimitedScheduler> {
        let analyze: AnalyzeFn = Arc::new(|_: &ExtractionRecord| vec!["stubbed".to_string()]);
        Arc::new(RateLimitedScheduler::new(
            config,
            100,
            extractors,
            analyze,
            Arc::new(RunStats::default()),
        ))
    }

    #[tokio::test]
    async fn duplicate_urls_share_one_job_with_fanout() {
        let stub = Arc::new(ScriptedExtractor::new(JobKind::Video, vec![]));
        let calls = stub.calls.clone();
        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(JobKind::Video, stub);
        let config = SchedulerConfig { max_concurrent: 4, ..Default::default() };
        let scheduler = scheduler_with(extractors, &config);

        assert!(scheduler.admit(seed(JobKind::Video, "https://youtu.be/a", "p#0")).await.unwrap());
        assert!(!scheduler.admit(seed(JobKind::Video, "https://youtu.be/a", "p#1")).await.unwrap());

        let outcome = scheduler.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1, "dedup means one extractor call");
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.pending_updates.len(), 2, "both owners receive the record");
    }

    #[tokio::test]
    async fn rate_limit_reschedules_then_succeeds() {
        let stub = Arc::new(ScriptedExtractor::new(
            JobKind::Video,
            vec![
                Err(ExtractError::RateLimited { retry_after: Some(1) }),
                Ok(record(JobKind::Video, "https://youtu.be/a")),
            ],
        ));
        let calls = stub.calls.clone();
        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(JobKind::Video, stub);
        let config = SchedulerConfig { max_concurrent: 2, ..Default::default() };
        let scheduler = scheduler_with(extractors, &config);

        scheduler.admit(seed(JobKind::Video, "https://youtu.be/a", "p#0")).await.unwrap();
        let started = Instant::now();
        let outcome = scheduler.run().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.completed, 1);
        assert_eq!(outcome.failed, 0);
        assert!(started.elapsed() >= Duration::from_secs(1), "second attempt waited the window");
    }

    #[tokio::test]
    async fn permanent_failures_never_retry() {
        let stub = Arc::new(ScriptedExtractor::new(
            JobKind::Pdf,
            vec![Err(ExtractError::Permanent("404".into()))],
        ));
        let calls = stub.calls.clone();
        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(JobKind::Pdf, stub);
        let config = SchedulerConfig::default();
        let scheduler = scheduler_with(extractors, &config);

        scheduler.admit(seed(JobKind::Pdf, "https://a.com/x.pdf", "p#0")).await.unwrap();
        let outcome = scheduler.run().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.pending_updates.is_empty());
        let statuses = scheduler.job_statuses().await;
        assert!(statuses.values().all(|s| s.is_terminal()));
    }

    #[tokio::test]
    async fn transient_failures_retry_up_to_budget() {
        let stub = Arc::new(ScriptedExtractor::new(
            JobKind::Video,
            vec![
                Err(ExtractError::Transient("timeout".into())),
                Err(ExtractError::Transient("timeout".into())),
                Err(ExtractError::Transient("timeout".into())),
                Err(ExtractError::Transient("timeout".into())),
            ],
        ));
        let calls = stub.calls.clone();
        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(JobKind::Video, stub);
        // shrink the backoff so the test stays fast
        let config = SchedulerConfig { max_retries: 1, ..Default::default() };
        let scheduler = scheduler_with(extractors, &config);

        scheduler.admit(seed(JobKind::Video, "https://youtu.be/a", "p#0")).await.unwrap();
        let outcome = scheduler.run().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2, "initial attempt plus one retry");
        assert_eq!(outcome.failed, 1);
    }

    #[tokio::test]
    async fn single_worker_preserves_priority_then_fifo() {
        let order: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        struct OrderRecorder {
            kind: JobKind,
            order: Arc<StdMutex<Vec<String>>>,
        }
        #[async_trait]
        impl Extractor for OrderRecorder {
            fn kind(&self) -> JobKind {
                self.kind
            }
            async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
                self.order.lock().unwrap().push(url.to_string());
                Ok(ExtractionRecord::new(self.kind, url, "stub"))
            }
        }

        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        for kind in JobKind::ALL {
            extractors.insert(kind, Arc::new(OrderRecorder { kind, order: order.clone() }));
        }
        let config = SchedulerConfig { max_concurrent: 1, ..Default::default() };
        let scheduler = scheduler_with(extractors, &config);

        scheduler.admit(seed(JobKind::Pdf, "https://a.com/1.pdf", "p#0")).await.unwrap();
        scheduler.admit(seed(JobKind::Social, "https://x.com/u/status/1", "p#1")).await.unwrap();
        scheduler.admit(seed(JobKind::Video, "https://youtu.be/a", "p#2")).await.unwrap();
        scheduler.admit(seed(JobKind::Video, "https://youtu.be/b", "p#3")).await.unwrap();
        scheduler.run().await.unwrap();

        let seen = order.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                "https://youtu.be/a",
                "https://youtu.be/b",
                "https://x.com/u/status/1",
                "https://a.com/1.pdf",
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_leaves_partial_pending_updates() {
        struct SlowExtractor {
            kind: JobKind,
        }
        #[async_trait]
        impl Extractor for SlowExtractor {
            fn kind(&self) -> JobKind {
                self.kind
            }
            async fn extract(&self, url: &str) -> Result<ExtractionRecord, ExtractError> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(ExtractionRecord::new(self.kind, url, "stub"))
            }
        }

        let mut extractors: HashMap<JobKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(JobKind::Video, Arc::new(SlowExtractor { kind: JobKind::Video }));
        let config = SchedulerConfig { max_concurrent: 1, ..Default::default() };
        let scheduler = scheduler_with(extractors, &config);

        for i in 0..20 {
            scheduler
                .admit(seed(JobKind::Video, &format!("https://youtu.be/v{i}"), &format!("p#{i}")))
                .await
                .unwrap();
        }

        let canceller = Arc::clone(&scheduler);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            canceller.cancel();
        });

        let outcome = scheduler.run().await.unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.completed >= 1, "some jobs finished before cancel");
        assert!(outcome.completed < 20, "cancel stopped the rest");
        assert_eq!(outcome.pending_updates.len(), outcome.completed);
    }
}

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::signal;
use tracing::{info, warn};

use graphscribe_apply::{backup, Applier};
use graphscribe_core::{AppConfig, ExtractionRecord, RunStats};
use graphscribe_extract::{build_extractors, build_http_client};
use graphscribe_scanner::scan_graph;
use graphscribe_scheduler::{AnalyzeFn, RateLimitedScheduler};
use graphscribe_topics::TopicAnalyzer;

use crate::report::RunReport;

/// One full run: Scan -> Queue -> Drain -> Apply -> Report. Apply happens
/// exactly once, after every job reaches a terminal state (or the run is
/// cancelled, in which case whatever completed is applied).
pub async fn run_enrich(config: AppConfig, graph: &Path) -> Result<i32> {
    let started = Instant::now();
    info!(graph = %graph.display(), "starting enrichment run");

    let stats = Arc::new(RunStats::default());

    // --- Scan ---
    let seeds = scan_graph(graph, &config, &stats)?;
    info!(seeds = seeds.len(), "scan complete");

    // --- Build the pipeline ---
    let client = build_http_client(&config.http)?;
    let extractors = build_extractors(&config, &client);

    let analyzer = Arc::new(TopicAnalyzer::new(
        config.topics.max_topics_per_item,
        &config.topics.extra_stopwords,
    ));
    let min_preview = config.topics.min_preview_length;
    let analyze: AnalyzeFn = {
        let analyzer = Arc::clone(&analyzer);
        Arc::new(move |record: &ExtractionRecord| match record.analysis_text(min_preview) {
            Some(text) => analyzer.analyze(text, record.title.as_deref(), &record.platform_tag),
            None => Vec::new(),
        })
    };

    let scheduler = Arc::new(RateLimitedScheduler::new(
        &config.scheduler,
        min_preview,
        extractors,
        analyze,
        Arc::clone(&stats),
    ));

    // --- Queue ---
    for seed in seeds {
        scheduler.admit(seed).await?;
    }

    // interrupt -> graceful cancellation; in-flight calls finish, the
    // applier still runs on the partial pending set
    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                scheduler.cancel();
            }
        });
    }
    if let Some(timeout_s) = config.scheduler.run_timeout_seconds {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(timeout_s)).await;
            warn!(timeout_s, "run timeout reached, cancelling");
            scheduler.cancel();
        });
    }

    // --- Drain ---
    let outcome = scheduler.run().await?;

    // --- Backup, then Apply ---
    let mut backup_dir = None;
    if config.general.backup_enabled
        && !config.general.dry_run
        && !outcome.pending_updates.is_empty()
    {
        match backup::create_backup(graph) {
            Ok(dir) => backup_dir = Some(dir),
            Err(e) => warn!("backup failed, apply proceeds without one: {e}"),
        }
    }

    let applier = Applier::new(graph, &config, Arc::clone(&stats));
    let apply_outcome = applier.apply(outcome.pending_updates);

    if let Some(dir) = backup_dir {
        if apply_outcome.partial {
            warn!(backup = %dir.display(), "apply was partial; backup kept for restore");
        } else {
            backup::remove_backup(&dir);
        }
    }

    // --- Report ---
    let snapshot = stats.snapshot();
    let partial = outcome.cancelled || apply_outcome.partial || snapshot.errors > 0;
    let report = RunReport {
        success: true,
        partial,
        cancelled: outcome.cancelled,
        graph: graph.display().to_string(),
        elapsed_seconds: started.elapsed().as_secs_f64(),
        stats: snapshot,
    };
    info!(
        completed = outcome.completed,
        failed = outcome.failed,
        documents = apply_outcome.documents_written,
        topic_pages = apply_outcome.topic_pages_written,
        partial,
        "run finished"
    );
    report.print();
    Ok(report.exit_code())
}

//! End-to-end scenarios against real tempdir graphs with stub extractors.

mod common;

use std::time::Duration;

use common::{extractor_table, run_stubbed, run_stubbed_with_cancel, StubExtractor};
use graphscribe_core::{AppConfig, ExtractError, JobKind};

fn topics(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|s| s.to_string()).collect()
}

/// S1: one video node; after the run the body is wrapped with metadata,
/// topic properties are stamped, and both topic pages list the source.
#[tokio::test]
async fn enriches_a_video_node_and_writes_topic_pages() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("notes.md");
    std::fs::write(&doc, "- See https://youtube.com/watch?v=abc\n").unwrap();

    let config = AppConfig::default();
    let stub = StubExtractor::ok(JobKind::Video);
    let result = run_stubbed(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, stub)]),
        topics(&["tutorial", "python"]),
    )
    .await
    .unwrap();

    assert_eq!(result.completed, 1);
    assert_eq!(result.documents_written, 1);
    assert!(!result.partial);

    let body = std::fs::read_to_string(&doc).unwrap();
    assert!(body.contains("{{video https://youtube.com/watch?v=abc}}\n  **Hello**\n  By: Ann"));
    assert!(body.contains("topic-1:: tutorial"));
    assert!(body.contains("topic-2:: python"));

    for page in ["topic-tutorial.md", "topic-python.md"] {
        let content = std::fs::read_to_string(dir.path().join(page)).unwrap();
        assert!(content.contains("[[notes]]"), "{page} must link the source node");
        assert!(content.contains("https://youtube.com/watch?v=abc"));
    }

    assert_eq!(result.stats.videos_found, 1);
    assert_eq!(result.stats.videos_enhanced, 1);
    assert_eq!(result.stats.properties_stamped, 2);
    assert_eq!(result.stats.topic_pages_written, 2);
}

/// S2: a second run over the enriched graph does no work and writes no
/// files; the URL is still counted as found.
#[tokio::test]
async fn second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("notes.md");
    std::fs::write(&doc, "- See https://youtube.com/watch?v=abc\n").unwrap();

    let config = AppConfig::default();
    let first = run_stubbed(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, StubExtractor::ok(JobKind::Video))]),
        topics(&["tutorial"]),
    )
    .await
    .unwrap();
    assert_eq!(first.stats.videos_enhanced, 1);

    let after_first = std::fs::read_to_string(&doc).unwrap();
    let stub = StubExtractor::ok(JobKind::Video);
    let second = run_stubbed(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, stub.clone())]),
        topics(&["tutorial"]),
    )
    .await
    .unwrap();

    assert_eq!(second.stats.videos_found, 1, "url inside the wrapper still counts as found");
    assert_eq!(second.stats.videos_enhanced, 0);
    assert_eq!(second.stats.jobs_submitted, 0);
    assert_eq!(second.documents_written, 0);
    assert_eq!(second.topic_pages_written, 0);
    assert_eq!(stub.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), after_first, "bit-identical after re-run");
}

/// S3: two nodes referencing the same URL share one extractor invocation
/// and both receive identical rewrites.
#[tokio::test]
async fn duplicate_urls_extract_once_and_fan_out() {
    let dir = tempfile::tempdir().unwrap();
    let doc_a = dir.path().join("alpha.md");
    let doc_b = dir.path().join("beta.md");
    std::fs::write(&doc_a, "- watch https://youtube.com/watch?v=abc\n").unwrap();
    std::fs::write(&doc_b, "- same https://youtube.com/watch?v=abc\n").unwrap();

    let config = AppConfig::default();
    let stub = StubExtractor::ok(JobKind::Video);
    let result = run_stubbed(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, stub.clone())]),
        topics(&["tutorial"]),
    )
    .await
    .unwrap();

    assert_eq!(stub.calls.load(std::sync::atomic::Ordering::SeqCst), 1, "dedup by job id");
    assert_eq!(result.stats.jobs_submitted, 1);
    assert_eq!(result.documents_written, 2);

    let a = std::fs::read_to_string(&doc_a).unwrap();
    let b = std::fs::read_to_string(&doc_b).unwrap();
    for content in [&a, &b] {
        assert!(content.contains("{{video https://youtube.com/watch?v=abc}}"));
        assert!(content.contains("topic-1:: tutorial"));
    }
}

/// S4: a Retry-After of 2 closes the video gate; the retry does not start
/// before the window lapses.
#[tokio::test]
async fn rate_limit_window_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.md"),
        "- https://youtube.com/watch?v=abc\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.md"),
        "- https://youtube.com/watch?v=abc\n",
    )
    .unwrap();

    let config = AppConfig::default();
    let stub = StubExtractor::scripted(
        JobKind::Video,
        vec![Err(ExtractError::RateLimited { retry_after: Some(2) })],
    );
    let result = run_stubbed(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, stub.clone())]),
        topics(&["tutorial"]),
    )
    .await
    .unwrap();

    assert_eq!(result.stats.jobs_submitted, 1, "same url, one job");
    assert_eq!(result.stats.rate_limited, 1);
    assert_eq!(result.stats.retried, 1);
    assert_eq!(result.completed, 1);

    let times = stub.call_times.lock().unwrap();
    assert_eq!(times.len(), 2);
    assert!(
        times[1].duration_since(times[0]) >= Duration::from_secs(2),
        "second attempt started before the retry window lapsed"
    );
}

/// S5: a disabled kind produces neither jobs nor counters and leaves the
/// node untouched.
#[tokio::test]
async fn disabled_kind_is_invisible() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("notes.md");
    let original = "- read https://example.com/doc.pdf\n";
    std::fs::write(&doc, original).unwrap();

    let mut config = AppConfig::default();
    config.pdf.enabled = false;

    let result = run_stubbed(dir.path(), &config, extractor_table(vec![]), topics(&[]))
        .await
        .unwrap();

    assert_eq!(result.stats.pdfs_found, 0);
    assert_eq!(result.stats.jobs_submitted, 0);
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), original);
}

/// S6: cancellation mid-run applies the completed subset and leaves the
/// rest untouched; the run reports partial.
#[tokio::test]
async fn cancellation_applies_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..8 {
        std::fs::write(
            dir.path().join(format!("n{i}.md")),
            format!("- https://youtube.com/watch?v=vid{i}\n"),
        )
        .unwrap();
    }

    let mut config = AppConfig::default();
    config.scheduler.max_concurrent = 1;

    let stub = StubExtractor::slow(JobKind::Video, Duration::from_millis(60));
    let result = run_stubbed_with_cancel(
        dir.path(),
        &config,
        extractor_table(vec![(JobKind::Video, stub)]),
        topics(&["tutorial"]),
        Some(Duration::from_millis(150)),
    )
    .await
    .unwrap();

    assert!(result.cancelled);
    assert!(result.partial);
    assert!(result.completed >= 1, "something finished before the cancel");
    assert!(result.completed < 8, "cancellation stopped the rest");
    assert_eq!(result.documents_written, result.completed);

    let enriched = (0..8)
        .filter(|i| {
            std::fs::read_to_string(dir.path().join(format!("n{i}.md")))
                .unwrap()
                .contains("{{video")
        })
        .count();
    assert_eq!(enriched, result.completed, "exactly the completed subset was applied");
}

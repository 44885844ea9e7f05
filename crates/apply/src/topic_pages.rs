use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{error, info};

use graphscribe_core::{EnrichedItem, JobKind, NodeRef, RunStats};
use graphscribe_outline::{serialize_page, Node, Page};

/// One enriched item's appearance under a topic: enough to link the index
/// page back to the source node.
#[derive(Debug, Clone)]
pub struct TopicSource {
    pub title: Option<String>,
    pub url: String,
    pub kind: JobKind,
    pub source_page: String,
    pub author: Option<String>,
    pub processed: String,
}

/// Group every record received this run by topic tag. Sorted maps and a
/// final sort keep the page content deterministic regardless of worker
/// interleaving.
pub(crate) fn collect_topic_sources(
    pending: &HashMap<NodeRef, Vec<EnrichedItem>>,
) -> BTreeMap<String, Vec<TopicSource>> {
    let mut by_topic: BTreeMap<String, Vec<TopicSource>> = BTreeMap::new();

    for (node_ref, items) in pending {
        let source_page = node_ref
            .document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());
        for item in items {
            let record = &item.record;
            for topic in &item.topics {
                by_topic.entry(topic.clone()).or_default().push(TopicSource {
                    title: record.title.clone(),
                    url: record.url.clone(),
                    kind: record.kind,
                    source_page: source_page.clone(),
                    author: record.author.clone().or_else(|| record.author_handle.clone()),
                    processed: record.extracted_at.format("%Y-%m-%d").to_string(),
                });
            }
        }
    }

    for sources in by_topic.values_mut() {
        sources.sort_by(|a, b| (&a.source_page, &a.url).cmp(&(&b.source_page, &b.url)));
    }
    by_topic
}

#[derive(Debug)]
pub(crate) struct TopicPageFailures {
    pub written: usize,
}

/// Emit one `<prefix>-<topic>.md` index page per topic. Existing pages are
/// overwritten; a failed write is logged and the rest still proceed.
pub(crate) fn write_topic_pages(
    root: &Path,
    prefix: &str,
    by_topic: &BTreeMap<String, Vec<TopicSource>>,
    dry_run: bool,
    stats: &Arc<RunStats>,
) -> Result<usize, TopicPageFailures> {
    let mut written = 0;
    let mut failed = false;

    for (topic, sources) in by_topic {
        let page_name = format!("{prefix}-{topic}");
        if dry_run {
            info!(page = %page_name, "dry run: would write topic page");
            continue;
        }
        let path = root.join(format!("{page_name}.md"));
        let page = build_topic_page(&page_name, topic, sources, &path);
        match std::fs::write(&path, serialize_page(&page)) {
            Ok(()) => {
                stats.topic_page_written();
                written += 1;
            }
            Err(e) => {
                error!(page = %page_name, "topic page write failed: {e}");
                stats.error();
                failed = true;
            }
        }
    }

    if failed {
        Err(TopicPageFailures { written })
    } else {
        Ok(written)
    }
}

fn build_topic_page(page_name: &str, topic: &str, sources: &[TopicSource], path: &Path) -> Page {
    let mut properties = vec![
        ("type".to_string(), "content-topic".to_string()),
        ("topic".to_string(), topic.to_string()),
        ("created".to_string(), Local::now().format("%Y-%m-%d").to_string()),
        ("item-count".to_string(), sources.len().to_string()),
    ];
    for kind in JobKind::ALL {
        let count = sources.iter().filter(|s| s.kind == kind).count();
        if count > 0 {
            properties.push((format!("{}-count", kind.as_str()), count.to_string()));
        }
    }

    let mut nodes = Vec::new();
    let mut ordinal = 0usize;
    let mut push = |body: String, depth: usize, nodes: &mut Vec<Node>| {
        nodes.push(Node {
            id: format!("{page_name}#{ordinal}"),
            body,
            properties: Vec::new(),
            depth,
        });
        ordinal += 1;
    };

    push(format!("# Content tagged with: {topic}"), 0, &mut nodes);
    push(format!("All content related to **{topic}**, collected from the graph."), 0, &mut nodes);

    for kind in JobKind::ALL {
        let kind_sources: Vec<&TopicSource> = sources.iter().filter(|s| s.kind == kind).collect();
        if kind_sources.is_empty() {
            continue;
        }
        push(
            format!("## {} content ({} items)", capitalized(kind.as_str()), kind_sources.len()),
            0,
            &mut nodes,
        );
        for (index, source) in kind_sources.iter().enumerate() {
            let title = source.title.as_deref().unwrap_or("Unknown");
            push(format!("### {}. {title}", index + 1), 1, &mut nodes);
            push(format!("**Source:** [[{}]]", source.source_page), 2, &mut nodes);
            push(format!("**URL:** {}", source.url), 2, &mut nodes);
            if let Some(author) = &source.author {
                push(format!("**Author:** {author}"), 2, &mut nodes);
            }
            push(format!("**Processed:** {}", source.processed), 2, &mut nodes);
        }
    }

    Page {
        name: page_name.to_string(),
        path: path.to_path_buf(),
        properties,
        nodes,
        is_journal: false,
    }
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

//! Two-phase result application.
//!
//! Runs exactly once, after the scheduler drains: rewrites owning nodes in
//! place ({{kind url}} wrappers plus metadata lines and topic properties),
//! then emits one topic-index page per topic touched this run. Individual
//! file-write failures are logged and counted; they never abort the rest
//! of the run.

pub mod backup;
mod topic_pages;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info};

use graphscribe_core::{AppConfig, EnrichedItem, JobKind, NodeRef, RunStats};
use graphscribe_outline::{serialize_page, Node};

pub use topic_pages::TopicSource;

/// Social post bodies are clipped to this many characters in node metadata
/// lines; the analyzer already saw the full text.
const BODY_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub documents_written: usize,
    pub topic_pages_written: usize,
    /// Set when any individual write failed; the run reports partial.
    pub partial: bool,
}

pub struct Applier {
    root: PathBuf,
    property_prefix: String,
    dry_run: bool,
    stats: Arc<RunStats>,
}

impl Applier {
    pub fn new(root: &Path, config: &AppConfig, stats: Arc<RunStats>) -> Self {
        Self {
            root: root.to_path_buf(),
            property_prefix: config.general.property_prefix.clone(),
            dry_run: config.general.dry_run,
            stats,
        }
    }

    /// Consume the pending-update set once. Node rewrites come first, then
    /// the topic-index pages; writes to distinct files are independent.
    pub fn apply(&self, pending: HashMap<NodeRef, Vec<EnrichedItem>>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();
        if pending.is_empty() {
            info!("no pending updates, nothing to apply");
            return outcome;
        }

        // topic pages cover every record received this run, applied or not
        let topic_sources = topic_pages::collect_topic_sources(&pending);

        // deterministic document order
        let mut by_document: BTreeMap<PathBuf, Vec<(&NodeRef, &Vec<EnrichedItem>)>> =
            BTreeMap::new();
        for (node_ref, items) in &pending {
            by_document
                .entry(node_ref.document.clone())
                .or_default()
                .push((node_ref, items));
        }

        for (document, mut updates) in by_document {
            updates.sort_by(|a, b| a.0.node_id.cmp(&b.0.node_id));
            match self.apply_document(&document, &updates) {
                Ok(true) => outcome.documents_written += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(document = %document.display(), "apply failed: {e}");
                    self.stats.error();
                    outcome.partial = true;
                }
            }
        }

        match topic_pages::write_topic_pages(
            &self.root,
            &self.property_prefix,
            &topic_sources,
            self.dry_run,
            &self.stats,
        ) {
            Ok(written) => outcome.topic_pages_written = written,
            Err(failures) => {
                outcome.topic_pages_written = failures.written;
                outcome.partial = true;
            }
        }

        outcome
    }

    /// Rewrite one document's nodes. Returns whether the file was written.
    fn apply_document(
        &self,
        document: &Path,
        updates: &[(&NodeRef, &Vec<EnrichedItem>)],
    ) -> Result<bool, graphscribe_core::EnrichError> {
        let mut page = graphscribe_outline::parse_page(document)?;
        let mut dirty = false;

        for (node_ref, items) in updates {
            let Some(node) = page.node_mut(&node_ref.node_id) else {
                debug!(node = %node_ref.node_id, "node vanished between scan and apply");
                continue;
            };
            if node.has_property_prefix(&self.property_prefix) {
                debug!(node = %node_ref.node_id, "node already enriched, skipping");
                continue;
            }
            for item in *items {
                if self.enhance_node(node, item) {
                    dirty = true;
                }
            }
        }

        if !dirty {
            return Ok(false);
        }
        if self.dry_run {
            info!(document = %document.display(), "dry run: would rewrite document");
            return Ok(false);
        }
        std::fs::write(document, serialize_page(&page))?;
        info!(document = %document.display(), "document rewritten");
        Ok(true)
    }

    /// Replace the bare URL with its wrapper block and stamp the topic
    /// properties. Idempotent: URLs already inside a `{{...}}` wrapper are
    /// left alone.
    fn enhance_node(&self, node: &mut Node, item: &EnrichedItem) -> bool {
        let record = &item.record;
        if url_is_wrapped(&node.body, &record.url) {
            debug!(url = %record.url, "url already wrapped, skipping");
            return false;
        }
        if !node.body.contains(&record.url) {
            debug!(url = %record.url, "url no longer present in node body");
            return false;
        }

        let block = build_wrapper_block(item);
        node.body = node.body.replace(&record.url, &block);
        self.stats.enhanced(record.kind);

        let mut stamped = 0u64;
        for (index, topic) in item.topics.iter().enumerate() {
            node.set_property(format!("{}-{}", self.property_prefix, index + 1), topic.clone());
            stamped += 1;
        }
        self.stats.properties_stamped(stamped);
        true
    }
}

/// Is any occurrence of `url` already inside a `{{...}}` wrapper?
fn url_is_wrapped(body: &str, url: &str) -> bool {
    body.match_indices(url).any(|(idx, _)| {
        let before = &body[..idx];
        let after = &body[idx + url.len()..];
        let opened = match before.rfind("{{") {
            Some(open) => !before[open..].contains("}}"),
            None => false,
        };
        let closed = match after.find("}}") {
            Some(close) => !after[..close].contains("{{"),
            None => false,
        };
        opened && closed
    })
}

/// The structured block that replaces a bare URL: `{{kind url}}` followed
/// by indented metadata lines.
fn build_wrapper_block(item: &EnrichedItem) -> String {
    let record = &item.record;
    let mut block = format!("{{{{{} {}}}}}", record.kind.wrapper_tag(), record.url);

    match record.kind {
        JobKind::Video => {
            if let Some(title) = &record.title {
                block.push_str(&format!("\n  **{title}**"));
            }
            if let Some(author) = &record.author {
                block.push_str(&format!("\n  By: {author}"));
            }
            if let Some(duration) = &record.duration {
                block.push_str(&format!("\n  Duration: {duration}"));
            }
        }
        JobKind::Social => {
            if let Some(title) = &record.title {
                block.push_str(&format!("\n  **{title}**"));
            }
            if let Some(handle) = &record.author_handle {
                block.push_str(&format!("\n  By: {handle}"));
            }
            if let Some(body) = &record.preview_text {
                block.push_str(&format!("\n  {}", snippet(body)));
            }
        }
        JobKind::Pdf => {
            if let Some(title) = &record.title {
                block.push_str(&format!("\n  **{title}**"));
            }
            if let Some(author) = &record.author {
                block.push_str(&format!("\n  Author: {author}"));
            }
            if let Some(pages) = record.page_count {
                block.push_str(&format!("\n  Pages: {pages}"));
            }
            if let Some(bytes) = record.size_bytes {
                block.push_str(&format!("\n  Size: {:.2} MB", bytes as f64 / (1024.0 * 1024.0)));
            }
        }
    }

    block
}

fn snippet(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= BODY_SNIPPET_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(BODY_SNIPPET_CHARS).collect();
    format!("{cut}...")
}

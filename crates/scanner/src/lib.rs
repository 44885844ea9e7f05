//! Graph scanning: enumerate content nodes and classify embedded URLs.
//!
//! The scanner is side-effect-free on the graph. It emits one job seed per
//! unique `(node, url, kind)` triple whose owning node has not been
//! enriched on a previous run.

pub mod classify;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use graphscribe_core::{AppConfig, EnrichError, JobKind, NodeRef, RunStats, BACKUP_DIR_PREFIX};

pub use classify::{classify_node_urls, classify_url};

/// One unit of discovered work, ready for scheduler admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSeed {
    pub kind: JobKind,
    pub url: String,
    pub owner: NodeRef,
}

fn kind_enabled(config: &AppConfig, kind: JobKind) -> bool {
    match kind {
        JobKind::Video => config.video.enabled,
        JobKind::Social => config.social.enabled,
        JobKind::Pdf => config.pdf.enabled,
    }
}

/// Collect every `.md` document under `root`, skipping dot-files, the
/// configured system directories and backup scratch dirs. Sorted for a
/// deterministic scan order.
fn collect_documents(root: &Path, skip_dirs: &[String]) -> Result<Vec<PathBuf>, EnrichError> {
    let mut documents = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), "unreadable directory, skipping: {e}");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                if skip_dirs.iter().any(|s| *s == name) || name.starts_with(BACKUP_DIR_PREFIX) {
                    continue;
                }
                pending.push(path);
            } else if name.ends_with(".md") {
                documents.push(path);
            }
        }
    }

    documents.sort();
    Ok(documents)
}

/// Walk the graph and emit job seeds. Unreadable or unparseable files are
/// logged and skipped; malformed URLs are discarded by the classifier.
pub fn scan_graph(
    root: &Path,
    config: &AppConfig,
    stats: &RunStats,
) -> Result<Vec<JobSeed>, EnrichError> {
    if !root.exists() {
        return Err(EnrichError::GraphPath(root.display().to_string()));
    }

    let prefix = &config.general.property_prefix;
    let mut seeds = Vec::new();

    for document in collect_documents(root, &config.general.skip_dirs)? {
        let page = match graphscribe_outline::parse_page(&document) {
            Ok(p) => p,
            Err(e) => {
                warn!(document = %document.display(), "skipping unreadable document: {e}");
                stats.error();
                continue;
            }
        };

        // topic-index pages quote the URLs they group; scanning them would
        // re-enrich derived content on every run
        if page
            .properties
            .iter()
            .any(|(k, v)| k == "type" && v == "content-topic")
        {
            continue;
        }

        for node in &page.nodes {
            stats.node_scanned();

            let urls: Vec<_> = classify_node_urls(&node.body)
                .into_iter()
                .filter(|(_, kind)| kind_enabled(config, *kind))
                .collect();
            if urls.is_empty() {
                continue;
            }

            for (_, kind) in &urls {
                stats.found(*kind);
            }

            // already-enriched nodes are counted but produce no work
            if node.has_property_prefix(prefix) {
                debug!(node = %node.id, "node already enriched, skipping");
                continue;
            }

            for (url, kind) in urls {
                seeds.push(JobSeed {
                    kind,
                    url,
                    owner: NodeRef { document: document.clone(), node_id: node.id.clone() },
                });
            }
        }
    }

    Ok(seeds)
}

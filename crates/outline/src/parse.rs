use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::page::{Node, Page};

static PROPERTY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_-]+)::\s*(.*)$").unwrap());

/// Indentation level of a bullet line: tabs count one level each, otherwise
/// two spaces per level.
fn indent_level(line: &str) -> usize {
    let tabs = line.chars().take_while(|c| *c == '\t').count();
    if tabs > 0 {
        return tabs;
    }
    let spaces = line.len() - line.trim_start_matches(' ').len();
    spaces / 2
}

pub(crate) fn parse_content(content: &str, name: &str, path: &Path) -> Page {
    let mut page = Page {
        name: name.to_string(),
        path: path.to_path_buf(),
        properties: Vec::new(),
        nodes: Vec::new(),
        is_journal: crate::is_journal_name(name),
    };

    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;
    let mut ordinal = 0usize;
    let mut in_fence = false;

    while i < lines.len() {
        let line = lines[i];
        let stripped = line.trim_start_matches([' ', '\t']);

        if stripped.is_empty() {
            i += 1;
            continue;
        }

        if let Some(rest) = stripped.strip_prefix("- ").or_else(|| {
            // a bare "-" bullet is an empty node
            (stripped == "-").then_some("")
        }) {
            if !in_fence {
                let depth = indent_level(line);
                page.nodes.push(Node {
                    id: format!("{name}#{ordinal}"),
                    body: rest.to_string(),
                    properties: Vec::new(),
                    depth,
                });
                ordinal += 1;
                if rest.trim_start().starts_with("```") {
                    in_fence = true;
                }
                i += 1;
                continue;
            }
        }

        match page.nodes.last_mut() {
            None => {
                // before the first bullet: page properties only
                if let Some(caps) = PROPERTY_RE.captures(stripped) {
                    page.properties
                        .push((caps[1].to_lowercase(), caps[2].trim().to_string()));
                }
                // anything else before the first bullet is ignored
            }
            Some(node) => {
                if !in_fence {
                    if let Some(caps) = PROPERTY_RE.captures(stripped) {
                        node.properties
                            .push((caps[1].to_lowercase(), caps[2].trim().to_string()));
                        i += 1;
                        continue;
                    }
                }
                // body continuation: keep indentation relative to the bullet
                let base = node.depth * 2;
                let cont = strip_indent(line, base);
                node.body.push('\n');
                node.body.push_str(cont);
                if cont.trim_start().starts_with("```") {
                    in_fence = !in_fence;
                }
            }
        }
        i += 1;
    }

    page
}

/// Remove up to `base` leading space-equivalents (a tab counts as two).
fn strip_indent(line: &str, base: usize) -> &str {
    let mut removed = 0;
    let mut idx = 0;
    for (pos, c) in line.char_indices() {
        if removed >= base {
            break;
        }
        match c {
            ' ' => removed += 1,
            '\t' => removed += 2,
            _ => break,
        }
        idx = pos + c.len_utf8();
    }
    &line[idx..]
}

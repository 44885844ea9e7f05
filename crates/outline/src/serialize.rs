use crate::page::Page;

/// Serialize a page back to its on-disk form. Inverse of parsing for every
/// document this tool produces: page properties first, then each node as a
/// bullet with continuation lines and `key:: value` property lines indented
/// under it.
pub fn serialize_page(page: &Page) -> String {
    let mut out = String::new();

    for (key, value) in &page.properties {
        out.push_str(key);
        out.push_str(":: ");
        out.push_str(value);
        out.push('\n');
    }
    if !page.properties.is_empty() {
        out.push('\n');
    }

    for node in &page.nodes {
        let indent = "  ".repeat(node.depth);
        let mut lines = node.body.lines();
        let first = lines.next().unwrap_or("");
        out.push_str(&indent);
        out.push_str("- ");
        out.push_str(first);
        out.push('\n');
        for cont in lines {
            out.push_str(&indent);
            out.push_str(cont);
            out.push('\n');
        }
        for (key, value) in &node.properties {
            out.push_str(&indent);
            out.push_str("  ");
            out.push_str(key);
            out.push_str(":: ");
            out.push_str(value);
            out.push('\n');
        }
    }

    out
}

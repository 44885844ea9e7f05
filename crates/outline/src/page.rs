use std::path::PathBuf;

/// One leaf unit of outline content. Loaded by the scanner, mutated only by
/// the applier, never shared across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Stable within a parse: `<page name>#<ordinal>` in document order.
    pub id: String,
    /// First line is the bullet text; continuation lines keep their
    /// indentation relative to the bullet.
    pub body: String,
    /// `key:: value` pairs in file order.
    pub properties: Vec<(String, String)>,
    pub depth: usize,
}

impl Node {
    /// A node is already-enriched once any property key carries the topic
    /// prefix; such nodes are skipped by scanner and applier alike.
    pub fn has_property_prefix(&self, prefix: &str) -> bool {
        let dashed = format!("{prefix}-");
        self.properties.iter().any(|(k, _)| k.starts_with(&dashed))
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value.into(),
            None => self.properties.push((key, value.into())),
        }
    }
}

/// One outline document: page-level properties plus its nodes in document
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub name: String,
    pub path: PathBuf,
    pub properties: Vec<(String, String)>,
    pub nodes: Vec<Node>,
    pub is_journal: bool,
}

impl Page {
    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_prefix_detection() {
        let node = Node {
            id: "p#0".into(),
            body: "text".into(),
            properties: vec![("topic-1".into(), "rust".into())],
            depth: 0,
        };
        assert!(node.has_property_prefix("topic"));
        assert!(!node.has_property_prefix("tag"));
        // "topical" must not count as the "topic" prefix
        let other = Node {
            id: "p#1".into(),
            body: "text".into(),
            properties: vec![("topical".into(), "x".into())],
            depth: 0,
        };
        assert!(!other.has_property_prefix("topic"));
    }

    #[test]
    fn set_property_overwrites_in_place() {
        let mut node = Node { id: "p#0".into(), body: String::new(), properties: vec![], depth: 0 };
        node.set_property("topic-1", "rust");
        node.set_property("topic-1", "tokio");
        assert_eq!(node.properties, vec![("topic-1".to_string(), "tokio".to_string())]);
    }
}

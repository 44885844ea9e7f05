//! Topic derivation from extracted text.
//!
//! The analyzer is pure and deterministic: the same input always yields the
//! same ordered tag list. Candidates are pooled from several heuristics,
//! scored with a fixed formula, deduplicated by word root, and truncated to
//! the configured cap.

mod stopwords;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Fixed rubric of domain categories. A category fires when any of its
/// keywords appears in the analysis text.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("technology", &["tech", "software", "computer", "programming", "code", "app", "digital", "ai", "machine learning", "algorithm", "data", "python", "javascript"]),
    ("science", &["science", "research", "study", "experiment", "theory", "discovery", "analysis", "physics", "chemistry", "biology", "medical"]),
    ("education", &["learn", "teach", "lesson", "course", "tutorial", "guide", "explain", "instruction", "knowledge", "skill", "university", "school"]),
    ("business", &["business", "company", "market", "finance", "money", "economy", "startup", "entrepreneur", "sales", "management", "strategy"]),
    ("health", &["health", "medical", "doctor", "medicine", "treatment", "wellness", "fitness", "exercise", "nutrition", "diet", "mental health"]),
    ("entertainment", &["music", "movie", "game", "show", "entertainment", "fun", "comedy", "drama", "performance", "art", "creative"]),
    ("news", &["news", "current", "event", "politics", "government", "election", "policy", "international", "breaking", "report", "journalism"]),
    ("lifestyle", &["lifestyle", "fashion", "travel", "food", "cooking", "home", "family", "personal", "daily", "routine", "culture"]),
    ("social", &["social", "community", "discussion", "opinion", "debate", "communication", "network", "relationship", "society"]),
    ("academic", &["paper", "journal", "academic", "research", "publication", "thesis", "conference", "peer review", "citation", "scholarly"]),
];

/// Curated two-word domain terms admitted as bigrams regardless of
/// frequency.
const DOMAIN_TERMS: &[(&str, &str)] = &[
    ("machine", "learning"), ("deep", "learning"), ("data", "science"),
    ("natural", "language"), ("computer", "vision"), ("neural", "network"),
    ("artificial", "intelligence"), ("software", "engineering"),
    ("web", "development"), ("cloud", "computing"), ("big", "data"),
    ("business", "intelligence"), ("data", "analysis"), ("time", "series"),
    ("reinforcement", "learning"), ("computer", "science"), ("machine", "vision"),
    ("quantum", "computing"), ("distributed", "systems"), ("operating", "system"),
];

/// Markers that tag a document preview as academic material.
const ACADEMIC_MARKERS: &[&str] = &[
    "abstract", "introduction", "methodology", "results", "conclusion",
    "references", "doi", "journal", "volume", "issue",
];

static WORD3_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{3,}\b").unwrap());
static WORD4_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]{4,}\b").unwrap());
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());
static CAPITALIZED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[A-Z][a-z]{2,}\b").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"'\s]{4,})["']"#).unwrap());
static TECHNICAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d|api|sql|http|tech|data").unwrap());

pub struct TopicAnalyzer {
    max_topics: usize,
    stopwords: HashSet<String>,
    domain_terms: HashSet<(&'static str, &'static str)>,
}

impl TopicAnalyzer {
    pub fn new(max_topics: usize, extra_stopwords: &[String]) -> Self {
        let mut stopwords: HashSet<String> =
            stopwords::ENGLISH.iter().map(|s| s.to_string()).collect();
        stopwords.extend(extra_stopwords.iter().map(|s| s.to_lowercase()));
        Self {
            max_topics,
            stopwords,
            domain_terms: DOMAIN_TERMS.iter().copied().collect(),
        }
    }

    /// Derive up to `max_topics` ranked tags from `content`. The title is
    /// weighted by duplication in the analysis blob; `platform` selects
    /// platform-specific candidate hooks.
    pub fn analyze(&self, content: &str, title: Option<&str>, platform: &str) -> Vec<String> {
        if content.is_empty() {
            return Vec::new();
        }

        let title_part = title.unwrap_or("");
        let full_text = format!("{title_part} {title_part} {content}").to_lowercase();

        // BTreeSet keeps candidate iteration order stable
        let mut candidates: BTreeSet<String> = BTreeSet::new();
        candidates.extend(self.category_hits(&full_text));
        candidates.extend(self.key_phrases(&full_text));
        candidates.extend(self.frequent_words(&full_text));
        match platform {
            "x-twitter" => candidates.extend(self.hashtags(content)),
            "pdf" => {
                if ACADEMIC_MARKERS.iter().any(|m| full_text.contains(m)) {
                    candidates.insert("academic".to_string());
                }
            }
            _ => {}
        }
        if let Some(t) = title {
            candidates.extend(self.title_tokens(t));
        }

        self.rank(candidates, &full_text, title)
    }

    fn category_hits(&self, text: &str) -> Vec<String> {
        CATEGORIES
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Adjacent non-stopword bigrams/trigrams: admitted when they repeat,
    /// or (bigrams) when they are curated domain terms.
    fn key_phrases(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = WORD3_RE.find_iter(text).map(|m| m.as_str()).collect();
        let mut phrases = Vec::new();

        for pair in words.windows(2) {
            let (w1, w2) = (pair[0], pair[1]);
            if self.is_stopword(w1) || self.is_stopword(w2) {
                continue;
            }
            let spaced = format!("{w1} {w2}");
            if text.matches(&spaced).count() >= 2 || self.domain_terms.contains(&(w1, w2)) {
                phrases.push(format!("{w1}-{w2}"));
            }
        }

        for triple in words.windows(3) {
            let (w1, w2, w3) = (triple[0], triple[1], triple[2]);
            if self.is_stopword(w1) || self.is_stopword(w2) || self.is_stopword(w3) {
                continue;
            }
            let spaced = format!("{w1} {w2} {w3}");
            if text.matches(&spaced).count() >= 2 {
                phrases.push(format!("{w1}-{w2}-{w3}"));
            }
        }

        phrases
    }

    /// Single tokens scored by a term-frequency heuristic; the top scorers
    /// that repeat at least twice enter the candidate pool.
    fn frequent_words(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = WORD4_RE.find_iter(text).map(|m| m.as_str()).collect();
        if words.is_empty() {
            return Vec::new();
        }
        let total = words.len() as f64;

        let mut freq: BTreeMap<&str, usize> = BTreeMap::new();
        for w in &words {
            if !self.is_stopword(w) {
                *freq.entry(w).or_insert(0) += 1;
            }
        }

        let mut scored: Vec<(&str, f64)> = freq
            .iter()
            .map(|(word, count)| {
                let tf = 1.0 + (*count as f64 / total) * 100.0;
                let variants = freq.keys().filter(|w| w.starts_with(&word[..4])).count();
                (*word, tf * (1.0 + variants as f64 * 0.1))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        scored
            .into_iter()
            .take(15)
            .filter(|(word, _)| freq[word] >= 2)
            .map(|(word, _)| word.to_string())
            .collect()
    }

    fn hashtags(&self, content: &str) -> Vec<String> {
        HASHTAG_RE
            .captures_iter(content)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase())
            .filter(|t| t.len() >= 3)
            .collect()
    }

    /// Capitalized words and quoted phrases from the title.
    fn title_tokens(&self, title: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for m in CAPITALIZED_RE.find_iter(title) {
            let w = m.as_str().to_lowercase();
            if !self.is_stopword(&w) {
                tokens.push(w);
            }
        }
        for c in QUOTED_RE.captures_iter(title) {
            let w = c[1].to_lowercase();
            if !self.is_stopword(&w) {
                tokens.push(w);
            }
        }
        tokens
    }

    fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Fixed ranking formula, root-aware dedup, lexicographic tie-break.
    fn rank(&self, candidates: BTreeSet<String>, text: &str, title: Option<&str>) -> Vec<String> {
        let title_lower = title.map(|t| t.to_lowercase()).unwrap_or_default();
        let total_tokens = text.split_whitespace().count();
        let category_names: HashSet<&str> = CATEGORIES.iter().map(|(n, _)| *n).collect();

        let mut scored: Vec<(i64, String)> = Vec::new();
        for tag in candidates {
            let clean = tag.replace('-', " ");
            let freq = text.matches(&clean).count() as i64;
            let word_count = tag.split('-').count() as i64;

            let mut score = freq * 2;
            if !title_lower.is_empty() && title_lower.contains(&clean) {
                score += 10;
            }
            if category_names.contains(tag.as_str()) {
                score += 5;
            }
            score += word_count * 2;
            if word_count == 2 {
                let mut parts = tag.split('-');
                let (w1, w2) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                if self.domain_terms.iter().any(|(a, b)| *a == w1 && *b == w2) {
                    score += 8;
                }
            }
            if freq as usize > total_tokens / 20 {
                score -= 3;
            }
            if TECHNICAL_RE.is_match(&clean) {
                score += 2;
            }

            let score = score.max(0);
            if score >= 1 {
                scored.push((score, tag));
            }
        }

        // highest score first; equal scores resolve lexicographically
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut out = Vec::new();
        let mut seen_roots: HashSet<String> = HashSet::new();
        for (_, tag) in scored {
            let root = tag.split('-').next().unwrap_or(&tag).to_string();
            if seen_roots.contains(&root) && !tag.contains('-') {
                continue;
            }
            seen_roots.insert(root);
            out.push(tag);
            if out.len() == self.max_topics {
                break;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> TopicAnalyzer {
        TopicAnalyzer::new(3, &[])
    }

    #[test]
    fn deterministic_across_calls() {
        let text = "Machine learning systems process data. Machine learning \
                    models need data pipelines and careful evaluation metrics.";
        let a = analyzer().analyze(text, Some("Machine Learning Intro"), "video");
        let b = analyzer().analyze(text, Some("Machine Learning Intro"), "video");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn empty_content_yields_nothing() {
        assert!(analyzer().analyze("", Some("Title"), "video").is_empty());
    }

    #[test]
    fn curated_bigram_survives_single_occurrence() {
        let topics = analyzer().analyze(
            "An overview of machine learning for beginners",
            None,
            "video",
        );
        assert!(topics.contains(&"machine-learning".to_string()), "{topics:?}");
    }

    #[test]
    fn category_fires_on_keyword() {
        let topics = analyzer().analyze(
            "a long tutorial about cooking pasta and cooking sauces at home",
            Some("Cooking tutorial"),
            "video",
        );
        assert!(topics.iter().any(|t| t == "education" || t == "lifestyle"), "{topics:?}");
    }

    #[test]
    fn hashtags_only_on_social() {
        let content = "Shipping the new release today #rustlang #async";
        let social = analyzer().analyze(content, None, "x-twitter");
        assert!(social.contains(&"rustlang".to_string()), "{social:?}");
        let video = analyzer().analyze(content, None, "youtube");
        assert!(!video.contains(&"rustlang".to_string()));
    }

    #[test]
    fn academic_marker_tags_pdf() {
        let preview = "Abstract. We present results and a conclusion with references.";
        let topics = analyzer().analyze(preview, None, "pdf");
        assert!(topics.contains(&"academic".to_string()), "{topics:?}");
    }

    #[test]
    fn cap_respected() {
        let text = "python programming tutorial about python programming and \
                    data science with machine learning plus neural network design \
                    for computer vision research";
        let topics = TopicAnalyzer::new(2, &[]).analyze(text, Some("Python Tutorial"), "video");
        assert!(topics.len() <= 2);
    }

    #[test]
    fn root_dedup_prefers_higher_score() {
        // "learning" alone and "machine-learning": the multi-word tag always
        // passes, the bare token claims the root only once
        let text = "machine learning and more machine learning on learning systems";
        let topics = analyzer().analyze(text, None, "video");
        let singles: Vec<_> = topics.iter().filter(|t| !t.contains('-')).collect();
        let mut roots: Vec<&str> =
            singles.iter().map(|t| t.split('-').next().unwrap()).collect();
        roots.sort();
        let before = roots.len();
        roots.dedup();
        assert_eq!(before, roots.len(), "single-token roots must be unique: {topics:?}");
    }

    #[test]
    fn no_stopword_tags() {
        let text = "the the the and and for with this that have been very very";
        assert!(analyzer().analyze(text, None, "video").is_empty());
    }
}

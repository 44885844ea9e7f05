/// English stopwords filtered from every candidate pool. Extended at
/// runtime via configuration.
pub const ENGLISH: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
    "by", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must",
    "can", "this", "that", "these", "those", "i", "you", "he", "she", "it", "we",
    "they", "me", "him", "her", "us", "them", "my", "your", "his", "its",
    "our", "their", "what", "where", "when", "why", "how", "who", "which", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "now",
    "here", "there", "then", "also", "just", "like", "get", "go", "know", "see",
    "come", "think", "take", "want", "use", "make", "way", "time", "people",
];

use std::collections::BTreeSet;

/// Match `text` against the relevance vocabulary. Case-insensitive substring
/// match, results in vocabulary order, membership only — repeated mentions
/// don't weight anything.
pub fn extract_topics(text: &str, vocabulary: &[String]) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = BTreeSet::new();
    vocabulary
        .iter()
        .filter(|topic| {
            let t = topic.to_lowercase();
            !t.is_empty() && lowered.contains(t.as_str()) && seen.insert(t)
        })
        .cloned()
        .collect()
}

/// Jaccard distance between two topic sets: `1 − |∩|/|∪|`.
///
/// A topicless root drifts nowhere (0.0 — nothing to drift from), while a
/// topicless branch under a focused root sits at exactly 0.5: neither on-
/// nor off-topic, just silent.
pub fn topic_drift(root_topics: &[String], branch_topics: &[String]) -> f64 {
    if root_topics.is_empty() {
        return 0.0;
    }
    if branch_topics.is_empty() {
        return 0.5;
    }

    let root: BTreeSet<String> = root_topics.iter().map(|t| t.to_lowercase()).collect();
    let branch: BTreeSet<String> = branch_topics.iter().map(|t| t.to_lowercase()).collect();
    let intersection = root.intersection(&branch).count();
    let union = root.union(&branch).count();

    1.0 - intersection as f64 / union as f64
}

/// Drift of a branch's accumulated text relative to precomputed root topics.
pub fn drift_from_text(root_topics: &[String], branch_text: &str, vocabulary: &[String]) -> f64 {
    let branch_topics = extract_topics(branch_text, vocabulary);
    topic_drift(root_topics, &branch_topics)
}

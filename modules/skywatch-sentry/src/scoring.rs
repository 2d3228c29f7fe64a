use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use skywatch_common::Branch;

/// Topic-relevance component of a thread's overall score, from the number of
/// vocabulary matches in the root text.
pub fn root_topic_score(match_count: usize) -> f64 {
    match match_count {
        0 => 0.0,
        1 => 10.0,
        2 | 3 => 20.0,
        _ => 30.0,
    }
}

/// Thread-dynamics component: how much of a conversation this actually is.
/// Very large threads lose points — piling on a viral post is not a dialogue.
pub fn dynamics_score(total_replies: u32, our_replies: u32, branch_count: usize) -> f64 {
    let mut score: f64 = 0.0;

    if our_replies >= 3 {
        score += 15.0;
    } else if our_replies >= 1 {
        score += 8.0;
    }

    if branch_count >= 3 {
        score += 10.0;
    } else if branch_count >= 2 {
        score += 5.0;
    }

    if (3..=30).contains(&total_replies) {
        score += 5.0;
    } else if total_replies > 30 {
        score -= 5.0;
    }

    score.clamp(0.0, 100.0)
}

/// Relevance of one branch, in [0,100].
///
/// An engaged participant suspends the drift penalty entirely: an ongoing
/// personal exchange is not abandoned just because it wandered off-topic.
pub fn score_branch(
    branch: &Branch,
    participant_scores: &HashMap<String, f64>,
    engaged_participants: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> f64 {
    let engaged_here = branch
        .participant_dids()
        .any(|did| engaged_participants.contains(did));

    let topicality = if engaged_here {
        40.0
    } else {
        40.0 * (1.0 - branch.topic_drift)
    };

    let scored: Vec<f64> = branch
        .participant_dids()
        .filter_map(|did| participant_scores.get(did))
        .copied()
        .collect();
    let interlocutor = if scored.is_empty() {
        0.0
    } else {
        scored.iter().sum::<f64>() / scored.len() as f64 * 0.75
    };

    let messages = if branch.message_count >= 5 {
        20.0
    } else if branch.message_count >= 3 {
        15.0
    } else if branch.message_count >= 2 {
        10.0
    } else {
        0.0
    };

    let age = now - branch.last_activity_at;
    let recency = if age < chrono::Duration::hours(1) {
        10.0
    } else if age < chrono::Duration::hours(6) {
        5.0
    } else {
        0.0
    };

    (topicality + interlocutor + messages + recency).clamp(0.0, 100.0)
}

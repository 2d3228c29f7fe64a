use std::collections::BTreeSet;
use std::fmt::Write;

use skywatch_common::{Branch, JobPayload, JobSchedule, MonitorJob, TrackedThread, WatchConfig};

use crate::backoff::interval_ms;

/// Drift thresholds for briefing annotations.
const DRIFT_ON_TOPIC: f64 = 0.3;
const DRIFT_OFF_TOPIC: f64 = 0.7;

/// How a branch reads in the briefing: an engaged exchange trumps any drift
/// label.
pub fn classify_branch(branch: &Branch, engaged: &BTreeSet<String>) -> &'static str {
    if branch.participant_dids().any(|did| engaged.contains(did)) {
        "engaged"
    } else if branch.topic_drift < DRIFT_ON_TOPIC {
        "on-topic"
    } else if branch.topic_drift < DRIFT_OFF_TOPIC {
        "drifting"
    } else {
        "off-topic"
    }
}

/// Produce the declarative job description for the external scheduler.
/// Pure: no I/O, no clock reads, no side effects.
pub fn monitor_job(thread: &TrackedThread, config: &WatchConfig) -> MonitorJob {
    MonitorJob {
        name: format!("watch-thread-{}", rkey(&thread.root_uri)),
        schedule: JobSchedule {
            kind: "every".to_string(),
            interval_ms: interval_ms(thread.backoff_level, config),
        },
        payload: JobPayload {
            message: briefing(thread),
            deliver: true,
            channel: config.deliver_channel.clone(),
            to: config.deliver_to.clone(),
        },
        enabled: thread.enabled,
    }
}

/// Human-readable monitoring briefing: what the thread is, which branches
/// matter, and what we already said there (for self-consistency checks by
/// whoever drafts the next reply).
pub fn briefing(thread: &TrackedThread) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Thread by @{}: {}", thread.root_author, thread.root_text);
    if thread.root_topics.is_empty() {
        let _ = writeln!(out, "Topics: (none recognized)");
    } else {
        let _ = writeln!(out, "Topics: {}", thread.root_topics.join(", "));
    }
    let _ = writeln!(
        out,
        "Score {:.0}, {} replies from us, {} branch(es)",
        thread.clamped_score(),
        thread.our_reply_count,
        thread.branches.len()
    );

    for branch in thread.branches.values() {
        let who: Vec<&str> = branch.participants.iter().map(|p| p.handle.as_str()).collect();
        let _ = writeln!(
            out,
            "- {} [{}]: {} msgs with {}, drift {:.2}, score {:.0}",
            rkey(&branch.anchor_uri),
            classify_branch(branch, &thread.engaged_participants),
            branch.message_count,
            if who.is_empty() { "(nobody yet)".to_string() } else { who.join(", ") },
            branch.topic_drift,
            branch.score,
        );
    }

    if !thread.recent_replies.is_empty() {
        let _ = writeln!(out, "Our recent replies:");
        for reply in &thread.recent_replies {
            let _ = writeln!(out, "  > {reply}");
        }
    }
    out
}

/// Record key — the last path segment of an AT URI, enough to name a job.
fn rkey(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use skywatch_common::{
    AgentIdentity, Branch, BranchParticipant, ThreadNode, TrackedThread, WatchConfig,
    ROOT_TEXT_MAX,
};

use crate::interlocutor::score_interlocutor;
use crate::scoring::{dynamics_score, root_topic_score, score_branch};
use crate::topics::{drift_from_text, extract_topics};
use crate::traits::ThreadTransport;

/// Walks a reply tree once, extracts the agent's branches, scores everything,
/// and assembles the tracked-thread record.
pub struct ThreadAnalyzer<'a, T: ThreadTransport + ?Sized> {
    transport: &'a T,
    config: &'a WatchConfig,
    identity: &'a AgentIdentity,
}

/// Transient per-branch accumulator. Only the documented `Branch` fields
/// survive; the concatenated text exists to compute drift and is discarded.
#[derive(Debug)]
struct BranchDraft {
    participants: Vec<BranchParticipant>,
    seen: BTreeSet<String>,
    message_count: u32,
    last_activity_at: DateTime<Utc>,
    text: String,
}

impl BranchDraft {
    fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            participants: Vec::new(),
            seen: BTreeSet::new(),
            message_count: 0,
            last_activity_at: first_seen,
            text: String::new(),
        }
    }
}

/// Accumulator threaded through the traversal and returned from it, instead
/// of mutable captures over enclosing scope.
#[derive(Debug)]
struct WalkState {
    latest_activity: DateTime<Utc>,
    total_posts: u32,
    our_replies: u32,
    our_reply_texts: Vec<(DateTime<Utc>, String)>,
    /// DIDs the agent replied to directly (the immediate parent author at
    /// each agent reply).
    engaged: BTreeSet<String>,
    /// Every non-self DID present inside any branch.
    participants: BTreeSet<String>,
    branches: BTreeMap<String, BranchDraft>,
}

impl WalkState {
    fn new(root_created_at: DateTime<Utc>) -> Self {
        Self {
            latest_activity: root_created_at,
            total_posts: 0,
            our_replies: 0,
            our_reply_texts: Vec::new(),
            engaged: BTreeSet::new(),
            participants: BTreeSet::new(),
            branches: BTreeMap::new(),
        }
    }
}

fn walk_tree(identity: &AgentIdentity, root: &ThreadNode) -> WalkState {
    walk(identity, root, None, None, WalkState::new(root.created_at))
}

/// Depth-first traversal. Branch attachment:
/// - an agent-authored reply inherits its nearest agent ancestor's branch
///   key, or starts a new branch keyed by its own URI;
/// - anyone else's post folds into the inherited key, or sits outside every
///   branch (and still moves `latest_activity`).
fn walk(
    identity: &AgentIdentity,
    node: &ThreadNode,
    parent_author: Option<&str>,
    inherited_branch: Option<&str>,
    mut state: WalkState,
) -> WalkState {
    state.latest_activity = state.latest_activity.max(node.created_at);
    state.total_posts += 1;

    let is_ours = node.author_did == identity.did;
    let is_reply = parent_author.is_some();

    let branch_key: Option<String> = if is_ours && is_reply {
        state.our_replies += 1;
        state.our_reply_texts.push((node.created_at, node.text.clone()));
        if let Some(parent) = parent_author {
            if parent != identity.did {
                state.engaged.insert(parent.to_string());
            }
        }
        Some(
            inherited_branch
                .map(str::to_string)
                .unwrap_or_else(|| node.uri.clone()),
        )
    } else {
        inherited_branch.map(str::to_string)
    };

    if let Some(key) = &branch_key {
        let draft = state
            .branches
            .entry(key.clone())
            .or_insert_with(|| BranchDraft::new(node.created_at));
        draft.message_count += 1;
        draft.last_activity_at = draft.last_activity_at.max(node.created_at);
        if !draft.text.is_empty() {
            draft.text.push(' ');
        }
        draft.text.push_str(&node.text);
        if !is_ours && draft.seen.insert(node.author_did.clone()) {
            draft.participants.push(BranchParticipant {
                did: node.author_did.clone(),
                handle: node.author_handle.clone(),
            });
            state.participants.insert(node.author_did.clone());
        }
    }

    for reply in &node.replies {
        state = walk(
            identity,
            reply,
            Some(&node.author_did),
            branch_key.as_deref(),
            state,
        );
    }
    state
}

impl<'a, T: ThreadTransport + ?Sized> ThreadAnalyzer<'a, T> {
    pub fn new(transport: &'a T, config: &'a WatchConfig, identity: &'a AgentIdentity) -> Self {
        Self {
            transport,
            config,
            identity,
        }
    }

    /// Analyze a thread from its root. Returns `None` when the tree could
    /// not be fetched — the caller treats that as "try later", not an error.
    /// `existing` carries forward identity-of-record fields (creation time,
    /// job id, enabled flag, backoff state) and the engagement history.
    pub async fn analyze(
        &self,
        root_uri: &str,
        existing: Option<&TrackedThread>,
        now: DateTime<Utc>,
    ) -> Option<TrackedThread> {
        let tree = self
            .transport
            .fetch_thread(root_uri, self.config.thread_depth)
            .await?;

        let root_topics = extract_topics(&tree.text, &self.config.vocabulary);
        let state = walk_tree(self.identity, &tree);
        let total_replies = state.total_posts.saturating_sub(1);

        let mut engaged = state.engaged;
        if let Some(prev) = existing {
            engaged.extend(prev.engaged_participants.iter().cloned());
        }

        // Best-effort profile pass over everyone who can influence scoring.
        let mut to_score: BTreeSet<String> = state.participants.clone();
        if tree.author_did != self.identity.did {
            to_score.insert(tree.author_did.clone());
        }
        let mut participant_scores: HashMap<String, f64> = HashMap::new();
        for did in &to_score {
            match self.transport.fetch_profile(did).await {
                Some(profile) => {
                    let (score, reasons) = score_interlocutor(&profile, &self.config.vocabulary);
                    debug!(actor = did.as_str(), score, reasons = ?reasons, "scored interlocutor");
                    participant_scores.insert(did.clone(), score);
                }
                None => {
                    debug!(actor = did.as_str(), "profile unavailable, excluded from scoring");
                }
            }
        }

        let branches: BTreeMap<String, Branch> = state
            .branches
            .into_iter()
            .map(|(anchor, draft)| {
                let mut branch = Branch {
                    anchor_uri: anchor.clone(),
                    participants: draft.participants,
                    message_count: draft.message_count,
                    last_activity_at: draft.last_activity_at,
                    topic_drift: drift_from_text(
                        &root_topics,
                        &draft.text,
                        &self.config.vocabulary,
                    ),
                    score: 0.0,
                };
                branch.score = score_branch(&branch, &participant_scores, &engaged, now);
                (anchor, branch)
            })
            .collect();

        let root_author_score = participant_scores
            .get(&tree.author_did)
            .copied()
            .unwrap_or(0.0);
        let overall_score = root_author_score
            + root_topic_score(root_topics.len())
            + dynamics_score(total_replies, state.our_replies, branches.len());

        let mut reply_texts = state.our_reply_texts;
        reply_texts.sort_by_key(|(at, _)| *at);
        let keep_from = reply_texts
            .len()
            .saturating_sub(self.config.recent_reply_history);
        let recent_replies: Vec<String> =
            reply_texts.drain(..).skip(keep_from).map(|(_, text)| text).collect();

        Some(TrackedThread {
            root_uri: tree.uri.clone(),
            root_author: tree.author_handle.clone(),
            root_topics,
            root_text: tree.text.chars().take(ROOT_TEXT_MAX).collect(),
            overall_score,
            branches,
            our_reply_count: state.our_replies,
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
            last_activity_at: state.latest_activity,
            engaged_participants: engaged,
            recent_replies,
            monitor_job_id: existing.and_then(|e| e.monitor_job_id.clone()),
            enabled: existing.map(|e| e.enabled).unwrap_or(true),
            backoff_level: existing.map(|e| e.backoff_level).unwrap_or(0),
            last_check_at: existing.map(|e| e.last_check_at).unwrap_or(now),
            last_new_activity_at: existing.and_then(|e| e.last_new_activity_at),
        })
    }
}

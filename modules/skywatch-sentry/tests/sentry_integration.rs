//! End-to-end engine tests against the in-memory transport and store:
//! discovery, evaluated-set suppression, backoff transitions, and the
//! notification peek. No network, no filesystem.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use skywatch_common::{AgentIdentity, Notification, NotificationReason, TrackedThread, WatchConfig};
use skywatch_sentry::discovery::{CheckOutcome, Sentry, UpdateOutcome};
use skywatch_sentry::store::StateStore;
use skywatch_sentry::testing::{post, profile, reply_notification, MemoryStateStore, MockTransport};

const ROOT: &str = "at://did:plc:alice/app.bsky.feed.post/root1";

fn identity() -> AgentIdentity {
    AgentIdentity {
        did: "did:plc:me".to_string(),
        handle: "me.bsky.social".to_string(),
    }
}

/// A thread worth tracking: on-topic root by a strong account, one branch of
/// ours with four messages, latest reply half an hour old.
fn rich_transport(now: DateTime<Utc>) -> MockTransport {
    let t0 = now - Duration::hours(2);
    let tree = post(
        ROOT,
        "did:plc:alice",
        "exploring ai agents, machine learning and llm tooling in rust",
        t0,
        vec![post(
            "at://did:plc:me/app.bsky.feed.post/b1",
            "did:plc:me",
            "love this, rust makes it fun",
            t0 + Duration::minutes(5),
            vec![post(
                "at://did:plc:bob/app.bsky.feed.post/bob1",
                "did:plc:bob",
                "which crates are you using?",
                t0 + Duration::minutes(10),
                vec![post(
                    "at://did:plc:me/app.bsky.feed.post/b2",
                    "did:plc:me",
                    "tokio and friends",
                    t0 + Duration::minutes(15),
                    vec![post(
                        "at://did:plc:bob/app.bsky.feed.post/bob2",
                        "did:plc:bob",
                        "thanks, will try",
                        now - Duration::minutes(30),
                        vec![],
                    )],
                )],
            )],
        )],
    );

    MockTransport::new()
        .with_thread(tree)
        .with_profile(profile("did:plc:alice", 20_000, 150, 3_000, "ai and rust on bluesky"))
        .with_profile(profile("did:plc:bob", 50, 200, 40, ""))
        .with_notification(reply_notification(
            "at://did:plc:bob/app.bsky.feed.post/bob2",
            "did:plc:bob",
            ROOT,
            now - Duration::minutes(30),
        ))
}

fn minimal_thread(level: u32, last_check: DateTime<Utc>) -> TrackedThread {
    let mut t: TrackedThread = serde_json::from_value(json!({
        "root_uri": ROOT,
        "root_author": "alice.bsky.social",
        "overall_score": 75.0
    }))
    .expect("minimal thread decodes");
    t.backoff_level = level;
    t.last_check_at = last_check;
    t
}

fn seeded_sentry(
    transport: MockTransport,
    thread: Option<TrackedThread>,
) -> (Sentry<MockTransport, MemoryStateStore>, MemoryStateStore) {
    let store = MemoryStateStore::new(500);
    if let Some(thread) = thread {
        let mut state = store.load().unwrap();
        state.put_thread(&thread);
        store.save(&mut state).unwrap();
    }
    let sentry = Sentry::new(transport, store.clone(), WatchConfig::default(), identity());
    (sentry, store)
}

#[tokio::test]
async fn discover_tracks_and_emits_job_for_qualifying_thread() {
    let now = Utc::now();
    let (sentry, store) = seeded_sentry(rich_transport(now), None);

    let summary = sentry.discover(now).await.expect("discover");
    assert_eq!(summary.notifications_seen, 1);
    assert_eq!(summary.fresh_notifications, 1);
    assert_eq!(summary.threads_analyzed, 1);
    assert_eq!(summary.threads_tracked, 1);
    assert_eq!(summary.jobs.len(), 1, "qualifying thread must emit a job");

    let job = &summary.jobs[0];
    assert_eq!(job.name, "watch-thread-root1");
    assert_eq!(job.schedule.kind, "every");
    assert_eq!(job.schedule.interval_ms, 600_000, "level 0 polls every 10 minutes");
    assert!(job.payload.message.contains("@alice.bsky.social"));

    let state = store.load().unwrap();
    let thread = state.thread(ROOT).expect("thread persisted");
    assert!(thread.overall_score >= 60.0, "got {}", thread.overall_score);
    assert_eq!(thread.our_reply_count, 2);
    assert_eq!(
        thread.branches.keys().collect::<Vec<_>>(),
        vec!["at://did:plc:me/app.bsky.feed.post/b1"]
    );
    assert_eq!(thread.branches.values().next().unwrap().message_count, 4);
    assert!(thread.engaged_participants.contains("did:plc:alice"));
    assert!(thread.engaged_participants.contains("did:plc:bob"));
    assert_eq!(thread.recent_replies.len(), 2, "both of our reply texts kept");
}

#[tokio::test]
async fn second_discover_pass_skips_evaluated_notifications() {
    let now = Utc::now();
    let (sentry, store) = seeded_sentry(rich_transport(now), None);

    sentry.discover(now).await.expect("first pass");
    let second = sentry.discover(now).await.expect("second pass");

    assert_eq!(second.fresh_notifications, 0, "notification already evaluated");
    assert_eq!(second.threads_analyzed, 0);

    let state = store.load().unwrap();
    assert!(state.already_evaluated("at://did:plc:bob/app.bsky.feed.post/bob2"));
    assert!(state.last_evaluated_at.is_some());
}

#[tokio::test]
async fn low_value_thread_is_analyzed_but_not_tracked() {
    let now = Utc::now();
    let quiet_root = "at://did:plc:carol/app.bsky.feed.post/q1";
    let transport = MockTransport::new()
        .with_thread(post(
            quiet_root,
            "did:plc:carol",
            "my sourdough starter is thriving",
            now - Duration::hours(1),
            vec![],
        ))
        .with_notification(Notification {
            uri: "at://did:plc:carol/app.bsky.feed.post/q1".to_string(),
            reason: NotificationReason::Mention,
            author_did: "did:plc:carol".to_string(),
            author_handle: "carol.bsky.social".to_string(),
            thread_root: None,
            indexed_at: now - Duration::minutes(5),
        });
    let (sentry, store) = seeded_sentry(transport, None);

    let summary = sentry.discover(now).await.expect("discover");
    assert_eq!(summary.threads_analyzed, 1);
    assert_eq!(summary.threads_tracked, 0, "below thresholds, not persisted");
    assert!(summary.jobs.is_empty());

    let state = store.load().unwrap();
    assert!(state.thread(quiet_root).is_none());
    assert!(
        state.already_evaluated("at://did:plc:carol/app.bsky.feed.post/q1"),
        "the notification was still considered"
    );
}

#[tokio::test]
async fn unfetchable_thread_leaves_notifications_fresh_for_retry() {
    let now = Utc::now();
    let transport = MockTransport::new().with_notification(reply_notification(
        "at://did:plc:bob/app.bsky.feed.post/n1",
        "did:plc:bob",
        ROOT,
        now - Duration::minutes(3),
    ));
    let (sentry, store) = seeded_sentry(transport, None);

    let summary = sentry.discover(now).await.expect("discover");
    assert_eq!(summary.threads_analyzed, 0);
    assert_eq!(summary.threads_tracked, 0);

    let state = store.load().unwrap();
    assert!(
        !state.already_evaluated("at://did:plc:bob/app.bsky.feed.post/n1"),
        "unanalyzed notification must stay fresh for the next tick"
    );
}

#[tokio::test]
async fn update_ratchets_and_resets_backoff() {
    let now = Utc::now();
    let (sentry, _store) =
        seeded_sentry(MockTransport::new(), Some(minimal_thread(0, now)));

    for expected in [1, 2, 3] {
        match sentry.update(ROOT, false, now).expect("update") {
            UpdateOutcome::Updated { backoff_level } => assert_eq!(backoff_level, expected),
            UpdateOutcome::NotFound => panic!("thread should exist"),
        }
    }

    match sentry.update(ROOT, true, now).expect("update") {
        UpdateOutcome::Updated { backoff_level } => {
            assert_eq!(backoff_level, 0, "activity resets the ratchet")
        }
        UpdateOutcome::NotFound => panic!("thread should exist"),
    }
}

#[tokio::test]
async fn update_unknown_thread_is_distinct_from_success() {
    let now = Utc::now();
    let (sentry, _store) = seeded_sentry(MockTransport::new(), None);
    assert_eq!(
        sentry.update("at://nowhere", false, now).expect("update"),
        UpdateOutcome::NotFound
    );
}

#[tokio::test]
async fn check_due_boundary_semantics() {
    let now = Utc::now();

    let (sentry, _store) = seeded_sentry(
        MockTransport::new(),
        Some(minimal_thread(0, now - Duration::minutes(9))),
    );
    assert_eq!(sentry.check_due(ROOT, now).await.unwrap(), CheckOutcome::NotDue);

    let (sentry, _store) = seeded_sentry(
        MockTransport::new(),
        Some(minimal_thread(0, now - Duration::minutes(10))),
    );
    assert_eq!(
        sentry.check_due(ROOT, now).await.unwrap(),
        CheckOutcome::Check,
        "boundary at exactly ten minutes is due"
    );

    let (sentry, _store) = seeded_sentry(MockTransport::new(), None);
    assert_eq!(
        sentry.check_due(ROOT, now).await.unwrap(),
        CheckOutcome::NotFound
    );
}

#[tokio::test]
async fn terminal_silence_window_retires_the_thread() {
    let now = Utc::now();
    let (sentry, _store) = seeded_sentry(
        MockTransport::new(),
        Some(minimal_thread(6, now - Duration::hours(25))),
    );
    assert_eq!(sentry.check_due(ROOT, now).await.unwrap(), CheckOutcome::Retire);

    let (sentry, _store) = seeded_sentry(
        MockTransport::new(),
        Some(minimal_thread(6, now - Duration::hours(2))),
    );
    assert_eq!(sentry.check_due(ROOT, now).await.unwrap(), CheckOutcome::NotDue);
}

#[tokio::test]
async fn fresh_reply_in_feed_preempts_backoff_at_any_level() {
    let now = Utc::now();
    let transport = MockTransport::new().with_notification(reply_notification(
        "at://did:plc:bob/app.bsky.feed.post/fresh",
        "did:plc:bob",
        ROOT,
        now - Duration::minutes(5),
    ));
    // Deep in backoff and checked a minute ago — nowhere near due by elapsed
    // time alone.
    let (sentry, store) = seeded_sentry(
        transport,
        Some(minimal_thread(4, now - Duration::minutes(1))),
    );

    assert_eq!(sentry.check_due(ROOT, now).await.unwrap(), CheckOutcome::Check);

    let state = store.load().unwrap();
    let thread = state.thread(ROOT).unwrap();
    assert_eq!(thread.backoff_level, 0, "pre-emption resets the ratchet");
    assert_eq!(thread.last_new_activity_at, Some(now));
}

#[tokio::test]
async fn stale_reply_in_feed_does_not_preempt() {
    let now = Utc::now();
    let transport = MockTransport::new().with_notification(reply_notification(
        "at://did:plc:bob/app.bsky.feed.post/old",
        "did:plc:bob",
        ROOT,
        now - Duration::minutes(45),
    ));
    let (sentry, store) = seeded_sentry(
        transport,
        Some(minimal_thread(4, now - Duration::minutes(1))),
    );

    assert_eq!(sentry.check_due(ROOT, now).await.unwrap(), CheckOutcome::NotDue);
    let thread = store.load().unwrap().thread(ROOT).unwrap();
    assert_eq!(thread.backoff_level, 4, "stale notification leaves backoff alone");
}

#[tokio::test]
async fn unwatch_is_the_only_removal_path() {
    let now = Utc::now();
    let (sentry, store) = seeded_sentry(MockTransport::new(), Some(minimal_thread(0, now)));

    assert!(sentry.unwatch(ROOT).expect("unwatch"));
    assert!(store.load().unwrap().thread(ROOT).is_none());
    assert_eq!(
        sentry.check_due(ROOT, now).await.unwrap(),
        CheckOutcome::NotFound
    );
    assert!(!sentry.unwatch(ROOT).expect("unwatch again"), "second removal finds nothing");
}

#[tokio::test]
async fn unreadable_records_are_skipped_not_fatal() {
    let now = Utc::now();
    let store = MemoryStateStore::new(500);
    let mut state = store.load().unwrap();
    // One healthy thread that qualifies for job emission.
    let qualifying: TrackedThread = serde_json::from_value(json!({
        "root_uri": ROOT,
        "root_author": "alice.bsky.social",
        "overall_score": 80.0,
        "last_check_at": now.to_rfc3339(),
        "branches": {
            "at://did:plc:me/app.bsky.feed.post/b1": {
                "anchor_uri": "at://did:plc:me/app.bsky.feed.post/b1",
                "message_count": 4,
                "last_activity_at": now.to_rfc3339()
            }
        }
    }))
    .unwrap();
    state.put_thread(&qualifying);
    state
        .threads
        .insert("at://legacy/garbage".to_string(), json!({"score": "corrupt"}));
    store.save(&mut state).unwrap();

    let sentry = Sentry::new(
        MockTransport::new(),
        store.clone(),
        WatchConfig::default(),
        identity(),
    );

    let listed = sentry.list().expect("list proceeds past the bad record");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].root_uri, ROOT);

    let jobs = sentry.jobs().expect("jobs proceeds past the bad record");
    assert_eq!(jobs.len(), 1);
}

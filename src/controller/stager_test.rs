use std::sync::Arc;

use super::*;
use crate::ChangeEvent;
use crate::ConfigRule;
use crate::Key;
use crate::Schema;
use crate::StagedConfig;
use crate::WatchError;

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::new()
            .rule(ConfigRule::scalar("name"))
            .rule(ConfigRule::scalar("age").int())
            .rule(ConfigRule::scalar("sex"))
            .rule(ConfigRule::scalar("config-version").int().default("0"))
            .rule(ConfigRule::group("endpoints")),
    )
}

fn initial_live(schema: &Schema) -> LiveConfig {
    let mut staged = StagedConfig::new();
    staged.insert(Key::scalar("name"), "before");
    staged.insert(Key::scalar("age"), "1");
    staged.insert(Key::scalar("config-version"), "1");
    LiveConfig::new(schema.apply(&staged).unwrap())
}

fn gated_stager() -> (Stager, LiveConfig) {
    let schema = schema();
    let live = initial_live(&schema);
    (
        Stager::new(schema, GatePolicy::default(), live.clone()),
        live,
    )
}

fn put(
    name: &str,
    value: &'static str,
) -> ChangeEvent {
    ChangeEvent::put(Key::scalar(name), value)
}

#[test]
fn test_non_gate_events_only_stage() {
    let (mut stager, live) = gated_stager();
    let before = live.load();

    for event in [put("name", "x"), put("age", "5"), put("sex", "m")] {
        assert!(matches!(stager.fold(&event), FoldOutcome::Staged));
    }

    assert_eq!(*live.load(), *before);
    assert_eq!(live.load().string("name"), "before");
}

#[test]
fn test_gate_event_commits_fold_of_preceding_events() {
    let (mut stager, live) = gated_stager();

    stager.fold(&put("name", "x"));
    stager.fold(&put("age", "5"));
    assert_eq!(live.load().string("name"), "before");

    let outcome = stager.fold(&put("config-version", "2"));

    assert!(matches!(outcome, FoldOutcome::Committed(_)));
    let now = live.load();
    assert_eq!(now.string("name"), "x");
    assert_eq!(now.int("age"), 5);
    assert_eq!(now.int("config-version"), 2);
    assert_eq!(stager.staged(), &now.to_staged());
}

#[test]
fn test_same_gate_event_twice_is_idempotent() {
    let (mut stager, live) = gated_stager();
    stager.fold(&put("name", "x"));

    stager.fold(&put("config-version", "2"));
    let first = live.load();
    stager.fold(&put("config-version", "2"));
    let second = live.load();

    assert_eq!(*first, *second);
}

#[test]
fn test_rejected_commit_keeps_live_and_staged_attempt() {
    let (mut stager, live) = gated_stager();
    let before = live.load();

    stager.fold(&put("age", "not-a-number"));
    let outcome = stager.fold(&put("config-version", "2"));

    assert!(matches!(outcome, FoldOutcome::Rejected(_)));
    assert_eq!(*live.load(), *before);
    assert_eq!(
        stager.staged().scalar("age").map(|b| &b[..]),
        Some(&b"not-a-number"[..])
    );

    // Fixing the bad value and bumping the gate again commits everything
    stager.fold(&put("age", "7"));
    assert!(matches!(
        stager.fold(&put("config-version", "3")),
        FoldOutcome::Committed(_)
    ));
    assert_eq!(live.load().int("age"), 7);
}

#[test]
fn test_undeclared_and_terminal_events_are_ignored() {
    let (mut stager, live) = gated_stager();
    let before = live.load();

    assert!(matches!(
        stager.fold(&put("unknown", "x")),
        FoldOutcome::Ignored
    ));
    assert!(matches!(
        stager.fold(&ChangeEvent::put(Key::invalid(), "x")),
        FoldOutcome::Ignored
    ));
    assert!(matches!(
        stager.fold(&ChangeEvent::error(WatchError::Transport("reset".into()))),
        FoldOutcome::Ignored
    ));

    assert_eq!(stager.staged(), &before.to_staged());
}

#[test]
fn test_scalar_delete_resets_to_default_on_commit() {
    let (mut stager, live) = gated_stager();

    stager.fold(&ChangeEvent::delete(Key::scalar("age")));
    stager.fold(&ChangeEvent::delete(Key::scalar("config-version")));

    let now = live.load();
    assert!(!now.is_set("age"));
    assert_eq!(now.int("config-version"), 0);
}

#[test]
fn test_group_members_are_upserted_and_removed() {
    let (mut stager, live) = gated_stager();

    stager.fold(&ChangeEvent::put(Key::member("endpoints", "e1"), "http://a"));
    stager.fold(&ChangeEvent::put(Key::member("endpoints", "e2"), "http://b"));
    stager.fold(&ChangeEvent::put(Key::member("endpoints", "e1"), "http://c"));
    stager.fold(&ChangeEvent::delete(Key::member("endpoints", "e2")));
    stager.fold(&put("config-version", "2"));

    let endpoints = live.load().group("endpoints").to_map();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints.get("e1").map(String::as_str), Some("http://c"));
}

#[test]
fn test_immediate_policy_commits_every_declared_event() {
    let schema = schema();
    let live = initial_live(&schema);
    let mut stager = Stager::new(schema, GatePolicy::Immediate, live.clone());

    assert!(matches!(
        stager.fold(&put("name", "x")),
        FoldOutcome::Committed(_)
    ));
    assert_eq!(live.load().string("name"), "x");
    assert_eq!(stager.version_of(&live.load()), None);
}

#[test]
fn test_resync_commits_only_when_gate_changed() {
    let (mut stager, live) = gated_stager();

    // Same gate value: staged only
    let mut fresh = live.load().to_staged();
    fresh.insert(Key::scalar("name"), "half-written");
    assert!(matches!(stager.resync(fresh), FoldOutcome::Staged));
    assert_eq!(live.load().string("name"), "before");
    assert_eq!(
        stager.staged().scalar("name").map(|b| &b[..]),
        Some(&b"half-written"[..])
    );

    // Gate moved while disconnected: commit
    let mut fresh = live.load().to_staged();
    fresh.insert(Key::scalar("name"), "complete");
    fresh.insert(Key::scalar("config-version"), "5");
    assert!(matches!(stager.resync(fresh), FoldOutcome::Committed(_)));
    assert_eq!(live.load().string("name"), "complete");
    assert_eq!(stager.version_of(&live.load()), Some("5".to_string()));
}

#[test]
fn test_gate_policy_matches_only_scalar_gate() {
    let gate = GatePolicy::OnKey("config-version".to_string());

    assert!(gate.is_gate(&Key::scalar("config-version")));
    assert!(!gate.is_gate(&Key::member("group", "config-version")));
    assert!(!gate.is_gate(&Key::scalar("name")));
    assert!(GatePolicy::Immediate.is_gate(&Key::scalar("name")));
    assert_eq!(GatePolicy::default().gate_name(), Some("config-version"));
}

#[test]
fn test_live_config_clones_share_one_cell() {
    let schema = schema();
    let live = initial_live(&schema);
    let reader = live.clone();

    let mut staged = StagedConfig::new();
    staged.insert(Key::scalar("name"), "swapped");
    live.store(Arc::new(schema.apply(&staged).unwrap()));

    assert_eq!(reader.load().string("name"), "swapped");
}

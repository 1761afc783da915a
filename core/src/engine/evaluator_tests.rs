//! Tests for evaluation passes
//!
//! Every pass runs against a small `com.x` window whose OK button can be
//! present or absent. Time is injected, so delay, cooldown and quota windows
//! are exact.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use taprule_types::{ActionKind, AppRaw, ClickLog, GroupRaw, RuleRaw, SubsItem, SubscriptionRaw};
use tokio::sync::mpsc;

use super::{ActiveRuleSet, Evaluator, RuleId, TopActivity};
use crate::node::{NodeAttrs, NodeId, NodeTree, NodeTreeBuilder, Rect};
use crate::platform::{ActionExecutionError, ActionExecutor, DryRunExecutor};
use crate::subscription::{EnableOverrides, Subscription};

fn window(with_ok: bool) -> NodeTree {
    let mut builder = NodeTreeBuilder::new(NodeAttrs {
        package: Some("com.x".to_string()),
        name: Some("android.widget.FrameLayout".to_string()),
        bounds: Rect::new(0, 0, 1080, 1920),
        ..Default::default()
    });
    let root = builder.root();
    builder.add_child(
        root,
        NodeAttrs {
            package: Some("com.x".to_string()),
            name: Some("android.widget.TextView".to_string()),
            text: Some("Welcome".to_string()),
            bounds: Rect::new(0, 0, 1080, 200),
            ..Default::default()
        },
    );
    if with_ok {
        builder.add_child(
            root,
            NodeAttrs {
                package: Some("com.x".to_string()),
                name: Some("android.widget.Button".to_string()),
                text: Some("OK".to_string()),
                clickable: true,
                bounds: Rect::new(100, 1700, 500, 1800),
                ..Default::default()
            },
        );
    }
    builder.build()
}

fn rule_set(groups: Vec<Vec<RuleRaw>>) -> Arc<ActiveRuleSet> {
    let groups = groups
        .into_iter()
        .enumerate()
        .map(|(key, rules)| GroupRaw {
            key: key as i32,
            name: format!("group {key}"),
            desc: None,
            enable: None,
            rules,
        })
        .collect();
    let subscription = Subscription {
        item: SubsItem::new(3, "3.json"),
        doc: SubscriptionRaw {
            id: 3,
            version: 1,
            name: None,
            update_url: None,
            apps: vec![AppRaw {
                id: "com.x".to_string(),
                name: None,
                groups,
            }],
        },
    };
    Arc::new(ActiveRuleSet::build(
        &[subscription],
        &EnableOverrides::new(),
        Some("com.x"),
    ))
}

fn ok_rule(configure: impl FnOnce(&mut RuleRaw)) -> RuleRaw {
    let mut rule = RuleRaw::new(0, [r#"[text="OK"]"#]);
    configure(&mut rule);
    rule
}

fn rule_id(group_key: i32, rule_key: i32) -> RuleId {
    RuleId {
        subs_id: 3,
        app_id: "com.x".to_string(),
        group_key,
        rule_key,
    }
}

fn foreground() -> TopActivity {
    TopActivity::new("com.x", Some("com.x.MainActivity".to_string()))
}

struct Harness {
    evaluator: Evaluator,
    executor: Arc<DryRunExecutor>,
    logs: mpsc::UnboundedReceiver<ClickLog>,
}

impl Harness {
    fn new() -> Self {
        let executor = Arc::new(DryRunExecutor::new());
        let (tx, logs) = mpsc::unbounded_channel();
        Self {
            evaluator: Evaluator::new(executor.clone(), tx),
            executor,
            logs,
        }
    }

    fn pass(&mut self, rules: &Arc<ActiveRuleSet>, with_ok: bool, now: i64) -> super::PassReport {
        self.evaluator
            .run_pass(rules, &window(with_ok), &foreground(), now, || true)
    }

    fn drain_logs(&mut self) -> Vec<ClickLog> {
        let mut logs = Vec::new();
        while let Ok(log) = self.logs.try_recv() {
            logs.push(log);
        }
        logs
    }
}

/// Executor that fails while `fail` is set
#[derive(Default)]
struct FlakyExecutor {
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl ActionExecutor for FlakyExecutor {
    fn perform(&self, _tree: &NodeTree, _node: NodeId, _action: ActionKind) -> Result<(), ActionExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            Err(ActionExecutionError::Rejected {
                reason: "gesture cancelled".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Matching & Firing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_matching_rule_fires_once_and_logs() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|r| {
        r.key = 4;
        r.action = Some(ActionKind::TapNode);
    })]]);

    let report = h.pass(&rules, true, 1_000);
    assert_eq!(report.fired, 1);

    let performed = h.executor.performed();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].path, vec![1]);
    assert_eq!(performed[0].action, ActionKind::TapNode);
    assert_eq!(performed[0].point, Some((300, 1750)));

    let logs = h.drain_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].rule_key, 4);
    assert_eq!(logs[0].subs_id, 3);
    assert_eq!(logs[0].group_key, 0);
    assert_eq!(logs[0].timestamp, 1_000);
    assert_eq!(logs[0].app_id.as_deref(), Some("com.x"));
    assert_eq!(logs[0].activity_id.as_deref(), Some("com.x.MainActivity"));

    let state = h.evaluator.state(&rule_id(0, 4)).unwrap();
    assert_eq!(state.trigger_count, 1);
    assert_eq!(state.delay_trigger_time, 0);
}

#[test]
fn test_no_match_leaves_state_idle() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![RuleRaw::new(0, [r#"[text="Cancel"]"#])]]);

    let report = h.pass(&rules, true, 1_000);
    assert_eq!(report, super::PassReport::default());
    assert!(h.executor.performed().is_empty());
    assert!(h.drain_logs().is_empty());

    let delay_trigger_time = h
        .evaluator
        .state(&rule_id(0, 0))
        .map(|s| s.delay_trigger_time)
        .unwrap_or(0);
    assert_eq!(delay_trigger_time, 0);
}

#[test]
fn test_fallback_selectors_are_tried_in_order() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![RuleRaw::new(
        0,
        [r#"[text="Skip"]"#, r#"Button[clickable=true]"#],
    )]]);

    assert_eq!(h.pass(&rules, true, 1_000).fired, 1);
    assert_eq!(h.executor.performed()[0].path, vec![1]);
}

#[test]
fn test_several_rules_fire_in_one_pass() {
    let mut h = Harness::new();
    let rules = rule_set(vec![
        vec![ok_rule(|_| {}), RuleRaw::new(1, ["TextView"])],
        vec![RuleRaw::new(0, [r#"[text="Missing"]"#])],
    ]);

    let report = h.pass(&rules, true, 1_000);
    assert_eq!(report.fired, 2);
    let keys: Vec<_> = h.drain_logs().iter().map(|l| (l.group_key, l.rule_key)).collect();
    assert_eq!(keys, vec![(0, 0), (0, 1)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Delay
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_delay_arms_then_fires_after_deadline() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|r| r.delay = Some(500))]]);

    let report = h.pass(&rules, true, 1_000);
    assert_eq!((report.armed, report.fired), (1, 0));
    assert_eq!(h.evaluator.state(&rule_id(0, 0)).unwrap().delay_trigger_time, 1_000);

    assert_eq!(h.pass(&rules, true, 1_300).fired, 0);
    assert!(h.executor.performed().is_empty());

    assert_eq!(h.pass(&rules, true, 1_500).fired, 1);
    assert_eq!(h.evaluator.state(&rule_id(0, 0)).unwrap().delay_trigger_time, 0);
    assert_eq!(h.drain_logs().len(), 1);
}

#[test]
fn test_delay_survives_disappearance_before_deadline() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|r| r.delay = Some(500))]]);

    h.pass(&rules, true, 1_000);
    h.pass(&rules, false, 1_200);
    h.pass(&rules, false, 1_600);
    assert_eq!(h.evaluator.state(&rule_id(0, 0)).unwrap().delay_trigger_time, 1_000);

    // First matching tick after the deadline fires without re-arming
    let report = h.pass(&rules, true, 1_650);
    assert_eq!((report.armed, report.fired), (0, 1));
}

// ─────────────────────────────────────────────────────────────────────────────
// Quota & Cooldown
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_max_triggers_stops_until_reset_interval() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|r| {
        r.max_triggers = Some(1);
        r.reset_interval = Some(10_000);
    })]]);

    assert_eq!(h.pass(&rules, true, 1_000).fired, 1);
    assert_eq!(h.pass(&rules, true, 2_000).fired, 0);
    assert_eq!(h.pass(&rules, true, 10_999).fired, 0);
    assert_eq!(h.pass(&rules, true, 11_000).fired, 1);
    assert_eq!(h.executor.performed().len(), 2);
}

#[test]
fn test_action_cooldown_spaces_fires() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|r| r.action_cd = Some(1_000))]]);

    assert_eq!(h.pass(&rules, true, 1_000).fired, 1);
    assert_eq!(h.pass(&rules, true, 1_150).fired, 0);
    assert_eq!(h.pass(&rules, true, 2_000).fired, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Failures & Rule Set Changes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_failed_action_is_retried_next_pass() {
    let executor = Arc::new(FlakyExecutor::default());
    executor.fail.store(true, Ordering::SeqCst);
    let (tx, mut logs) = mpsc::unbounded_channel();
    let mut evaluator = Evaluator::new(executor.clone(), tx);
    let rules = rule_set(vec![vec![ok_rule(|r| r.delay = Some(100))]]);
    let tree = window(true);

    evaluator.run_pass(&rules, &tree, &foreground(), 1_000, || true);
    let report = evaluator.run_pass(&rules, &tree, &foreground(), 1_100, || true);
    assert_eq!((report.fired, report.failed), (0, 1));

    let state = evaluator.state(&rule_id(0, 0)).unwrap();
    assert_eq!(state.trigger_count, 0);
    assert_eq!(state.delay_trigger_time, 1_000);
    assert!(logs.try_recv().is_err());

    executor.fail.store(false, Ordering::SeqCst);
    let report = evaluator.run_pass(&rules, &tree, &foreground(), 1_250, || true);
    assert_eq!(report.fired, 1);
    assert_eq!(executor.calls.load(Ordering::SeqCst), 2);
    assert!(logs.try_recv().is_ok());
}

#[test]
fn test_empty_bounds_do_not_count_as_fired() {
    let mut h = Harness::new();
    let tree = NodeTreeBuilder::new(NodeAttrs {
        package: Some("com.x".to_string()),
        text: Some("OK".to_string()),
        ..Default::default()
    })
    .build();
    let rules = rule_set(vec![vec![ok_rule(|_| {})]]);
    let report = h
        .evaluator
        .run_pass(&rules, &tree, &foreground(), 1_000, || true);
    assert_eq!((report.fired, report.failed), (0, 1));
    assert!(h.drain_logs().is_empty());
    assert_eq!(h.evaluator.state(&rule_id(0, 0)).unwrap().trigger_count, 0);
}

#[test]
fn test_pass_abandoned_when_rule_set_changes() {
    let mut h = Harness::new();
    let rules = rule_set(vec![vec![ok_rule(|_| {}), RuleRaw::new(1, ["TextView"])]]);

    let report = h
        .evaluator
        .run_pass(&rules, &window(true), &foreground(), 1_000, || false);
    assert!(report.abandoned);
    assert_eq!(report.fired, 1);
    assert_eq!(h.executor.performed().len(), 1);
}

#[test]
fn test_adopting_new_set_drops_stale_state() {
    let mut h = Harness::new();
    let first = rule_set(vec![vec![ok_rule(|_| {})], vec![RuleRaw::new(0, ["TextView"])]]);
    h.pass(&first, true, 1_000);
    assert!(h.evaluator.state(&rule_id(0, 0)).is_some());
    assert!(h.evaluator.state(&rule_id(1, 0)).is_some());

    let second = rule_set(vec![vec![ok_rule(|_| {})]]);
    h.evaluator.adopt(&second);
    assert_eq!(h.evaluator.state(&rule_id(0, 0)).unwrap().trigger_count, 1);
    assert!(h.evaluator.state(&rule_id(1, 0)).is_none());
}

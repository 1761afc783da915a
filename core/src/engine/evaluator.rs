//! Evaluation passes
//!
//! The evaluator owns every rule's runtime state. A pass walks the active rule
//! set in order against one snapshot; see [`RuleState`] for the per-rule
//! lifecycle.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use taprule_types::ClickLog;
use tokio::sync::mpsc;

use super::foreground::TopActivity;
use super::rule_set::{ActiveRule, ActiveRuleSet, RuleId};
use super::state::RuleState;
use crate::node::NodeTree;
use crate::platform::ActionExecutor;
use crate::selector::query_selector;

/// Counts for one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub armed: usize,
    pub fired: usize,
    pub failed: usize,
    /// The rule set was replaced while the pass was running
    pub abandoned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleOutcome {
    Skipped,
    NoMatch,
    Armed,
    Fired,
    Failed,
}

pub struct Evaluator {
    states: HashMap<RuleId, RuleState>,
    executor: Arc<dyn ActionExecutor>,
    click_tx: mpsc::UnboundedSender<ClickLog>,
    adopted: Option<Arc<ActiveRuleSet>>,
}

impl Evaluator {
    pub fn new(executor: Arc<dyn ActionExecutor>, click_tx: mpsc::UnboundedSender<ClickLog>) -> Self {
        Self {
            states: HashMap::new(),
            executor,
            click_tx,
            adopted: None,
        }
    }

    pub fn state(&self, id: &RuleId) -> Option<&RuleState> {
        self.states.get(id)
    }

    /// Switch to `rules`, dropping state of rules that are no longer active.
    pub fn adopt(&mut self, rules: &Arc<ActiveRuleSet>) {
        if self
            .adopted
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, rules))
        {
            return;
        }

        let live: HashSet<&RuleId> = rules.rules().iter().map(|r| &r.id).collect();
        let before = self.states.len();
        self.states.retain(|id, _| live.contains(id));
        tracing::debug!(
            app_id = ?rules.app_id(),
            rules = rules.len(),
            dropped = before - self.states.len(),
            "Adopted rule set"
        );
        self.adopted = Some(Arc::clone(rules));
    }

    /// Run one pass of `rules` against `tree`.
    ///
    /// `is_current` is asked after every rule whether `rules` is still the
    /// live set; the rest of the pass is abandoned when it is not.
    pub fn run_pass(
        &mut self,
        rules: &Arc<ActiveRuleSet>,
        tree: &NodeTree,
        foreground: &TopActivity,
        now: i64,
        mut is_current: impl FnMut() -> bool,
    ) -> PassReport {
        self.adopt(rules);

        let mut report = PassReport::default();
        for active in rules.rules() {
            match self.evaluate_rule(active, tree, foreground, now) {
                RuleOutcome::Armed => report.armed += 1,
                RuleOutcome::Fired => report.fired += 1,
                RuleOutcome::Failed => report.failed += 1,
                RuleOutcome::Skipped | RuleOutcome::NoMatch => {}
            }

            if !is_current() {
                tracing::debug!(rule = %active.id, "Rule set changed mid-pass, abandoning");
                report.abandoned = true;
                break;
            }
        }
        report
    }

    fn evaluate_rule(
        &mut self,
        active: &ActiveRule,
        tree: &NodeTree,
        foreground: &TopActivity,
        now: i64,
    ) -> RuleOutcome {
        let rule = &active.rule;
        let state = self.states.entry(active.id.clone()).or_default();

        state.reset_quota_if_due(rule, now);
        if state.is_exhausted(rule) || state.is_cooling_down(rule, now) || state.is_waiting(rule, now)
        {
            return RuleOutcome::Skipped;
        }

        let Some(node) = rule
            .selectors
            .iter()
            .find_map(|selector| query_selector(tree, tree.root(), selector))
        else {
            return RuleOutcome::NoMatch;
        };

        if state.should_arm(rule) {
            state.arm(now);
            tracing::debug!(rule = %active.id, delay_ms = rule.delay_ms, "Rule armed");
            return RuleOutcome::Armed;
        }

        if let Err(e) = self.executor.perform(tree, node, rule.action) {
            tracing::warn!(rule = %active.id, action = rule.action.as_str(), error = %e, "Action failed");
            return RuleOutcome::Failed;
        }

        state.record_fire(now);
        tracing::info!(
            rule = %active.id,
            group = %active.group_name,
            action = rule.action.as_str(),
            count = state.trigger_count,
            "Rule fired"
        );

        let log = ClickLog {
            timestamp: now,
            app_id: foreground.app_id.clone(),
            activity_id: foreground.activity_id.clone(),
            subs_id: active.id.subs_id,
            group_key: active.id.group_key,
            rule_index: rule.index,
            rule_key: rule.key,
        };
        if self.click_tx.send(log).is_err() {
            tracing::debug!("Click log channel closed");
        }
        RuleOutcome::Fired
    }
}

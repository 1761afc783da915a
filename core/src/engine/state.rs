//! Per-rule runtime state
//!
//! # Lifecycle
//!
//! 1. `Idle`: `delay_trigger_time == 0`
//! 2. Rule with a delay matches → `Pending` (deadline = first match + delay)
//! 3. Action succeeds → trigger recorded, back to `Idle`
//! 4. `max_triggers` reached → skipped until `reset_interval` elapses
//!
//! All times are wall-clock milliseconds. State is only touched by the
//! evaluation loop.

use crate::subscription::CompiledRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending { deadline: i64 },
    Exhausted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleState {
    /// Time of the first match that armed the delay; 0 while idle
    pub delay_trigger_time: i64,

    // ─── Quota ──────────────────────────────────────────────────────────────
    /// Fires in the current quota window
    pub trigger_count: u32,
    /// Time of the first fire in the current quota window
    pub window_start: i64,

    /// Time of the most recent fire
    pub last_trigger: Option<i64>,
}

impl RuleState {
    pub fn phase(&self, rule: &CompiledRule) -> Phase {
        if self.is_exhausted(rule) {
            Phase::Exhausted
        } else if self.delay_trigger_time > 0 {
            Phase::Pending {
                deadline: self.deadline(rule),
            }
        } else {
            Phase::Idle
        }
    }

    fn deadline(&self, rule: &CompiledRule) -> i64 {
        self.delay_trigger_time.saturating_add(millis(rule.delay_ms))
    }

    /// Start a new quota window once `reset_interval` has passed since the
    /// window opened.
    pub fn reset_quota_if_due(&mut self, rule: &CompiledRule, now: i64) {
        let Some(interval) = rule.reset_interval_ms else {
            return;
        };
        if self.trigger_count > 0 && now.saturating_sub(self.window_start) >= millis(interval) {
            self.trigger_count = 0;
            self.window_start = 0;
        }
    }

    pub fn is_exhausted(&self, rule: &CompiledRule) -> bool {
        rule.max_triggers
            .is_some_and(|max| self.trigger_count >= max)
    }

    pub fn is_cooling_down(&self, rule: &CompiledRule, now: i64) -> bool {
        match (rule.action_cd_ms, self.last_trigger) {
            (Some(cd), Some(last)) => now.saturating_sub(last) < millis(cd),
            _ => false,
        }
    }

    /// Pending with the delay deadline still ahead
    pub fn is_waiting(&self, rule: &CompiledRule, now: i64) -> bool {
        self.delay_trigger_time > 0 && now < self.deadline(rule)
    }

    /// Whether a match at this point should only arm the delay
    pub fn should_arm(&self, rule: &CompiledRule) -> bool {
        rule.delay_ms > 0 && self.delay_trigger_time == 0
    }

    pub fn arm(&mut self, now: i64) {
        // 0 is reserved for idle
        self.delay_trigger_time = now.max(1);
    }

    pub fn record_fire(&mut self, now: i64) {
        if self.trigger_count == 0 {
            self.window_start = now;
        }
        self.trigger_count = self.trigger_count.saturating_add(1);
        self.last_trigger = Some(now);
        self.delay_trigger_time = 0;
    }
}

/// Document durations are unsigned; anything past `i64::MAX` never elapses
fn millis(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taprule_types::RuleRaw;

    fn rule(configure: impl FnOnce(&mut RuleRaw)) -> CompiledRule {
        let mut raw = RuleRaw::new(0, ["Button"]);
        configure(&mut raw);
        CompiledRule::compile(0, &raw).unwrap()
    }

    #[test]
    fn delay_arms_then_waits_for_deadline() {
        let rule = rule(|r| r.delay = Some(500));
        let mut state = RuleState::default();
        assert_eq!(state.phase(&rule), Phase::Idle);
        assert!(state.should_arm(&rule));

        state.arm(1_000);
        assert_eq!(state.phase(&rule), Phase::Pending { deadline: 1_500 });
        assert!(!state.should_arm(&rule));
        assert!(state.is_waiting(&rule, 1_499));
        assert!(!state.is_waiting(&rule, 1_500));

        state.record_fire(1_500);
        assert_eq!(state.phase(&rule), Phase::Idle);
        assert_eq!(state.trigger_count, 1);
    }

    #[test]
    fn quota_exhausts_and_resets_after_interval() {
        let rule = rule(|r| {
            r.max_triggers = Some(2);
            r.reset_interval = Some(10_000);
        });
        let mut state = RuleState::default();
        state.record_fire(1_000);
        state.record_fire(2_000);
        assert_eq!(state.phase(&rule), Phase::Exhausted);

        state.reset_quota_if_due(&rule, 10_999);
        assert!(state.is_exhausted(&rule));

        state.reset_quota_if_due(&rule, 11_000);
        assert!(!state.is_exhausted(&rule));
        assert_eq!(state.trigger_count, 0);
    }

    #[test]
    fn quota_without_interval_never_resets() {
        let rule = rule(|r| r.max_triggers = Some(1));
        let mut state = RuleState::default();
        state.record_fire(1_000);
        state.reset_quota_if_due(&rule, i64::MAX / 2);
        assert!(state.is_exhausted(&rule));
    }

    #[test]
    fn huge_delay_never_elapses() {
        for delay in [u64::MAX, i64::MAX as u64] {
            let rule = rule(|r| r.delay = Some(delay));
            let mut state = RuleState::default();
            state.arm(1_000);
            assert_eq!(state.phase(&rule), Phase::Pending { deadline: i64::MAX });
            assert!(state.is_waiting(&rule, i64::MAX - 1));
        }
    }

    #[test]
    fn huge_cooldown_and_reset_interval_hold() {
        let rule = rule(|r| {
            r.action_cd = Some(u64::MAX);
            r.max_triggers = Some(1);
            r.reset_interval = Some(u64::MAX);
        });
        let mut state = RuleState::default();
        state.record_fire(1_000);
        assert!(state.is_cooling_down(&rule, i64::MAX));

        state.reset_quota_if_due(&rule, i64::MAX);
        assert!(state.is_exhausted(&rule));
    }

    #[test]
    fn cooldown_counts_from_last_fire() {
        let rule = rule(|r| r.action_cd = Some(300));
        let mut state = RuleState::default();
        assert!(!state.is_cooling_down(&rule, 0));

        state.record_fire(1_000);
        assert!(state.is_cooling_down(&rule, 1_299));
        assert!(!state.is_cooling_down(&rule, 1_300));
    }
}

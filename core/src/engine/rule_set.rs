//! Active rule set
//!
//! The rules the evaluation loop considers for one foreground app: every rule
//! of every enabled, valid group, ordered by subscription order, then group
//! declaration order, then rule declaration order. A set is immutable once
//! built; changes publish a new `Arc<ActiveRuleSet>`.

use std::fmt;

use crate::subscription::{CompiledRule, EnableOverrides, GroupRawExt, Subscription};

/// Stable identity of a rule across rule-set rebuilds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleId {
    pub subs_id: i64,
    pub app_id: String,
    pub group_key: i32,
    pub rule_key: i32,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.subs_id, self.app_id, self.group_key, self.rule_key
        )
    }
}

#[derive(Debug, Clone)]
pub struct ActiveRule {
    pub id: RuleId,
    pub group_name: String,
    pub rule: CompiledRule,
}

#[derive(Debug, Clone, Default)]
pub struct ActiveRuleSet {
    app_id: Option<String>,
    rules: Vec<ActiveRule>,
}

impl ActiveRuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collect the active rules for `app_id`.
    ///
    /// `subscriptions` must already be in evaluation order (the registry keeps
    /// them sorted). Disabled items and groups turned off by overrides are
    /// left out; groups that fail to compile are logged and skipped.
    pub fn build(
        subscriptions: &[Subscription],
        overrides: &EnableOverrides,
        app_id: Option<&str>,
    ) -> Self {
        let Some(app_id) = app_id else {
            return Self::empty();
        };

        let mut rules = Vec::new();
        for subscription in subscriptions.iter().filter(|s| s.item.enable) {
            let subs_id = subscription.item.id;
            let Some(app) = subscription.doc.app(app_id) else {
                continue;
            };

            for group in &app.groups {
                if !overrides.is_group_enabled(subs_id, app_id, group) {
                    continue;
                }
                let compiled = match group.compile() {
                    Ok(compiled) => compiled,
                    Err(e) => {
                        tracing::warn!(
                            subs_id,
                            app_id,
                            group_key = group.key,
                            error = %e,
                            "Skipping invalid group"
                        );
                        continue;
                    }
                };

                rules.extend(compiled.into_iter().map(|rule| ActiveRule {
                    id: RuleId {
                        subs_id,
                        app_id: app_id.to_string(),
                        group_key: group.key,
                        rule_key: rule.key,
                    },
                    group_name: group.name.clone(),
                    rule,
                }));
            }
        }

        tracing::debug!(app_id, rules = rules.len(), "Built active rule set");
        Self {
            app_id: Some(app_id.to_string()),
            rules,
        }
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn rules(&self) -> &[ActiveRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taprule_types::{AppRaw, GroupRaw, RuleRaw, SubsItem, SubscriptionRaw};

    fn group(key: i32, rules: Vec<RuleRaw>) -> GroupRaw {
        GroupRaw {
            key,
            name: format!("g{key}"),
            desc: None,
            enable: None,
            rules,
        }
    }

    fn subscription(id: i64, order: i32, groups: Vec<GroupRaw>) -> Subscription {
        let mut item = SubsItem::new(id, format!("{id}.json"));
        item.order = order;
        Subscription {
            item,
            doc: SubscriptionRaw {
                id,
                version: 1,
                name: None,
                update_url: None,
                apps: vec![AppRaw {
                    id: "com.x".into(),
                    name: None,
                    groups,
                }],
            },
        }
    }

    fn keys(set: &ActiveRuleSet) -> Vec<(i64, i32, i32)> {
        set.rules()
            .iter()
            .map(|r| (r.id.subs_id, r.id.group_key, r.id.rule_key))
            .collect()
    }

    #[test]
    fn orders_by_subscription_then_declaration() {
        let subs = vec![
            subscription(
                1,
                0,
                vec![
                    group(4, vec![RuleRaw::new(1, ["A"]), RuleRaw::new(0, ["B"])]),
                    group(2, vec![RuleRaw::new(0, ["C"])]),
                ],
            ),
            subscription(2, 1, vec![group(0, vec![RuleRaw::new(0, ["D"])])]),
        ];

        let set = ActiveRuleSet::build(&subs, &EnableOverrides::new(), Some("com.x"));
        assert_eq!(set.app_id(), Some("com.x"));
        assert_eq!(keys(&set), vec![(1, 4, 1), (1, 4, 0), (1, 2, 0), (2, 0, 0)]);
    }

    #[test]
    fn skips_disabled_and_invalid_groups() {
        let mut off_by_default = group(1, vec![RuleRaw::new(0, ["A"])]);
        off_by_default.enable = Some(false);
        let mut subs = vec![
            subscription(
                1,
                0,
                vec![
                    off_by_default,
                    group(2, vec![RuleRaw::new(0, ["[text>1]"])]),
                    group(3, vec![RuleRaw::new(0, ["B"])]),
                ],
            ),
            subscription(2, 1, vec![group(0, vec![RuleRaw::new(0, ["C"])])]),
        ];
        subs[1].item.enable = false;

        let mut overrides = EnableOverrides::new();
        let set = ActiveRuleSet::build(&subs, &overrides, Some("com.x"));
        assert_eq!(keys(&set), vec![(1, 3, 0)]);

        overrides.set_group(1, "com.x", 1, true);
        overrides.set_group(1, "com.x", 3, false);
        let set = ActiveRuleSet::build(&subs, &overrides, Some("com.x"));
        assert_eq!(keys(&set), vec![(1, 1, 0)]);
    }

    #[test]
    fn unknown_app_has_no_rules() {
        let subs = vec![subscription(1, 0, vec![group(0, vec![RuleRaw::new(0, ["A"])])])];
        assert!(ActiveRuleSet::build(&subs, &EnableOverrides::new(), Some("com.y")).is_empty());
        assert!(ActiveRuleSet::build(&subs, &EnableOverrides::new(), None).is_empty());
    }
}

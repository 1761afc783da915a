//! Subscription documents
//!
//! A subscription is a versioned JSON document of per-app rule groups. This
//! module covers the whole document lifecycle:
//!
//! ```text
//!   text ──parse──► SubscriptionRaw ──edit──► SubscriptionRaw ──stringify──► file
//!                        │
//!                        ├── GroupRawExt::compile ──► CompiledRule (engine)
//!                        └── EnableOverrides (kept apart, survive refresh)
//! ```

mod compile;
mod document;
mod edit;
mod error;
mod overrides;
mod registry;
pub mod watcher;

#[cfg(test)]
mod edit_tests;

pub use compile::{AppRawExt, CompiledRule, GroupRawExt};
pub use document::{
    parse_app_raw, parse_group_raw, parse_subscription, stringify, validate_app, validate_group,
    validate_subscription,
};
pub use edit::{add_from_source, add_groups, delete_group, edit_group};
pub use error::{DocumentError, EditError, OverridesError, RegistryError, RuleCompileError};
pub use overrides::EnableOverrides;
pub use registry::{Subscription, SubscriptionRegistry};
pub use watcher::{SubscriptionFileEvent, SubscriptionWatcher};

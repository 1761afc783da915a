pub mod clock;
pub mod context;
pub mod engine;
pub mod node;
pub mod platform;
pub mod selector;
pub mod serde_defaults;
pub mod storage;
pub mod subscription;
pub mod updater;

// Re-exports for convenience
pub use context::{ConfigError, EngineSettings, SettingsExt};
pub use engine::{
    ActiveRuleSet, Engine, EngineError, EngineHandle, EnginePlatform, Evaluator, RuleId,
    TopActivity,
};
pub use node::{NodeAttrs, NodeId, NodeTree, NodeTreeBuilder, RawNode, Rect};
pub use platform::{
    ActionExecutionError, ActionExecutor, ForegroundOracle, PlatformError, Screenshot,
    SnapshotSource,
};
pub use selector::{Selector, SelectorSyntaxError, query_selector, query_selector_all};
pub use subscription::{SubscriptionRegistry, parse_subscription, stringify};
pub use taprule_types::*;
pub use updater::{DocumentFetcher, HttpFetcher};

//! Rule evaluation engine
//!
//! ```text
//!   SubscriptionRegistry + overrides + foreground app
//!            │
//!            ▼
//!      ActiveRuleSet ──► Evaluator (per-rule RuleState) ──► ActionExecutor
//!                                  │
//!                                  └──► ClickLog channel
//! ```

mod error;
mod evaluator;
mod foreground;
mod rule_set;
mod service;
mod state;

#[cfg(test)]
mod evaluator_tests;

pub use error::EngineError;
pub use evaluator::{Evaluator, PassReport};
pub use foreground::{ForegroundTracker, TopActivity, WindowClass, classify_window};
pub use rule_set::{ActiveRule, ActiveRuleSet, RuleId};
pub use service::{Engine, EngineHandle, EnginePlatform};
pub use state::{Phase, RuleState};

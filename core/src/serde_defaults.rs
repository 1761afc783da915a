//! Common serde default value functions

/// Default for flags that are on unless stated otherwise
pub fn default_true() -> bool {
    true
}

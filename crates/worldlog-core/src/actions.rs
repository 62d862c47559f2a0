// ABOUTME: Built-in action ids and the registry of actions enabled by configuration.
// ABOUTME: Registration is a static enumeration in code; unknown configured ids warn and are skipped.

use std::collections::BTreeSet;

/// Prefix for all built-in action ids. User-defined actions use any other
/// string and bypass the registry entirely.
pub const NAMESPACE: &str = "wal:";

pub const BLOCK_ENTITY_BREAK: &str = "wal:block_entity_break";
pub const BLOCK_ENTITY_INTERACT: &str = "wal:block_entity_interact";
pub const BLOCK_ENTITY_PLACE: &str = "wal:block_entity_place";
pub const CHUNK_ENTER: &str = "wal:chunk_enter";
pub const CHUNK_EXIT: &str = "wal:chunk_exit";
pub const INVENTORY_OPEN: &str = "wal:inventory_open";

/// All built-in action ids, in registration order.
pub const BUILTIN_ACTIONS: [&str; 6] = [
    BLOCK_ENTITY_BREAK,
    BLOCK_ENTITY_INTERACT,
    BLOCK_ENTITY_PLACE,
    CHUNK_ENTER,
    CHUNK_EXIT,
    INVENTORY_OPEN,
];

/// The set of built-in actions enabled by configuration. Built once at
/// startup by direct enumeration over [`BUILTIN_ACTIONS`]; configured ids
/// that match no built-in action are logged and ignored.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    enabled: BTreeSet<String>,
}

impl ActionRegistry {
    /// Build the registry from the configured enabled-action list.
    ///
    /// Only ids present in [`BUILTIN_ACTIONS`] are registered. Unknown ids
    /// produce a warning naming them so the operator can clean up the
    /// config; skipped built-ins and the final registered set are logged at
    /// debug level.
    pub fn build(enabled_actions: &[String]) -> Self {
        let mut enabled = BTreeSet::new();
        let mut skipped = Vec::new();

        for action in BUILTIN_ACTIONS {
            if enabled_actions.iter().any(|a| a == action) {
                enabled.insert(action.to_string());
            } else {
                skipped.push(action);
            }
        }

        let unknown: Vec<&str> = enabled_actions
            .iter()
            .filter(|a| !BUILTIN_ACTIONS.contains(&a.as_str()))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            tracing::warn!("some enabled actions are not known: {}", unknown.join(", "));
            tracing::warn!("these actions will be ignored; remove them from the config to hide this message");
        }

        if !skipped.is_empty() {
            tracing::debug!("skipped actions: {}", skipped.join(", "));
        }
        if enabled.is_empty() {
            tracing::debug!("no built-in actions are enabled");
        } else {
            tracing::debug!(
                "listening for actions: {}",
                enabled.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
            );
        }

        Self { enabled }
    }

    /// Whether the given built-in action id was enabled by configuration.
    pub fn is_enabled(&self, action: &str) -> bool {
        self.enabled.contains(action)
    }

    /// Iterate over the enabled action ids in sorted order.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.enabled.iter().map(String::as_str)
    }
}

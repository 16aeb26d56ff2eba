//! Contextual attributes merged into events before they are sent.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{event::Event, models::Level};

/// Contextual data shared by every event captured under it.
///
/// Values already present on the event take precedence over the scope, with
/// one exception: a scope level, when set, overrides the event level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    level: Option<Level>,
    transaction: Option<String>,
    fingerprint: Option<Vec<String>>,
    tags: BTreeMap<String, String>,
    extra: Map<String, Value>,
    user: Map<String, Value>,
    contexts: Map<String, Value>,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the level of every event captured under this scope.
    pub fn set_level(&mut self, level: Option<Level>) {
        self.level = level;
    }

    /// Sets the transaction name used when the event has none.
    pub fn set_transaction(&mut self, transaction: Option<String>) {
        self.transaction = transaction;
    }

    /// Sets the fingerprint used when the event has none.
    pub fn set_fingerprint(&mut self, fingerprint: Option<Vec<String>>) {
        self.fingerprint = fingerprint;
    }

    /// Sets a tag.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(key.into(), value.into());
    }

    /// Removes a tag.
    pub fn remove_tag(&mut self, key: &str) {
        self.tags.remove(key);
    }

    /// Sets an extra value.
    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    /// Sets a user field.
    pub fn set_user_field(&mut self, key: impl Into<String>, value: Value) {
        self.user.insert(key.into(), value);
    }

    /// Sets a named context such as `runtime` or `os`.
    pub fn set_context(&mut self, key: impl Into<String>, value: Value) {
        self.contexts.insert(key.into(), value);
    }

    /// Merges this scope into `event`.
    pub fn apply_to_event(&self, event: &mut Event) {
        if let Some(level) = self.level {
            event.level = level;
        }
        if event.transaction.is_none() {
            event.transaction.clone_from(&self.transaction);
        }
        if event.fingerprint.is_empty() {
            if let Some(fingerprint) = &self.fingerprint {
                event.fingerprint.clone_from(fingerprint);
            }
        }
        for (key, value) in &self.tags {
            event.tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
        fill_missing(&mut event.extra, &self.extra);
        fill_missing(&mut event.user, &self.user);
        fill_missing(&mut event.contexts, &self.contexts);
    }
}

fn fill_missing(target: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        target.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

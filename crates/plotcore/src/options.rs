//! Named option values with change observers.
//!
//! A component registers interest in a key with [`OptionSet::on_change`];
//! [`OptionSet::set`] stores the new value and runs that key's callbacks
//! synchronously, in registration order.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

pub type OptionCallback = Box<dyn FnMut(&Value)>;

#[derive(Default)]
struct OptionEntry {
    value: Value,
    callbacks: Vec<OptionCallback>,
}

#[derive(Default)]
pub struct OptionSet {
    entries: BTreeMap<String, OptionEntry>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `key`. The key becomes handled, so
    /// [`OptionSet::update`] and [`OptionSet::serialize`] include it.
    pub fn on_change<F>(&mut self, key: impl Into<String>, callback: F)
    where
        F: FnMut(&Value) + 'static,
    {
        self.entries
            .entry(key.into())
            .or_default()
            .callbacks
            .push(Box::new(callback));
    }

    /// Stores `value` under `key` and notifies the key's observers.
    pub fn set(&mut self, key: &str, value: Value) {
        let entry = self.entries.entry(key.to_string()).or_default();
        entry.value = value;
        let OptionEntry { value, callbacks } = entry;
        for callback in callbacks.iter_mut() {
            callback(&*value);
        }
    }

    /// Stores `value` without notifying anyone.
    pub fn set_silently(&mut self, key: &str, value: Value) {
        self.entries.entry(key.to_string()).or_default().value = value;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .get(key)
            .map(|entry| &entry.value)
            .filter(|value| !value.is_null())
    }

    pub fn is_handled(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.callbacks.is_empty())
    }

    /// Applies every handled key in `options`, ignoring the rest. Returns the
    /// number of keys applied.
    pub fn update(&mut self, options: &Map<String, Value>) -> usize {
        let mut applied = 0;
        for (key, value) in options {
            if self.is_handled(key) {
                self.set(key, value.clone());
                applied += 1;
            } else {
                tracing::debug!(key = %key, "ignoring option without a handler");
            }
        }
        applied
    }

    /// Current values of every handled key.
    pub fn serialize(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.callbacks.is_empty())
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Restores a snapshot produced by [`OptionSet::serialize`], notifying
    /// observers as each value lands.
    pub fn deserialize(&mut self, snapshot: &Map<String, Value>) -> usize {
        self.update(snapshot)
    }
}

impl fmt::Debug for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(key, entry)| (key, (&entry.value, entry.callbacks.len()))),
            )
            .finish()
    }
}

//! Process-wide environment snapshot.
//!
//! The embedding application owns the map and may mutate it; the facade
//! only reads it (login name, home directory, shell for the fallback
//! user database).

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct EnvMap {
    vars: RwLock<HashMap<String, String>>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the real process environment. Non-UTF-8 entries are
    /// converted lossily.
    pub fn capture() -> Self {
        Self::from_pairs(std::env::vars_os().map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        }))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: RwLock::new(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// First of `keys` that is set to a non-empty value.
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        let vars = self.vars.read().unwrap_or_else(|e| e.into_inner());
        keys.iter()
            .filter_map(|k| vars.get(*k))
            .find(|v| !v.is_empty())
            .cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.vars
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.vars.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.vars.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ABOUTME: In-memory settings store holding the complete, always-valid snapshot
// ABOUTME: Initialized from persisted state with per-key fallback to registry defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! The settings store.
//!
//! Holds exactly one value for every declared key. A [`SettingsSnapshot`] is
//! always fully populated - missing keys resolve to defaults at load time,
//! never at read time - and every value in it satisfies its definition's
//! constraints. Reads never observe a partially-applied change set: the
//! store state is swapped wholesale under the write lock, so a reader sees
//! either the pre- or post-transaction state.

use crate::errors::{SettingsError, SettingsResult};
use crate::schema::{SchemaRegistry, SettingValue};
use crate::validation::check_value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Complete mapping from every declared key to its current value.
///
/// Invariant: `keys(snapshot) == keys(registry)` at all times, and every
/// value satisfies its definition's constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSnapshot(BTreeMap<String, SettingValue>);

impl SettingsSnapshot {
    pub(crate) fn from_values(values: BTreeMap<String, SettingValue>) -> Self {
        Self(values)
    }

    /// Value for a key, `None` if the key was never declared
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    /// Iterate all key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of settings in the snapshot
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn set(&mut self, key: String, value: SettingValue) {
        self.0.insert(key, value);
    }

    pub(crate) fn values(&self) -> &BTreeMap<String, SettingValue> {
        &self.0
    }
}

/// Values handed back by the persistence collaborator at startup.
///
/// May be stale relative to the current registry; the store reconciles it
/// key by key.
pub type PersistedValues = BTreeMap<String, SettingValue>;

/// Process-wide settings state.
///
/// Single-writer, multi-reader: mutations go through the transaction
/// manager, which swaps a fully-built snapshot in under the write lock;
/// readers clone out of the read lock and never block each other.
#[derive(Debug)]
pub struct SettingsStore {
    registry: Arc<SchemaRegistry>,
    state: RwLock<SettingsSnapshot>,
}

impl SettingsStore {
    /// Initialize purely from registry defaults
    #[must_use]
    pub fn from_defaults(registry: Arc<SchemaRegistry>) -> Self {
        Self::from_persisted(registry, None)
    }

    /// Initialize from persisted values, falling back per key.
    ///
    /// Any persisted value that fails current validation (the schema may
    /// have changed since the last save) is replaced by its default and the
    /// discrepancy is logged as a warning, not a fatal error. Persisted keys
    /// no longer in the registry are dropped with a warning.
    #[must_use]
    pub fn from_persisted(
        registry: Arc<SchemaRegistry>,
        persisted: Option<PersistedValues>,
    ) -> Self {
        let persisted = persisted.unwrap_or_default();
        let mut values = BTreeMap::new();

        for definition in registry.definitions() {
            let value = match persisted.get(&definition.key) {
                Some(stored) => match check_value(definition, stored) {
                    Ok(()) => stored.clone(),
                    Err(reason) => {
                        warn!(
                            key = %definition.key,
                            %reason,
                            "persisted value no longer valid, falling back to default"
                        );
                        definition.default.clone()
                    }
                },
                None => definition.default.clone(),
            };
            values.insert(definition.key.clone(), value);
        }

        for key in persisted.keys() {
            if registry.definition(key).is_none() {
                warn!(%key, "dropping persisted value for undeclared setting");
            }
        }

        Self {
            registry,
            state: RwLock::new(SettingsSnapshot::from_values(values)),
        }
    }

    /// Read-only copy of the complete current state
    pub async fn snapshot(&self) -> SettingsSnapshot {
        self.state.read().await.clone()
    }

    /// Current value for one key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownKey`] for keys never declared.
    pub async fn current_value(&self, key: &str) -> SettingsResult<SettingValue> {
        // Registry check first so the error does not depend on store state
        self.registry.get(key)?;
        let state = self.state.read().await;
        state
            .value(key)
            .cloned()
            .ok_or_else(|| SettingsError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// The registry this store was built against
    #[must_use]
    pub const fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Replace the whole state with an already-validated snapshot.
    ///
    /// Only the transaction manager calls this, after the snapshot has been
    /// durably persisted.
    pub(crate) async fn commit(&self, next: SettingsSnapshot) {
        *self.state.write().await = next;
    }
}

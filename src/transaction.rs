// ABOUTME: Atomic per-section transaction manager for settings mutations
// ABOUTME: Guard check, full validation, durable persist, snapshot swap, event emission
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Section transactions.
//!
//! All mutations flow through [`SectionTransactionManager`]. A commit is
//! defined as "validated AND durably persisted": the new snapshot is written
//! to the persistence collaborator first and only then swapped into memory,
//! so in-memory and durable state never diverge. Validation or persistence
//! failure leaves the store completely unchanged.
//!
//! Mutations are serialized behind a single write gate; readers are never
//! blocked by it.

use crate::access::{AccessGuard, Actor, Operation};
use crate::codec::ImportMode;
use crate::errors::{SettingsError, SettingsResult};
use crate::events::{EventBus, SettingsEvent};
use crate::schema::{ChangeSet, SectionName, SettingValue};
use crate::store::{SettingsSnapshot, SettingsStore};
use crate::validation::{ValidationErrors, ValidationFailure, Validator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Committed changes kept in the in-memory audit trail
const MAX_AUDIT_ENTRIES: usize = 512;

/// One committed key change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// When the transaction committed
    pub timestamp: DateTime<Utc>,
    /// Who committed it
    pub actor: String,
    /// Section the key belongs to
    pub section: SectionName,
    /// The changed key
    pub key: String,
    /// Value before the transaction
    pub old_value: SettingValue,
    /// Value after the transaction
    pub new_value: SettingValue,
}

/// Applies change sets atomically: all keys in a transaction succeed or none
/// are applied.
pub struct SectionTransactionManager {
    store: Arc<SettingsStore>,
    validator: Arc<Validator>,
    guard: Arc<dyn AccessGuard>,
    persistence: Arc<dyn crate::persistence::SettingsPersistence>,
    events: Arc<EventBus>,
    // Serializes mutations; at most one transaction runs at a time
    write_gate: Mutex<()>,
    audit: RwLock<VecDeque<AuditEntry>>,
}

impl SectionTransactionManager {
    /// Wire a manager over its collaborators
    #[must_use]
    pub fn new(
        store: Arc<SettingsStore>,
        validator: Arc<Validator>,
        guard: Arc<dyn AccessGuard>,
        persistence: Arc<dyn crate::persistence::SettingsPersistence>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            validator,
            guard,
            persistence,
            events,
            write_gate: Mutex::new(()),
            audit: RwLock::new(VecDeque::new()),
        }
    }

    /// Apply a batch of key changes for one section atomically.
    ///
    /// Order of checks: access guard (before validation, so schema details
    /// are not leaked to unauthorized callers), then section membership and
    /// full validation, then persist-and-swap. Returns the post-commit
    /// snapshot; applying an identical change set again is a no-op that
    /// succeeds without re-persisting or re-emitting.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Unauthorized`] if the guard denies the write,
    /// [`SettingsError::Validation`] with every failing key if the change
    /// set is invalid, [`SettingsError::Persistence`] if the durable write
    /// fails (in-memory state is left at its pre-transaction value).
    pub async fn apply_section(
        &self,
        actor: &Actor,
        section: SectionName,
        changes: &ChangeSet,
    ) -> SettingsResult<SettingsSnapshot> {
        self.authorize_write(actor, section).await?;

        let _gate = self.write_gate.lock().await;
        let current = self.store.snapshot().await;

        self.validator
            .validate_change_set(section, changes, &current)
            .map_err(SettingsError::Validation)?;

        let (next, changed_keys) = build_next(&current, changes);
        if changed_keys.is_empty() {
            debug!(%section, actor = %actor.id, "change set is a no-op, nothing to commit");
            return Ok(current);
        }

        self.persistence
            .persist(&next)
            .await
            .map_err(SettingsError::Persistence)?;
        self.store.commit(next.clone()).await;

        self.record_audit(actor, section, &current, &next, &changed_keys)
            .await;
        info!(
            %section,
            actor = %actor.id,
            changed = changed_keys.len(),
            "settings section committed"
        );
        self.events.publish(SettingsEvent::SectionChanged {
            section,
            changed_keys,
        });

        Ok(next)
    }

    /// Apply changes spanning several sections as one transaction.
    ///
    /// Used by document import: the whole batch is validated, persisted once
    /// and swapped once, so a failure in one section never partially commits
    /// another. One `SectionChanged` event is emitted per section that
    /// actually changed.
    ///
    /// Validation runs on the unfiltered batch in both modes, so an invalid
    /// document value is reported even when merge filtering would drop it.
    /// Mode filtering itself happens under the write gate, against the same
    /// snapshot the commit is built from: a value committed by a concurrent
    /// transaction counts as "existing" for `MergeKeepExisting`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`Self::apply_section`]; validation failures are
    /// collected across all sections.
    pub async fn apply_sections(
        &self,
        actor: &Actor,
        sections: &BTreeMap<SectionName, ChangeSet>,
        mode: ImportMode,
    ) -> SettingsResult<SettingsSnapshot> {
        for section in sections.keys() {
            self.authorize_write(actor, *section).await?;
        }

        let _gate = self.write_gate.lock().await;
        let current = self.store.snapshot().await;

        let mut failures: Vec<ValidationFailure> = Vec::new();
        for (section, changes) in sections {
            if let Err(errors) = self
                .validator
                .validate_change_set(*section, changes, &current)
            {
                failures.extend(errors.failures().iter().cloned());
            }
        }
        if !failures.is_empty() {
            return Err(SettingsError::Validation(ValidationErrors::new(failures)));
        }

        let sections = self.filter_for_mode(sections, mode, &current);

        let mut next = current.clone();
        let mut changed_per_section: Vec<(SectionName, Vec<String>)> = Vec::new();
        for (section, changes) in &sections {
            let (candidate, changed_keys) = build_next(&next, changes);
            next = candidate;
            if !changed_keys.is_empty() {
                changed_per_section.push((*section, changed_keys));
            }
        }
        if changed_per_section.is_empty() {
            debug!(actor = %actor.id, "import changed nothing, skipping commit");
            return Ok(current);
        }

        self.persistence
            .persist(&next)
            .await
            .map_err(SettingsError::Persistence)?;
        self.store.commit(next.clone()).await;

        for (section, changed_keys) in &changed_per_section {
            self.record_audit(actor, *section, &current, &next, changed_keys)
                .await;
        }
        info!(
            actor = %actor.id,
            sections = changed_per_section.len(),
            "multi-section settings transaction committed"
        );
        for (section, changed_keys) in changed_per_section {
            self.events.publish(SettingsEvent::SectionChanged {
                section,
                changed_keys,
            });
        }

        Ok(next)
    }

    /// Most recent committed changes, newest first
    pub async fn recent_changes(&self, limit: usize) -> Vec<AuditEntry> {
        let audit = self.audit.read().await;
        audit.iter().rev().take(limit).cloned().collect()
    }

    /// Reduce a batch to the changes its mode actually applies. Runs under
    /// the write gate so the default-vs-existing decision and the commit see
    /// the same store state.
    fn filter_for_mode(
        &self,
        sections: &BTreeMap<SectionName, ChangeSet>,
        mode: ImportMode,
        current: &SettingsSnapshot,
    ) -> BTreeMap<SectionName, ChangeSet> {
        match mode {
            ImportMode::Overwrite => sections.clone(),
            ImportMode::MergeKeepExisting => {
                let registry = self.store.registry();
                sections
                    .iter()
                    .map(|(section, values)| {
                        let kept = values
                            .iter()
                            .filter(|(key, _)| {
                                registry.definition(key).is_some_and(|definition| {
                                    current.value(key) == Some(&definition.default)
                                })
                            })
                            .map(|(key, value)| (key.clone(), value.clone()))
                            .collect();
                        (*section, kept)
                    })
                    .collect()
            }
        }
    }

    async fn authorize_write(&self, actor: &Actor, section: SectionName) -> SettingsResult<()> {
        let decision = self
            .guard
            .authorize(actor, Operation::WriteSection, Some(section))
            .await;
        if decision.is_allowed() {
            Ok(())
        } else {
            Err(SettingsError::Unauthorized {
                operation: Operation::WriteSection,
                section: Some(section),
            })
        }
    }

    async fn record_audit(
        &self,
        actor: &Actor,
        section: SectionName,
        before: &SettingsSnapshot,
        after: &SettingsSnapshot,
        changed_keys: &[String],
    ) {
        let now = Utc::now();
        let mut audit = self.audit.write().await;
        for key in changed_keys {
            let (Some(old_value), Some(new_value)) = (before.value(key), after.value(key)) else {
                continue;
            };
            audit.push_back(AuditEntry {
                timestamp: now,
                actor: actor.id.clone(),
                section,
                key: key.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            });
            if audit.len() > MAX_AUDIT_ENTRIES {
                audit.pop_front();
            }
        }
    }
}

impl std::fmt::Debug for SectionTransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionTransactionManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

/// Overlay a change set on a snapshot, returning the candidate snapshot and
/// the keys whose value actually changed (in key order).
fn build_next(current: &SettingsSnapshot, changes: &ChangeSet) -> (SettingsSnapshot, Vec<String>) {
    let mut next = current.clone();
    let mut changed_keys = Vec::new();
    for (key, value) in changes {
        if current.value(key) != Some(value) {
            changed_keys.push(key.clone());
            next.set(key.clone(), value.clone());
        }
    }
    (next, changed_keys)
}

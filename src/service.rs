// ABOUTME: Top-level settings service bundling store, validator, guard, persistence and events
// ABOUTME: Exposes the four calls the presentation layer drives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! The settings service.
//!
//! [`SettingsService`] wires the sealed registry, store, validator,
//! transaction manager and codec together over the two external
//! collaborators (access guard and persistence backend) and exposes the
//! surface an admin UI drives: `get_snapshot`, `apply_section`,
//! `export_settings` and `import_settings`.

use crate::access::{AccessGuard, Actor};
use crate::catalog;
use crate::codec::{ExportDocument, ImportMode, Migration, SettingsCodec};
use crate::errors::{SettingsError, SettingsResult};
use crate::events::{EventBus, SettingsEvent};
use crate::persistence::SettingsPersistence;
use crate::schema::{ChangeSet, SchemaRegistry, SectionName, SettingValue};
use crate::store::{SettingsSnapshot, SettingsStore};
use crate::transaction::{AuditEntry, SectionTransactionManager};
use crate::validation::{SectionRule, Validator};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Process-wide settings engine
#[derive(Debug)]
pub struct SettingsService {
    registry: Arc<SchemaRegistry>,
    store: Arc<SettingsStore>,
    manager: Arc<SectionTransactionManager>,
    codec: SettingsCodec,
    events: Arc<EventBus>,
}

impl SettingsService {
    /// Initialize with the built-in StockPilot catalog and its rules.
    ///
    /// # Errors
    ///
    /// Fails if the catalog is self-inconsistent or the persistence backend
    /// cannot be read at startup.
    pub async fn with_catalog(
        guard: Arc<dyn AccessGuard>,
        persistence: Arc<dyn SettingsPersistence>,
    ) -> SettingsResult<Self> {
        let registry = Arc::new(catalog::stockpilot_registry()?);
        Self::initialize(registry, catalog::section_rules(), guard, persistence, Vec::new()).await
    }

    /// Initialize over an arbitrary sealed registry.
    ///
    /// Loads persisted state through the persistence collaborator; absent
    /// state starts from registry defaults, and stale persisted values fall
    /// back per key with a logged warning.
    ///
    /// # Errors
    ///
    /// Fails if the persistence backend cannot be read at startup.
    pub async fn initialize(
        registry: Arc<SchemaRegistry>,
        rules: Vec<SectionRule>,
        guard: Arc<dyn AccessGuard>,
        persistence: Arc<dyn SettingsPersistence>,
        migrations: Vec<Box<dyn Migration>>,
    ) -> SettingsResult<Self> {
        let persisted = persistence
            .load()
            .await
            .map_err(SettingsError::Persistence)?;
        let store = Arc::new(SettingsStore::from_persisted(
            Arc::clone(&registry),
            persisted,
        ));
        let validator = Arc::new(Validator::new(Arc::clone(&registry), rules));
        let events = Arc::new(EventBus::new());
        let manager = Arc::new(SectionTransactionManager::new(
            Arc::clone(&store),
            Arc::clone(&validator),
            Arc::clone(&guard),
            Arc::clone(&persistence),
            Arc::clone(&events),
        ));
        let mut codec = SettingsCodec::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            guard,
            Arc::clone(&manager),
        );
        for migration in migrations {
            codec = codec.with_migration(migration);
        }

        info!(settings = registry.len(), "settings service initialized");
        Ok(Self {
            registry,
            store,
            manager,
            codec,
            events,
        })
    }

    /// Read-only copy of the complete current state
    pub async fn get_snapshot(&self) -> SettingsSnapshot {
        self.store.snapshot().await
    }

    /// Current value for one key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownKey`] for undeclared keys.
    pub async fn current_value(&self, key: &str) -> SettingsResult<SettingValue> {
        self.store.current_value(key).await
    }

    /// Apply a change set to one section atomically.
    ///
    /// # Errors
    ///
    /// See [`SectionTransactionManager::apply_section`].
    pub async fn apply_section(
        &self,
        actor: &Actor,
        section: SectionName,
        changes: &ChangeSet,
    ) -> SettingsResult<SettingsSnapshot> {
        self.manager.apply_section(actor, section, changes).await
    }

    /// Export the current settings as a portable document.
    ///
    /// # Errors
    ///
    /// See [`SettingsCodec::export`].
    pub async fn export_settings(
        &self,
        actor: &Actor,
        include_sensitive: bool,
    ) -> SettingsResult<ExportDocument> {
        self.codec.export(actor, include_sensitive).await
    }

    /// Import a portable settings document.
    ///
    /// # Errors
    ///
    /// See [`SettingsCodec::import`].
    pub async fn import_settings(
        &self,
        actor: &Actor,
        document: ExportDocument,
        mode: ImportMode,
    ) -> SettingsResult<SettingsSnapshot> {
        self.codec.import(actor, document, mode).await
    }

    /// Subscribe to committed-change events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsEvent> {
        self.events.subscribe()
    }

    /// Most recent committed changes, newest first
    pub async fn recent_changes(&self, limit: usize) -> Vec<AuditEntry> {
        self.manager.recent_changes(limit).await
    }

    /// The sealed registry, for catalog listings and form rendering
    #[must_use]
    pub const fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }
}

// ABOUTME: Import/export codec for portable settings documents
// ABOUTME: Sensitive-key omission, overwrite/merge import modes and the format version gate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Settings import and export.
//!
//! An [`ExportDocument`] is the portable serialized form of a snapshot:
//! plain nested JSON (`section -> key -> value`) so it can be hand-edited
//! and re-imported. Sensitive keys are omitted - not nulled - unless the
//! caller holds elevated access, so a round-trip import never blanks them
//! out.
//!
//! Import pre-validates the entire document and commits it as one
//! multi-section transaction: a failure in any section leaves every section
//! untouched.

use crate::access::{AccessGuard, Actor, Operation};
use crate::errors::{SettingsError, SettingsResult};
use crate::schema::{SchemaRegistry, SectionName, SettingValue};
use crate::store::{SettingsSnapshot, SettingsStore};
use crate::transaction::SectionTransactionManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Document format version this build reads and writes
pub const FORMAT_VERSION: u32 = 1;

/// Portable serialized form of a settings snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDocument {
    /// Format version of this document
    pub format_version: u32,
    /// When the document was produced
    pub exported_at: DateTime<Utc>,
    /// Section -> key -> value, sensitive keys omitted by default
    pub sections: BTreeMap<SectionName, BTreeMap<String, SettingValue>>,
}

/// How imported values combine with the current store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Document values win over current values
    Overwrite,
    /// Current values win; document values land only where the store still
    /// holds the registry default
    MergeKeepExisting,
}

/// Extension point for upgrading documents written by older builds.
///
/// A migration maps a document of `source_version` one step forward. None
/// ship by default; without a covering migration a foreign version fails
/// with [`SettingsError::SchemaVersionMismatch`].
pub trait Migration: Send + Sync {
    /// Document version this migration consumes
    fn source_version(&self) -> u32;

    /// Produce the upgraded document.
    ///
    /// # Errors
    ///
    /// Implementations may reject documents they cannot upgrade.
    fn migrate(&self, document: ExportDocument) -> SettingsResult<ExportDocument>;
}

/// Serializes the store to portable documents and applies them back
pub struct SettingsCodec {
    registry: Arc<SchemaRegistry>,
    store: Arc<SettingsStore>,
    guard: Arc<dyn AccessGuard>,
    manager: Arc<SectionTransactionManager>,
    migrations: Vec<Box<dyn Migration>>,
}

impl SettingsCodec {
    /// Wire a codec over its collaborators
    #[must_use]
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<SettingsStore>,
        guard: Arc<dyn AccessGuard>,
        manager: Arc<SectionTransactionManager>,
    ) -> Self {
        Self {
            registry,
            store,
            guard,
            manager,
            migrations: Vec::new(),
        }
    }

    /// Register a document migration step
    #[must_use]
    pub fn with_migration(mut self, migration: Box<dyn Migration>) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Export the current store as a portable document.
    ///
    /// Sensitive keys are omitted entirely unless `include_sensitive` is
    /// requested and granted by the access guard.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Unauthorized`] if sensitive export is requested and
    /// denied.
    pub async fn export(
        &self,
        actor: &Actor,
        include_sensitive: bool,
    ) -> SettingsResult<ExportDocument> {
        if include_sensitive {
            let decision = self
                .guard
                .authorize(actor, Operation::ExportSensitive, None)
                .await;
            if !decision.is_allowed() {
                return Err(SettingsError::Unauthorized {
                    operation: Operation::ExportSensitive,
                    section: None,
                });
            }
        }

        let snapshot = self.store.snapshot().await;
        let mut sections: BTreeMap<SectionName, BTreeMap<String, SettingValue>> = BTreeMap::new();
        for definition in self.registry.definitions() {
            if definition.sensitive && !include_sensitive {
                continue;
            }
            let value = snapshot
                .value(&definition.key)
                .unwrap_or(&definition.default)
                .clone();
            sections
                .entry(definition.section)
                .or_default()
                .insert(definition.key.clone(), value);
        }

        info!(actor = %actor.id, include_sensitive, "settings exported");
        Ok(ExportDocument {
            format_version: FORMAT_VERSION,
            exported_at: Utc::now(),
            sections,
        })
    }

    /// Apply a portable document to the store.
    ///
    /// Order of checks: write authorization for every section in the
    /// document, then the format version gate (with migrations), then full
    /// pre-validation of every section, then a single atomic multi-section
    /// commit. Keys absent from the document - sensitive keys omitted on
    /// export, most commonly - keep their current value.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Unauthorized`], [`SettingsError::SchemaVersionMismatch`],
    /// [`SettingsError::Validation`] (every failing key across all sections)
    /// or [`SettingsError::Persistence`]. The store is untouched on any
    /// failure.
    pub async fn import(
        &self,
        actor: &Actor,
        document: ExportDocument,
        mode: ImportMode,
    ) -> SettingsResult<SettingsSnapshot> {
        for section in document.sections.keys() {
            let decision = self
                .guard
                .authorize(actor, Operation::WriteSection, Some(*section))
                .await;
            if !decision.is_allowed() {
                return Err(SettingsError::Unauthorized {
                    operation: Operation::WriteSection,
                    section: Some(*section),
                });
            }
        }

        let document = self.upgrade(document)?;

        // Validation and merge filtering both happen inside the manager's
        // write gate, against the snapshot the commit is built from.
        let snapshot = self
            .manager
            .apply_sections(actor, &document.sections, mode)
            .await?;
        info!(actor = %actor.id, ?mode, "settings document imported");
        Ok(snapshot)
    }

    /// Run registered migrations until the document reaches the supported
    /// version, or fail with a version mismatch.
    fn upgrade(&self, mut document: ExportDocument) -> SettingsResult<ExportDocument> {
        let mut steps = 0;
        while document.format_version != FORMAT_VERSION {
            let migration = self
                .migrations
                .iter()
                .find(|m| m.source_version() == document.format_version);
            let Some(migration) = migration else {
                return Err(SettingsError::SchemaVersionMismatch {
                    document: document.format_version,
                    supported: FORMAT_VERSION,
                });
            };
            warn!(
                from = document.format_version,
                to = FORMAT_VERSION,
                "migrating settings document"
            );
            let source_version = document.format_version;
            document = migration.migrate(document)?;
            if document.format_version == source_version {
                // A migration that does not advance the version would loop
                return Err(SettingsError::SchemaVersionMismatch {
                    document: source_version,
                    supported: FORMAT_VERSION,
                });
            }
            steps += 1;
            if steps > self.migrations.len() {
                return Err(SettingsError::SchemaVersionMismatch {
                    document: document.format_version,
                    supported: FORMAT_VERSION,
                });
            }
        }
        Ok(document)
    }

}

impl std::fmt::Debug for SettingsCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsCodec")
            .field("migrations", &self.migrations.len())
            .finish_non_exhaustive()
    }
}

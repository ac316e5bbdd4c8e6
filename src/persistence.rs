// ABOUTME: Persistence collaborator contract and the bundled storage backends
// ABOUTME: JSON file backend with atomic writes plus an in-memory backend for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Durable storage for committed snapshots.
//!
//! The engine only requires the two-method [`SettingsPersistence`] contract:
//! `load` once at startup and `persist` once per committed transaction. The
//! storage format is the backend's business. Two backends ship here: a
//! human-readable JSON file (written atomically via a temp file rename) and
//! an in-memory map for tests.

use crate::store::{PersistedValues, SettingsSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Storage backend contract, invoked once per committed transaction
#[async_trait]
pub trait SettingsPersistence: Send + Sync {
    /// Load the previously persisted values, `None` on first run
    async fn load(&self) -> Result<Option<PersistedValues>>;

    /// Durably persist a committed snapshot
    async fn persist(&self, snapshot: &SettingsSnapshot) -> Result<()>;
}

/// On-disk shape of the JSON file backend
#[derive(Debug, Serialize, Deserialize)]
struct FileDocument {
    updated_at: DateTime<Utc>,
    values: PersistedValues,
}

/// JSON file backend. The file is hand-readable and rewritten atomically.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    /// Backend storing its document at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where this backend stores its document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsPersistence for JsonFileSettings {
    async fn load(&self) -> Result<Option<PersistedValues>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file yet, starting from defaults");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading settings file {}", self.path.display()))
            }
        };
        let document: FileDocument = serde_json::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", self.path.display()))?;
        Ok(Some(document.values))
    }

    async fn persist(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        let document = FileDocument {
            updated_at: Utc::now(),
            values: snapshot.values().clone(),
        };
        let rendered =
            serde_json::to_string_pretty(&document).context("encoding settings document")?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating settings directory {}", parent.display()))?;
            }
        }

        // Write-then-rename so a crash mid-write never truncates the live file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, rendered.as_bytes())
            .await
            .with_context(|| format!("writing settings file {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing settings file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "settings persisted");
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral deployments
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: Mutex<Option<PersistedValues>>,
}

impl InMemorySettings {
    /// Empty backend; `load` returns `None` until the first persist
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-seeded with values, as if a previous run had persisted them
    #[must_use]
    pub fn seeded(values: PersistedValues) -> Self {
        Self {
            values: Mutex::new(Some(values)),
        }
    }
}

#[async_trait]
impl SettingsPersistence for InMemorySettings {
    async fn load(&self) -> Result<Option<PersistedValues>> {
        let guard = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory settings lock poisoned"))?;
        Ok(guard.clone())
    }

    async fn persist(&self, snapshot: &SettingsSnapshot) -> Result<()> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("in-memory settings lock poisoned"))?;
        *guard = Some(snapshot.values().clone());
        Ok(())
    }
}

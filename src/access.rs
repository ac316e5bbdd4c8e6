// ABOUTME: Access guard seam consulted before every mutating settings operation
// ABOUTME: Defines the authorization contract plus simple built-in guard implementations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Authorization collaborator.
//!
//! The settings engine consults an [`AccessGuard`] before every mutating
//! operation and before sensitive export; it does not implement
//! authorization itself. The guard runs before validation so schema details
//! are never leaked to unauthorized callers.

use crate::schema::SectionName;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Who is asking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable identifier recorded in the audit trail
    pub id: String,
}

impl Actor {
    /// Actor with the given identifier
    #[must_use]
    pub fn named(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Operations the guard can be asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Read the settings of a section
    ReadSection,
    /// Mutate the settings of a section
    WriteSection,
    /// Include sensitive values in an export
    ExportSensitive,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadSection => "read_section",
            Self::WriteSection => "write_section",
            Self::ExportSensitive => "export_sensitive",
        };
        f.write_str(name)
    }
}

/// Guard verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Operation may proceed
    Allow,
    /// Operation is denied
    Deny,
}

impl Decision {
    /// Whether this verdict allows the operation
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Authorization subsystem contract.
///
/// Implementations are external collaborators; this crate ships two trivial
/// ones for development and tests.
#[async_trait]
pub trait AccessGuard: Send + Sync {
    /// Decide whether `actor` may perform `operation`, optionally scoped to
    /// a section.
    async fn authorize(
        &self,
        actor: &Actor,
        operation: Operation,
        section: Option<SectionName>,
    ) -> Decision;
}

/// Guard that allows everything. Development and local tooling only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessGuard for AllowAll {
    async fn authorize(
        &self,
        _actor: &Actor,
        _operation: Operation,
        _section: Option<SectionName>,
    ) -> Decision {
        Decision::Allow
    }
}

/// Fixed-grant guard: per-actor writable sections and sensitive-export
/// permission. Reads are unrestricted.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGuard {
    write_grants: HashMap<String, HashSet<SectionName>>,
    sensitive_exporters: HashSet<String>,
}

impl StaticAccessGuard {
    /// Empty guard; denies every mutation until grants are added
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow an actor to write one section
    #[must_use]
    pub fn grant_write(mut self, actor_id: &str, section: SectionName) -> Self {
        self.write_grants
            .entry(actor_id.to_string())
            .or_default()
            .insert(section);
        self
    }

    /// Allow an actor to write every section
    #[must_use]
    pub fn grant_write_all(mut self, actor_id: &str) -> Self {
        let sections = self
            .write_grants
            .entry(actor_id.to_string())
            .or_default();
        sections.extend(SectionName::ALL);
        self
    }

    /// Allow an actor to export sensitive values
    #[must_use]
    pub fn grant_sensitive_export(mut self, actor_id: &str) -> Self {
        self.sensitive_exporters.insert(actor_id.to_string());
        self
    }
}

#[async_trait]
impl AccessGuard for StaticAccessGuard {
    async fn authorize(
        &self,
        actor: &Actor,
        operation: Operation,
        section: Option<SectionName>,
    ) -> Decision {
        let allowed = match operation {
            Operation::ReadSection => true,
            Operation::WriteSection => section.is_some_and(|target| {
                self.write_grants
                    .get(&actor.id)
                    .is_some_and(|sections| sections.contains(&target))
            }),
            Operation::ExportSensitive => self.sensitive_exporters.contains(&actor.id),
        };
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

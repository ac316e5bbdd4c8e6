// ABOUTME: Unified error handling for the settings engine
// ABOUTME: Defines the error taxonomy, stable error codes and the crate result alias
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! # Unified Error Handling
//!
//! Every rejected operation in this crate returns a structured, enumerable
//! reason - never a bare failure flag. Validation failures are collected
//! exhaustively and surfaced as a single [`ValidationErrors`] listing every
//! failing key, so a caller (typically an admin UI) can display all problems
//! at once.

use crate::access::Operation;
use crate::schema::SectionName;
use crate::validation::ValidationErrors;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes used in serialized error payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Key never declared in the schema registry
    #[serde(rename = "UNKNOWN_KEY")]
    UnknownKey,
    /// Key declared twice during registry construction
    #[serde(rename = "DUPLICATE_KEY")]
    DuplicateKey,
    /// A definition's own default violates its constraints
    #[serde(rename = "INVALID_DEFAULT")]
    InvalidDefault,
    /// One or more proposed values failed validation
    #[serde(rename = "VALIDATION_FAILED")]
    ValidationFailed,
    /// The access guard denied the operation
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    /// Import document format version is not supported
    #[serde(rename = "SCHEMA_VERSION_MISMATCH")]
    SchemaVersionMismatch,
    /// The persistence collaborator reported a failure
    #[serde(rename = "PERSISTENCE_ERROR")]
    PersistenceError,
}

/// Errors produced by the settings engine
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Key never declared in the schema registry
    #[error("unknown setting key '{key}'")]
    UnknownKey {
        /// The undeclared key
        key: String,
    },

    /// Key declared twice during registry construction
    #[error("setting key '{key}' is already declared")]
    DuplicateKey {
        /// The duplicated key
        key: String,
    },

    /// A definition's own default violates its constraints
    #[error("default value for '{key}' violates its own constraints: {reason}")]
    InvalidDefault {
        /// The offending key
        key: String,
        /// Why the default was rejected
        reason: String,
    },

    /// One or more proposed values failed validation. Carries every failing
    /// key, never just the first.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The access guard denied the operation. Checked before validation so
    /// schema details are not leaked to unauthorized callers.
    #[error("not authorized for {operation}{}", section.map(|s| format!(" on section '{s}'")).unwrap_or_default())]
    Unauthorized {
        /// The denied operation
        operation: Operation,
        /// Section the operation targeted, if any
        section: Option<SectionName>,
    },

    /// Import document format version is not supported and no registered
    /// migration covers it
    #[error("settings document format version {document} is not supported (supported: {supported})")]
    SchemaVersionMismatch {
        /// Version carried by the document
        document: u32,
        /// Version this build understands
        supported: u32,
    },

    /// The persistence collaborator failed. On commit this means the
    /// transaction was rolled back; in-memory and durable state never
    /// diverge.
    #[error("persistence backend failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl SettingsError {
    /// Stable code for serialized error payloads
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownKey { .. } => ErrorCode::UnknownKey,
            Self::DuplicateKey { .. } => ErrorCode::DuplicateKey,
            Self::InvalidDefault { .. } => ErrorCode::InvalidDefault,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Unauthorized { .. } => ErrorCode::Unauthorized,
            Self::SchemaVersionMismatch { .. } => ErrorCode::SchemaVersionMismatch,
            Self::Persistence(_) => ErrorCode::PersistenceError,
        }
    }

    /// The exhaustive failure list, if this is a validation error
    #[must_use]
    pub const fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Standard result type used throughout the settings engine
pub type SettingsResult<T> = Result<T, SettingsError>;

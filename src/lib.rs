// ABOUTME: Main library entry point for the StockPilot settings engine
// ABOUTME: Sealed schema registry, validated settings store, atomic section transactions, import/export
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

#![deny(unsafe_code)]

//! # StockPilot Settings Engine
//!
//! The settings backend behind the StockPilot inventory admin: one
//! structured configuration object keyed by named settings, with
//! defaulting, validation, partial per-section update, import/export
//! round-tripping and access-controlled mutation.
//!
//! ## Architecture
//!
//! - **Schema registry**: every recognized setting is declared once, with
//!   its section, type, default and constraints, then the registry is
//!   sealed - no further mutation API exists.
//! - **Store**: a complete, always-valid snapshot of every declared
//!   setting; single writer, many readers.
//! - **Validator**: per-key type/constraint checks plus cross-key section
//!   rules, collecting every failure instead of stopping at the first.
//! - **Transaction manager**: per-section atomic updates; a commit is
//!   "validated AND durably persisted", so in-memory and durable state
//!   never diverge.
//! - **Codec**: portable JSON export/import with sensitive-key omission
//!   and a format version gate.
//!
//! Authorization and durable storage are external collaborators behind the
//! [`access::AccessGuard`] and [`persistence::SettingsPersistence`] traits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stockpilot_settings::access::{Actor, AllowAll};
//! use stockpilot_settings::persistence::InMemorySettings;
//! use stockpilot_settings::schema::{ChangeSet, SectionName, SettingValue};
//! use stockpilot_settings::service::SettingsService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service =
//!         SettingsService::with_catalog(Arc::new(AllowAll), Arc::new(InMemorySettings::new()))
//!             .await?;
//!
//!     let mut changes = ChangeSet::new();
//!     changes.insert("low_stock_threshold".into(), SettingValue::Integer(25));
//!     let actor = Actor::named("admin");
//!     service
//!         .apply_section(&actor, SectionName::Inventory, &changes)
//!         .await?;
//!     Ok(())
//! }
//! ```

/// Access guard collaborator contract and built-in guards
pub mod access;

/// The concrete StockPilot setting catalog
pub mod catalog;

/// Import/export codec and portable document format
pub mod codec;

/// Unified error handling with stable error codes
pub mod errors;

/// Committed-change event broadcasting
pub mod events;

/// Logging configuration and setup
pub mod logging;

/// Persistence collaborator contract and bundled backends
pub mod persistence;

/// Core schema types and the sealed registry
pub mod schema;

/// The settings service facade driven by the presentation layer
pub mod service;

/// The in-memory settings store
pub mod store;

/// Atomic per-section transactions and the audit trail
pub mod transaction;

/// Per-key and cross-key validation
pub mod validation;

// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides quiet logging plus service and change-set fixture helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

//! Shared test utilities for `stockpilot_settings` integration tests.

use std::sync::{Arc, Once};
use stockpilot_settings::access::{AccessGuard, AllowAll};
use stockpilot_settings::persistence::{InMemorySettings, SettingsPersistence};
use stockpilot_settings::schema::{ChangeSet, SettingValue};
use stockpilot_settings::service::SettingsService;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Service over the built-in catalog with an allow-all guard and in-memory
/// persistence
pub async fn create_test_service() -> SettingsService {
    init_test_logging();
    SettingsService::with_catalog(Arc::new(AllowAll), Arc::new(InMemorySettings::new()))
        .await
        .unwrap()
}

/// Service over the built-in catalog with explicit collaborators
pub async fn create_test_service_with(
    guard: Arc<dyn AccessGuard>,
    persistence: Arc<dyn SettingsPersistence>,
) -> SettingsService {
    init_test_logging();
    SettingsService::with_catalog(guard, persistence)
        .await
        .unwrap()
}

/// Single-key change set
pub fn single_change(key: &str, value: SettingValue) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.insert(key.to_string(), value);
    changes
}

// ABOUTME: Integration tests for the settings import/export codec
// ABOUTME: Covers sensitive omission, round-tripping, merge mode, version gate and migrations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

mod common;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stockpilot_settings::access::{
    AccessGuard, Actor, AllowAll, Decision, Operation, StaticAccessGuard,
};
use stockpilot_settings::catalog;
use stockpilot_settings::codec::{ExportDocument, ImportMode, Migration, FORMAT_VERSION};
use stockpilot_settings::errors::{SettingsError, SettingsResult};
use stockpilot_settings::persistence::InMemorySettings;
use stockpilot_settings::schema::{ChangeSet, SectionName, SettingValue};
use stockpilot_settings::service::SettingsService;
use tokio::sync::Semaphore;

#[tokio::test]
async fn export_omits_sensitive_keys_entirely() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");

    // Store a secret first; it must not appear in a default export
    let changes = common::single_change("smtp_password", SettingValue::Text("hunter2".into()));
    service
        .apply_section(&actor, SectionName::Notifications, &changes)
        .await
        .unwrap();

    let document = service.export_settings(&actor, false).await.unwrap();
    let notifications = &document.sections[&SectionName::Notifications];

    assert!(!notifications.contains_key("smtp_password"));
    assert!(notifications.contains_key("smtp_host"));
    assert_eq!(document.format_version, FORMAT_VERSION);
}

#[tokio::test]
async fn sensitive_export_requires_the_grant() {
    let guard = Arc::new(
        StaticAccessGuard::new()
            .grant_write_all("auditor")
            .grant_write_all("operator")
            .grant_sensitive_export("auditor"),
    );
    let service =
        common::create_test_service_with(guard, Arc::new(InMemorySettings::new())).await;

    let operator = Actor::named("operator");
    let error = service.export_settings(&operator, true).await.unwrap_err();
    assert!(matches!(error, SettingsError::Unauthorized { .. }));

    let auditor = Actor::named("auditor");
    let document = service.export_settings(&auditor, true).await.unwrap();
    assert!(document.sections[&SectionName::Notifications].contains_key("smtp_password"));
}

#[tokio::test]
async fn round_trip_preserves_values_and_secrets() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");

    let mut changes = ChangeSet::new();
    changes.insert("low_stock_threshold".into(), SettingValue::Integer(25));
    changes.insert("id_prefix".into(), SettingValue::Text("PNS".into()));
    service
        .apply_section(&actor, SectionName::Inventory, &changes)
        .await
        .unwrap();
    let secret = common::single_change("smtp_password", SettingValue::Text("hunter2".into()));
    service
        .apply_section(&actor, SectionName::Notifications, &secret)
        .await
        .unwrap();

    let before = service.get_snapshot().await;
    let document = service.export_settings(&actor, false).await.unwrap();
    let after = service
        .import_settings(&actor, document, ImportMode::Overwrite)
        .await
        .unwrap();

    // All non-sensitive values unchanged, and the omitted secret kept its
    // pre-import value instead of being blanked out
    assert_eq!(after, before);
    assert_eq!(
        service.current_value("smtp_password").await.unwrap(),
        SettingValue::Text("hunter2".into())
    );
}

#[tokio::test]
async fn merge_keeps_existing_non_default_values() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");

    let changes = common::single_change("low_stock_threshold", SettingValue::Integer(25));
    service
        .apply_section(&actor, SectionName::Inventory, &changes)
        .await
        .unwrap();

    let mut inventory = BTreeMap::new();
    inventory.insert("low_stock_threshold".to_string(), SettingValue::Integer(50));
    inventory.insert("id_prefix".to_string(), SettingValue::Text("PNS".into()));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    let document = ExportDocument {
        format_version: FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let snapshot = service
        .import_settings(&actor, document, ImportMode::MergeKeepExisting)
        .await
        .unwrap();

    // The locally changed threshold wins; the still-default prefix is filled
    assert_eq!(
        snapshot.value("low_stock_threshold"),
        Some(&SettingValue::Integer(25))
    );
    assert_eq!(
        snapshot.value("id_prefix"),
        Some(&SettingValue::Text("PNS".into()))
    );
}

#[tokio::test]
async fn invalid_document_commits_nothing() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");
    let before = service.get_snapshot().await;

    let mut inventory = BTreeMap::new();
    inventory.insert("low_stock_threshold".to_string(), SettingValue::Integer(0));
    let mut system = BTreeMap::new();
    system.insert("items_per_page".to_string(), SettingValue::Integer(50));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    sections.insert(SectionName::System, system);
    let document = ExportDocument {
        format_version: FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let error = service
        .import_settings(&actor, document, ImportMode::Overwrite)
        .await
        .unwrap_err();
    let errors = error.validation_errors().expect("validation error");
    assert!(errors.contains_key("low_stock_threshold"));

    // The valid section was not committed either; the import is atomic
    assert_eq!(service.get_snapshot().await, before);
}

#[tokio::test]
async fn unknown_document_key_fails_validation() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");

    let mut inventory = BTreeMap::new();
    inventory.insert("shelf_count".to_string(), SettingValue::Integer(4));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    let document = ExportDocument {
        format_version: FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let error = service
        .import_settings(&actor, document, ImportMode::Overwrite)
        .await
        .unwrap_err();
    assert!(error
        .validation_errors()
        .is_some_and(|errors| errors.contains_key("shelf_count")));
}

#[tokio::test]
async fn newer_format_version_without_migration_is_rejected() {
    let service = common::create_test_service().await;
    let actor = Actor::named("admin");
    let before = service.get_snapshot().await;

    let mut document = service.export_settings(&actor, false).await.unwrap();
    document.format_version = FORMAT_VERSION + 1;

    let error = service
        .import_settings(&actor, document, ImportMode::Overwrite)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        SettingsError::SchemaVersionMismatch {
            document,
            supported,
        } if document == FORMAT_VERSION + 1 && supported == FORMAT_VERSION
    ));
    assert_eq!(service.get_snapshot().await, before);
}

/// Upgrades version-0 documents by renaming the legacy threshold key
struct LegacyThresholdMigration;

impl Migration for LegacyThresholdMigration {
    fn source_version(&self) -> u32 {
        0
    }

    fn migrate(&self, mut document: ExportDocument) -> SettingsResult<ExportDocument> {
        if let Some(inventory) = document.sections.get_mut(&SectionName::Inventory) {
            if let Some(value) = inventory.remove("stock_alert_level") {
                inventory.insert("low_stock_threshold".to_string(), value);
            }
        }
        document.format_version = FORMAT_VERSION;
        Ok(document)
    }
}

#[tokio::test]
async fn registered_migration_upgrades_old_documents() {
    common::init_test_logging();
    let registry = Arc::new(catalog::stockpilot_registry().unwrap());
    let service = SettingsService::initialize(
        registry,
        catalog::section_rules(),
        Arc::new(AllowAll),
        Arc::new(InMemorySettings::new()),
        vec![Box::new(LegacyThresholdMigration)],
    )
    .await
    .unwrap();
    let actor = Actor::named("admin");

    let mut inventory = BTreeMap::new();
    inventory.insert("stock_alert_level".to_string(), SettingValue::Integer(30));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    let document = ExportDocument {
        format_version: 0,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let snapshot = service
        .import_settings(&actor, document, ImportMode::Overwrite)
        .await
        .unwrap();
    assert_eq!(
        snapshot.value("low_stock_threshold"),
        Some(&SettingValue::Integer(30))
    );
}

#[test]
fn hand_edited_float_value_fails_parsing_with_a_named_reason() {
    let raw = r#"{
        "format_version": 1,
        "exported_at": "2026-08-30T00:00:00Z",
        "sections": { "inventory": { "low_stock_threshold": 2.5 } }
    }"#;

    let message = serde_json::from_str::<ExportDocument>(raw)
        .unwrap_err()
        .to_string();
    assert!(
        message.contains("floating point"),
        "parse error should name the offending value: {message}"
    );
}

/// Allows everything, but parks the watched actor's second authorization
/// request until the test releases it
struct HoldSecondWrite {
    held_actor: &'static str,
    calls: AtomicUsize,
    reached: Semaphore,
    release: Semaphore,
}

impl HoldSecondWrite {
    fn new(held_actor: &'static str) -> Self {
        Self {
            held_actor,
            calls: AtomicUsize::new(0),
            reached: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl AccessGuard for HoldSecondWrite {
    async fn authorize(
        &self,
        actor: &Actor,
        _operation: Operation,
        _section: Option<SectionName>,
    ) -> Decision {
        if actor.id == self.held_actor && self.calls.fetch_add(1, Ordering::SeqCst) == 1 {
            self.reached.add_permits(1);
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        Decision::Allow
    }
}

#[tokio::test]
async fn merge_import_keeps_a_value_committed_while_importing() {
    common::init_test_logging();
    let guard = Arc::new(HoldSecondWrite::new("importer"));
    let service = Arc::new(
        common::create_test_service_with(
            Arc::clone(&guard) as Arc<dyn AccessGuard>,
            Arc::new(InMemorySettings::new()),
        )
        .await,
    );

    let mut inventory = BTreeMap::new();
    inventory.insert("low_stock_threshold".to_string(), SettingValue::Integer(50));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    let document = ExportDocument {
        format_version: FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let import_service = Arc::clone(&service);
    let import = tokio::spawn(async move {
        let importer = Actor::named("importer");
        import_service
            .import_settings(&importer, document, ImportMode::MergeKeepExisting)
            .await
    });

    // Land a competing commit while the import is parked at its guard check
    guard.reached.acquire().await.unwrap().forget();
    let admin = Actor::named("admin");
    let changes = common::single_change("low_stock_threshold", SettingValue::Integer(42));
    service
        .apply_section(&admin, SectionName::Inventory, &changes)
        .await
        .unwrap();
    guard.release.add_permits(1);

    import.await.unwrap().unwrap();

    // 42 is an existing non-default value by the time the import commits;
    // merge semantics say it wins over the document's 50
    assert_eq!(
        service.current_value("low_stock_threshold").await.unwrap(),
        SettingValue::Integer(42)
    );
}

#[tokio::test]
async fn import_authorization_is_checked_per_section() {
    let guard =
        Arc::new(StaticAccessGuard::new().grant_write("clerk", SectionName::Inventory));
    let service =
        common::create_test_service_with(guard, Arc::new(InMemorySettings::new())).await;
    let clerk = Actor::named("clerk");

    let mut system = BTreeMap::new();
    system.insert("items_per_page".to_string(), SettingValue::Integer(50));
    let mut inventory = BTreeMap::new();
    inventory.insert("low_stock_threshold".to_string(), SettingValue::Integer(25));
    let mut sections = BTreeMap::new();
    sections.insert(SectionName::Inventory, inventory);
    sections.insert(SectionName::System, system);
    let document = ExportDocument {
        format_version: FORMAT_VERSION,
        exported_at: chrono::Utc::now(),
        sections,
    };

    let error = service
        .import_settings(&clerk, document, ImportMode::Overwrite)
        .await
        .unwrap_err();
    assert!(matches!(
        error,
        SettingsError::Unauthorized {
            section: Some(SectionName::System),
            ..
        }
    ));
    // Nothing committed, including the section the clerk may write
    assert_eq!(
        service.current_value("low_stock_threshold").await.unwrap(),
        SettingValue::Integer(10)
    );
}

// ABOUTME: Integration tests for store initialization and the JSON file backend
// ABOUTME: Covers default fallback for stale persisted values and durable round-trips
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

mod common;

use std::sync::Arc;
use stockpilot_settings::access::{Actor, AllowAll};
use stockpilot_settings::persistence::{InMemorySettings, JsonFileSettings, SettingsPersistence};
use stockpilot_settings::schema::{SectionName, SettingValue};
use stockpilot_settings::service::SettingsService;
use stockpilot_settings::store::PersistedValues;

#[tokio::test]
async fn stale_persisted_values_fall_back_to_defaults() {
    common::init_test_logging();
    let mut persisted = PersistedValues::new();
    // Out of range since the schema demands 1..=100
    persisted.insert("low_stock_threshold".to_string(), SettingValue::Integer(0));
    // Still valid, must survive
    persisted.insert("id_prefix".to_string(), SettingValue::Text("PNS".into()));
    // Key that no longer exists in the registry
    persisted.insert("legacy_flag".to_string(), SettingValue::Boolean(true));

    let service = common::create_test_service_with(
        Arc::new(AllowAll),
        Arc::new(InMemorySettings::seeded(persisted)),
    )
    .await;
    let snapshot = service.get_snapshot().await;

    assert_eq!(
        snapshot.value("low_stock_threshold"),
        Some(&SettingValue::Integer(10)),
        "invalid persisted value should be replaced by its default"
    );
    assert_eq!(
        snapshot.value("id_prefix"),
        Some(&SettingValue::Text("PNS".into()))
    );
    assert_eq!(snapshot.value("legacy_flag"), None);
    assert_eq!(snapshot.len(), service.registry().len());
}

#[tokio::test]
async fn file_backend_round_trips_committed_state() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let actor = Actor::named("admin");

    {
        let persistence = Arc::new(JsonFileSettings::new(&path));
        let service = SettingsService::with_catalog(Arc::new(AllowAll), persistence)
            .await
            .unwrap();
        let changes = common::single_change("low_stock_threshold", SettingValue::Integer(25));
        service
            .apply_section(&actor, SectionName::Inventory, &changes)
            .await
            .unwrap();
    }

    // The document on disk is plain JSON
    let raw = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["values"]["low_stock_threshold"], 25);

    // A fresh service over the same file sees the committed value
    let persistence = Arc::new(JsonFileSettings::new(&path));
    let service = SettingsService::with_catalog(Arc::new(AllowAll), persistence)
        .await
        .unwrap();
    assert_eq!(
        service.current_value("low_stock_threshold").await.unwrap(),
        SettingValue::Integer(25)
    );
}

#[tokio::test]
async fn missing_file_starts_from_defaults() {
    common::init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    let persistence = Arc::new(JsonFileSettings::new(dir.path().join("absent.json")));

    assert!(persistence.load().await.unwrap().is_none());

    let service = SettingsService::with_catalog(Arc::new(AllowAll), persistence)
        .await
        .unwrap();
    assert_eq!(
        service.current_value("low_stock_threshold").await.unwrap(),
        SettingValue::Integer(10)
    );
}

#[tokio::test]
async fn unknown_key_lookup_fails() {
    let service = common::create_test_service().await;
    let error = service.current_value("warp_factor").await.unwrap_err();
    assert!(matches!(
        error,
        stockpilot_settings::errors::SettingsError::UnknownKey { key } if key == "warp_factor"
    ));
}

#[tokio::test]
async fn concurrent_readers_see_consistent_snapshots() {
    let service = Arc::new(common::create_test_service().await);
    let actor = Actor::named("admin");

    let mut readers = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let snapshot = service.get_snapshot().await;
                // A snapshot is complete regardless of concurrent writes
                assert_eq!(snapshot.len(), service.registry().len());
            }
        }));
    }

    for i in 0..20 {
        let changes = common::single_change(
            "low_stock_threshold",
            SettingValue::Integer(1 + (i % 100)),
        );
        service
            .apply_section(&actor, SectionName::Inventory, &changes)
            .await
            .unwrap();
    }

    for reader in readers {
        reader.await.unwrap();
    }
}

// ABOUTME: Concrete setting catalog for the StockPilot inventory admin
// ABOUTME: Declares every setting of the six admin sections with defaults and constraints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! The StockPilot setting catalog.
//!
//! One builder function per admin section, mirroring the settings pages the
//! UI renders: company profile, inventory configuration, notifications,
//! security policy, backup configuration and system switches. The catalog
//! is declared once at process start and sealed.

use crate::errors::SettingsResult;
use crate::schema::{
    Constraints, RegistryBuilder, SchemaRegistry, SectionName, SettingDefinition, SettingValue,
    ValueType,
};
use crate::validation::{SectionRule, ValidationFailure, ValidationReason};
use std::collections::BTreeMap;

fn setting(
    key: &str,
    section: SectionName,
    value_type: ValueType,
    default: impl Into<SettingValue>,
    constraints: Constraints,
    description: &str,
) -> SettingDefinition {
    SettingDefinition {
        key: key.to_string(),
        section,
        value_type,
        default: default.into(),
        constraints,
        sensitive: false,
        description: description.to_string(),
    }
}

fn sensitive(definition: SettingDefinition) -> SettingDefinition {
    SettingDefinition {
        sensitive: true,
        ..definition
    }
}

/// Build and seal the full StockPilot registry.
///
/// # Errors
///
/// Fails only if the catalog itself is inconsistent (duplicate key or a
/// default violating its own constraints), which is a programming error
/// surfaced at startup.
pub fn stockpilot_registry() -> SettingsResult<SchemaRegistry> {
    let mut builder = RegistryBuilder::new();
    define_general(&mut builder)?;
    define_inventory(&mut builder)?;
    define_notifications(&mut builder)?;
    define_security(&mut builder)?;
    define_backup(&mut builder)?;
    define_system(&mut builder)?;
    Ok(builder.seal())
}

fn define_general(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::General;
    builder.define(setting(
        "company_name",
        General,
        ValueType::Text,
        "StockPilot",
        Constraints::max_len(120),
        "Company name shown across the admin UI and on documents",
    ))?;
    builder.define(setting(
        "company_email",
        General,
        ValueType::Email,
        "admin@stockpilot.example",
        Constraints::none(),
        "Contact address printed on exported documents",
    ))?;
    builder.define(setting(
        "company_website",
        General,
        ValueType::Url,
        "https://stockpilot.example",
        Constraints::none(),
        "Company website linked from generated documents",
    ))?;
    builder.define(setting(
        "company_address",
        General,
        ValueType::Text,
        "",
        Constraints::max_len(240),
        "Postal address printed on generated documents",
    ))?;
    builder.define(setting(
        "timezone",
        General,
        ValueType::Enumerated,
        "UTC",
        Constraints::one_of(&[
            "UTC",
            "America/New_York",
            "Europe/London",
            "Asia/Singapore",
            "Australia/Sydney",
        ]),
        "Timezone used for displayed timestamps and scheduled jobs",
    ))?;
    builder.define(setting(
        "date_format",
        General,
        ValueType::Enumerated,
        "YYYY-MM-DD",
        Constraints::one_of(&["YYYY-MM-DD", "DD/MM/YYYY", "MM/DD/YYYY"]),
        "Date rendering used across the UI",
    ))?;
    builder.define(setting(
        "brand_color",
        General,
        ValueType::Color,
        "#0d6efd",
        Constraints::none(),
        "Accent color applied to the admin theme",
    ))?;
    Ok(())
}

fn define_inventory(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::Inventory;
    builder.define(setting(
        "id_prefix",
        Inventory,
        ValueType::Text,
        "INV",
        Constraints::max_len(8),
        "Prefix stamped onto generated item identifiers",
    ))?;
    builder.define(setting(
        "low_stock_threshold",
        Inventory,
        ValueType::Integer,
        10_i64,
        Constraints::range(1, 100),
        "Stock level at or below which an item counts as low stock",
    ))?;
    builder.define(setting(
        "default_unit",
        Inventory,
        ValueType::Enumerated,
        "piece",
        Constraints::one_of(&["piece", "box", "kg", "litre"]),
        "Unit preselected for newly created items",
    ))?;
    builder.define(setting(
        "enable_barcode_scanning",
        Inventory,
        ValueType::Boolean,
        true,
        Constraints::none(),
        "Whether the goods-in screens offer barcode capture",
    ))?;
    builder.define(setting(
        "enable_auto_reorder",
        Inventory,
        ValueType::Boolean,
        false,
        Constraints::none(),
        "Automatically raise purchase orders for low-stock items",
    ))?;
    builder.define(setting(
        "auto_reorder_quantity",
        Inventory,
        ValueType::Integer,
        25_i64,
        Constraints::range(1, 10_000),
        "Quantity ordered when auto-reorder triggers",
    ))?;
    builder.define(setting(
        "track_expiry_dates",
        Inventory,
        ValueType::Boolean,
        true,
        Constraints::none(),
        "Track and warn about item expiry dates",
    ))?;
    Ok(())
}

fn define_notifications(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::Notifications;
    builder.define(setting(
        "email_notifications_enabled",
        Notifications,
        ValueType::Boolean,
        false,
        Constraints::none(),
        "Master switch for outgoing notification email",
    ))?;
    builder.define(setting(
        "smtp_host",
        Notifications,
        ValueType::Text,
        "",
        Constraints::max_len(253),
        "SMTP relay hostname",
    ))?;
    builder.define(setting(
        "smtp_port",
        Notifications,
        ValueType::Integer,
        587_i64,
        Constraints::range(1, 65_535),
        "SMTP relay port",
    ))?;
    builder.define(setting(
        "smtp_username",
        Notifications,
        ValueType::Text,
        "",
        Constraints::max_len(128),
        "SMTP authentication username",
    ))?;
    builder.define(sensitive(setting(
        "smtp_password",
        Notifications,
        ValueType::Text,
        "",
        Constraints::max_len(128),
        "SMTP authentication password, never included in default exports",
    )))?;
    builder.define(setting(
        "smtp_use_tls",
        Notifications,
        ValueType::Boolean,
        true,
        Constraints::none(),
        "Negotiate TLS with the SMTP relay",
    ))?;
    builder.define(setting(
        "notify_on_low_stock",
        Notifications,
        ValueType::Boolean,
        true,
        Constraints::none(),
        "Send an alert when an item crosses its low-stock threshold",
    ))?;
    builder.define(setting(
        "daily_digest_time",
        Notifications,
        ValueType::TimeOfDay,
        "08:00",
        Constraints::none(),
        "Local time at which the daily summary email is sent",
    ))?;
    Ok(())
}

fn define_security(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::Security;
    builder.define(setting(
        "password_min_length",
        Security,
        ValueType::Integer,
        10_i64,
        Constraints::range(6, 128),
        "Minimum accepted password length",
    ))?;
    builder.define(setting(
        "password_require_symbols",
        Security,
        ValueType::Boolean,
        true,
        Constraints::none(),
        "Require at least one symbol in passwords",
    ))?;
    builder.define(setting(
        "session_timeout_minutes",
        Security,
        ValueType::Integer,
        30_i64,
        Constraints::range(5, 1_440),
        "Idle minutes before a session is terminated",
    ))?;
    builder.define(setting(
        "enable_two_factor",
        Security,
        ValueType::Boolean,
        false,
        Constraints::none(),
        "Require a second factor at login",
    ))?;
    builder.define(setting(
        "max_login_attempts",
        Security,
        ValueType::Integer,
        5_i64,
        Constraints::range(3, 10),
        "Failed attempts before an account is locked",
    ))?;
    builder.define(setting(
        "lockout_duration_minutes",
        Security,
        ValueType::Integer,
        15_i64,
        Constraints::range(1, 1_440),
        "How long a locked account stays locked",
    ))?;
    builder.define(setting(
        "allowed_ip_ranges",
        Security,
        ValueType::IpList,
        SettingValue::List(Vec::new()),
        Constraints::none(),
        "Admin access allow-list; empty means no restriction",
    ))?;
    builder.define(setting(
        "audit_log_retention_days",
        Security,
        ValueType::Integer,
        90_i64,
        Constraints::range(7, 3_650),
        "Days of audit history kept before pruning",
    ))?;
    Ok(())
}

fn define_backup(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::Backup;
    builder.define(setting(
        "enable_auto_backup",
        Backup,
        ValueType::Boolean,
        false,
        Constraints::none(),
        "Run scheduled backups automatically",
    ))?;
    builder.define(setting(
        "backup_frequency",
        Backup,
        ValueType::Enumerated,
        "daily",
        Constraints::one_of(&["daily", "weekly", "monthly"]),
        "How often scheduled backups run",
    ))?;
    builder.define(setting(
        "backup_time",
        Backup,
        ValueType::TimeOfDay,
        "02:30",
        Constraints::none(),
        "Local time at which scheduled backups start",
    ))?;
    builder.define(setting(
        "backup_retention_count",
        Backup,
        ValueType::Integer,
        7_i64,
        Constraints::range(1, 60),
        "Backups kept before the oldest is deleted",
    ))?;
    builder.define(setting(
        "backup_location",
        Backup,
        ValueType::Text,
        "backups/",
        Constraints::max_len(240),
        "Directory or bucket scheduled backups are written to",
    ))?;
    Ok(())
}

fn define_system(builder: &mut RegistryBuilder) -> SettingsResult<()> {
    use SectionName::System;
    builder.define(setting(
        "maintenance_mode",
        System,
        ValueType::Boolean,
        false,
        Constraints::none(),
        "Block non-admin access while maintenance is in progress",
    ))?;
    builder.define(setting(
        "items_per_page",
        System,
        ValueType::Integer,
        25_i64,
        Constraints::range(10, 200),
        "Default page size for listings",
    ))?;
    builder.define(setting(
        "log_level",
        System,
        ValueType::Enumerated,
        "info",
        Constraints::one_of(&["error", "warn", "info", "debug", "trace"]),
        "Runtime log verbosity",
    ))?;
    builder.define(setting(
        "currency_code",
        System,
        ValueType::Enumerated,
        "USD",
        Constraints::one_of(&["USD", "EUR", "GBP", "MYR", "SGD"]),
        "Currency used for displayed prices",
    ))?;
    Ok(())
}

/// Cross-key rules for the StockPilot catalog. Rules are scoped to a single
/// section and run against the merged prospective section state.
#[must_use]
pub fn section_rules() -> Vec<SectionRule> {
    vec![
        SectionRule {
            name: "smtp_configured_when_email_enabled",
            section: SectionName::Notifications,
            check: smtp_configured_when_email_enabled,
        },
        SectionRule {
            name: "backup_schedule_when_auto_backup_enabled",
            section: SectionName::Backup,
            check: backup_schedule_when_auto_backup_enabled,
        },
    ]
}

fn smtp_configured_when_email_enabled(
    state: &BTreeMap<String, SettingValue>,
) -> Result<(), ValidationFailure> {
    let enabled = state
        .get("email_notifications_enabled")
        .and_then(SettingValue::as_bool)
        .unwrap_or(false);
    if !enabled {
        return Ok(());
    }
    let host_empty = state
        .get("smtp_host")
        .and_then(SettingValue::as_text)
        .is_none_or(str::is_empty);
    if host_empty {
        return Err(ValidationFailure {
            key: "smtp_host".to_string(),
            reason: ValidationReason::MissingRequired {
                detail: "an SMTP host must be configured before enabling email notifications"
                    .to_string(),
            },
        });
    }
    Ok(())
}

fn backup_schedule_when_auto_backup_enabled(
    state: &BTreeMap<String, SettingValue>,
) -> Result<(), ValidationFailure> {
    let enabled = state
        .get("enable_auto_backup")
        .and_then(SettingValue::as_bool)
        .unwrap_or(false);
    if !enabled {
        return Ok(());
    }
    let location_empty = state
        .get("backup_location")
        .and_then(SettingValue::as_text)
        .is_none_or(str::is_empty);
    if location_empty {
        return Err(ValidationFailure {
            key: "backup_location".to_string(),
            reason: ValidationReason::MissingRequired {
                detail: "a backup location must be configured before enabling automatic backups"
                    .to_string(),
            },
        });
    }
    Ok(())
}

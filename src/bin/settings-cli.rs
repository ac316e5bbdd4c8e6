// ABOUTME: Command-line tool for inspecting and editing a StockPilot settings file
// ABOUTME: Drives the settings service surface: show, get, set, export, import
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Usage:
//! ```bash
//! # Show every setting, grouped by section
//! settings-cli show
//!
//! # Show one section
//! settings-cli show --section inventory
//!
//! # Read and change single settings
//! settings-cli get low_stock_threshold
//! settings-cli set low_stock_threshold 25
//!
//! # Export to a portable document (sensitive values omitted by default)
//! settings-cli export --output settings-export.json
//!
//! # Re-import a (possibly hand-edited) document
//! settings-cli import settings-export.json --merge
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use stockpilot_settings::access::{Actor, AllowAll};
use stockpilot_settings::codec::{ExportDocument, ImportMode};
use stockpilot_settings::logging::{self, LoggingConfig};
use stockpilot_settings::persistence::JsonFileSettings;
use stockpilot_settings::schema::{
    ChangeSet, SectionName, SettingDefinition, SettingValue, ValueType,
};
use stockpilot_settings::service::SettingsService;

#[derive(Parser)]
#[command(
    name = "settings-cli",
    about = "StockPilot settings management CLI",
    long_about = "Inspect and edit the StockPilot settings file through the validated settings engine."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file to operate on
    #[arg(long, global = true, default_value = "stockpilot-settings.json")]
    file: PathBuf,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show current settings, grouped by section
    Show {
        /// Only show one section
        #[arg(long)]
        section: Option<String>,
    },
    /// Print the current value of one setting
    Get {
        /// Setting key
        key: String,
    },
    /// Change one setting through a validated section transaction
    Set {
        /// Setting key
        key: String,
        /// New value
        value: String,
    },
    /// Export settings as a portable JSON document
    Export {
        /// Include sensitive values (credentials) in the document
        #[arg(long)]
        include_sensitive: bool,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Import a portable JSON document
    Import {
        /// Document to import
        input: PathBuf,
        /// Keep existing non-default values, only fill in defaults
        #[arg(long)]
        merge: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig {
            level: "warn".into(),
            ..LoggingConfig::default()
        }
    };
    logging::init(&logging_config)?;

    let persistence = Arc::new(JsonFileSettings::new(&cli.file));
    let service = SettingsService::with_catalog(Arc::new(AllowAll), persistence)
        .await
        .with_context(|| format!("opening settings file {}", cli.file.display()))?;
    let actor = Actor::named("settings-cli");

    match cli.command {
        Command::Show { section } => show(&service, section.as_deref()).await,
        Command::Get { key } => get(&service, &key).await,
        Command::Set { key, value } => set(&service, &actor, &key, &value).await,
        Command::Export {
            include_sensitive,
            output,
        } => export(&service, &actor, include_sensitive, output).await,
        Command::Import { input, merge } => import(&service, &actor, &input, merge).await,
    }
}

async fn show(service: &SettingsService, section_filter: Option<&str>) -> Result<()> {
    let sections: Vec<SectionName> = match section_filter {
        Some(name) => {
            let Some(section) = SectionName::parse(name) else {
                bail!(
                    "unknown section '{name}' (expected one of: {})",
                    SectionName::ALL.map(SectionName::as_str).join(", ")
                );
            };
            vec![section]
        }
        None => SectionName::ALL.to_vec(),
    };

    let snapshot = service.get_snapshot().await;
    for section in sections {
        println!("[{section}]");
        for definition in service.registry().definitions_in_section(section) {
            let value = snapshot.value(&definition.key);
            let rendered = match value {
                Some(v) if definition.sensitive && !v.to_string().is_empty() => {
                    "<hidden>".to_string()
                }
                Some(v) => v.to_string(),
                None => String::new(),
            };
            println!("  {} = {}", definition.key, rendered);
        }
        println!();
    }
    Ok(())
}

async fn get(service: &SettingsService, key: &str) -> Result<()> {
    let value = service.current_value(key).await?;
    println!("{value}");
    Ok(())
}

async fn set(service: &SettingsService, actor: &Actor, key: &str, raw: &str) -> Result<()> {
    let definition = service.registry().get(key)?.clone();
    let value = parse_value(&definition, raw)?;

    let mut changes = ChangeSet::new();
    changes.insert(key.to_string(), value);
    service
        .apply_section(actor, definition.section, &changes)
        .await?;
    println!("{key} updated");
    Ok(())
}

async fn export(
    service: &SettingsService,
    actor: &Actor,
    include_sensitive: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let document = service.export_settings(actor, include_sensitive).await?;
    let rendered = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, rendered.as_bytes())
                .await
                .with_context(|| format!("writing export to {}", path.display()))?;
            println!("exported to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

async fn import(
    service: &SettingsService,
    actor: &Actor,
    input: &PathBuf,
    merge: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading import document {}", input.display()))?;
    let document: ExportDocument =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;
    let mode = if merge {
        ImportMode::MergeKeepExisting
    } else {
        ImportMode::Overwrite
    };
    service.import_settings(actor, document, mode).await?;
    println!("import applied");
    Ok(())
}

fn parse_value(definition: &SettingDefinition, raw: &str) -> Result<SettingValue> {
    let value = match definition.value_type {
        ValueType::Boolean => {
            let flag: bool = raw
                .parse()
                .with_context(|| format!("'{raw}' is not true or false"))?;
            SettingValue::Boolean(flag)
        }
        ValueType::Integer => {
            let number: i64 = raw
                .parse()
                .with_context(|| format!("'{raw}' is not an integer"))?;
            SettingValue::Integer(number)
        }
        ValueType::IpList => {
            let entries = raw
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(ToString::to_string)
                .collect();
            SettingValue::List(entries)
        }
        _ => SettingValue::Text(raw.to_string()),
    };
    Ok(value)
}

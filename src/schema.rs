// ABOUTME: Core settings schema types and the sealed schema registry
// ABOUTME: Declares setting keys, sections, value types, constraints and defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Settings schema model.
//!
//! Every recognized setting is declared once, up front, as a
//! [`SettingDefinition`] in a [`RegistryBuilder`]. Sealing the builder
//! produces an immutable [`SchemaRegistry`]; there is no mutation API after
//! the seal, the open/sealed transition is enforced by the type split.

use crate::errors::SettingsError;
use crate::validation::check_value;
use serde::de::{self, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Named grouping of related settings, the unit of atomic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    /// Company profile and presentation defaults
    General,
    /// Stock handling and reorder behavior
    Inventory,
    /// Email/SMTP and alerting configuration
    Notifications,
    /// Password policy, sessions and access restrictions
    Security,
    /// Automatic backup configuration
    Backup,
    /// Process-wide operational switches
    System,
}

impl SectionName {
    /// All sections in display order
    pub const ALL: [Self; 6] = [
        Self::General,
        Self::Inventory,
        Self::Notifications,
        Self::Security,
        Self::Backup,
        Self::System,
    ];

    /// Stable lowercase name used in documents and on the wire
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Inventory => "inventory",
            Self::Notifications => "notifications",
            Self::Security => "security",
            Self::Backup => "backup",
            Self::System => "system",
        }
    }

    /// Parse a section from its lowercase name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a setting value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Free-form text
    Text,
    /// Signed integer with optional inclusive bounds
    Integer,
    /// True/false switch
    Boolean,
    /// Text restricted to a fixed set of allowed values
    Enumerated,
    /// RFC-5321-shaped email address
    Email,
    /// Absolute http(s) URL
    Url,
    /// Hex color in `#rrggbb` form
    Color,
    /// Time of day in 24h `HH:MM` form
    TimeOfDay,
    /// List of IP addresses or CIDR ranges
    IpList,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Enumerated => "enumerated",
            Self::Email => "email",
            Self::Url => "url",
            Self::Color => "color",
            Self::TimeOfDay => "time_of_day",
            Self::IpList => "ip_list",
        };
        f.write_str(name)
    }
}

/// A concrete setting value.
///
/// Serialized untagged so export documents read as plain JSON scalars and
/// arrays and stay hand-editable. Deserialization is hand-written so an
/// unrepresentable scalar in a hand-edited document (a float, a null, a
/// nested object) is rejected with an error naming the value, not an opaque
/// no-variant-matched failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean switch value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Textual value (also carries email/url/color/time/enum values)
    Text(String),
    /// List value (IP lists)
    List(Vec<String>),
}

impl SettingValue {
    /// Boolean payload, if this is a boolean value
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer value
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text payload, if this is a textual value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List payload, if this is a list value
    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<'de> Deserialize<'de> for SettingValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = SettingValue;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a boolean, an integer, a string or a list of strings")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(SettingValue::Boolean(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(SettingValue::Integer(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                i64::try_from(v)
                    .map(SettingValue::Integer)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Err(E::invalid_type(Unexpected::Float(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SettingValue::Text(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(SettingValue::Text(v))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<String>()? {
                    items.push(item);
                }
                Ok(SettingValue::List(items))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Optional per-setting constraints. Numeric bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Inclusive lower bound for integer values
    pub min: Option<i64>,
    /// Inclusive upper bound for integer values
    pub max: Option<i64>,
    /// Maximum length for textual values
    pub max_length: Option<usize>,
    /// Exact allowed values for enumerated settings
    pub allowed_values: Option<Vec<String>>,
}

impl Constraints {
    /// No constraints beyond the value type itself
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Inclusive integer range
    #[must_use]
    pub fn range(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// Maximum text length
    #[must_use]
    pub fn max_len(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::default()
        }
    }

    /// Fixed set of allowed values
    #[must_use]
    pub fn one_of(values: &[&str]) -> Self {
        Self {
            allowed_values: Some(values.iter().map(ToString::to_string).collect()),
            ..Self::default()
        }
    }
}

/// Full declaration of one setting: identity, type, default and rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingDefinition {
    /// Unique setting key, immutable once declared
    pub key: String,
    /// Section this setting belongs to (exactly one)
    pub section: SectionName,
    /// Declared value type
    pub value_type: ValueType,
    /// Default value, must itself satisfy the constraints
    pub default: SettingValue,
    /// Validation constraints
    #[serde(default)]
    pub constraints: Constraints,
    /// Sensitive values are excluded from export unless elevated access is held
    #[serde(default)]
    pub sensitive: bool,
    /// Human-readable description for catalog listings
    pub description: String,
}

/// A proposed partial update to one section's settings
pub type ChangeSet = BTreeMap<String, SettingValue>;

/// Mutable registry under construction. Consumed by [`RegistryBuilder::seal`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<SettingDefinition>,
    index: HashMap<String, usize>,
}

impl RegistryBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one setting.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::DuplicateKey`] if the key is already
    /// declared, or a validation error if the definition's own default does
    /// not satisfy its constraints.
    pub fn define(&mut self, definition: SettingDefinition) -> Result<(), SettingsError> {
        if self.index.contains_key(&definition.key) {
            return Err(SettingsError::DuplicateKey {
                key: definition.key,
            });
        }
        if let Err(reason) = check_value(&definition, &definition.default) {
            return Err(SettingsError::InvalidDefault {
                key: definition.key,
                reason: reason.to_string(),
            });
        }
        self.index
            .insert(definition.key.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Finish registration and produce the immutable registry
    #[must_use]
    pub fn seal(self) -> SchemaRegistry {
        SchemaRegistry {
            definitions: self.definitions,
            index: self.index,
        }
    }
}

/// Immutable, sealed setting schema. Constructed once at process start.
#[derive(Debug)]
pub struct SchemaRegistry {
    definitions: Vec<SettingDefinition>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Look up the definition for a key.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::UnknownKey`] for keys never declared.
    pub fn get(&self, key: &str) -> Result<&SettingDefinition, SettingsError> {
        self.definition(key)
            .ok_or_else(|| SettingsError::UnknownKey {
                key: key.to_string(),
            })
    }

    /// Look up the definition for a key, `None` if not declared
    #[must_use]
    pub fn definition(&self, key: &str) -> Option<&SettingDefinition> {
        self.index.get(key).map(|&i| &self.definitions[i])
    }

    /// Every declared key, in declaration order
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.key.as_str())
    }

    /// All definitions, in declaration order
    #[must_use]
    pub fn definitions(&self) -> &[SettingDefinition] {
        &self.definitions
    }

    /// Keys declared for one section, in declaration order
    pub fn keys_in_section(&self, section: SectionName) -> impl Iterator<Item = &str> {
        self.definitions_in_section(section).map(|d| d.key.as_str())
    }

    /// Definitions declared for one section, in declaration order.
    ///
    /// This is the catalog surface a presentation layer renders forms from.
    pub fn definitions_in_section(
        &self,
        section: SectionName,
    ) -> impl Iterator<Item = &SettingDefinition> {
        self.definitions.iter().filter(move |d| d.section == section)
    }

    /// Number of declared settings
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_value_parses_plain_json_scalars() {
        assert_eq!(
            serde_json::from_str::<SettingValue>("true").unwrap(),
            SettingValue::Boolean(true)
        );
        assert_eq!(
            serde_json::from_str::<SettingValue>("25").unwrap(),
            SettingValue::Integer(25)
        );
        assert_eq!(
            serde_json::from_str::<SettingValue>("\"INV\"").unwrap(),
            SettingValue::Text("INV".into())
        );
        assert_eq!(
            serde_json::from_str::<SettingValue>(r#"["10.0.0.1", "192.168.1.0/24"]"#).unwrap(),
            SettingValue::List(vec!["10.0.0.1".into(), "192.168.1.0/24".into()])
        );
    }

    #[test]
    fn setting_value_rejects_floats_with_a_named_reason() {
        let message = serde_json::from_str::<SettingValue>("2.5")
            .unwrap_err()
            .to_string();
        assert!(
            message.contains("floating point"),
            "error should name the offending value: {message}"
        );
    }

    #[test]
    fn setting_value_rejects_null_and_objects() {
        assert!(serde_json::from_str::<SettingValue>("null").is_err());
        assert!(serde_json::from_str::<SettingValue>(r#"{"nested": 1}"#).is_err());
    }
}

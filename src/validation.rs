// ABOUTME: Per-key and cross-key validation for proposed setting values
// ABOUTME: Collects every failure exhaustively so callers can display all problems at once
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 StockPilot Software

//! Validation of setting values against their declared schema.
//!
//! Two layers: [`check_value`] verifies one value against one
//! [`SettingDefinition`] (type match, inclusive numeric bounds, exact enum
//! membership, length, and email/url/color/time/ip formats), and
//! [`Validator::validate_change_set`] runs per-key checks plus the cross-key
//! rules declared for a section against the merged prospective state.
//! Failures are always collected in full - never first-failure-wins.

use crate::schema::{
    ChangeSet, SchemaRegistry, SectionName, SettingDefinition, SettingValue, ValueType,
};
use crate::store::SettingsSnapshot;
use chrono::NaiveTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // Safe: pattern is a compile-time constant
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
    })
}

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // Safe: pattern is a compile-time constant
        Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap()
    })
}

/// Why a single proposed value was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    /// Key never declared in the schema registry
    UnknownKey,
    /// Value variant does not match the declared type
    TypeMismatch {
        /// Declared type of the setting
        expected: ValueType,
    },
    /// Integer outside its inclusive bounds
    OutOfRange {
        /// Inclusive lower bound, if declared
        min: Option<i64>,
        /// Inclusive upper bound, if declared
        max: Option<i64>,
    },
    /// Value not in the enumerated allowed set
    NotInEnum {
        /// The exact allowed values
        allowed: Vec<String>,
    },
    /// Text longer than the declared maximum
    TooLong {
        /// Declared maximum length
        max_length: usize,
    },
    /// Value does not parse as its declared format (email, url, color,
    /// time of day, IP address or CIDR range)
    InvalidFormat {
        /// What failed to parse
        detail: String,
    },
    /// Key belongs to a different section than the one being updated
    SectionMismatch {
        /// Section the key is declared in
        declared: SectionName,
        /// Section the change set targeted
        target: SectionName,
    },
    /// A cross-key rule requires this key to carry a usable value
    MissingRequired {
        /// Which rule raised the requirement
        detail: String,
    },
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey => f.write_str("unknown key"),
            Self::TypeMismatch { expected } => write!(f, "expected a {expected} value"),
            Self::OutOfRange { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "must be between {lo} and {hi}"),
                (Some(lo), None) => write!(f, "must be at least {lo}"),
                (None, Some(hi)) => write!(f, "must be at most {hi}"),
                (None, None) => f.write_str("out of range"),
            },
            Self::NotInEnum { allowed } => {
                write!(f, "must be one of: {}", allowed.join(", "))
            }
            Self::TooLong { max_length } => {
                write!(f, "must be at most {max_length} characters")
            }
            Self::InvalidFormat { detail } => write!(f, "invalid format: {detail}"),
            Self::SectionMismatch { declared, target } => write!(
                f,
                "belongs to section '{declared}', not '{target}'"
            ),
            Self::MissingRequired { detail } => write!(f, "required: {detail}"),
        }
    }
}

/// One rejected key with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// The failing key
    pub key: String,
    /// Why it was rejected
    pub reason: ValidationReason,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// Non-empty, ordered list of validation failures.
///
/// A change set is either fully valid or rejected with every failing key
/// listed; there is no partially-valid outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(Vec<ValidationFailure>);

impl ValidationErrors {
    pub(crate) fn new(failures: Vec<ValidationFailure>) -> Self {
        debug_assert!(!failures.is_empty());
        Self(failures)
    }

    /// All failures, in the order they were detected
    #[must_use]
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.0
    }

    /// Number of failing keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; the list is non-empty by construction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a specific key is among the failures
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.iter().any(|failure| failure.key == key)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

/// Cross-key rule scoped to a single section.
///
/// The check runs against the merged prospective state of the whole section
/// (current values overlaid with the proposed changes), so a rule can relate
/// keys the change set itself does not touch.
pub struct SectionRule {
    /// Short rule name used in failure details
    pub name: &'static str,
    /// Section this rule applies to
    pub section: SectionName,
    /// Rule body; returns the failure to report, if any
    pub check: fn(&BTreeMap<String, SettingValue>) -> Result<(), ValidationFailure>,
}

impl fmt::Debug for SectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionRule")
            .field("name", &self.name)
            .field("section", &self.section)
            .finish_non_exhaustive()
    }
}

/// Validate one value against one definition.
///
/// # Errors
///
/// Returns the [`ValidationReason`] describing the first violated rule for
/// this single value (type check before constraint checks).
pub fn check_value(
    definition: &SettingDefinition,
    value: &SettingValue,
) -> Result<(), ValidationReason> {
    match definition.value_type {
        ValueType::Integer => check_integer(definition, value),
        ValueType::Boolean => match value {
            SettingValue::Boolean(_) => Ok(()),
            _ => Err(type_mismatch(definition)),
        },
        ValueType::IpList => check_ip_list(definition, value),
        ValueType::Text => check_text(definition, value),
        ValueType::Enumerated => check_enumerated(definition, value),
        ValueType::Email => {
            let text = text_payload(definition, value)?;
            if email_regex().is_match(text) {
                Ok(())
            } else {
                Err(ValidationReason::InvalidFormat {
                    detail: format!("'{text}' is not a valid email address"),
                })
            }
        }
        ValueType::Url => {
            let text = text_payload(definition, value)?;
            match url::Url::parse(text) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
                Ok(parsed) => Err(ValidationReason::InvalidFormat {
                    detail: format!("unsupported URL scheme '{}'", parsed.scheme()),
                }),
                Err(e) => Err(ValidationReason::InvalidFormat {
                    detail: format!("'{text}' is not a valid URL: {e}"),
                }),
            }
        }
        ValueType::Color => {
            let text = text_payload(definition, value)?;
            if color_regex().is_match(text) {
                Ok(())
            } else {
                Err(ValidationReason::InvalidFormat {
                    detail: format!("'{text}' is not a #rrggbb color"),
                })
            }
        }
        ValueType::TimeOfDay => {
            let text = text_payload(definition, value)?;
            if NaiveTime::parse_from_str(text, "%H:%M").is_ok() {
                Ok(())
            } else {
                Err(ValidationReason::InvalidFormat {
                    detail: format!("'{text}' is not a HH:MM time of day"),
                })
            }
        }
    }
}

const fn type_mismatch(definition: &SettingDefinition) -> ValidationReason {
    ValidationReason::TypeMismatch {
        expected: definition.value_type,
    }
}

fn text_payload<'v>(
    definition: &SettingDefinition,
    value: &'v SettingValue,
) -> Result<&'v str, ValidationReason> {
    value.as_text().ok_or_else(|| type_mismatch(definition))
}

fn check_integer(
    definition: &SettingDefinition,
    value: &SettingValue,
) -> Result<(), ValidationReason> {
    let Some(number) = value.as_i64() else {
        return Err(type_mismatch(definition));
    };
    let min = definition.constraints.min;
    let max = definition.constraints.max;
    // Bounds are inclusive
    let below = min.is_some_and(|lo| number < lo);
    let above = max.is_some_and(|hi| number > hi);
    if below || above {
        return Err(ValidationReason::OutOfRange { min, max });
    }
    Ok(())
}

fn check_text(
    definition: &SettingDefinition,
    value: &SettingValue,
) -> Result<(), ValidationReason> {
    let text = text_payload(definition, value)?;
    if let Some(max_length) = definition.constraints.max_length {
        if text.chars().count() > max_length {
            return Err(ValidationReason::TooLong { max_length });
        }
    }
    Ok(())
}

fn check_enumerated(
    definition: &SettingDefinition,
    value: &SettingValue,
) -> Result<(), ValidationReason> {
    let text = text_payload(definition, value)?;
    match &definition.constraints.allowed_values {
        Some(allowed) if allowed.iter().any(|candidate| candidate == text) => Ok(()),
        Some(allowed) => Err(ValidationReason::NotInEnum {
            allowed: allowed.clone(),
        }),
        // An enumerated setting without an allowed set accepts any text
        None => Ok(()),
    }
}

fn check_ip_list(
    definition: &SettingDefinition,
    value: &SettingValue,
) -> Result<(), ValidationReason> {
    let Some(entries) = value.as_list() else {
        return Err(type_mismatch(definition));
    };
    for entry in entries {
        if !is_ip_or_cidr(entry) {
            return Err(ValidationReason::InvalidFormat {
                detail: format!("'{entry}' is not an IP address or CIDR range"),
            });
        }
    }
    Ok(())
}

fn is_ip_or_cidr(entry: &str) -> bool {
    if entry.parse::<IpAddr>().is_ok() {
        return true;
    }
    let Some((addr, prefix)) = entry.split_once('/') else {
        return false;
    };
    let Ok(parsed) = addr.parse::<IpAddr>() else {
        return false;
    };
    let Ok(bits) = prefix.parse::<u8>() else {
        return false;
    };
    let limit = if parsed.is_ipv4() { 32 } else { 128 };
    bits <= limit
}

/// Validates change sets against the sealed registry and section rules
#[derive(Debug)]
pub struct Validator {
    registry: Arc<SchemaRegistry>,
    section_rules: Vec<SectionRule>,
}

impl Validator {
    /// Create a validator over a sealed registry with its cross-key rules
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>, section_rules: Vec<SectionRule>) -> Self {
        Self {
            registry,
            section_rules,
        }
    }

    /// Validate a single proposed value.
    ///
    /// # Errors
    ///
    /// Returns the failure for this key (unknown key, type mismatch, or
    /// constraint violation).
    pub fn validate(&self, key: &str, value: &SettingValue) -> Result<(), ValidationFailure> {
        let Some(definition) = self.registry.definition(key) else {
            return Err(ValidationFailure {
                key: key.to_string(),
                reason: ValidationReason::UnknownKey,
            });
        };
        check_value(definition, value).map_err(|reason| ValidationFailure {
            key: key.to_string(),
            reason,
        })
    }

    /// Validate a full change set for one section.
    ///
    /// Runs per-key validation (including section membership) and then the
    /// cross-key rules for the section against the merged prospective state.
    /// Unknown keys reject the whole change set - no partial acceptance.
    ///
    /// # Errors
    ///
    /// Returns every failure found, in detection order.
    pub fn validate_change_set(
        &self,
        section: SectionName,
        changes: &ChangeSet,
        current: &SettingsSnapshot,
    ) -> Result<(), ValidationErrors> {
        let mut failures = Vec::new();

        for (key, value) in changes {
            let Some(definition) = self.registry.definition(key) else {
                failures.push(ValidationFailure {
                    key: key.clone(),
                    reason: ValidationReason::UnknownKey,
                });
                continue;
            };
            if definition.section != section {
                failures.push(ValidationFailure {
                    key: key.clone(),
                    reason: ValidationReason::SectionMismatch {
                        declared: definition.section,
                        target: section,
                    },
                });
                continue;
            }
            if let Err(reason) = check_value(definition, value) {
                failures.push(ValidationFailure {
                    key: key.clone(),
                    reason,
                });
            }
        }

        // Cross-key rules see the section as it would look after the change
        let merged = self.merged_section_state(section, changes, current);
        for rule in self
            .section_rules
            .iter()
            .filter(|rule| rule.section == section)
        {
            if let Err(failure) = (rule.check)(&merged) {
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(failures))
        }
    }

    fn merged_section_state(
        &self,
        section: SectionName,
        changes: &ChangeSet,
        current: &SettingsSnapshot,
    ) -> BTreeMap<String, SettingValue> {
        let mut merged = BTreeMap::new();
        for definition in self.registry.definitions_in_section(section) {
            let value = changes
                .get(&definition.key)
                .or_else(|| current.value(&definition.key))
                .unwrap_or(&definition.default);
            merged.insert(definition.key.clone(), value.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Constraints;

    fn definition(value_type: ValueType, constraints: Constraints) -> SettingDefinition {
        SettingDefinition {
            key: "sample_setting".into(),
            section: SectionName::System,
            value_type,
            default: SettingValue::Text(String::new()),
            constraints,
            sensitive: false,
            description: String::new(),
        }
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        let def = SettingDefinition {
            default: SettingValue::Integer(1),
            ..definition(ValueType::Integer, Constraints::range(1, 100))
        };
        assert!(check_value(&def, &SettingValue::Integer(1)).is_ok());
        assert!(check_value(&def, &SettingValue::Integer(100)).is_ok());
        assert!(matches!(
            check_value(&def, &SettingValue::Integer(0)),
            Err(ValidationReason::OutOfRange { .. })
        ));
        assert!(matches!(
            check_value(&def, &SettingValue::Integer(101)),
            Err(ValidationReason::OutOfRange { .. })
        ));
    }

    #[test]
    fn integer_rejects_text_payload() {
        let def = SettingDefinition {
            default: SettingValue::Integer(1),
            ..definition(ValueType::Integer, Constraints::range(1, 100))
        };
        assert!(matches!(
            check_value(&def, &SettingValue::Text("7".into())),
            Err(ValidationReason::TypeMismatch {
                expected: ValueType::Integer
            })
        ));
    }

    #[test]
    fn email_format() {
        let def = definition(ValueType::Email, Constraints::none());
        assert!(check_value(&def, &SettingValue::Text("ops@example.com".into())).is_ok());
        assert!(check_value(&def, &SettingValue::Text("not-an-email".into())).is_err());
        assert!(check_value(&def, &SettingValue::Text("a b@example.com".into())).is_err());
    }

    #[test]
    fn url_requires_http_scheme() {
        let def = definition(ValueType::Url, Constraints::none());
        assert!(check_value(&def, &SettingValue::Text("https://example.com".into())).is_ok());
        assert!(check_value(&def, &SettingValue::Text("ftp://example.com".into())).is_err());
        assert!(check_value(&def, &SettingValue::Text("example.com".into())).is_err());
    }

    #[test]
    fn color_and_time_formats() {
        let color = definition(ValueType::Color, Constraints::none());
        assert!(check_value(&color, &SettingValue::Text("#0d6efd".into())).is_ok());
        assert!(check_value(&color, &SettingValue::Text("#12345".into())).is_err());
        assert!(check_value(&color, &SettingValue::Text("blue".into())).is_err());

        let time = definition(ValueType::TimeOfDay, Constraints::none());
        assert!(check_value(&time, &SettingValue::Text("02:30".into())).is_ok());
        assert!(check_value(&time, &SettingValue::Text("23:59".into())).is_ok());
        assert!(check_value(&time, &SettingValue::Text("24:00".into())).is_err());
        assert!(check_value(&time, &SettingValue::Text("2:30pm".into())).is_err());
    }

    #[test]
    fn ip_list_accepts_addresses_and_cidr_ranges() {
        let def = SettingDefinition {
            default: SettingValue::List(Vec::new()),
            ..definition(ValueType::IpList, Constraints::none())
        };
        let good = SettingValue::List(vec![
            "10.0.0.1".into(),
            "192.168.1.0/24".into(),
            "2001:db8::1".into(),
            "2001:db8::/64".into(),
        ]);
        assert!(check_value(&def, &good).is_ok());

        let bad = SettingValue::List(vec!["10.0.0.1".into(), "office-lan".into()]);
        assert!(matches!(
            check_value(&def, &bad),
            Err(ValidationReason::InvalidFormat { .. })
        ));
        let bad_prefix = SettingValue::List(vec!["192.168.1.0/33".into()]);
        assert!(check_value(&def, &bad_prefix).is_err());
    }

    #[test]
    fn text_length_counts_characters() {
        let def = definition(ValueType::Text, Constraints::max_len(3));
        assert!(check_value(&def, &SettingValue::Text("abc".into())).is_ok());
        assert!(check_value(&def, &SettingValue::Text("abcd".into())).is_err());
    }
}

//! Run configuration consumed by the linter.
//!
//! Configuration arrives as already-loaded data; reading and merging config
//! files belongs to the layers above this crate. Severity values are kept
//! raw until [`Linter::verify`](crate::Linter::verify) resolves them, so a
//! bad entry surfaces as a reported message instead of a deserialization
//! failure.

use crate::types::{InvalidSeverity, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Top-level configuration for one verify run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Rule id to severity (optionally with rule-specific options).
    pub rules: HashMap<String, RuleEntry>,
    /// Language feature flags forwarded to the parser.
    pub ecma_features: HashMap<String, bool>,
}

impl Config {
    /// Creates an empty configuration: no rules, no feature flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables a rule.
    #[must_use]
    pub fn with_rule(mut self, id: impl Into<String>, entry: impl Into<RuleEntry>) -> Self {
        self.rules.insert(id.into(), entry.into());
        self
    }

    /// Sets a language feature flag.
    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.ecma_features.insert(name.into(), enabled);
        self
    }
}

/// One configured rule: a bare severity, or a severity followed by
/// rule-specific options.
///
/// The severity is stored as raw JSON so that out-of-range values can be
/// diagnosed per rule at verify time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleEntry {
    /// `[severity, ...options]`
    WithOptions(Vec<Value>),
    /// `severity` alone, numeric or named.
    Level(Value),
}

impl RuleEntry {
    /// Resolves the configured severity.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not 0, 1, 2 or a known severity
    /// name, or if an options array is empty.
    pub fn severity(&self) -> Result<Severity, ConfigError> {
        let raw = match self {
            Self::WithOptions(values) => values.first().ok_or(ConfigError::MissingSeverity)?,
            Self::Level(value) => value,
        };
        match raw {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .and_then(|v| Severity::try_from(v).ok())
                .ok_or_else(|| InvalidSeverity(raw.to_string()).into()),
            Value::String(s) => s.parse().map_err(ConfigError::from),
            other => Err(InvalidSeverity(other.to_string()).into()),
        }
    }

    /// Rule-specific options, excluding the leading severity.
    #[must_use]
    pub fn options(&self) -> &[Value] {
        match self {
            Self::WithOptions(values) if !values.is_empty() => &values[1..],
            _ => &[],
        }
    }
}

impl From<Severity> for RuleEntry {
    fn from(severity: Severity) -> Self {
        Self::Level(Value::from(severity.level()))
    }
}

/// Errors in a single rule's configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The severity value is out of range or misspelled.
    #[error(transparent)]
    InvalidSeverity(#[from] InvalidSeverity),

    /// An options array with no leading severity level.
    #[error("rule entry array must start with a severity level")]
    MissingSeverity,
}

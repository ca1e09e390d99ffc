//! Core types for lint messages and severities.

use crate::ast::NodeType;
use miette::{Diagnostic, SourceSpan};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Severity level for lint messages.
///
/// Serializes to its numeric level (0, 1, 2) to match the message wire
/// shape; deserializes from either the numeric level or the names `"off"`,
/// `"warn"`/`"warning"` and `"error"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Rule is disabled; listeners may run but never contribute messages.
    Off,
    /// Finding that should be addressed but does not fail the run.
    Warning,
    /// Finding that must be fixed.
    Error,
}

impl Severity {
    /// Numeric level: 0 = off, 1 = warning, 2 = error.
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Warning => 1,
            Self::Error => 2,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl TryFrom<u8> for Severity {
    type Error = InvalidSeverity;

    fn try_from(level: u8) -> Result<Self, InvalidSeverity> {
        match level {
            0 => Ok(Self::Off),
            1 => Ok(Self::Warning),
            2 => Ok(Self::Error),
            other => Err(InvalidSeverity(other.to_string())),
        }
    }
}

impl FromStr for Severity {
    type Err = InvalidSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "warn" | "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(InvalidSeverity(other.to_string())),
        }
    }
}

/// Error produced when a severity level is not 0, 1, 2 or a known name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("severity should be 0, 1, 2, \"off\", \"warn\" or \"error\" (got {0})")]
pub struct InvalidSeverity(pub String);

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.level())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeverityVisitor;

        impl Visitor<'_> for SeverityVisitor {
            type Value = Severity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("0, 1, 2, \"off\", \"warn\" or \"error\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Severity, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(|level| Severity::try_from(level).ok())
                    .ok_or_else(|| E::custom(InvalidSeverity(v.to_string())))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Severity, E> {
                u64::try_from(v)
                    .map_err(|_| E::custom(InvalidSeverity(v.to_string())))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Severity, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SeverityVisitor)
    }
}

/// A diagnostic produced by a rule listener during one verify run.
///
/// Never mutated after creation; the line is 1-indexed and the column
/// 0-indexed, taken from the reported node's start position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Id of the rule that produced the message; `None` for messages the
    /// engine itself synthesized.
    pub rule_id: Option<String>,
    /// Configured severity at the time of reporting.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// 1-indexed line of the reported position.
    pub line: usize,
    /// 0-indexed column of the reported position.
    pub column: usize,
    /// Type of the reported node, when the message points at one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(
        rule_id: Option<String>,
        severity: Severity,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            rule_id,
            severity,
            message: message.into(),
            line,
            column,
            node_type: None,
        }
    }

    /// Attaches the reported node's type.
    #[must_use]
    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.severity)?;
        if let Some(rule) = &self.rule_id {
            write!(f, " [{rule}]")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Converts a [`Message`] to a miette [`Diagnostic`] for rich display.
///
/// The byte offset is supplied by the caller, typically via
/// [`crate::SourceCode::offset_for`].
#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{message}")]
pub struct MessageDiagnostic {
    message: String,
    #[label("{label_message}")]
    span: SourceSpan,
    label_message: String,
}

impl MessageDiagnostic {
    /// Creates a diagnostic anchored at the given byte offset.
    #[must_use]
    pub fn new(message: &Message, offset: usize) -> Self {
        Self {
            message: message.message.clone(),
            span: SourceSpan::from((offset, 0)),
            label_message: message
                .rule_id
                .clone()
                .unwrap_or_else(|| message.severity.to_string()),
        }
    }
}

//! Playbook hints.
//!
//! Hints are per-run overrides a caller passes when building a playbook
//! configuration. A plugin declares the hints it understands; [`Hints::consume`]
//! validates the raw values and resolves them into a flat option map with
//! defaults filled in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while consuming raw hints.
#[derive(Debug, Error, PartialEq)]
pub enum HintsError {
    #[error("unknown hint '{0}'")]
    Unknown(String),

    #[error("hint '{0}' given more than once")]
    Duplicate(String),

    #[error("hint '{id}' expects {expected}, got {actual}")]
    WrongType {
        id: String,
        expected: HintKind,
        actual: String,
    },

    #[error("hint '{id}' must be one of {allowed:?}")]
    NotAllowed { id: String, allowed: Vec<String> },
}

/// Value type of a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintKind {
    Boolean,
    Integer,
    String,
    Select,
}

impl std::fmt::Display for HintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HintKind::Boolean => write!(f, "a boolean"),
            HintKind::Integer => write!(f, "an integer"),
            HintKind::String => write!(f, "a string"),
            HintKind::Select => write!(f, "a choice"),
        }
    }
}

/// A single declared hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hint {
    /// Hint identifier
    pub id: String,

    /// Human readable description
    #[serde(default)]
    pub description: String,

    /// Value type
    #[serde(rename = "type")]
    pub kind: HintKind,

    /// Value used when the caller omits the hint
    pub default_value: serde_json::Value,

    /// Allowed values for `select` hints
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl Hint {
    pub fn boolean(id: impl Into<String>, description: impl Into<String>, default: bool) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: HintKind::Boolean,
            default_value: default.into(),
            values: Vec::new(),
        }
    }

    pub fn integer(id: impl Into<String>, description: impl Into<String>, default: i64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: HintKind::Integer,
            default_value: default.into(),
            values: Vec::new(),
        }
    }

    pub fn string(
        id: impl Into<String>,
        description: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: HintKind::String,
            default_value: serde_json::Value::String(default.into()),
            values: Vec::new(),
        }
    }

    pub fn select(
        id: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        default: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            kind: HintKind::Select,
            default_value: serde_json::Value::String(default.into()),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    fn accept(&self, value: &serde_json::Value) -> Result<(), HintsError> {
        let type_ok = match self.kind {
            HintKind::Boolean => value.is_boolean(),
            HintKind::Integer => value.is_i64() || value.is_u64(),
            HintKind::String | HintKind::Select => value.is_string(),
        };
        if !type_ok {
            return Err(HintsError::WrongType {
                id: self.id.clone(),
                expected: self.kind,
                actual: json_type_name(value).to_string(),
            });
        }

        if self.kind == HintKind::Select {
            let chosen = value.as_str().unwrap_or_default();
            if !self.values.iter().any(|v| v == chosen) {
                return Err(HintsError::NotAllowed {
                    id: self.id.clone(),
                    allowed: self.values.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A raw `{id, value}` pair as sent by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHint {
    pub id: String,
    pub value: serde_json::Value,
}

impl RawHint {
    pub fn new(id: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// Hints resolved for one run.
pub type ResolvedHints = IndexMap<String, serde_json::Value>;

/// A plugin's hint schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hints {
    hints: Vec<Hint>,
}

impl Hints {
    pub fn new(hints: Vec<Hint>) -> Self {
        Self { hints }
    }

    /// Declared hints.
    pub fn iter(&self) -> impl Iterator<Item = &Hint> {
        self.hints.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }

    /// Validates `raw` against the schema and resolves every declared hint.
    ///
    /// The result contains one entry per declared hint, in declaration order.
    pub fn consume(&self, raw: &[RawHint]) -> Result<ResolvedHints, HintsError> {
        let mut seen = HashSet::new();
        for item in raw {
            if !seen.insert(item.id.as_str()) {
                return Err(HintsError::Duplicate(item.id.clone()));
            }
            let hint = self
                .hints
                .iter()
                .find(|h| h.id == item.id)
                .ok_or_else(|| HintsError::Unknown(item.id.clone()))?;
            hint.accept(&item.value)?;
        }

        let resolved = self
            .hints
            .iter()
            .map(|hint| {
                let value = raw
                    .iter()
                    .find(|item| item.id == hint.id)
                    .map_or_else(|| hint.default_value.clone(), |item| item.value.clone());
                (hint.id.clone(), value)
            })
            .collect();

        Ok(resolved)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

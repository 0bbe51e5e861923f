//! YAML front matter handling.
//!
//! Front matter is kept as an ordered, loosely typed mapping so malformed or
//! legacy documents can be reported field by field instead of failing to
//! decode, and so rewrites keep the original key order.

use std::path::Path;

use once_cell::sync::OnceCell;
use regex_lite::Regex;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::error::{ExecPlanError, Result};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontMatterError {
    #[error("Missing YAML front matter block")]
    Missing,

    #[error("Invalid YAML front matter: {0}")]
    Yaml(String),

    #[error("Front matter must be a YAML mapping")]
    NotMapping,

    #[error("Front matter keys must be strings")]
    NonStringKey,
}

#[allow(clippy::expect_used)]
fn block_regex() -> &'static Regex {
    static BLOCK_RE: OnceCell<Regex> = OnceCell::new();
    BLOCK_RE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)")
            .expect("valid front matter regex")
    })
}

/// Splits `text` into the raw YAML block and the body that follows it.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let captures = block_regex().captures(text)?;
    let whole = captures.get(0)?;
    let yaml = captures.get(1)?;
    Some((yaml.as_str(), &text[whole.end()..]))
}

/// Ordered front matter mapping with string keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    fields: Mapping,
}

impl FrontMatter {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, FrontMatterError> {
        let value: Value =
            serde_yaml::from_str(yaml).map_err(|e| FrontMatterError::Yaml(e.to_string()))?;
        let fields = match value {
            Value::Mapping(fields) => fields,
            Value::Null => Mapping::new(),
            _ => return Err(FrontMatterError::NotMapping),
        };
        if fields.keys().any(|key| !key.is_string()) {
            return Err(FrontMatterError::NonStringKey);
        }
        Ok(Self { fields })
    }

    /// Parses the front matter at the top of a document.
    pub fn parse_document(text: &str) -> std::result::Result<Self, FrontMatterError> {
        let (yaml, _) = split_front_matter(text).ok_or(FrontMatterError::Missing)?;
        Self::from_yaml(yaml)
    }

    /// Reads and parses a document's front matter from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExecPlanError::io("read document", path, e))?;
        Self::parse_document(&text).map_err(|e| ExecPlanError::InvalidDocument {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Scalar value rendered as text; `null` reads as empty, collections as `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        scalar_text(self.get(key)?)
    }

    /// Trimmed scalar text, treating empty as absent.
    pub fn get_trimmed(&self, key: &str) -> Option<String> {
        self.get_str(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Replaces a value in place, or appends the key when it is new.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(Value::String(key.to_string()), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().filter_map(Value::as_str)
    }

    /// Returns `text` with its front matter block replaced by this mapping.
    pub fn splice_into(&self, text: &str) -> std::result::Result<String, FrontMatterError> {
        let (_, body) = split_front_matter(text).ok_or(FrontMatterError::Missing)?;
        let yaml = serde_yaml::to_string(&self.fields)
            .map_err(|e| FrontMatterError::Yaml(e.to_string()))?;
        Ok(format!("---\n{}\n---\n{body}", yaml.trim_end()))
    }
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Double-quoted YAML scalar for template rendering.
pub fn yaml_quote(value: &str) -> String {
    // JSON string literals are valid YAML double-quoted scalars.
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DocmetaError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";

pub const BUILT_IN_FIELD_NAMES: &[&str] = &[
    "document_name",
    "uploader",
    "upload_date",
    "last_update_date",
    "source",
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatasetId {
    type Err = DocmetaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(DocmetaError::InvalidDatasetId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        Self(DEFAULT_BASE_URL.to_string())
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BaseUrl {
    type Err = DocmetaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DocmetaError::InvalidBaseUrl(value.to_string()));
        }
        // host:port without a scheme is treated as plain http
        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };
        let parsed = Url::parse(&with_scheme)
            .map_err(|err| DocmetaError::InvalidBaseUrl(format!("{value}: {err}")))?;
        if parsed.host_str().is_none() {
            return Err(DocmetaError::InvalidBaseUrl(value.to_string()));
        }
        Ok(Self(with_scheme.trim_end_matches('/').to_string()))
    }
}

/// Which non-built-in metadata fields survive filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataFilter {
    #[default]
    All,
    Names(BTreeSet<String>),
    Values(BTreeMap<String, String>),
}

/// One entry of a document's `doc_metadata` list.
///
/// Keys other than `id`, `name`, `type` and `value` are kept in `extra` and
/// written back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetadataField {
    pub fn new(name: &str, value: Value) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            field_type: None,
            value,
            extra: Map::new(),
        }
    }

    /// Reads an upstream metadata object. Scalar `id`, `name` and `type`
    /// values of any JSON type are taken as text.
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let mut extra = object.clone();
        let id = extra.remove("id").and_then(optional_text);
        let name = extra.remove("name").and_then(optional_text).unwrap_or_default();
        let field_type = extra.remove("type").and_then(optional_text);
        let value = extra.remove("value").unwrap_or(Value::Null);
        Self {
            id,
            name,
            field_type,
            value,
            extra,
        }
    }

    pub fn is_built_in(&self) -> bool {
        let is_built_in_id = self
            .id
            .as_deref()
            .map(|id| {
                let id = id.trim().to_ascii_lowercase();
                id == "built-in" || id == "built_in"
            })
            .unwrap_or(false);
        is_built_in_id || BUILT_IN_FIELD_NAMES.contains(&self.name.trim())
    }

    /// Text form used when comparing against a required filter value.
    pub fn value_text(&self) -> String {
        scalar_text(&self.value)
    }
}

/// A document as listed by the knowledge base, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct KbDocument {
    pub id: String,
    pub name: Option<String>,
    pub metadata: Vec<MetadataField>,
}

impl KbDocument {
    /// Top-level name, falling back to the `document_name` metadata value.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.trim().is_empty()) {
            return name.to_string();
        }
        self.metadata
            .iter()
            .find(|field| field.name == "document_name")
            .map(|field| match &field.value {
                Value::Null => String::new(),
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default()
    }
}

fn optional_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

//! Normalization of loosely-typed invocation parameters.
//!
//! Hosts hand parameters over as JSON values, and the same logical input can
//! arrive as a JSON array, JSON text inside a string, or a delimited string.
//! Each normalizer tries its candidate syntaxes in a fixed order and falls back
//! to plain splitting.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::{BaseUrl, DatasetId, MetadataFilter, scalar_text};
use crate::error::DocmetaError;

static LIST_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\n]").expect("list separator pattern"));
static NAME_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,，\n]").expect("name separator pattern"));
static PAIR_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,，;；\n]").expect("pair separator pattern"));

pub fn normalize_dataset_list(value: Option<&Value>) -> Result<Vec<DatasetId>, DocmetaError> {
    normalize_list(value, "dataset_list", &LIST_SEPARATORS)?
        .iter()
        .map(|item| item.parse())
        .collect()
}

pub fn normalize_document_names(value: Option<&Value>) -> Result<Vec<String>, DocmetaError> {
    normalize_list(value, "document_name", &NAME_SEPARATORS)
}

pub fn require_str(value: Option<&Value>, name: &str) -> Result<String, DocmetaError> {
    match value {
        None | Some(Value::Null) => Err(DocmetaError::MissingParameter(name.to_string())),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(DocmetaError::EmptyParameter(name.to_string()));
            }
            Ok(trimmed.to_string())
        }
        Some(Value::Array(_)) | Some(Value::Object(_)) => Err(DocmetaError::UnsupportedShape {
            name: name.to_string(),
            message: "expected a string".to_string(),
        }),
        Some(other) => Ok(other.to_string()),
    }
}

pub fn normalize_base_url(value: Option<&Value>) -> Result<BaseUrl, DocmetaError> {
    let text = match value {
        None | Some(Value::Null) => return Ok(BaseUrl::default()),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            return Err(DocmetaError::UnsupportedShape {
                name: "kb_base_url".to_string(),
                message: "expected a string".to_string(),
            });
        }
        Some(other) => other.to_string(),
    };
    if text.is_empty() {
        return Ok(BaseUrl::default());
    }
    text.parse()
}

pub fn parse_metadata_filter(value: Option<&Value>) -> Result<MetadataFilter, DocmetaError> {
    let filter = match value {
        None | Some(Value::Null) => MetadataFilter::All,
        Some(Value::Array(items)) => {
            let names = items
                .iter()
                .map(|item| element_text(item, "metadata_filter"))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|name| !name.is_empty())
                .collect::<BTreeSet<_>>();
            names_filter(names)
        }
        Some(Value::Object(map)) => {
            let mut pairs = BTreeMap::new();
            for (name, expected) in map {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                pairs.insert(name.to_string(), element_text(expected, "metadata_filter")?);
            }
            values_filter(pairs)
        }
        Some(Value::String(text)) => parse_filter_text(text)?,
        Some(_) => MetadataFilter::All,
    };
    Ok(filter)
}

fn parse_filter_text(text: &str) -> Result<MetadataFilter, DocmetaError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(MetadataFilter::All);
    }

    if looks_like_json(trimmed, &[('[', ']'), ('{', '}')]) {
        if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
            return parse_metadata_filter(Some(&parsed));
        }
    }

    if trimmed.contains('=') {
        let mut pairs = BTreeMap::new();
        for token in PAIR_SEPARATORS.split(trimmed) {
            let Some((name, expected)) = token.trim().split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            pairs.insert(name.to_string(), expected.trim().to_string());
        }
        return Ok(values_filter(pairs));
    }

    let names = split_non_blank(trimmed, &NAME_SEPARATORS)
        .into_iter()
        .collect::<BTreeSet<_>>();
    Ok(names_filter(names))
}

fn names_filter(names: BTreeSet<String>) -> MetadataFilter {
    if names.is_empty() {
        MetadataFilter::All
    } else {
        MetadataFilter::Names(names)
    }
}

fn values_filter(pairs: BTreeMap<String, String>) -> MetadataFilter {
    if pairs.is_empty() {
        MetadataFilter::All
    } else {
        MetadataFilter::Values(pairs)
    }
}

fn normalize_list(
    value: Option<&Value>,
    name: &str,
    separators: &Regex,
) -> Result<Vec<String>, DocmetaError> {
    let items = match value {
        None | Some(Value::Null) => return Err(DocmetaError::MissingParameter(name.to_string())),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| element_text(item, name))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>(),
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            if looks_like_json(trimmed, &[('[', ']'), ('"', '"')]) {
                if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                    return normalize_list(Some(&parsed), name, separators);
                }
            }
            split_non_blank(trimmed, separators)
        }
        Some(Value::Object(_)) => {
            return Err(DocmetaError::UnsupportedShape {
                name: name.to_string(),
                message: "expected a list or a delimited string, got an object".to_string(),
            });
        }
        Some(other) => vec![other.to_string()],
    };

    if items.is_empty() {
        return Err(DocmetaError::EmptyList(name.to_string()));
    }
    Ok(items)
}

fn element_text(value: &Value, name: &str) -> Result<String, DocmetaError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(DocmetaError::UnsupportedShape {
            name: name.to_string(),
            message: "nested arrays and objects are not supported".to_string(),
        }),
        scalar => Ok(scalar_text(scalar)),
    }
}

fn looks_like_json(text: &str, delimiters: &[(char, char)]) -> bool {
    text.len() >= 2
        && delimiters
            .iter()
            .any(|(open, close)| text.starts_with(*open) && text.ends_with(*close))
}

fn split_non_blank(text: &str, separators: &Regex) -> Vec<String> {
    separators
        .split(text)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

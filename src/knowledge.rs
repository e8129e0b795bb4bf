use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::domain::{BaseUrl, DatasetId, KbDocument, MetadataField};
use crate::error::DocmetaError;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_MESSAGE_LIMIT: usize = 200;

pub trait KnowledgeBaseClient {
    fn list_documents(
        &self,
        dataset: &DatasetId,
        keyword: &str,
    ) -> Result<Vec<KbDocument>, DocmetaError>;
}

impl<T: KnowledgeBaseClient + ?Sized> KnowledgeBaseClient for &T {
    fn list_documents(
        &self,
        dataset: &DatasetId,
        keyword: &str,
    ) -> Result<Vec<KbDocument>, DocmetaError> {
        (**self).list_documents(dataset, keyword)
    }
}

#[derive(Clone)]
pub struct KnowledgeHttpClient {
    client: Client,
    base_url: BaseUrl,
}

impl KnowledgeHttpClient {
    pub fn new(base_url: BaseUrl, api_key: &str) -> Result<Self, DocmetaError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("docmeta-query/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| DocmetaError::KnowledgeHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| DocmetaError::UnsupportedShape {
                name: "kb_api_key".to_string(),
                message: "contains characters not allowed in an HTTP header".to_string(),
            })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| DocmetaError::KnowledgeHttp(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn documents_url(base_url: &BaseUrl, dataset: &DatasetId) -> String {
        base_url.join(&format!(
            "v1/datasets/{}/documents",
            encode_path_segment(dataset.as_str())
        ))
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, DocmetaError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().unwrap_or_default();
        Err(DocmetaError::KnowledgeStatus {
            status,
            message: message.chars().take(STATUS_MESSAGE_LIMIT).collect(),
        })
    }
}

impl KnowledgeBaseClient for KnowledgeHttpClient {
    fn list_documents(
        &self,
        dataset: &DatasetId,
        keyword: &str,
    ) -> Result<Vec<KbDocument>, DocmetaError> {
        let url = Self::documents_url(&self.base_url, dataset);
        let response = self
            .client
            .get(&url)
            .query(&[("keyword", keyword)])
            .send()
            .map_err(|err| DocmetaError::KnowledgeHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| DocmetaError::KnowledgeHttp(err.to_string()))?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|_| DocmetaError::KnowledgeResponse("not JSON".to_string()))?;
        parse_documents(&payload)
    }
}

/// Reads the `data` list of a document listing response.
pub fn parse_documents(payload: &Value) -> Result<Vec<KbDocument>, DocmetaError> {
    let items = payload
        .get("data")
        .and_then(|value| value.as_array())
        .ok_or_else(|| DocmetaError::KnowledgeResponse("missing 'data' list".to_string()))?;

    Ok(items.iter().filter_map(parse_document).collect())
}

fn parse_document(item: &Value) -> Option<KbDocument> {
    let object = item.as_object()?;
    let id = object
        .get("id")
        .map(|value| match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    let name = object
        .get("name")
        .and_then(|value| value.as_str())
        .map(|value| value.to_string());
    let metadata = object
        .get("doc_metadata")
        .and_then(|value| value.as_array())
        .map(|fields| {
            fields
                .iter()
                .filter_map(|field| field.as_object().map(MetadataField::from_object))
                .collect()
        })
        .unwrap_or_default();
    Some(KbDocument { id, name, metadata })
}

fn encode_path_segment(value: &str) -> String {
    let mut out = String::new();
    for byte in value.as_bytes() {
        let ch = *byte as char;
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~' | '/') {
            out.push(ch);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::QueryRequest;
use crate::domain::BaseUrl;
use crate::error::DocmetaError;
use crate::input::{
    normalize_base_url, normalize_dataset_list, normalize_document_names, parse_metadata_filter,
    require_str,
};

/// Raw invocation parameters, exactly as a host hands them over.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct ToolParameters {
    #[serde(default)]
    pub dataset_list: Option<Value>,
    #[serde(default)]
    pub kb_api_key: Option<Value>,
    #[serde(default)]
    pub kb_base_url: Option<Value>,
    #[serde(default)]
    pub document_name: Option<Value>,
    #[serde(default)]
    pub metadata_filter: Option<Value>,
}

impl ToolParameters {
    /// Values present in `overrides` replace the ones loaded here.
    pub fn merge(self, overrides: ToolParameters) -> Self {
        Self {
            dataset_list: overrides.dataset_list.or(self.dataset_list),
            kb_api_key: overrides.kb_api_key.or(self.kb_api_key),
            kb_base_url: overrides.kb_base_url.or(self.kb_base_url),
            document_name: overrides.document_name.or(self.document_name),
            metadata_filter: overrides.metadata_filter.or(self.metadata_filter),
        }
    }
}

impl fmt::Debug for ToolParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolParameters")
            .field("dataset_list", &self.dataset_list)
            .field("kb_api_key", &self.kb_api_key.as_ref().map(|_| "<redacted>"))
            .field("kb_base_url", &self.kb_base_url)
            .field("document_name", &self.document_name)
            .field("metadata_filter", &self.metadata_filter)
            .finish()
    }
}

#[derive(Clone)]
pub struct ResolvedParameters {
    pub request: QueryRequest,
    pub api_key: String,
    pub base_url: BaseUrl,
}

impl fmt::Debug for ResolvedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedParameters")
            .field("request", &self.request)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads a JSON parameters object from a file, or from stdin when the path is `-`.
    pub fn load(path: Option<&str>) -> Result<ToolParameters, DocmetaError> {
        let Some(path) = path else {
            return Ok(ToolParameters::default());
        };

        let content = if path == "-" {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|_| DocmetaError::ParamsRead(PathBuf::from("<stdin>")))?;
            buffer
        } else {
            let params_path = PathBuf::from(path);
            fs::read_to_string(&params_path).map_err(|_| DocmetaError::ParamsRead(params_path))?
        };

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ToolParameters, DocmetaError> {
        serde_json::from_str(content).map_err(|err| DocmetaError::ParamsParse(err.to_string()))
    }

    pub fn resolve_parameters(params: ToolParameters) -> Result<ResolvedParameters, DocmetaError> {
        let datasets = normalize_dataset_list(params.dataset_list.as_ref())?;
        let api_key = require_str(params.kb_api_key.as_ref(), "kb_api_key")?;
        let keywords = normalize_document_names(params.document_name.as_ref())?;
        let base_url = normalize_base_url(params.kb_base_url.as_ref())?;
        let filter = parse_metadata_filter(params.metadata_filter.as_ref())?;

        Ok(ResolvedParameters {
            request: QueryRequest {
                datasets,
                keywords,
                filter,
            },
            api_key,
            base_url,
        })
    }
}

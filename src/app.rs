use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::domain::{DatasetId, MetadataField, MetadataFilter};
use crate::error::DocmetaError;
use crate::filter::select_document;
use crate::knowledge::KnowledgeBaseClient;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub datasets: Vec<DatasetId>,
    pub keywords: Vec<String>,
    pub filter: MetadataFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEntry {
    pub dataset_id: DatasetId,
    pub document_id: String,
    pub document_name: String,
    pub keyword: String,
    pub metadata: Vec<MetadataField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetError {
    pub dataset_id: DatasetId,
    pub keyword: String,
    pub message: String,
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dataset {}, keyword '{}': {}",
            self.dataset_id, self.keyword, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DatasetOutcome {
    Documents(Vec<ResultEntry>),
    Failed(DatasetError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub documents: Vec<ResultEntry>,
    pub errors: Vec<DatasetError>,
}

impl QueryResult {
    pub fn push(&mut self, outcome: DatasetOutcome) {
        match outcome {
            DatasetOutcome::Documents(entries) => self.documents.extend(entries),
            DatasetOutcome::Failed(error) => self.errors.push(error),
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.documents.is_empty() && !self.errors.is_empty()
    }

    /// An empty result is reported as a failure, carrying any per-dataset errors.
    pub fn require_documents(self, attempted: usize) -> Result<Self, DocmetaError> {
        if !self.documents.is_empty() {
            return Ok(self);
        }
        if self.errors.is_empty() {
            return Err(DocmetaError::NoDocuments {
                message: "no documents found".to_string(),
                all_failed: false,
            });
        }
        let joined = self
            .errors
            .iter()
            .map(|error| error.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(DocmetaError::NoDocuments {
            message: format!("no documents found; errors: {joined}"),
            all_failed: self.errors.len() >= attempted,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Clone)]
pub struct App<K: KnowledgeBaseClient> {
    client: K,
}

impl<K: KnowledgeBaseClient> App<K> {
    pub fn new(client: K) -> Self {
        Self { client }
    }

    /// Queries every dataset for every keyword, in request order. Failures are
    /// recorded per dataset and never stop the remaining requests.
    pub fn query(&self, request: &QueryRequest, sink: &dyn ProgressSink) -> QueryResult {
        let mut result = QueryResult::default();
        let total = request.datasets.len() * request.keywords.len();
        let mut step = 0usize;

        for dataset in &request.datasets {
            for keyword in &request.keywords {
                step += 1;
                sink.event(ProgressEvent {
                    message: format!("phase=Fetch; [{step}/{total}] dataset={dataset} keyword='{keyword}'"),
                    elapsed: None,
                });
                let started = Instant::now();
                let outcome = self.fetch_dataset(dataset, keyword, &request.filter);
                let summary = match &outcome {
                    DatasetOutcome::Documents(entries) => format!("{} document(s)", entries.len()),
                    DatasetOutcome::Failed(error) => format!("failed: {}", error.message),
                };
                sink.event(ProgressEvent {
                    message: format!("phase=Done; dataset={dataset} {summary}"),
                    elapsed: Some(started.elapsed()),
                });
                result.push(outcome);
            }
        }

        tracing::debug!(
            documents = result.documents.len(),
            errors = result.errors.len(),
            "query finished"
        );
        result
    }

    pub fn fetch_dataset(
        &self,
        dataset: &DatasetId,
        keyword: &str,
        filter: &MetadataFilter,
    ) -> DatasetOutcome {
        let documents = match self.client.list_documents(dataset, keyword) {
            Ok(documents) => documents,
            Err(err) => {
                tracing::warn!(%dataset, keyword, error = %err, "dataset query failed");
                return DatasetOutcome::Failed(DatasetError {
                    dataset_id: dataset.clone(),
                    keyword: keyword.to_string(),
                    message: err.to_string(),
                });
            }
        };
        tracing::debug!(%dataset, keyword, count = documents.len(), "documents listed");

        let entries = documents
            .iter()
            .filter_map(|document| {
                let metadata = select_document(document, filter)?;
                Some(ResultEntry {
                    dataset_id: dataset.clone(),
                    document_id: document.id.clone(),
                    document_name: document.display_name(),
                    keyword: keyword.to_string(),
                    metadata,
                })
            })
            .collect();
        DatasetOutcome::Documents(entries)
    }
}

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use assert_matches::assert_matches;
use serde_json::json;

use docmeta_query::app::{App, DatasetOutcome, QueryRequest};
use docmeta_query::domain::{BUILT_IN_FIELD_NAMES, DatasetId, KbDocument, MetadataField, MetadataFilter};
use docmeta_query::error::DocmetaError;
use docmeta_query::knowledge::KnowledgeBaseClient;
use docmeta_query::output::JsonOutput;

enum MockResponse {
    Documents(Vec<KbDocument>),
    Unreachable,
    NotFound,
}

#[derive(Default)]
struct MockKnowledgeBase {
    responses: HashMap<String, MockResponse>,
    calls: RefCell<Vec<(String, String)>>,
}

impl MockKnowledgeBase {
    fn with(mut self, dataset: &str, response: MockResponse) -> Self {
        self.responses.insert(dataset.to_string(), response);
        self
    }
}

impl KnowledgeBaseClient for MockKnowledgeBase {
    fn list_documents(
        &self,
        dataset: &DatasetId,
        keyword: &str,
    ) -> Result<Vec<KbDocument>, DocmetaError> {
        self.calls
            .borrow_mut()
            .push((dataset.to_string(), keyword.to_string()));
        match self.responses.get(dataset.as_str()) {
            Some(MockResponse::Documents(documents)) => Ok(documents.clone()),
            Some(MockResponse::NotFound) => Err(DocmetaError::KnowledgeStatus {
                status: 404,
                message: "dataset not found".to_string(),
            }),
            Some(MockResponse::Unreachable) | None => Err(DocmetaError::KnowledgeHttp(
                "error sending request: connection refused".to_string(),
            )),
        }
    }
}

fn document(id: &str, name: &str, fields: &[(&str, serde_json::Value)]) -> KbDocument {
    KbDocument {
        id: id.to_string(),
        name: Some(name.to_string()),
        metadata: fields
            .iter()
            .map(|(field, value)| MetadataField::new(field, value.clone()))
            .collect(),
    }
}

fn request(datasets: &[&str], filter: MetadataFilter) -> QueryRequest {
    QueryRequest {
        datasets: datasets.iter().map(|id| id.parse().unwrap()).collect(),
        keywords: vec!["guide".to_string()],
        filter,
    }
}

#[test]
fn failed_dataset_does_not_hide_other_results() {
    let client = MockKnowledgeBase::default()
        .with("d1", MockResponse::Unreachable)
        .with(
            "d2",
            MockResponse::Documents(vec![document(
                "doc-1",
                "guide.md",
                &[("lang", json!("en")), ("uploader", json!("alice"))],
            )]),
        );
    let app = App::new(client);

    let result = app.query(&request(&["d1", "d2"], MetadataFilter::All), &JsonOutput);

    assert_eq!(result.documents.len(), 1);
    let entry = &result.documents[0];
    assert_eq!(entry.dataset_id.as_str(), "d2");
    assert_eq!(entry.document_id, "doc-1");
    assert_eq!(entry.document_name, "guide.md");
    assert_eq!(entry.metadata, vec![MetadataField::new("lang", json!("en"))]);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].dataset_id.as_str(), "d1");
    assert!(result.errors[0].message.starts_with("request error:"));
    assert!(result.is_partial());
}

#[test]
fn datasets_are_queried_in_request_order_for_every_keyword() {
    let client = MockKnowledgeBase::default()
        .with("b", MockResponse::Documents(vec![document("b1", "b.md", &[])]))
        .with("a", MockResponse::Documents(vec![document("a1", "a.md", &[])]));
    let app = App::new(client);
    let mut query = request(&["b", "a", "b"], MetadataFilter::All);
    query.keywords = vec!["x".to_string(), "y".to_string()];

    let result = app.query(&query, &JsonOutput);

    let ids: Vec<_> = result
        .documents
        .iter()
        .map(|entry| (entry.document_id.as_str(), entry.keyword.as_str()))
        .collect();
    assert_eq!(
        ids,
        vec![
            ("b1", "x"),
            ("b1", "y"),
            ("a1", "x"),
            ("a1", "y"),
            ("b1", "x"),
            ("b1", "y")
        ]
    );
}

#[test]
fn upstream_not_found_is_recorded_per_dataset() {
    let client = MockKnowledgeBase::default().with("gone", MockResponse::NotFound);
    let app = App::new(client);

    let outcome = app.fetch_dataset(&"gone".parse().unwrap(), "guide", &MetadataFilter::All);

    assert_matches!(outcome, DatasetOutcome::Failed(ref error) if error.message == "HTTP 404: dataset not found");
}

#[test]
fn built_in_fields_never_reach_results() {
    let mut fields: Vec<(&str, serde_json::Value)> = BUILT_IN_FIELD_NAMES
        .iter()
        .map(|name| (*name, json!("system")))
        .collect();
    fields.push(("topic", json!("billing")));
    let mut with_builtin_id = document("doc-2", "", &[("custom", json!("x"))]);
    with_builtin_id.metadata[0].id = Some("built_in".to_string());

    let client = MockKnowledgeBase::default().with(
        "d",
        MockResponse::Documents(vec![document("doc-1", "a.md", &fields), with_builtin_id]),
    );
    let app = App::new(client);

    let filters = [
        MetadataFilter::All,
        MetadataFilter::Names(BTreeSet::from(["uploader".to_string(), "topic".to_string()])),
    ];
    for filter in filters {
        let result = app.query(&request(&["d"], filter), &JsonOutput);
        for entry in &result.documents {
            assert!(entry.metadata.iter().all(|field| !field.is_built_in()));
        }
        assert_eq!(result.documents[0].metadata.len(), 1);
        assert!(result.documents[1].metadata.is_empty());
    }
}

#[test]
fn value_filter_excludes_non_matching_documents() {
    let client = MockKnowledgeBase::default().with(
        "d",
        MockResponse::Documents(vec![
            document("one", "1.md", &[("a", json!(1)), ("b", json!(2))]),
            document("two", "2.md", &[("a", json!(2)), ("b", json!(2))]),
        ]),
    );
    let app = App::new(client);
    let filter = MetadataFilter::Values(BTreeMap::from([("a".to_string(), "1".to_string())]));

    let result = app.query(&request(&["d"], filter), &JsonOutput);

    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].document_id, "one");
    assert_eq!(result.documents[0].metadata, vec![MetadataField::new("a", json!(1))]);
}

#[test]
fn every_dataset_failing_is_reported_as_such() {
    let app = App::new(MockKnowledgeBase::default());
    let result = app.query(&request(&["x", "y"], MetadataFilter::All), &JsonOutput);

    let err = result.require_documents(2).unwrap_err();
    assert_matches!(err, DocmetaError::NoDocuments { all_failed: true, .. });
    assert!(err.to_string().starts_with("no documents found; errors: dataset x, keyword 'guide'"));
}

#[test]
fn each_dataset_is_requested_once_per_keyword() {
    let client = MockKnowledgeBase::default().with("d2", MockResponse::NotFound);
    let app = App::new(&client);
    let mut query = request(&["d1", "d2"], MetadataFilter::All);
    query.keywords = vec!["x".to_string(), "y".to_string()];

    let result = app.query(&query, &JsonOutput);

    assert_eq!(result.errors.len(), 4);
    let calls = client.calls.borrow();
    let calls: Vec<_> = calls
        .iter()
        .map(|(dataset, keyword)| (dataset.as_str(), keyword.as_str()))
        .collect();
    assert_eq!(calls, vec![("d1", "x"), ("d1", "y"), ("d2", "x"), ("d2", "y")]);
}

#[test]
fn dataset_id_with_control_character_only_fails_itself() {
    let client = MockKnowledgeBase::default()
        .with("bad\tid", MockResponse::NotFound)
        .with("d2", MockResponse::Documents(vec![document("doc-1", "a.md", &[])]));
    let app = App::new(client);

    let result = app.query(&request(&["bad\tid", "d2"], MetadataFilter::All), &JsonOutput);

    assert_eq!(result.documents.len(), 1);
    assert_eq!(result.documents[0].dataset_id.as_str(), "d2");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].dataset_id.as_str(), "bad\tid");
}

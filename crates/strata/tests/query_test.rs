//! Integration tests for the query interface.

mod common;

use common::{dividend_records, engine, engine_with, entity, range, ts};
use std::sync::Arc;
use strata::data::MemorySource;
use strata::features::{Dependency, FeatureDefinition, FeatureKey, FeatureRegistry, Transformation};
use strata::store::MemoryStore;
use strata::{EngineConfig, ErrorKind, QueryRequest, QueryResponse, QueryService};

fn service() -> QueryService {
    QueryService::new(engine(
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        Arc::new(MemoryStore::new()),
    ))
}

#[tokio::test]
async fn test_unknown_feature_does_not_block_others() {
    let response = service()
        .query(QueryRequest::new(
            vec![entity("AAPL")],
            vec!["close".to_string(), "nope".to_string(), "volume".to_string()],
            range(1, 3),
        ))
        .await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].feature, "nope");
    assert_eq!(response.errors[0].kind, ErrorKind::UnknownFeature);
    assert_eq!(
        response.table.columns(),
        &[FeatureKey::new("close", 1), FeatureKey::new("volume", 1)]
    );
    assert_eq!(
        response.table.value(&entity("AAPL"), &FeatureKey::new("volume", 1), ts(3)),
        Some(None)
    );
}

#[tokio::test]
async fn test_engine_failure_is_isolated() {
    let mut registry = FeatureRegistry::with_builtins().unwrap();
    registry
        .register(
            FeatureDefinition::new("orphan", 1, Transformation::Identity)
                .with_dependency(Dependency::feature("not_registered")),
        )
        .unwrap();
    let service = QueryService::new(engine_with(
        registry,
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        Arc::new(MemoryStore::new()),
        EngineConfig::default(),
    ));

    let response = service
        .query(QueryRequest::new(
            vec![entity("AAPL")],
            vec!["orphan".to_string(), "adjusted_close".to_string()],
            range(1, 3),
        ))
        .await;

    assert!(!response.is_complete());
    assert_eq!(response.errors[0].feature, "orphan");
    assert!(response.errors[0].message.contains("not_registered"));
    assert_eq!(response.table.columns(), &[FeatureKey::new("adjusted_close", 1)]);
    assert_eq!(response.table.row_count(), 3);
}

#[tokio::test]
async fn test_pinned_versions() {
    let service = service();
    let mut request = QueryRequest::new(
        vec![entity("AAPL")],
        vec!["close@1".to_string(), "close_diff@9".to_string()],
        range(1, 3),
    );
    request.version = Some(1);

    let response = service.query(request).await;
    assert_eq!(response.table.columns(), &[FeatureKey::new("close", 1)]);
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].kind, ErrorKind::UnknownFeature);
}

#[tokio::test]
async fn test_equivalent_spellings_run_once() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let service = QueryService::new(engine(Arc::clone(&source), Arc::new(MemoryStore::new())));
    let mut request = QueryRequest::new(
        vec![entity("AAPL")],
        vec!["close".to_string(), "close@1".to_string(), " close ".to_string()],
        range(1, 3),
    );
    request.version = Some(1);

    let response = service.query(request).await;

    assert!(response.is_complete());
    assert_eq!(response.table.columns(), &[FeatureKey::new("close", 1)]);
    assert_eq!(response.table.row_count(), 3);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_source_outage_reported_per_feature() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    source.set_available(false);
    let service = QueryService::new(engine(source, Arc::new(MemoryStore::new())));

    let response = service
        .query(QueryRequest::new(
            vec![entity("AAPL")],
            vec!["close".to_string(), "returns".to_string()],
            range(1, 3),
        ))
        .await;

    assert!(response.table.is_empty());
    assert_eq!(response.errors.len(), 2);
    assert!(response.errors.iter().all(|e| e.kind == ErrorKind::SourceUnavailable));
}

#[tokio::test]
async fn test_response_serde_roundtrip() {
    let response = service()
        .query(QueryRequest::new(
            vec![entity("AAPL")],
            vec!["dividend_factor".to_string(), "missing".to_string()],
            range(1, 3),
        ))
        .await;

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"unknown_feature\""));
    let back: QueryResponse = serde_json::from_str(&json).unwrap();
    assert_eq!(back.errors, response.errors);
    assert_eq!(back.table.records(), response.table.records());
}

#[test]
fn test_request_from_json() {
    let request: QueryRequest = serde_json::from_str(
        r#"{
            "entities": ["AAPL", "MSFT"],
            "features": ["adjusted_close"],
            "range": {"start": "2024-01-01T00:00:00Z", "end": "2024-01-31T00:00:00Z"}
        }"#,
    )
    .unwrap();
    assert_eq!(request.entities.len(), 2);
    assert!(request.version.is_none());

    let inverted = serde_json::from_str::<QueryRequest>(
        r#"{
            "entities": ["AAPL"],
            "features": ["close"],
            "range": {"start": "2024-02-01T00:00:00Z", "end": "2024-01-01T00:00:00Z"}
        }"#,
    );
    assert!(inverted.is_err());
}

#[test]
fn test_catalogue_lists_builtins() {
    let catalogue = service().catalogue();
    let adjusted = catalogue.iter().find(|f| f.name == "adjusted_close").unwrap();
    assert_eq!(adjusted.version, 1);
    assert_eq!(
        adjusted.dependencies,
        vec!["close", "dividend_factor", "split_factor"]
    );
    assert_eq!(adjusted.transformation, "product");
}

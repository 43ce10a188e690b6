//! Integration tests for the computation engine.

mod common;

use approx::assert_relative_eq;
use common::{
    Duplicating, PartialOutage, dividend_records, engine, engine_with, entity, range, ts,
};
use std::sync::Arc;
use std::time::Duration;
use strata::data::{MemorySource, TimeRange, UpstreamRecord};
use strata::features::{
    Dependency, FeatureDefinition, FeatureKey, FeatureRegistry, Transformation,
};
use strata::store::{FeatureStore, MemoryStore, SeriesKey, SqliteStore};
use strata::{ComputationRequest, EngineConfig, EngineError, ErrorKind};

#[tokio::test]
async fn test_dividend_adjusted_close_example() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(source, store);

    let table = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "adjusted_close", range(1, 3)))
        .await
        .unwrap();

    let key = FeatureKey::new("adjusted_close", 1);
    let factor = 1.0 - 2.0 / 102.0;
    let aapl = entity("AAPL");
    assert_relative_eq!(table.value(&aapl, &key, ts(1)).unwrap().unwrap(), 100.0 * factor, epsilon = 1e-9);
    assert_relative_eq!(table.value(&aapl, &key, ts(2)).unwrap().unwrap(), 102.0 * factor, epsilon = 1e-9);
    assert_relative_eq!(table.value(&aapl, &key, ts(3)).unwrap().unwrap(), 98.0, epsilon = 1e-9);
    assert_eq!(table.row_count(), 3);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));
    let request = ComputationRequest::new(vec![entity("AAPL")], "returns", range(1, 3));

    let first = engine.compute(request.clone()).await.unwrap();
    let after_first = store.stats().await.unwrap();
    assert_eq!(source.fetch_count(), 1);
    assert!(after_first.writes > 0);

    let second = engine.compute(request).await.unwrap();
    let after_second = store.stats().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(after_second.writes, after_first.writes);
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_cached_dependencies_are_reused() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));

    engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 3)))
        .await
        .unwrap();
    assert_eq!(store.stats().await.unwrap().writes, 3);

    engine
        .compute(ComputationRequest::new(
            vec![entity("AAPL")],
            "dividend_adjusted_close",
            range(1, 3),
        ))
        .await
        .unwrap();

    // dividend_factor and dividend_adjusted_close are new; close is reused.
    assert_eq!(store.stats().await.unwrap().writes, 9);
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test]
async fn test_missing_inputs_propagate() {
    let mut registry = FeatureRegistry::with_builtins().unwrap();
    registry
        .register(
            FeatureDefinition::new("dollar_volume", 1, Transformation::Product)
                .with_dependency(Dependency::feature("close"))
                .with_dependency(Dependency::feature("volume")),
        )
        .unwrap();

    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(registry, source, store.clone(), EngineConfig::default());

    let table = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "dollar_volume", range(1, 3)))
        .await
        .unwrap();

    let key = FeatureKey::new("dollar_volume", 1);
    let aapl = entity("AAPL");
    assert_eq!(table.value(&aapl, &key, ts(1)), Some(Some(100_000.0)));
    assert_eq!(table.value(&aapl, &key, ts(3)), Some(None));

    // The missing marker is persisted, not a zero.
    let stored = store
        .get_value(&SeriesKey::new(aapl, "dollar_volume", 1), ts(3))
        .await
        .unwrap();
    assert_eq!(stored, Some(None));
}

#[tokio::test]
async fn test_source_outage_writes_nothing() {
    let mut records = dividend_records("AAPL");
    records.extend(dividend_records("MSFT"));
    let source = Arc::new(PartialOutage {
        inner: MemorySource::with_records(records),
        down: entity("MSFT"),
    });
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        source,
        store.clone(),
        EngineConfig::default(),
    );

    let err = engine
        .compute(ComputationRequest::new(
            vec![entity("AAPL"), entity("MSFT")],
            "close",
            range(1, 3),
        ))
        .await
        .unwrap_err();

    let EngineError::ComputationFailed { feature, .. } = &err;
    assert_eq!(feature, "close");
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert!(err.kind().is_transient());

    let stats = store.stats().await.unwrap();
    assert_eq!((stats.series, stats.values, stats.writes), (0, 0, 0));
}

#[tokio::test]
async fn test_duplicate_raw_observations_rejected() {
    let source = Arc::new(Duplicating(MemorySource::with_records(dividend_records("AAPL"))));
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        source,
        store.clone(),
        EngineConfig::default(),
    );

    let err = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DataIntegrity);
    assert_eq!(store.stats().await.unwrap().values, 0);
}

#[tokio::test]
async fn test_fetch_timeout_maps_to_source_unavailable() {
    let source = Arc::new(
        MemorySource::with_records(dividend_records("AAPL")).with_latency(Duration::from_millis(500)),
    );
    let config = EngineConfig::default().with_fetch_timeout(Duration::from_millis(20));
    let engine = engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        source,
        Arc::new(MemoryStore::new()),
        config,
    );

    let err = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
}

#[tokio::test]
async fn test_store_timeout_maps_to_cache_unavailable() {
    let store = Arc::new(MemoryStore::new().with_latency(Duration::from_millis(500)));
    let config = EngineConfig::default().with_store_timeout(Duration::from_millis(20));
    let engine = engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        store,
        config,
    );

    let err = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheUnavailable);
}

#[tokio::test]
async fn test_incremental_extension_appends_only_new_values() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));

    engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 3)))
        .await
        .unwrap();
    assert_eq!(store.stats().await.unwrap().writes, 3);

    source.ingest([UpstreamRecord::new("AAPL", ts(4), "price", 99.0)]);
    let table = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 4)))
        .await
        .unwrap();

    assert_eq!(table.row_count(), 4);
    assert_eq!(store.stats().await.unwrap().writes, 4);

    let cached = store
        .get(&SeriesKey::new(entity("AAPL"), "close", 1), &range(1, 4))
        .await
        .unwrap();
    assert!(cached.is_complete());
}

#[tokio::test]
async fn test_rewriting_history_is_a_conflict() {
    let source = Arc::new(MemorySource::with_records(vec![
        UpstreamRecord::new("AAPL", ts(1), "price", 100.0),
        UpstreamRecord::new("AAPL", ts(2), "price", 102.0),
    ]));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));

    engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "dividend_factor", range(1, 2)))
        .await
        .unwrap();

    // A dividend inside the already computed window changes historical factors.
    source.ingest([
        UpstreamRecord::new("AAPL", ts(2), "dividend", 1.0),
        UpstreamRecord::new("AAPL", ts(3), "price", 101.0),
    ]);
    let err = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "dividend_factor", range(1, 3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheConflict);

    let stored = store
        .get_value(&SeriesKey::new(entity("AAPL"), "dividend_factor", 1), ts(1))
        .await
        .unwrap();
    assert_eq!(stored, Some(Some(1.0)));
}

#[tokio::test]
async fn test_new_version_does_not_touch_previous() {
    let mut registry = FeatureRegistry::with_builtins().unwrap();
    registry
        .register(
            FeatureDefinition::new("close_diff", 2, Transformation::Difference { periods: 2 })
                .with_dependency(Dependency::feature("close")),
        )
        .unwrap();

    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(
        registry,
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        store.clone(),
        EngineConfig::default(),
    );
    let aapl = entity("AAPL");

    let v1 = engine
        .compute(
            ComputationRequest::new(vec![aapl.clone()], "close_diff", range(1, 3)).with_version(1),
        )
        .await
        .unwrap();
    let latest = engine
        .compute(ComputationRequest::new(vec![aapl.clone()], "close_diff", range(1, 3)))
        .await
        .unwrap();

    assert_eq!(v1.columns(), &[FeatureKey::new("close_diff", 1)]);
    assert_eq!(latest.columns(), &[FeatureKey::new("close_diff", 2)]);
    assert_eq!(v1.value(&aapl, &FeatureKey::new("close_diff", 1), ts(3)), Some(Some(-4.0)));
    assert_eq!(latest.value(&aapl, &FeatureKey::new("close_diff", 2), ts(3)), Some(Some(-2.0)));

    let stored_v1 = store
        .get_value(&SeriesKey::new(aapl, "close_diff", 1), ts(3))
        .await
        .unwrap();
    assert_eq!(stored_v1, Some(Some(-4.0)));
}

#[tokio::test]
async fn test_dividend_factor_does_not_depend_on_window() {
    let key = FeatureKey::new("dividend_factor", 1);
    let aapl = entity("AAPL");
    let expected = 1.0 - 2.0 / 102.0;

    // Narrow window first, then the full one.
    let narrow_first = engine(
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        Arc::new(MemoryStore::new()),
    );
    let narrow = narrow_first
        .compute(ComputationRequest::new(vec![aapl.clone()], "dividend_factor", range(1, 2)))
        .await
        .unwrap();
    assert_relative_eq!(narrow.value(&aapl, &key, ts(1)).unwrap().unwrap(), expected);
    let wide = narrow_first
        .compute(ComputationRequest::new(vec![aapl.clone()], "dividend_factor", range(1, 3)))
        .await
        .unwrap();
    assert_eq!(wide.value(&aapl, &key, ts(3)), Some(Some(1.0)));

    // Full window first, then the narrow one.
    let wide_first = engine(
        Arc::new(MemorySource::with_records(dividend_records("AAPL"))),
        Arc::new(MemoryStore::new()),
    );
    let wide_again = wide_first
        .compute(ComputationRequest::new(vec![aapl.clone()], "dividend_factor", range(1, 3)))
        .await
        .unwrap();
    let narrow_again = wide_first
        .compute(ComputationRequest::new(vec![aapl.clone()], "dividend_factor", range(1, 2)))
        .await
        .unwrap();

    assert_eq!(wide, wide_again);
    assert_eq!(narrow, narrow_again);
}

#[tokio::test]
async fn test_lagged_feature_sees_history_before_window() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));
    let key = FeatureKey::new("close_diff", 1);
    let aapl = entity("AAPL");

    let later = engine
        .compute(ComputationRequest::new(vec![aapl.clone()], "close_diff", range(2, 3)))
        .await
        .unwrap();
    assert_eq!(later.value(&aapl, &key, ts(2)), Some(Some(2.0)));

    // Backfilling an earlier start agrees with what is stored.
    let full = engine
        .compute(ComputationRequest::new(vec![aapl.clone()], "close_diff", range(1, 3)))
        .await
        .unwrap();
    assert_eq!(full.value(&aapl, &key, ts(1)), Some(None));
    assert_eq!(full.value(&aapl, &key, ts(2)), Some(Some(2.0)));
    assert_eq!(full.value(&aapl, &key, ts(3)), Some(Some(-4.0)));
}

#[tokio::test]
async fn test_incremental_extension_of_derived_features() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));
    let key = FeatureKey::new("returns", 1);
    let aapl = entity("AAPL");

    let before = engine
        .compute(ComputationRequest::new(vec![aapl.clone()], "returns", range(1, 3)))
        .await
        .unwrap();

    source.ingest([UpstreamRecord::new("AAPL", ts(4), "price", 99.0)]);
    let after = engine
        .compute(ComputationRequest::new(vec![aapl.clone()], "returns", range(1, 4)))
        .await
        .unwrap();

    for day in 1..=3 {
        assert_eq!(after.value(&aapl, &key, ts(day)), before.value(&aapl, &key, ts(day)));
    }
    assert_relative_eq!(after.value(&aapl, &key, ts(2)).unwrap().unwrap(), 0.02, epsilon = 1e-12);
    assert_relative_eq!(after.value(&aapl, &key, ts(4)).unwrap().unwrap(), 99.0 / 98.0 - 1.0, epsilon = 1e-12);

    let adjusted = store
        .get(&SeriesKey::new(aapl, "adjusted_close", 1), &range(1, 4))
        .await
        .unwrap();
    assert!(adjusted.is_complete());
    assert_eq!(adjusted.values.value_at(ts(4)), Some(99.0));
}

#[tokio::test]
async fn test_empty_window_inside_history_is_remembered() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));
    let overnight = TimeRange::new(
        ts(1) + chrono::Duration::hours(6),
        ts(1) + chrono::Duration::hours(18),
    )
    .unwrap();
    let request = ComputationRequest::new(vec![entity("AAPL")], "close", overnight);

    let table = engine.compute(request.clone()).await.unwrap();
    assert_eq!(table.row_count(), 0);
    engine.compute(request).await.unwrap();

    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test]
async fn test_window_past_latest_observation_picks_up_new_data() {
    let source = Arc::new(MemorySource::with_records(dividend_records("AAPL")));
    let store = Arc::new(MemoryStore::new());
    let engine = engine(Arc::clone(&source), Arc::clone(&store));
    let request = ComputationRequest::new(vec![entity("AAPL")], "close", range(1, 20));

    let table = engine.compute(request.clone()).await.unwrap();
    assert_eq!(table.row_count(), 3);
    let cached = store
        .get(&SeriesKey::new(entity("AAPL"), "close", 1), &range(1, 20))
        .await
        .unwrap();
    assert!(!cached.is_complete());

    source.ingest([UpstreamRecord::new("AAPL", ts(12), "price", 97.0)]);
    let table = engine.compute(request).await.unwrap();

    assert_eq!(table.row_count(), 4);
    assert_eq!(
        table.value(&entity("AAPL"), &FeatureKey::new("close", 1), ts(12)),
        Some(Some(97.0))
    );
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(store.stats().await.unwrap().writes, 4);
}

#[tokio::test]
async fn test_unknown_feature_fails() {
    let engine = engine(Arc::new(MemorySource::new()), Arc::new(MemoryStore::new()));
    let err = engine
        .compute(ComputationRequest::new(vec![entity("AAPL")], "nope", range(1, 3)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownFeature);
}

#[tokio::test]
async fn test_many_entities_on_sqlite_store() {
    let ids = ["AAPL", "MSFT", "NVDA", "AMZN"];
    let records = ids.iter().flat_map(|id| dividend_records(id)).collect();
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = engine_with(
        FeatureRegistry::with_builtins().unwrap(),
        Arc::new(MemorySource::with_records(records)),
        store.clone(),
        EngineConfig::default().with_entity_concurrency(2),
    );
    let request = ComputationRequest::new(
        ids.iter().map(|id| entity(id)).collect(),
        "adjusted_close",
        range(1, 3),
    );

    let table = engine.compute(request.clone()).await.unwrap();
    assert_eq!(table.entities().count(), 4);
    assert_eq!(table.row_count(), 12);

    let writes = store.stats().await.unwrap().writes;
    engine.compute(request).await.unwrap();
    assert_eq!(store.stats().await.unwrap().writes, writes);
}

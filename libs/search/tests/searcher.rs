mod support;

use datagerry_search::{
    AccessControlPermission, Error, QuickSearchCount, QuickSearchPipelineBuilder, SearchConfig,
    SearchOptions, SearchPipelineBuilder, SearcherFramework,
};
use serde_json::json;
use std::sync::Arc;
use support::*;

#[tokio::test]
async fn shapes_faceted_document_into_result() -> anyhow::Result<()> {
    let catalog = flat_catalog();
    let pipeline = SearchPipelineBuilder::new(&catalog, &catalog)
        .build(&[param("web", "text")], None, None, true)
        .await?;

    let group = json!({
        "searchText": "Server",
        "searchForm": "type",
        "searchLabel": "Server",
        "settings": {"types": [1]},
        "total": 2
    });
    let store = Arc::new(RecordingStore::returning(vec![faceted(
        2,
        vec![
            json!({"public_id": 1, "fields": [
                {"name": "hostname", "value": "web-01"},
                {"name": "ip", "value": "10.0.0.1"}
            ]}),
            json!({"public_id": 2, "fields": [{"name": "hostname", "value": "db-01"}]}),
        ],
        vec![group.clone()],
    )]));
    let searcher = SearcherFramework::new(store.clone());

    let result = searcher.aggregate(pipeline, &SearchOptions::default()).await?;

    assert_eq!(result.total_results, 2);
    assert_eq!(result.number_of_results(), 2);
    assert_eq!(result.matches_regex, vec!["web".to_string()]);
    assert_eq!(result.results[0].matches, vec!["hostname".to_string()]);
    assert!(result.results[1].matches.is_empty());
    assert_eq!(result.groups, vec![group]);
    assert_eq!((result.limit, result.skip), (10, 0));
    Ok(())
}

#[tokio::test]
async fn appends_restore_and_paging_facet() -> anyhow::Result<()> {
    let store = Arc::new(RecordingStore::returning(Vec::new()));
    let searcher = SearcherFramework::new(store.clone());
    let options = SearchOptions {
        limit: 25,
        skip: 50,
        ..SearchOptions::default()
    };

    searcher.aggregate(Vec::new(), &options).await?;

    let calls = store.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "framework.objects");

    let pipeline = store.last_pipeline();
    let stages = pipeline.as_array().cloned().unwrap_or_default();
    assert_eq!(stages.len(), 3);
    assert_eq!(
        stages[0],
        json!({"$addFields": {"fields": {"$ifNull": ["$__fields", "$fields"]}}})
    );
    assert_eq!(stages[1], json!({"$project": {"__fields": 0, "__references": 0}}));

    let facet = &stages[2]["$facet"];
    assert_eq!(facet["metadata"], json!([{"$count": "total"}]));
    assert_eq!(facet["data"], json!([{"$skip": 50}, {"$limit": 25}]));
    let group = facet["group"].as_array().cloned().unwrap_or_default();
    let lookup_from = group
        .first()
        .and_then(|stage| stage.get("$lookup"))
        .map(|lookup| &lookup["from"]);
    assert_eq!(lookup_from, Some(&json!("framework.types")));
    assert_eq!(group.last(), Some(&json!({"$sort": {"total": -1}})));
    Ok(())
}

#[tokio::test]
async fn resolve_pulls_in_referencing_objects() -> anyhow::Result<()> {
    let store = Arc::new(RecordingStore::returning(Vec::new()));
    let searcher = SearcherFramework::new(store.clone());
    let options = SearchOptions {
        resolve: true,
        ..SearchOptions::default()
    };

    searcher.aggregate(Vec::new(), &options).await?;

    let pipeline = store.last_pipeline();
    let lookup = &pipeline[2]["$lookup"];
    assert_eq!(lookup["let"], json!({"ref_id": "$public_id"}));
    assert_eq!(
        lookup["pipeline"],
        json!([
            {"$match": {"$expr": {"$in": ["$$ref_id", {"$ifNull": ["$fields.value", []]}]}}},
            {"$match": {"active": {"$eq": true}}}
        ])
    );
    assert_eq!(
        pipeline[4],
        json!({"$project": {"complete": {"$concatArrays": ["$root", "$references"]}}})
    );
    assert_eq!(pipeline[6], json!({"$replaceRoot": {"newRoot": "$complete"}}));
    assert!(pipeline[7].get("$facet").is_some());
    Ok(())
}

#[tokio::test]
async fn resolve_includes_inactive_referencing_objects_when_asked() -> anyhow::Result<()> {
    let store = Arc::new(RecordingStore::returning(Vec::new()));
    let searcher = SearcherFramework::new(store.clone());
    let options: SearchOptions =
        serde_json::from_value(json!({"resolve": true, "onlyActiveObjCookie": false}))?;

    searcher.aggregate(Vec::new(), &options).await?;

    let pipeline = store.last_pipeline();
    let referencing = pipeline[2]["$lookup"]["pipeline"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    assert_eq!(referencing.len(), 1);
    Ok(())
}

#[tokio::test]
async fn zero_limit_pages_without_limit_stage() -> anyhow::Result<()> {
    let store = Arc::new(RecordingStore::returning(Vec::new()));
    let searcher = SearcherFramework::new(store.clone());
    let options: SearchOptions = serde_json::from_value(json!({"limit": 0, "skip": 20}))?;

    let result = searcher.aggregate(Vec::new(), &options).await?;

    let pipeline = store.last_pipeline();
    assert_eq!(pipeline[2]["$facet"]["data"], json!([{"$skip": 20}]));
    assert_eq!((result.limit, result.skip), (0, 20));
    Ok(())
}

#[tokio::test]
async fn default_options_use_configured_page_size() -> anyhow::Result<()> {
    let store = Arc::new(RecordingStore::returning(Vec::new()));
    let config = SearchConfig {
        default_limit: 5,
        ..SearchConfig::default()
    };
    let searcher = SearcherFramework::with_config(store.clone(), config);

    let options = searcher.default_options();
    let result = searcher.aggregate(Vec::new(), &options).await?;

    assert_eq!(result.total_results, 0);
    assert!(result.results.is_empty());
    assert_eq!(result.limit, 5);
    assert_eq!(
        store.last_pipeline()[2]["$facet"]["data"],
        json!([{"$skip": 0}, {"$limit": 5}])
    );
    Ok(())
}

#[tokio::test]
async fn store_failure_becomes_aggregation_error() {
    let searcher = SearcherFramework::new(Arc::new(RecordingStore::failing("connection reset")));
    let result = searcher.aggregate(Vec::new(), &SearchOptions::default()).await;
    match result {
        Err(Error::Aggregation(message)) => assert!(message.contains("connection reset")),
        other => panic!("expected Aggregation, got {:?}", other.map(|r| r.total_results)),
    }
}

#[tokio::test]
async fn quick_count_reads_counter_document() -> anyhow::Result<()> {
    let catalog = catalog();
    let user = admin();
    let pipeline = QuickSearchPipelineBuilder::new(&catalog)
        .build("web", Some(&user), Some(AccessControlPermission::Read), false)
        .await?;
    let store = Arc::new(RecordingStore::returning(vec![
        json!({"active": 4, "inactive": 1, "total": 5.0}),
    ]));

    let count = SearcherFramework::new(store.clone()).quick_count(&pipeline).await?;

    assert_eq!(
        count,
        QuickSearchCount {
            active: 4,
            inactive: 1,
            total: 5
        }
    );
    assert_eq!(store.last_pipeline(), to_json(&pipeline));
    Ok(())
}

#[tokio::test]
async fn quick_count_without_hits_is_zero() -> anyhow::Result<()> {
    let searcher = SearcherFramework::new(Arc::new(RecordingStore::returning(Vec::new())));
    assert_eq!(searcher.quick_count(&[]).await?, QuickSearchCount::default());
    Ok(())
}

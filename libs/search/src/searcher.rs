//! Pipeline execution and result shaping
//!
//! [`SearcherFramework`] appends paging, grouping and (optionally) reference
//! resolution to a built pipeline, runs it against the object store and
//! turns the single faceted document it yields into a [`SearchResult`].

use crate::config::SearchConfig;
use crate::params::SearchOptions;
use crate::query::{compile_regex, Filter, PipelineBuilder, Stage};
use crate::quick::QuickSearchCount;
use crate::references::SearchReferencesPipelineBuilder;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::sync::Arc;

/// Runs aggregation pipelines against a document collection.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Execute `pipeline` on `collection` and return every produced document.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Stage],
    ) -> anyhow::Result<Vec<JsonValue>>;
}

/// One hit together with the names of the fields the search regexes matched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResultMap {
    pub result: JsonValue,
    pub matches: Vec<String>,
}

/// A page of search hits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub results: Vec<SearchResultMap>,
    pub total_results: u64,
    /// Hit counts per type, shaped as ready-to-use `type` search params
    pub groups: Vec<JsonValue>,
    pub matches_regex: Vec<String>,
    pub limit: u64,
    pub skip: u64,
}

impl SearchResult {
    pub fn empty(limit: u64, skip: u64) -> Self {
        Self {
            results: Vec::new(),
            total_results: 0,
            groups: Vec::new(),
            matches_regex: Vec::new(),
            limit,
            skip,
        }
    }

    pub fn number_of_results(&self) -> usize {
        self.results.len()
    }
}

/// Executes search pipelines built by the pipeline builders.
#[derive(Clone)]
pub struct SearcherFramework {
    store: Arc<dyn ObjectStore>,
    config: SearchConfig,
}

impl SearcherFramework {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, SearchConfig::default())
    }

    pub fn with_config(store: Arc<dyn ObjectStore>, config: SearchConfig) -> Self {
        Self { store, config }
    }

    /// Paging defaults for requests that carry no options of their own.
    pub fn default_options(&self) -> SearchOptions {
        SearchOptions::from_config(&self.config)
    }

    /// Run a search pipeline and collect one page of results.
    ///
    /// A zero `limit` returns every hit after `skip`.
    ///
    /// # Errors
    /// * `Aggregation` - If the store fails to execute the pipeline
    #[tracing::instrument(
        skip_all,
        fields(
            stages = pipeline.len(),
            limit = options.limit,
            skip = options.skip,
            resolve = options.resolve
        )
    )]
    pub async fn aggregate(
        &self,
        pipeline: Vec<Stage>,
        options: &SearchOptions,
    ) -> Result<SearchResult> {
        let mut builder = PipelineBuilder::from(pipeline);
        let matches_regex = builder.regex_pipe_values();

        builder.extend(SearchReferencesPipelineBuilder::restore_stages());
        if options.resolve {
            builder.extend(self.resolve_stages(options.active));
        }
        builder.add_pipe(self.result_facet(options));

        let documents = self.run(builder.pipeline()).await?;
        let Some(document) = documents.into_iter().next() else {
            return Ok(SearchResult::empty(options.limit, options.skip));
        };

        let total_results = document["metadata"][0]["total"]
            .as_u64()
            .unwrap_or_default();
        let regex_options = Some(self.config.text_regex_options.as_str());
        let regexes: Vec<Regex> = matches_regex
            .iter()
            .filter_map(|pattern| {
                let compiled = compile_regex(pattern, regex_options);
                if compiled.is_none() {
                    tracing::debug!(
                        pattern = %pattern,
                        "Skipping invalid pattern for match detection"
                    );
                }
                compiled
            })
            .collect();

        let results: Vec<SearchResultMap> = as_array(&document["data"])
            .iter()
            .map(|result| SearchResultMap {
                matches: matched_fields(result, &regexes),
                result: result.clone(),
            })
            .collect();
        tracing::debug!(total_results, page = results.len(), "Search executed");

        Ok(SearchResult {
            results,
            total_results,
            groups: as_array(&document["group"]).to_vec(),
            matches_regex,
            limit: options.limit,
            skip: options.skip,
        })
    }

    /// Run a quick-search pipeline and read its counter document.
    ///
    /// # Errors
    /// * `Aggregation` - If the store fails to execute the pipeline
    /// * `Json` - If the store returns a document of the wrong shape
    pub async fn quick_count(&self, pipeline: &[Stage]) -> Result<QuickSearchCount> {
        let documents = self.run(pipeline).await?;
        match documents.into_iter().next() {
            Some(document) => Ok(serde_json::from_value(document)?),
            None => Ok(QuickSearchCount::default()),
        }
    }

    async fn run(&self, pipeline: &[Stage]) -> Result<Vec<JsonValue>> {
        self.store
            .aggregate(self.config.objects_collection.as_str(), pipeline)
            .await
            .map_err(|e| Error::Aggregation(format!("{:#}", e)))
    }

    /// Pull objects referencing each hit into the result set.
    fn resolve_stages(&self, only_active: bool) -> Vec<Stage> {
        let mut variables = JsonMap::new();
        variables.insert("ref_id".to_string(), json!("$public_id"));

        let mut referencing = vec![Stage::match_(Filter::expr(json!({
            "$in": ["$$ref_id", {"$ifNull": ["$fields.value", []]}]
        })))];
        if only_active {
            referencing.push(Stage::match_(Filter::eq("active", true)));
        }

        vec![
            Stage::lookup_pipeline(
                self.config.objects_collection.as_str(),
                variables,
                referencing,
                "refs",
            ),
            Stage::facet(vec![
                ("root".to_string(), vec![Stage::project(json!({"refs": 0}))]),
                (
                    "references".to_string(),
                    vec![Stage::unwind("$refs"), Stage::replace_root(json!("$refs"))],
                ),
            ]),
            Stage::project(json!({"complete": {"$concatArrays": ["$root", "$references"]}})),
            Stage::unwind("$complete"),
            Stage::replace_root(json!("$complete")),
        ]
    }

    fn result_facet(&self, options: &SearchOptions) -> Stage {
        // The store rejects `$limit: 0`
        let mut data = vec![Stage::skip(options.skip)];
        if options.limit > 0 {
            data.push(Stage::limit(options.limit));
        }
        Stage::facet(vec![
            ("metadata".to_string(), vec![Stage::count("total")]),
            ("data".to_string(), data),
            ("group".to_string(), self.group_stages()),
        ])
    }

    fn group_stages(&self) -> Vec<Stage> {
        vec![
            Stage::lookup(
                self.config.types_collection.as_str(),
                "type_id",
                "public_id",
                "lookup_data",
            ),
            Stage::unwind("$lookup_data"),
            Stage::project(json!({"_id": 0, "type_id": 1, "label": "$lookup_data.label"})),
            Stage::group(
                json!("$type_id"),
                json!({"label": {"$first": "$label"}, "count": {"$sum": 1}}),
            ),
            Stage::project(json!({
                "_id": 0,
                "searchText": "$label",
                "searchForm": {"$literal": "type"},
                "searchLabel": "$label",
                "settings": {"types": ["$_id"]},
                "total": "$count"
            })),
            Stage::sort("total", -1),
        ]
    }
}

fn as_array(value: &JsonValue) -> &[JsonValue] {
    value.as_array().map(Vec::as_slice).unwrap_or_default()
}

/// Names of the fields whose value matches any of `regexes`.
fn matched_fields(result: &JsonValue, regexes: &[Regex]) -> Vec<String> {
    if regexes.is_empty() {
        return Vec::new();
    }
    let mut matches = Vec::new();
    for field in as_array(&result["fields"]) {
        let Some(name) = field["name"].as_str() else {
            continue;
        };
        let value = match &field["value"] {
            JsonValue::Null => continue,
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        let matched = regexes.iter().any(|regex| regex.is_match(&value));
        if matched && !matches.iter().any(|m| m == name) {
            matches.push(name.to_string());
        }
    }
    matches
}

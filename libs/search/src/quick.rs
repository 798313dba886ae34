//! Quick-search hit counter
//!
//! Counts the objects matching a single free-text term, split into active
//! and inactive ones, for the search bar preview.

use crate::access_control::{AccessControlPermission, AccessControlQueryBuilder};
use crate::catalog::{CmdbUser, TypeCatalog};
use crate::config::SearchConfig;
use crate::query::{Filter, PipelineBuilder, Stage};
use crate::references::SearchReferencesPipelineBuilder;
use crate::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value as JsonValue};

/// Hit counts returned by the quick-search pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickSearchCount {
    #[serde(default, deserialize_with = "count")]
    pub active: u64,
    #[serde(default, deserialize_with = "count")]
    pub inactive: u64,
    /// Some drivers hand `$sum` results back as doubles
    #[serde(default, deserialize_with = "count")]
    pub total: u64,
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = JsonValue::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| value.as_f64().map(|n| n.max(0.0).round() as u64))
        .unwrap_or_default())
}

/// Builds the quick-search counting pipeline.
pub struct QuickSearchPipelineBuilder<'a> {
    types: &'a dyn TypeCatalog,
    config: SearchConfig,
    builder: PipelineBuilder,
}

impl<'a> QuickSearchPipelineBuilder<'a> {
    pub fn new(types: &'a dyn TypeCatalog) -> Self {
        Self::with_config(types, SearchConfig::default())
    }

    pub fn with_config(types: &'a dyn TypeCatalog, config: SearchConfig) -> Self {
        Self {
            types,
            config,
            builder: PipelineBuilder::new(),
        }
    }

    /// Pipeline yielding a single `{active, inactive, total}` document.
    ///
    /// Unlike the full search, access control is applied before the term
    /// match here.
    #[tracing::instrument(skip_all, fields(active_flag = active_flag))]
    pub async fn build(
        &mut self,
        search_term: &str,
        user: Option<&CmdbUser>,
        permission: Option<AccessControlPermission>,
        active_flag: bool,
    ) -> Result<Vec<Stage>> {
        self.builder.clear();

        let references = SearchReferencesPipelineBuilder::with_collection(
            self.types,
            self.config.objects_collection.as_str(),
        )
        .build()
        .await?;
        self.builder.extend(references);

        if let (Some(user), Some(permission)) = (user, permission) {
            let stages = AccessControlQueryBuilder::new(self.config.types_collection.as_str())
                .build(user.group_id, permission);
            self.builder.extend(stages);
        }

        let term = Filter::regex(
            "fields.value",
            search_term,
            Some(self.config.text_regex_options.as_str()),
        );
        let active = if active_flag {
            Filter::eq("active", true)
        } else {
            Filter::Everything
        };
        self.builder
            .add_pipe(Stage::match_(Filter::and(vec![term, active])));
        self.builder.extend(count_stages());

        Ok(self.builder.pipeline().to_vec())
    }
}

/// Group matches by `active` and fold them into one counter document.
fn count_stages() -> Vec<Stage> {
    vec![
        Stage::group(json!({"active": "$active"}), json!({"count": {"$sum": 1}})),
        Stage::group(
            json!(0),
            json!({
                "levels": {"$push": {"_id": "$_id.active", "count": "$count"}},
                "total": {"$sum": "$count"}
            }),
        ),
        Stage::project(json!({
            "_id": 0,
            "active": level_count(true),
            "inactive": level_count(false),
            "total": "$total"
        })),
    ]
}

/// Count of the `levels` bucket whose `_id` equals `active`; 0 when absent.
fn level_count(active: bool) -> JsonValue {
    json!({
        "$sum": {
            "$map": {
                "input": {
                    "$filter": {
                        "input": "$levels",
                        "as": "level",
                        "cond": {"$eq": ["$$level._id", active]}
                    }
                },
                "as": "level",
                "in": "$$level.count"
            }
        }
    })
}

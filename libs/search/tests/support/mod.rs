#![allow(dead_code)]

use async_trait::async_trait;
use datagerry_search::{
    CategoryCatalog, CmdbCategory, CmdbType, CmdbUser, Error, Filter, InMemoryCatalog,
    ObjectStore, Result, SearchParam, Stage, TypeCatalog,
};
use serde_json::{json, Value};
use std::sync::Mutex;

/// Catalog with a reference field (`server.rack -> rack`) and two
/// categories whose labels both contain "ware".
pub const CATALOG: &str = r#"{
    "types": [
        {"public_id": 1, "name": "server", "label": "Server", "fields": [
            {"name": "hostname", "type": "text"},
            {"name": "rack", "type": "ref", "ref_types": [2]}
        ]},
        {"public_id": 2, "name": "rack", "label": "Rack", "fields": [
            {"name": "room", "type": "text"}
        ]},
        {"public_id": 5, "name": "switch", "label": "Switch"}
    ],
    "categories": [
        {"public_id": 10, "name": "hardware", "label": "Hardware", "types": [1, 2]},
        {"public_id": 11, "name": "software", "label": "Software", "types": [7]},
        {"public_id": 12, "name": "network", "label": "Network", "types": [5]}
    ]
}"#;

pub fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::from_json(CATALOG).expect("fixture catalog parses")
}

/// Catalog without reference fields, so pipelines carry no reference stages.
pub fn flat_catalog() -> InMemoryCatalog {
    InMemoryCatalog::from_json(
        r#"{
            "types": [
                {"public_id": 1, "name": "server", "fields": [
                    {"name": "hostname", "type": "text"}
                ]}
            ],
            "categories": [
                {"public_id": 10, "name": "hardware", "label": "Hardware", "types": [1, 2]},
                {"public_id": 11, "name": "software", "label": "Software", "types": [7]}
            ]
        }"#,
    )
    .expect("fixture catalog parses")
}

pub fn admin() -> CmdbUser {
    CmdbUser {
        public_id: 1,
        user_name: "admin".to_string(),
        group_id: 1,
    }
}

pub fn param(text: &str, form: &str) -> SearchParam {
    SearchParam::new(text, form, None, false).expect("valid search form")
}

pub fn param_with(text: &str, form: &str, settings: Value, disjunction: bool) -> SearchParam {
    let settings = settings.as_object().cloned();
    SearchParam::new(text, form, settings, disjunction).expect("valid search form")
}

pub fn to_json(stages: &[Stage]) -> Value {
    serde_json::to_value(stages).expect("pipeline serializes")
}

/// Catalog whose every read fails.
pub struct FailingCatalog;

#[async_trait]
impl TypeCatalog for FailingCatalog {
    async fn get_types(&self) -> Result<Vec<CmdbType>> {
        Err(Error::TypeCatalog("type collection unavailable".to_string()))
    }
}

#[async_trait]
impl CategoryCatalog for FailingCatalog {
    async fn get_categories_by(&self, _filter: &Filter) -> Result<Vec<CmdbCategory>> {
        Err(Error::CategoryCatalog("category collection unavailable".to_string()))
    }
}

/// Object store returning canned documents and recording what it was asked.
pub struct RecordingStore {
    response: std::result::Result<Vec<Value>, String>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingStore {
    pub fn returning(documents: Vec<Value>) -> Self {
        Self {
            response: Ok(documents),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `(collection, pipeline)` of every aggregation run so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_pipeline(&self) -> Value {
        self.calls()
            .pop()
            .map(|(_, pipeline)| pipeline)
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> anyhow::Result<Vec<Value>> {
        self.calls
            .lock()
            .unwrap()
            .push((collection.to_string(), serde_json::to_value(pipeline)?));
        match &self.response {
            Ok(documents) => Ok(documents.clone()),
            Err(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }
}

/// A faceted search document as the store returns it.
pub fn faceted(total: u64, data: Vec<Value>, group: Vec<Value>) -> Value {
    json!({
        "metadata": [{"total": total}],
        "data": data,
        "group": group
    })
}

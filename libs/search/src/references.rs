//! Reference resolution at query time
//!
//! Objects store references to other objects as public ids in their field
//! values. To let free-text search match the *referenced* data, these stages
//! pull the referenced objects' fields next to the object's own fields
//! before any `$match` on `fields.value` runs. The original field list is
//! kept aside and put back by [`SearchReferencesPipelineBuilder::restore_stages`].

use crate::catalog::{CmdbType, TypeCatalog};
use crate::config::OBJECTS_COLLECTION;
use crate::query::{Filter, PipelineBuilder, Stage};
use crate::Result;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::BTreeSet;

/// Referenced objects' fields, pulled in by the lookup.
pub const REFERENCES_KEY: &str = "__references";
/// The object's own fields while `fields` carries resolved values.
pub const ORIGINAL_FIELDS_KEY: &str = "__fields";

/// Builds the stages that inline referenced objects' field values.
pub struct SearchReferencesPipelineBuilder<'a> {
    types: &'a dyn TypeCatalog,
    objects_collection: String,
    builder: PipelineBuilder,
}

impl<'a> SearchReferencesPipelineBuilder<'a> {
    pub fn new(types: &'a dyn TypeCatalog) -> Self {
        Self::with_collection(types, OBJECTS_COLLECTION)
    }

    pub fn with_collection(
        types: &'a dyn TypeCatalog,
        objects_collection: impl Into<String>,
    ) -> Self {
        Self {
            types,
            objects_collection: objects_collection.into(),
            builder: PipelineBuilder::new(),
        }
    }

    /// Stages resolving every reference field declared in the type catalog.
    ///
    /// Yields no stages when no type declares a reference field.
    ///
    /// # Errors
    /// Propagates type catalog failures; a pipeline silently missing
    /// reference resolution would return incomplete results.
    pub async fn build(&mut self) -> Result<Vec<Stage>> {
        self.builder.clear();

        let types = self.types.get_types().await?;
        let Some(references) = ReferenceFields::collect(&types) else {
            tracing::debug!("No reference fields declared, skipping reference resolution");
            return Ok(Vec::new());
        };

        let mut variables = JsonMap::new();
        variables.insert("ref_values".to_string(), references.values_expression());

        let mut lookup = vec![Stage::match_(Filter::expr(json!({
            "$in": ["$public_id", "$$ref_values"]
        })))];
        if !references.target_types.is_empty() {
            lookup.push(Stage::match_(Filter::in_(
                "type_id",
                references.target_types.iter().copied(),
            )));
        }
        lookup.push(Stage::project(json!({"_id": 0, "fields": 1})));

        self.builder.add_pipe(Stage::lookup_pipeline(
            self.objects_collection.as_str(),
            variables,
            lookup,
            REFERENCES_KEY,
        ));
        self.builder.add_pipe(Stage::add_fields(json!({
            ORIGINAL_FIELDS_KEY: "$fields",
            "fields": {
                "$concatArrays": [
                    {"$ifNull": ["$fields", []]},
                    {
                        "$reduce": {
                            "input": format!("${}.fields", REFERENCES_KEY),
                            "initialValue": [],
                            "in": {"$concatArrays": ["$$value", "$$this"]}
                        }
                    }
                ]
            }
        })));

        Ok(self.builder.pipeline().to_vec())
    }

    /// Stages putting the object's own fields back and dropping the helper keys.
    ///
    /// Safe to append to pipelines that never resolved references.
    pub fn restore_stages() -> Vec<Stage> {
        vec![
            Stage::add_fields(json!({
                "fields": {"$ifNull": [format!("${}", ORIGINAL_FIELDS_KEY), "$fields"]}
            })),
            Stage::project(json!({ORIGINAL_FIELDS_KEY: 0, REFERENCES_KEY: 0})),
        ]
    }
}

/// Reference fields across all types, keyed as `"<type_id>:<field name>"`.
struct ReferenceFields {
    keys: BTreeSet<String>,
    /// Union of declared target types; empty when any field accepts all types
    target_types: BTreeSet<i64>,
}

impl ReferenceFields {
    fn collect(types: &[CmdbType]) -> Option<Self> {
        let mut keys = BTreeSet::new();
        let mut target_types = BTreeSet::new();
        let mut unrestricted = false;

        for cmdb_type in types {
            for field in cmdb_type.reference_fields() {
                keys.insert(format!("{}:{}", cmdb_type.public_id, field.name));
                if field.ref_types.is_empty() {
                    unrestricted = true;
                }
                target_types.extend(field.ref_types.iter().copied());
            }
        }

        if keys.is_empty() {
            return None;
        }
        if unrestricted {
            target_types.clear();
        }
        Some(Self { keys, target_types })
    }

    /// Values of the object's reference fields, evaluated in `$lookup.let`.
    fn values_expression(&self) -> JsonValue {
        json!({
            "$map": {
                "input": {
                    "$filter": {
                        "input": {"$ifNull": ["$fields", []]},
                        "as": "field",
                        "cond": {
                            "$in": [
                                {"$concat": [{"$toString": "$type_id"}, ":", "$$field.name"]},
                                self.keys.iter().collect::<Vec<_>>()
                            ]
                        }
                    }
                },
                "as": "field",
                "in": "$$field.value"
            }
        })
    }
}

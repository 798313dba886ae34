//! Access-control stages for object pipelines
//!
//! Restricts objects to those whose type grants the requesting group the
//! requested permission. Types without an ACL, or with a deactivated one,
//! stay visible to everyone.

use crate::config::TYPES_COLLECTION;
use crate::query::{Filter, PipelineBuilder, Stage};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Capability level checked against a type's ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessControlPermission {
    Create,
    Read,
    Update,
    Delete,
}

impl AccessControlPermission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AccessControlPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessControlPermission {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "READ" => Ok(Self::Read),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown permission '{}'", other)),
        }
    }
}

/// Builds the access-control tail of an object pipeline.
#[derive(Debug, Clone)]
pub struct AccessControlQueryBuilder {
    types_collection: String,
    builder: PipelineBuilder,
}

impl Default for AccessControlQueryBuilder {
    fn default() -> Self {
        Self::new(TYPES_COLLECTION)
    }
}

impl AccessControlQueryBuilder {
    pub fn new(types_collection: impl Into<String>) -> Self {
        Self {
            types_collection: types_collection.into(),
            builder: PipelineBuilder::new(),
        }
    }

    /// Stages that keep only objects readable by `group_id` with `permission`.
    pub fn build(&mut self, group_id: i64, permission: AccessControlPermission) -> Vec<Stage> {
        self.builder.clear();
        self.builder.add_pipe(Stage::lookup(
            self.types_collection.as_str(),
            "type_id",
            "public_id",
            "type",
        ));
        self.builder.add_pipe(Stage::unwind("$type"));
        self.builder.add_pipe(Stage::match_(acl_filter(group_id, permission)));
        self.builder.add_pipe(Stage::project(json!({"type": 0})));
        self.builder.pipeline().to_vec()
    }
}

fn acl_filter(group_id: i64, permission: AccessControlPermission) -> Filter {
    let includes = format!("type.acl.groups.includes.{}", group_id);
    Filter::or(vec![
        Filter::exists("type.acl", false),
        Filter::equals("type.acl.activated", false),
        Filter::and(vec![
            Filter::exists(includes.as_str(), true),
            Filter::all(includes, [permission.as_str()]),
        ]),
    ])
}

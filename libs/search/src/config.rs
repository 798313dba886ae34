//! Search configuration shared by the pipeline builders and the searcher

use serde::{Deserialize, Serialize};

pub const OBJECTS_COLLECTION: &str = "framework.objects";
pub const TYPES_COLLECTION: &str = "framework.types";

/// Tunables for pipeline construction and execution.
///
/// Every field has a default, so a partial `[search]` section (or none at
/// all) deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the request does not carry a limit
    pub default_limit: u64,
    /// `$options` for free-text and regex criteria
    pub text_regex_options: String,
    /// `$options` for the category label lookup
    pub category_regex_options: String,
    pub objects_collection: String,
    pub types_collection: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            text_regex_options: "ims".to_string(),
            category_regex_options: "imsx".to_string(),
            objects_collection: OBJECTS_COLLECTION.to_string(),
            types_collection: TYPES_COLLECTION.to_string(),
        }
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field type marking a reference to another object.
pub const REFERENCE_FIELD_TYPE: &str = "ref";

/// Field definition of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeField {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
    /// Types a reference field may point to (empty means any)
    #[serde(default)]
    pub ref_types: Vec<i64>,
}

impl TypeField {
    pub fn is_reference(&self) -> bool {
        self.field_type == REFERENCE_FIELD_TYPE
    }
}

/// Schema definition of configuration items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdbType {
    pub public_id: i64,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub fields: Vec<TypeField>,
    /// Access control list as stored on the type document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<JsonValue>,
}

impl CmdbType {
    pub fn reference_fields(&self) -> impl Iterator<Item = &TypeField> {
        self.fields.iter().filter(|field| field.is_reference())
    }
}

/// Category grouping a set of types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CmdbCategory {
    pub public_id: i64,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub parent: Option<i64>,
    #[serde(default)]
    pub types: Vec<i64>,
}

/// Requesting user, as far as access control needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdbUser {
    pub public_id: i64,
    pub user_name: String,
    pub group_id: i64,
}

fn default_active() -> bool {
    true
}

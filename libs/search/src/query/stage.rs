use super::Filter;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Serialize as DeriveSerialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// One aggregation pipeline stage.
///
/// Each stage serializes to a single-key document (`{"$match": ...}`,
/// `{"$lookup": ...}`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    /// `$lookup` with `let` variables and a sub-pipeline.
    LookupPipeline {
        from: String,
        variables: JsonMap<String, JsonValue>,
        pipeline: Vec<Stage>,
        as_field: String,
    },
    Unwind {
        path: String,
        preserve_null_and_empty_arrays: bool,
    },
    Project(JsonValue),
    AddFields(JsonValue),
    Group {
        id: JsonValue,
        accumulators: JsonMap<String, JsonValue>,
    },
    Sort(Vec<(String, i32)>),
    Skip(u64),
    Limit(u64),
    Count(String),
    Facet(Vec<(String, Vec<Stage>)>),
    ReplaceRoot(JsonValue),
}

impl Stage {
    pub fn match_(filter: Filter) -> Self {
        Self::Match(filter)
    }

    pub fn lookup(
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        Self::Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        }
    }

    pub fn lookup_pipeline(
        from: impl Into<String>,
        variables: JsonMap<String, JsonValue>,
        pipeline: Vec<Stage>,
        as_field: impl Into<String>,
    ) -> Self {
        Self::LookupPipeline {
            from: from.into(),
            variables,
            pipeline,
            as_field: as_field.into(),
        }
    }

    pub fn unwind(path: impl Into<String>) -> Self {
        Self::Unwind {
            path: path.into(),
            preserve_null_and_empty_arrays: false,
        }
    }

    pub fn unwind_preserving(path: impl Into<String>) -> Self {
        Self::Unwind {
            path: path.into(),
            preserve_null_and_empty_arrays: true,
        }
    }

    pub fn project(specification: JsonValue) -> Self {
        Self::Project(specification)
    }

    pub fn add_fields(fields: JsonValue) -> Self {
        Self::AddFields(fields)
    }

    /// `$group` by `id`; non-object `accumulators` contribute nothing.
    pub fn group(id: JsonValue, accumulators: JsonValue) -> Self {
        let accumulators = match accumulators {
            JsonValue::Object(map) => map,
            _ => JsonMap::new(),
        };
        Self::Group { id, accumulators }
    }

    pub fn sort(field: impl Into<String>, direction: i32) -> Self {
        Self::Sort(vec![(field.into(), direction)])
    }

    pub fn skip(skip: u64) -> Self {
        Self::Skip(skip)
    }

    pub fn limit(limit: u64) -> Self {
        Self::Limit(limit)
    }

    pub fn count(field: impl Into<String>) -> Self {
        Self::Count(field.into())
    }

    pub fn facet(facets: Vec<(String, Vec<Stage>)>) -> Self {
        Self::Facet(facets)
    }

    pub fn replace_root(new_root: JsonValue) -> Self {
        Self::ReplaceRoot(new_root)
    }

    /// The stage operator this stage serializes under.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Match(_) => "$match",
            Self::Lookup { .. } | Self::LookupPipeline { .. } => "$lookup",
            Self::Unwind { .. } => "$unwind",
            Self::Project(_) => "$project",
            Self::AddFields(_) => "$addFields",
            Self::Group { .. } => "$group",
            Self::Sort(_) => "$sort",
            Self::Skip(_) => "$skip",
            Self::Limit(_) => "$limit",
            Self::Count(_) => "$count",
            Self::Facet(_) => "$facet",
            Self::ReplaceRoot(_) => "$replaceRoot",
        }
    }
}

#[derive(DeriveSerialize)]
#[serde(rename_all = "camelCase")]
struct LookupDoc<'a> {
    from: &'a str,
    local_field: &'a str,
    foreign_field: &'a str,
    #[serde(rename = "as")]
    as_field: &'a str,
}

#[derive(DeriveSerialize)]
struct LookupPipelineDoc<'a> {
    from: &'a str,
    #[serde(rename = "let")]
    variables: &'a JsonMap<String, JsonValue>,
    pipeline: &'a [Stage],
    #[serde(rename = "as")]
    as_field: &'a str,
}

#[derive(DeriveSerialize)]
#[serde(rename_all = "camelCase")]
struct UnwindDoc<'a> {
    path: &'a str,
    preserve_null_and_empty_arrays: bool,
}

#[derive(DeriveSerialize)]
struct GroupDoc<'a> {
    #[serde(rename = "_id")]
    id: &'a JsonValue,
    #[serde(flatten)]
    accumulators: &'a JsonMap<String, JsonValue>,
}

#[derive(DeriveSerialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceRootDoc<'a> {
    new_root: &'a JsonValue,
}

/// Ordered key/value pairs serialized as one document.
struct OrderedDoc<'a, V>(&'a [(String, V)]);

impl<V: Serialize> Serialize for OrderedDoc<'_, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let key = self.operator();
        match self {
            Self::Match(filter) => map.serialize_entry(key, filter)?,
            Self::Lookup {
                from,
                local_field,
                foreign_field,
                as_field,
            } => map.serialize_entry(
                key,
                &LookupDoc {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                },
            )?,
            Self::LookupPipeline {
                from,
                variables,
                pipeline,
                as_field,
            } => map.serialize_entry(
                key,
                &LookupPipelineDoc {
                    from,
                    variables,
                    pipeline,
                    as_field,
                },
            )?,
            Self::Unwind {
                path,
                preserve_null_and_empty_arrays,
            } => {
                if *preserve_null_and_empty_arrays {
                    map.serialize_entry(
                        key,
                        &UnwindDoc {
                            path,
                            preserve_null_and_empty_arrays: true,
                        },
                    )?
                } else {
                    map.serialize_entry(key, path)?
                }
            }
            Self::Project(specification) => map.serialize_entry(key, specification)?,
            Self::AddFields(fields) => map.serialize_entry(key, fields)?,
            Self::Group { id, accumulators } => {
                map.serialize_entry(key, &GroupDoc { id, accumulators })?
            }
            Self::Sort(fields) => map.serialize_entry(key, &OrderedDoc(fields))?,
            Self::Skip(skip) => map.serialize_entry(key, skip)?,
            Self::Limit(limit) => map.serialize_entry(key, limit)?,
            Self::Count(field) => map.serialize_entry(key, field)?,
            Self::Facet(facets) => map.serialize_entry(key, &OrderedDoc(facets))?,
            Self::ReplaceRoot(new_root) => {
                map.serialize_entry(key, &ReplaceRootDoc { new_root })?
            }
        }
        map.end()
    }
}

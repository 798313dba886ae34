use regex::{Regex, RegexBuilder};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

/// Query filter as it appears inside a `$match` stage.
///
/// Serializes to the MongoDB query document shape, e.g.
/// `Filter::in_("type_id", [1, 2])` becomes `{"type_id": {"$in": [1, 2]}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Always-true sentinel, serialized as `{}`.
    Everything,
    /// Always-false sentinel, serialized as `{"$expr": false}`.
    Nothing,
    Field {
        path: String,
        condition: Condition,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Aggregation expression (`$expr`), passed through untouched.
    Expr(JsonValue),
}

/// Condition applied to a single field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Implicit equality: `{path: value}`.
    Equals(JsonValue),
    /// Explicit equality: `{path: {"$eq": value}}`.
    Eq(JsonValue),
    In(Vec<JsonValue>),
    Regex {
        pattern: String,
        options: Option<String>,
    },
    Exists(bool),
    All(Vec<JsonValue>),
}

impl Filter {
    pub fn field(path: impl Into<String>, condition: Condition) -> Self {
        Self::Field {
            path: path.into(),
            condition,
        }
    }

    pub fn regex(
        path: impl Into<String>,
        pattern: impl Into<String>,
        options: Option<&str>,
    ) -> Self {
        Self::field(
            path,
            Condition::Regex {
                pattern: pattern.into(),
                options: options.map(str::to_string),
            },
        )
    }

    pub fn in_<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        Self::field(path, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn equals(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::field(path, Condition::Equals(value.into()))
    }

    pub fn eq(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::field(path, Condition::Eq(value.into()))
    }

    pub fn exists(path: impl Into<String>, exists: bool) -> Self {
        Self::field(path, Condition::Exists(exists))
    }

    pub fn all<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<JsonValue>,
    {
        Self::field(path, Condition::All(values.into_iter().map(Into::into).collect()))
    }

    pub fn expr(expression: JsonValue) -> Self {
        Self::Expr(expression)
    }

    /// Conjunction; no operands collapses to [`Filter::Everything`].
    pub fn and(filters: Vec<Filter>) -> Self {
        if filters.is_empty() {
            Self::Everything
        } else {
            Self::And(filters)
        }
    }

    /// Disjunction; no operands collapses to [`Filter::Nothing`].
    pub fn or(filters: Vec<Filter>) -> Self {
        if filters.is_empty() {
            Self::Nothing
        } else {
            Self::Or(filters)
        }
    }

    /// Evaluate the filter against an in-memory document.
    ///
    /// Covers the field conditions and boolean combinators with MongoDB's
    /// array traversal rules. `$expr` cannot be evaluated outside the store
    /// and never matches.
    pub fn matches(&self, document: &JsonValue) -> bool {
        match self {
            Self::Everything => true,
            Self::Nothing | Self::Expr(_) => false,
            Self::And(filters) => filters.iter().all(|f| f.matches(document)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(document)),
            Self::Field { path, condition } => {
                let mut candidates = Vec::new();
                resolve_path(document, path, &mut candidates);
                condition.matches(&candidates)
            }
        }
    }
}

impl Condition {
    fn matches(&self, candidates: &[&JsonValue]) -> bool {
        match self {
            Self::Exists(expected) => !candidates.is_empty() == *expected,
            Self::Equals(value) | Self::Eq(value) => {
                candidates.iter().any(|c| scalar_or_elements(c).any(|v| v == value))
            }
            Self::In(values) => candidates
                .iter()
                .any(|c| scalar_or_elements(c).any(|v| values.contains(v))),
            Self::All(values) => candidates.iter().any(|c| match c {
                JsonValue::Array(items) => values.iter().all(|v| items.contains(v)),
                other => values.iter().all(|v| v == *other),
            }),
            Self::Regex { pattern, options } => {
                let Some(regex) = compile_regex(pattern, options.as_deref()) else {
                    return false;
                };
                candidates.iter().any(|c| {
                    scalar_or_elements(c).any(|v| v.as_str().is_some_and(|s| regex.is_match(s)))
                })
            }
        }
    }
}

fn scalar_or_elements<'a>(value: &'a JsonValue) -> Box<dyn Iterator<Item = &'a JsonValue> + 'a> {
    match value {
        JsonValue::Array(items) => Box::new(std::iter::once(value).chain(items.iter())),
        other => Box::new(std::iter::once(other)),
    }
}

fn resolve_path<'a>(value: &'a JsonValue, path: &str, out: &mut Vec<&'a JsonValue>) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match value {
        JsonValue::Object(map) => {
            let Some(child) = map.get(head) else {
                return;
            };
            match rest {
                Some(rest) => resolve_path(child, rest, out),
                None => out.push(child),
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                resolve_path(item, path, out);
            }
        }
        _ => {}
    }
}

/// Compile a MongoDB-style regex with its `$options` flags.
///
/// Returns `None` for patterns the `regex` crate cannot compile.
pub(crate) fn compile_regex(pattern: &str, options: Option<&str>) -> Option<Regex> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.unwrap_or_default().chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    builder.build().ok()
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Everything => serializer.serialize_map(Some(0))?.end(),
            Self::Nothing => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$expr", &false)?;
                map.end()
            }
            Self::Field { path, condition } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(path, condition)?;
                map.end()
            }
            Self::And(filters) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$and", filters)?;
                map.end()
            }
            Self::Or(filters) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$or", filters)?;
                map.end()
            }
            Self::Expr(expression) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$expr", expression)?;
                map.end()
            }
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Equals(value) => value.serialize(serializer),
            Self::Eq(value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$eq", value)?;
                map.end()
            }
            Self::In(values) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$in", values)?;
                map.end()
            }
            Self::Regex { pattern, options } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("$regex", pattern)?;
                if let Some(options) = options {
                    map.serialize_entry("$options", options)?;
                }
                map.end()
            }
            Self::Exists(exists) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$exists", exists)?;
                map.end()
            }
            Self::All(values) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$all", values)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(filter: &Filter) -> JsonValue {
        serde_json::to_value(filter).unwrap()
    }

    #[test]
    fn regex_serializes_with_and_without_options() {
        assert_eq!(
            doc(&Filter::regex("fields.value", "server", Some("ims"))),
            json!({"fields.value": {"$regex": "server", "$options": "ims"}})
        );
        assert_eq!(
            doc(&Filter::regex("label", "^a", None)),
            json!({"label": {"$regex": "^a"}})
        );
    }

    #[test]
    fn in_keeps_values_verbatim() {
        assert_eq!(
            doc(&Filter::in_("type_id", [json!(5), json!(7)])),
            json!({"type_id": {"$in": [5, 7]}})
        );
    }

    #[test]
    fn empty_boolean_combinators_collapse_to_sentinels() {
        assert_eq!(Filter::and(Vec::new()), Filter::Everything);
        assert_eq!(Filter::or(Vec::new()), Filter::Nothing);
        assert_eq!(doc(&Filter::and(Vec::new())), json!({}));
        assert_eq!(doc(&Filter::or(Vec::new())), json!({"$expr": false}));
    }

    #[test]
    fn nested_combinators_serialize() {
        let filter = Filter::or(vec![
            Filter::exists("type.acl", false),
            Filter::equals("type.acl.activated", false),
            Filter::and(vec![
                Filter::exists("type.acl.groups.includes.2", true),
                Filter::all("type.acl.groups.includes.2", ["READ"]),
            ]),
        ]);
        assert_eq!(
            doc(&filter),
            json!({"$or": [
                {"type.acl": {"$exists": false}},
                {"type.acl.activated": false},
                {"$and": [
                    {"type.acl.groups.includes.2": {"$exists": true}},
                    {"type.acl.groups.includes.2": {"$all": ["READ"]}}
                ]}
            ]})
        );
    }

    #[test]
    fn evaluates_regex_against_array_paths() {
        let object = json!({
            "public_id": 1,
            "fields": [
                {"name": "hostname", "value": "Web-Server"},
                {"name": "ip", "value": "10.0.0.1"}
            ]
        });
        assert!(Filter::regex("fields.value", "server", Some("ims")).matches(&object));
        assert!(!Filter::regex("fields.value", "server", None).matches(&object));
        assert!(Filter::in_("public_id", [1, 2]).matches(&object));
        assert!(!Filter::Nothing.matches(&object));
        assert!(Filter::Everything.matches(&object));
    }

    #[test]
    fn invalid_regex_does_not_match() {
        let object = json!({"label": "("});
        assert!(!Filter::regex("label", "(", Some("i")).matches(&object));
    }
}

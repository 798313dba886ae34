//! Search criterion parsing and validation
//!
//! Handles the raw criteria sent by the web client:
//! - POST bodies carrying a JSON array of criteria
//! - GET requests carrying the same array JSON-encoded in `query`
//! - Paging and resolution options (`limit`, `skip`, `resolve`, active flag)

use crate::config::SearchConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

/// Matching strategy of a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchForm {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "regex")]
    Regex,
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "disjunction")]
    Disjunction,
    #[serde(rename = "publicID")]
    PublicId,
}

impl SearchForm {
    pub const ALL: [SearchForm; 6] = [
        Self::Text,
        Self::Regex,
        Self::Type,
        Self::Category,
        Self::Disjunction,
        Self::PublicId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Regex => "regex",
            Self::Type => "type",
            Self::Category => "category",
            Self::Disjunction => "disjunction",
            Self::PublicId => "publicID",
        }
    }

    /// Free-text style forms matched against `fields.value`.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Regex)
    }
}

impl FromStr for SearchForm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|form| form.as_str() == s)
            .ok_or_else(|| Error::InvalidSearchForm(s.to_string()))
    }
}

impl fmt::Display for SearchForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-supplied search criterion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParam {
    pub search_text: String,
    pub search_form: SearchForm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<JsonMap<String, JsonValue>>,
    pub disjunction: bool,
}

impl SearchParam {
    /// Build a criterion, validating `search_form` against the known forms.
    pub fn new(
        search_text: impl Into<String>,
        search_form: &str,
        settings: Option<JsonMap<String, JsonValue>>,
        disjunction: bool,
    ) -> Result<Self> {
        Ok(Self {
            search_text: search_text.into(),
            search_form: search_form.parse()?,
            settings,
            disjunction,
        })
    }

    /// Parse raw criteria, skipping (and logging) the malformed ones.
    pub fn from_request(raw_params: &[JsonValue]) -> Vec<Self> {
        raw_params
            .iter()
            .enumerate()
            .fold(Vec::with_capacity(raw_params.len()), |mut params, (index, raw)| {
                match Self::from_raw(raw) {
                    Ok(param) => params.push(param),
                    Err(e) => tracing::warn!(
                        index,
                        error = %e,
                        "Skipping malformed search parameter"
                    ),
                }
                params
            })
    }

    /// Parse the JSON-encoded `query` value of a GET search.
    ///
    /// Accepts an array of criteria or a single criterion object.
    pub fn from_query(query: &str) -> Result<Vec<Self>> {
        let decoded: JsonValue =
            serde_json::from_str(query).map_err(|e| Error::InvalidQuery(e.to_string()))?;
        match decoded {
            JsonValue::Array(items) => Ok(Self::from_request(&items)),
            JsonValue::Object(_) => Ok(Self::from_request(std::slice::from_ref(&decoded))),
            other => Err(Error::InvalidQuery(format!(
                "expected an array of search parameters, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn from_raw(raw: &JsonValue) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            Error::InvalidParameter(format!("expected an object, got {}", json_kind(raw)))
        })?;

        let search_text = match object.get("searchText") {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(Error::InvalidParameter(format!(
                    "searchText must be a string, got {}",
                    json_kind(other)
                )))
            }
            None => return Err(Error::InvalidParameter("missing searchText".to_string())),
        };

        let search_form = object
            .get("searchForm")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::InvalidParameter("missing searchForm".to_string()))?;

        let settings = match object.get("settings") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Object(map)) => Some(map.clone()),
            Some(other) => {
                return Err(Error::InvalidParameter(format!(
                    "settings must be an object, got {}",
                    json_kind(other)
                )))
            }
        };

        let disjunction = match object.get("disjunction") {
            None | Some(JsonValue::Null) => false,
            Some(JsonValue::Bool(b)) => *b,
            Some(other) => {
                return Err(Error::InvalidParameter(format!(
                    "disjunction must be a boolean, got {}",
                    json_kind(other)
                )))
            }
        };

        Self::new(search_text, search_form, settings, disjunction)
    }

    /// Non-empty list stored under `key` in the settings.
    pub fn setting_list(&self, key: &str) -> Option<&[JsonValue]> {
        self.settings
            .as_ref()?
            .get(key)?
            .as_array()
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }

    /// Type ids requested by a `type` criterion.
    pub fn types(&self) -> Option<&[JsonValue]> {
        self.setting_list("types")
    }

    /// Category ids requested by a `category` criterion.
    pub fn categories(&self) -> Option<&[JsonValue]> {
        self.setting_list("categories")
    }

    /// Public id carried by a `publicID` criterion.
    ///
    /// Surrounding whitespace and a leading sign are accepted.
    pub fn public_id(&self) -> Result<i64> {
        self.search_text
            .trim()
            .parse()
            .map_err(|_| Error::InvalidPublicId(self.search_text.clone()))
    }
}

/// Paging and resolution options accompanying a search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub limit: u64,
    pub skip: u64,
    /// Also return objects that reference the matches
    pub resolve: bool,
    /// Restrict referencing objects pulled in by `resolve` to active ones
    #[serde(alias = "onlyActiveObjCookie")]
    pub active: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            skip: 0,
            resolve: false,
            active: true,
        }
    }
}

impl SearchOptions {
    /// Defaults with the page size taken from `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            limit: config.default_limit,
            ..Self::default()
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_wire_forms() {
        for form in SearchForm::ALL {
            assert_eq!(form.as_str().parse::<SearchForm>().unwrap(), form);
        }
        assert_eq!("publicID".parse::<SearchForm>().unwrap(), SearchForm::PublicId);
    }

    #[test]
    fn rejects_unknown_form() {
        let err = SearchParam::new("x", "bogus", None, false).unwrap_err();
        assert!(matches!(err, Error::InvalidSearchForm(ref f) if f == "bogus"));
        // Wire spelling is case-sensitive
        assert!(SearchParam::new("1", "publicid", None, false).is_err());
    }

    #[test]
    fn from_request_skips_malformed_entries() {
        let raw = vec![
            json!({"searchText": "x", "searchForm": "bogus"}),
            json!({"searchText": "server", "searchForm": "text"}),
        ];
        let params = SearchParam::from_request(&raw);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].search_text, "server");
        assert_eq!(params[0].search_form, SearchForm::Text);
        assert!(!params[0].disjunction);
    }

    #[test]
    fn from_request_reads_settings_and_disjunction() {
        let raw = vec![
            json!({
                "searchText": "",
                "searchForm": "type",
                "settings": {"types": [5, 7]},
                "disjunction": true
            }),
            json!({"searchText": 42, "searchForm": "publicID"}),
            json!({"searchForm": "text"}),
            json!({"searchText": "a", "searchForm": "text", "settings": [1]}),
            json!({"searchText": "a", "searchForm": "text", "disjunction": "yes"}),
            json!("not an object"),
        ];
        let params = SearchParam::from_request(&raw);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].types().unwrap(), &[json!(5), json!(7)]);
        assert!(params[0].disjunction);
        assert_eq!(params[1].search_text, "42");
        assert_eq!(params[1].public_id().unwrap(), 42);
    }

    #[test]
    fn empty_setting_lists_are_absent() {
        let param = SearchParam::new(
            "",
            "type",
            Some(json!({"types": []}).as_object().unwrap().clone()),
            false,
        )
        .unwrap();
        assert!(param.types().is_none());
        assert!(param.categories().is_none());
    }

    #[test]
    fn from_query_accepts_array_or_object() {
        let params =
            SearchParam::from_query(r#"[{"searchText":"a","searchForm":"text"}]"#).unwrap();
        assert_eq!(params.len(), 1);

        let params = SearchParam::from_query(r#"{"searchText":"b","searchForm":"regex"}"#).unwrap();
        assert_eq!(params[0].search_form, SearchForm::Regex);

        assert!(matches!(
            SearchParam::from_query("not json"),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            SearchParam::from_query("42"),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn public_id_parsing_is_permissive_about_whitespace_only() {
        let param = |text: &str| SearchParam::new(text, "publicID", None, false).unwrap();
        assert_eq!(param(" 17 ").public_id().unwrap(), 17);
        assert_eq!(param("+3").public_id().unwrap(), 3);
        assert!(matches!(
            param("abc").public_id(),
            Err(Error::InvalidPublicId(ref t)) if t == "abc"
        ));
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let param = SearchParam::new("42", "publicID", None, false).unwrap();
        assert_eq!(
            serde_json::to_value(&param).unwrap(),
            json!({"searchText": "42", "searchForm": "publicID", "disjunction": false})
        );
    }

    #[test]
    fn options_default_and_deserialize() {
        let options = SearchOptions::default();
        assert_eq!(options.limit, 10);
        assert!(options.active);

        let raw = json!({"limit": 50, "resolve": true, "onlyActiveObjCookie": false});
        let options: SearchOptions = serde_json::from_value(raw).unwrap();
        assert_eq!(options.limit, 50);
        assert_eq!(options.skip, 0);
        assert!(options.resolve);
        assert!(!options.active);
    }

    #[test]
    fn options_take_page_size_from_config() {
        let config = SearchConfig {
            default_limit: 25,
            ..SearchConfig::default()
        };
        let options = SearchOptions::from_config(&config);
        assert_eq!(options.limit, 25);
        assert_eq!(options.skip, 0);
        assert!(!options.resolve);
        assert!(options.active);
    }
}

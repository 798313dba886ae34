use super::{CategoryCatalog, CmdbCategory, CmdbType, TypeCatalog};
use crate::query::Filter;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;

/// Catalog held in memory, loadable from a JSON document of the shape
/// `{"types": [...], "categories": [...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InMemoryCatalog {
    #[serde(default)]
    pub types: Vec<CmdbType>,
    #[serde(default)]
    pub categories: Vec<CmdbCategory>,
}

impl InMemoryCatalog {
    pub fn new(types: Vec<CmdbType>, categories: Vec<CmdbCategory>) -> Self {
        Self { types, categories }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::TypeCatalog(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}

#[async_trait]
impl CategoryCatalog for InMemoryCatalog {
    async fn get_categories_by(&self, filter: &Filter) -> Result<Vec<CmdbCategory>> {
        let mut matching = Vec::new();
        for category in &self.categories {
            let document = serde_json::to_value(category)
                .map_err(|e| Error::CategoryCatalog(e.to_string()))?;
            if filter.matches(&document) {
                matching.push(category.clone());
            }
        }
        Ok(matching)
    }
}

#[async_trait]
impl TypeCatalog for InMemoryCatalog {
    async fn get_types(&self) -> Result<Vec<CmdbType>> {
        Ok(self.types.clone())
    }
}

//! Catalog collaborators consulted while building pipelines
//!
//! The builders only read from these seams; any storage backend (the
//! document store, an HTTP proxy, the in-memory catalog used by the CLI and
//! tests) can implement them.

mod memory;
mod models;

pub use memory::InMemoryCatalog;
pub use models::{CmdbCategory, CmdbType, CmdbUser, TypeField, REFERENCE_FIELD_TYPE};

use crate::query::Filter;
use crate::Result;
use async_trait::async_trait;

/// Read access to the category catalog.
#[async_trait]
pub trait CategoryCatalog: Send + Sync {
    /// Categories whose documents satisfy `filter`.
    ///
    /// # Errors
    /// * `CategoryCatalog` - If the catalog cannot be read
    async fn get_categories_by(&self, filter: &Filter) -> Result<Vec<CmdbCategory>>;
}

/// Read access to the type catalog.
#[async_trait]
pub trait TypeCatalog: Send + Sync {
    /// All configured types with their field definitions.
    ///
    /// # Errors
    /// * `TypeCatalog` - If the catalog cannot be read
    async fn get_types(&self) -> Result<Vec<CmdbType>>;
}

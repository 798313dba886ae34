//! Search pipeline construction for the DataGerry CMDB.
//!
//! Translates the criteria of a search request into a MongoDB aggregation
//! pipeline over the objects collection. The pipeline is a typed
//! [`Stage`] list that serializes to the exact JSON documents the database
//! expects, so it can be handed to any driver or inspected as-is.
//!
//! ```no_run
//! # async fn demo(catalog: &datagerry_search::InMemoryCatalog) -> datagerry_search::Result<()> {
//! use datagerry_search::{SearchParam, SearchPipelineBuilder};
//!
//! let params = SearchParam::from_query(r#"[{"searchText": "web", "searchForm": "text"}]"#)?;
//! let pipeline = SearchPipelineBuilder::new(catalog, catalog)
//!     .build(&params, None, None, true)
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&pipeline)?);
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

pub mod access_control;
pub mod catalog;
pub mod config;
mod error;
pub mod params;
pub mod pipeline;
pub mod query;
pub mod quick;
pub mod references;
pub mod searcher;

pub use access_control::{AccessControlPermission, AccessControlQueryBuilder};
pub use catalog::{CategoryCatalog, CmdbCategory, CmdbType, CmdbUser, InMemoryCatalog, TypeCatalog};
pub use config::SearchConfig;
pub use error::{Error, Result};
pub use params::{SearchForm, SearchOptions, SearchParam};
pub use pipeline::SearchPipelineBuilder;
pub use query::{Condition, Filter, PipelineBuilder, Stage};
pub use quick::{QuickSearchCount, QuickSearchPipelineBuilder};
pub use references::SearchReferencesPipelineBuilder;
pub use searcher::{ObjectStore, SearchResult, SearchResultMap, SearcherFramework};

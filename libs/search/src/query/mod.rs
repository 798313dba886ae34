//! Aggregation pipeline primitives.
//!
//! Typed filter and stage trees that serialize to the document store's
//! aggregation grammar, plus the generic [`PipelineBuilder`] the search
//! builders assemble them with.

mod filter;
mod pipeline;
mod stage;

pub(crate) use filter::compile_regex;
pub use filter::{Condition, Filter};
pub use pipeline::PipelineBuilder;
pub use stage::Stage;

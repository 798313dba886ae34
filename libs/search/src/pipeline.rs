//! Search pipeline assembly
//!
//! Turns a list of [`SearchParam`]s plus the request context into one
//! ordered aggregation pipeline:
//! - reference resolution first, so text criteria see referenced values
//! - the active filter before any text criterion
//! - text/regex, type, category and public id criteria in that order
//! - access control last, narrowing the already filtered candidates

use crate::access_control::{AccessControlPermission, AccessControlQueryBuilder};
use crate::catalog::{CategoryCatalog, CmdbUser, TypeCatalog};
use crate::config::SearchConfig;
use crate::params::{SearchForm, SearchParam};
use crate::query::{Filter, PipelineBuilder, Stage};
use crate::references::SearchReferencesPipelineBuilder;
use crate::Result;

/// Builds the search pipeline for one request.
///
/// Construct one per request; [`build`](Self::build) resets the builder
/// before assembling, so reusing an instance never leaks stages between
/// calls.
pub struct SearchPipelineBuilder<'a> {
    categories: &'a dyn CategoryCatalog,
    types: &'a dyn TypeCatalog,
    config: SearchConfig,
    builder: PipelineBuilder,
}

impl<'a> SearchPipelineBuilder<'a> {
    pub fn new(categories: &'a dyn CategoryCatalog, types: &'a dyn TypeCatalog) -> Self {
        Self::with_config(categories, types, SearchConfig::default())
    }

    pub fn with_config(
        categories: &'a dyn CategoryCatalog,
        types: &'a dyn TypeCatalog,
        config: SearchConfig,
    ) -> Self {
        Self {
            categories,
            types,
            config,
            builder: PipelineBuilder::new(),
        }
    }

    /// Assemble the pipeline for `params`.
    ///
    /// Access-control stages are appended only when both `user` and
    /// `permission` are given.
    ///
    /// # Errors
    /// * `InvalidPublicId` - If a `publicID` criterion is not an integer
    /// * Any type or category catalog failure, unchanged
    #[tracing::instrument(skip_all, fields(params = params.len(), active_flag = active_flag))]
    pub async fn build(
        &mut self,
        params: &[SearchParam],
        user: Option<&CmdbUser>,
        permission: Option<AccessControlPermission>,
        active_flag: bool,
    ) -> Result<Vec<Stage>> {
        self.builder.clear();

        let references = SearchReferencesPipelineBuilder::with_collection(
            self.types,
            self.config.objects_collection.as_str(),
        )
        .build()
        .await?;
        self.builder.extend(references);

        if active_flag {
            self.builder.add_pipe(Stage::match_(Filter::eq("active", true)));
        }

        self.push_text_params(params);
        self.push_type_params(params);
        self.push_category_params(params).await?;
        self.push_public_id_params(params)?;

        if let (Some(user), Some(permission)) = (user, permission) {
            let stages = AccessControlQueryBuilder::new(self.config.types_collection.as_str())
                .build(user.group_id, permission);
            self.builder.extend(stages);
        }

        tracing::debug!(stages = self.builder.len(), "Search pipeline built");
        Ok(self.builder.pipeline().to_vec())
    }

    /// The pipeline assembled by the last [`build`](Self::build).
    pub fn pipeline(&self) -> &PipelineBuilder {
        &self.builder
    }

    fn push_text_params(&mut self, params: &[SearchParam]) {
        for param in params.iter().filter(|p| p.search_form.is_textual()) {
            self.builder.add_pipe(Stage::match_(Filter::regex(
                "fields.value",
                param.search_text.as_str(),
                Some(self.config.text_regex_options.as_str()),
            )));
        }
    }

    fn push_type_params(&mut self, params: &[SearchParam]) {
        let mut disjunction = Vec::new();
        for param in params.iter().filter(|p| p.search_form == SearchForm::Type) {
            let Some(types) = param.types() else {
                continue;
            };
            let type_id_in = Filter::in_("type_id", types.iter().cloned());
            if param.disjunction {
                disjunction.push(type_id_in);
            } else {
                self.builder.add_pipe(Stage::match_(type_id_in));
            }
        }
        if !disjunction.is_empty() {
            self.builder.add_pipe(Stage::match_(Filter::or(disjunction)));
        }
    }

    // One `$in` per matching category: categories sharing a label match
    // narrow the result independently.
    async fn push_category_params(&mut self, params: &[SearchParam]) -> Result<()> {
        for param in params.iter().filter(|p| p.search_form == SearchForm::Category) {
            if param.categories().is_none() {
                continue;
            }
            let label = Filter::regex(
                "label",
                param.search_text.as_str(),
                Some(self.config.category_regex_options.as_str()),
            );
            let categories = self.categories.get_categories_by(&label).await?;
            for category in categories {
                self.builder
                    .add_pipe(Stage::match_(Filter::in_("type_id", category.types)));
            }
        }
        Ok(())
    }

    fn push_public_id_params(&mut self, params: &[SearchParam]) -> Result<()> {
        for param in params.iter().filter(|p| p.search_form == SearchForm::PublicId) {
            let public_id = param.public_id()?;
            self.builder
                .add_pipe(Stage::match_(Filter::equals("public_id", public_id)));
        }
        Ok(())
    }
}

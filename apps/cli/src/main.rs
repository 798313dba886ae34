//! `dg-search` - build DataGerry search pipelines from the command line.
//!
//! Prints the aggregation pipeline a search request would run, using a JSON
//! type/category catalog in place of the database.

mod config;
mod logging;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use datagerry_search::{
    AccessControlPermission, CmdbUser, InMemoryCatalog, QuickSearchPipelineBuilder, SearchParam,
    SearchPipelineBuilder,
};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "dg-search", version, about = "Inspect DataGerry search pipelines")]
struct Cli {
    /// Configuration file (defaults to ./dg-search.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON catalog of the form {"types": [...], "categories": [...]}
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the search pipeline for a JSON array of criteria
    Pipeline {
        /// Criteria as sent by the web client, e.g. '[{"searchText":"web","searchForm":"text"}]'
        #[arg(long)]
        query: String,
        #[command(flatten)]
        context: RequestContext,
    },
    /// Print the quick-search counting pipeline for a single term
    Quick {
        #[arg(long)]
        term: String,
        #[command(flatten)]
        context: RequestContext,
    },
    /// Print the regex values carried by the search pipeline
    Regex {
        #[arg(long)]
        query: String,
    },
}

#[derive(Args)]
struct RequestContext {
    /// Only match active objects
    #[arg(long)]
    active: bool,

    /// Group of the requesting user; enables access control with --permission
    #[arg(long, requires = "permission")]
    group_id: Option<i64>,

    /// CREATE, READ, UPDATE or DELETE
    #[arg(long, requires = "group_id")]
    permission: Option<AccessControlPermission>,
}

impl RequestContext {
    fn user(&self) -> Option<CmdbUser> {
        self.group_id.map(|group_id| CmdbUser {
            public_id: 0,
            user_name: "cli".to_string(),
            group_id,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    let _logging_guard =
        logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    let catalog = match &cli.catalog {
        Some(path) => InMemoryCatalog::from_path(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => {
            tracing::debug!("No catalog given, building against an empty catalog");
            InMemoryCatalog::default()
        }
    };

    match cli.command {
        Command::Pipeline { query, context } => {
            let params = SearchParam::from_query(&query).context("Failed to parse --query")?;
            let user = context.user();
            let pipeline = SearchPipelineBuilder::with_config(&catalog, &catalog, config.search)
                .build(&params, user.as_ref(), context.permission, context.active)
                .await
                .context("Failed to build search pipeline")?;
            print_json(&pipeline)?;
        }
        Command::Quick { term, context } => {
            let user = context.user();
            let pipeline = QuickSearchPipelineBuilder::with_config(&catalog, config.search)
                .build(&term, user.as_ref(), context.permission, context.active)
                .await
                .context("Failed to build quick-search pipeline")?;
            print_json(&pipeline)?;
        }
        Command::Regex { query } => {
            let params = SearchParam::from_query(&query).context("Failed to parse --query")?;
            let mut builder = SearchPipelineBuilder::with_config(&catalog, &catalog, config.search);
            builder
                .build(&params, None, None, false)
                .await
                .context("Failed to build search pipeline")?;
            print_json(&builder.pipeline().regex_pipe_values())?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", rendered);
    Ok(())
}

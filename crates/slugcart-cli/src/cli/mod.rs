//! CLI for the slugcart URL rewriter.

mod catalog;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use slugcart_core::config;

use commands::{run_decide, run_filter, run_reset, run_rewrite, run_sweep, run_warm};

/// Top-level CLI for the slugcart URL rewriter.
#[derive(Debug, Parser)]
#[command(name = "slugcart")]
#[command(about = "slugcart: storefront URL rewriting and canonical redirects", long_about = None)]
pub struct Cli {
    /// TOML catalog file backing name lookups.
    #[arg(long, global = true, default_value = "catalog.toml")]
    pub catalog: String,

    /// Skip the persistent slug cache for this invocation.
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Rewrite a (page, parameters) link into its search-friendly form.
    Rewrite {
        /// Storefront page name, e.g. `product_info`.
        page: String,
        /// Raw parameter string, e.g. `products_id=42&cPath=12_34`.
        #[arg(default_value = "")]
        parameters: String,
        /// Generate against the secure base URL.
        #[arg(long)]
        secure: bool,
    },

    /// Decide whether a requested URI must be 301-redirected.
    Decide {
        /// URI as requested by the client, e.g. `/old-name-p-42.html`.
        uri: String,
        /// Page the front controller resolved the request to.
        page: String,
        /// Raw parameter string of the resolved request.
        #[arg(default_value = "")]
        parameters: String,
    },

    /// Run a display name through the slug filter.
    Filter {
        /// Display name, e.g. `Café Süß 2-Pack`.
        name: String,
    },

    /// Pre-generate the slug cache for every catalog entity.
    Warm,

    /// Delete expired cache rows.
    CacheSweep,

    /// Unconditionally clear the slug cache.
    CacheReset,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Rewrite { page, parameters, secure } => {
                run_rewrite(&cfg, &cli.catalog, cli.no_cache, &page, &parameters, secure).await?;
            }
            CliCommand::Decide { uri, page, parameters } => {
                run_decide(&cfg, &cli.catalog, cli.no_cache, &uri, &page, &parameters).await?;
            }
            CliCommand::Filter { name } => run_filter(&cfg, &name)?,
            CliCommand::Warm => run_warm(&cfg, &cli.catalog).await?,
            CliCommand::CacheSweep => run_sweep().await?,
            CliCommand::CacheReset => run_reset().await?,
        }

        Ok(())
    }
}

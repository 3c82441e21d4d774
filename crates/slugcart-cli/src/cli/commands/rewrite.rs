use std::sync::Arc;

use anyhow::Result;

use slugcart_core::config::SeoConfig;
use slugcart_core::rewrite::Rewriter;
use slugcart_core::store::CacheStore;
use slugcart_core::types::{ConnectionKind, RequestContext, RewriteRequest};

use crate::cli::catalog::TomlCatalog;

pub async fn run_rewrite(
    cfg: &SeoConfig,
    catalog_path: &str,
    no_cache: bool,
    page: &str,
    parameters: &str,
    secure: bool,
) -> Result<()> {
    let (catalog, overrides) = TomlCatalog::load(catalog_path)?;
    let store = if no_cache {
        None
    } else {
        Some(CacheStore::open_default().await?)
    };
    let ctx = RequestContext {
        language_id: cfg.language_id,
        ..RequestContext::default()
    };

    let mut rewriter = Rewriter::new(Arc::new(cfg.clone()), catalog, store, overrides, ctx)?;
    rewriter.warm().await?;

    let mut req = RewriteRequest::new(page, parameters);
    if secure {
        req.connection = ConnectionKind::Secure;
    }

    match rewriter.rewrite(&req).await? {
        Some(url) => println!("{url}"),
        None => {
            tracing::info!(page, parameters, "link was not rewritten");
            println!("(not rewritten)");
        }
    }
    Ok(())
}

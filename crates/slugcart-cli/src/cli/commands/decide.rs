use std::sync::Arc;

use anyhow::Result;

use slugcart_core::config::SeoConfig;
use slugcart_core::rewrite::Rewriter;
use slugcart_core::store::CacheStore;
use slugcart_core::types::{RequestContext, RewriteRequest};

use crate::cli::catalog::TomlCatalog;

pub async fn run_decide(
    cfg: &SeoConfig,
    catalog_path: &str,
    no_cache: bool,
    uri: &str,
    page: &str,
    parameters: &str,
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

    let req = RewriteRequest::new(page, parameters);
    let decision = rewriter.decide(uri, &req).await?;
    if decision.should_redirect {
        if decision.target_query.is_empty() {
            println!("301 {}", decision.target_path);
        } else {
            println!("301 {}?{}", decision.target_path, decision.target_query);
        }
    } else {
        println!("ok (no redirect)");
    }
    Ok(())
}

use std::sync::Arc;

use anyhow::Result;

use slugcart_core::config::SeoConfig;
use slugcart_core::rewrite::Rewriter;
use slugcart_core::store::CacheStore;
use slugcart_core::types::RequestContext;

use crate::cli::catalog::TomlCatalog;

/// Resolve every catalog entity once so the persistent cache is hot.
pub async fn run_warm(cfg: &SeoConfig, catalog_path: &str) -> Result<()> {
    let (catalog, overrides) = TomlCatalog::load(catalog_path)?;
    let store = CacheStore::open_default().await?;
    let ctx = RequestContext {
        language_id: cfg.language_id,
        ..RequestContext::default()
    };

    let mut rewriter =
        Rewriter::new(Arc::new(cfg.clone()), catalog, Some(store), overrides, ctx)?;
    rewriter.warm().await?;
    println!("cache warmed");
    Ok(())
}

pub async fn run_sweep() -> Result<()> {
    let store = CacheStore::open_default().await?;
    let removed = store.invalidate_expired().await?;
    println!("removed {removed} expired entries");
    Ok(())
}

pub async fn run_reset() -> Result<()> {
    let store = CacheStore::open_default().await?;
    let removed = store.clear().await?;
    println!("cleared {removed} entries");
    Ok(())
}

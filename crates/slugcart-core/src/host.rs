//! Host-service port.
//!
//! The rewrite core never talks to the catalog's data store directly; every
//! lookup it needs is behind this trait. The CLI implements it with a
//! file-backed demo catalog, a storefront would implement it against its
//! database, and tests use small in-memory fixtures.

use anyhow::Result;
use async_trait::async_trait;

/// Page name a product's details live under when no product type overrides it.
pub const DEFAULT_INFO_PAGE: &str = "product_info";

/// Services the rewrite core consumes from its host.
///
/// Name lookups return `Ok(None)` when the entity does not exist for the
/// given language; the core maps that to "invalid link parameters". Errors
/// are reserved for real lookup failures.
#[async_trait]
pub trait Host: Send + Sync {
    /// Raw (unfiltered) product display name.
    async fn product_name(&self, id: i64, language_id: i64) -> Result<Option<String>>;

    /// Raw category display name.
    async fn category_name(&self, id: i64, language_id: i64) -> Result<Option<String>>;

    /// Raw manufacturer display name.
    async fn manufacturer_name(&self, id: i64, language_id: i64) -> Result<Option<String>>;

    /// Raw static-page title.
    async fn page_name(&self, id: i64, language_id: i64) -> Result<Option<String>>;

    /// Parent category of `id`, `None` for a root category (or unknown id).
    async fn parent_category(&self, id: i64) -> Result<Option<i64>>;

    /// The category a product's canonical path runs through.
    async fn product_master_category(&self, id: i64) -> Result<Option<i64>>;

    /// Whether a product is linked into the given category.
    async fn product_in_category(&self, product_id: i64, category_id: i64) -> Result<bool>;

    /// Page name serving the product's details, e.g. `product_info` or a
    /// type-specific handler such as `document_general_info`.
    async fn product_info_page(&self, _id: i64) -> Result<String> {
        Ok(DEFAULT_INFO_PAGE.to_string())
    }

    /// All active product ids, for cache pre-warming.
    async fn product_ids(&self) -> Result<Vec<i64>>;

    /// All category ids, for cache pre-warming.
    async fn category_ids(&self) -> Result<Vec<i64>>;

    /// All manufacturer ids, for cache pre-warming.
    async fn manufacturer_ids(&self) -> Result<Vec<i64>>;

    /// All static-page ids for a language, for cache pre-warming.
    async fn page_ids(&self, language_id: i64) -> Result<Vec<i64>>;

    /// Whether `uri` names a real static resource on disk (never the front
    /// controller itself). Such requests are never rewritten or redirected.
    fn is_physical_file(&self, uri: &str) -> bool;

    /// HTML-attribute escaping for the final generated link.
    fn escape_attribute(&self, value: &str) -> String;
}

//! Entity-name resolution.
//!
//! Resolves product/category/manufacturer/static-page ids to sanitized slug
//! text. Resolution order is always: injected override map, then the
//! request-scoped [`NameCache`], then the host's name source (filtered and
//! written back into the caches). Categories are keyed by their full
//! underscore-joined ancestor path so the same id caches uniformly no matter
//! how a link referenced it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::anchors::Anchor;
use crate::config::{CategoryDir, NameFormat, SeoConfig};
use crate::filter::SlugFilter;
use crate::host::Host;
use crate::store::{decode_payload, CacheStore};
use crate::types::{NameCache, Overrides};

/// Consolidated cache-store entry names, one per entity kind.
const KEY_PRODUCTS: &str = "slug_v1_products";
const KEY_CATEGORIES: &str = "slug_v1_categories";
const KEY_MANUFACTURERS: &str = "slug_v1_manufacturers";
const KEY_PAGES: &str = "slug_v1_pages";

/// Upper bound on ancestor-walk depth; a deeper chain is assumed cyclic.
const MAX_CATEGORY_DEPTH: usize = 50;

/// A resolved category: its slug plus the full path it is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryName {
    pub slug: String,
    /// Underscore-joined ancestor chain ending in the category's own id.
    pub full_cpath: String,
    /// The category's own (leaf) id.
    pub leaf: i64,
}

/// Name resolver over a host's catalog, one instance per request/session.
pub struct NameResolver<H: Host> {
    config: Arc<SeoConfig>,
    filter: SlugFilter,
    host: H,
    store: Option<CacheStore>,
    overrides: Overrides,
    names: NameCache,
    /// Suppresses per-lookup store write-back during bulk pre-warm.
    warming: bool,
}

impl<H: Host> NameResolver<H> {
    pub fn new(
        config: Arc<SeoConfig>,
        host: H,
        store: Option<CacheStore>,
        overrides: Overrides,
    ) -> Result<Self> {
        let filter = SlugFilter::new(&config)?;
        Ok(Self {
            config,
            filter,
            host,
            store,
            overrides,
            names: NameCache::default(),
            warming: false,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn filter(&self) -> &SlugFilter {
        &self.filter
    }

    fn language_id(&self) -> i64 {
        self.config.language_id
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.cache.ttl_days) * 24 * 3600)
    }

    /// Expands a `cPath` value (either a full underscore path or a bare id)
    /// to the full ancestor path, returning the leaf id alongside.
    ///
    /// The walk is iterative with a visited set and a depth cap, so a
    /// malformed or cyclic category graph terminates instead of recursing
    /// forever.
    pub async fn full_cpath(&self, cpath: &str) -> Result<(String, i64)> {
        if cpath.contains('_') {
            let leaf = cpath
                .rsplit('_')
                .next()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0);
            return Ok((cpath.to_string(), leaf));
        }

        let leaf: i64 = cpath.parse().unwrap_or(0);
        let chain = self.ancestor_chain(leaf).await?;
        let joined = chain
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("_");
        Ok((joined, leaf))
    }

    /// Root-to-leaf id chain for a category, including the category itself.
    async fn ancestor_chain(&self, leaf: i64) -> Result<Vec<i64>> {
        let mut ancestors = Vec::new();
        let mut visited: HashSet<i64> = HashSet::from([leaf]);
        let mut current = leaf;
        while let Some(parent) = self.host.parent_category(current).await? {
            if parent == 0 {
                break;
            }
            if !visited.insert(parent) {
                tracing::warn!(category = leaf, "category graph cycle detected, truncating path");
                break;
            }
            ancestors.push(parent);
            if ancestors.len() >= MAX_CATEGORY_DEPTH {
                tracing::warn!(category = leaf, "category path deeper than {MAX_CATEGORY_DEPTH}, truncating");
                break;
            }
            current = parent;
        }
        ancestors.reverse();
        ancestors.push(leaf);
        Ok(ancestors)
    }

    /// Resolves a category to its slug in the requested format.
    ///
    /// Returns `Ok(None)` when the category (or any ancestor needed for the
    /// requested format) has no name; nothing is cached in that case.
    pub async fn category_slug(
        &mut self,
        cpath: &str,
        format: NameFormat,
    ) -> Result<Option<CategoryName>> {
        let (full_cpath, leaf) = self.full_cpath(cpath).await?;

        // Overrides and the request cache only apply to the configured
        // format; a differently-formatted request must not read (or poison)
        // entries keyed for the configured one.
        if format == self.config.format {
            if let Some(slug) = self.overrides.categories.get(&full_cpath) {
                return Ok(Some(CategoryName { slug: slug.clone(), full_cpath, leaf }));
            }
            if let Some(slug) = self.names.categories.get(&full_cpath) {
                let slug = slug.clone();
                return Ok(Some(CategoryName { slug, full_cpath, leaf }));
            }
        }

        let slug = if self.config.category_dir == CategoryDir::Full {
            self.full_directory_slug(leaf).await?
        } else if format == NameFormat::Parent {
            self.parent_format_slug(leaf).await?
        } else {
            match self.host.category_name(leaf, self.language_id()).await? {
                Some(name) => Some(self.filter.filter(&name)),
                None => None,
            }
        };

        let slug = match slug {
            Some(s) if !s.is_empty() => s,
            _ => return Ok(None),
        };

        if format == self.config.format {
            self.names.categories.insert(full_cpath.clone(), slug.clone());
            self.persist_categories().await?;
        }
        Ok(Some(CategoryName { slug, full_cpath, leaf }))
    }

    /// `parent` format: the parent category's name and the category's own
    /// name, space-joined before filtering. Root categories use the bare name.
    async fn parent_format_slug(&self, leaf: i64) -> Result<Option<String>> {
        let Some(own) = self.host.category_name(leaf, self.language_id()).await? else {
            return Ok(None);
        };
        let parent = match self.host.parent_category(leaf).await? {
            Some(p) if p != 0 => self.host.category_name(p, self.language_id()).await?,
            _ => None,
        };
        let combined = match parent {
            Some(parent_name) => format!("{parent_name} {own}"),
            None => own,
        };
        Ok(Some(self.filter.filter(&combined)))
    }

    /// `full` category-directory slug: every ancestor becomes a
    /// `name-c-path` segment, with the final segment reduced to its name
    /// (the caller appends the anchor and the full path).
    async fn full_directory_slug(&self, leaf: i64) -> Result<Option<String>> {
        let chain = self.ancestor_chain(leaf).await?;
        let mut segments = Vec::with_capacity(chain.len());
        let mut cpath = String::new();
        for id in chain {
            let Some(name) = self.host.category_name(id, self.language_id()).await? else {
                return Ok(None);
            };
            let slug = self.filter.filter(&name);
            if slug.is_empty() {
                return Ok(None);
            }
            if !cpath.is_empty() {
                cpath.push('_');
            }
            cpath.push_str(&id.to_string());
            segments.push(format!("{slug}{}{cpath}", Anchor::CategoryPath.token()));
        }
        let joined = segments.join("/");
        // Drop the trailing anchor and path; the last segment contributes
        // only its name.
        let cut = match joined.rfind(Anchor::CategoryPath.token()) {
            Some(pos) => joined[..pos].to_string(),
            None => joined,
        };
        Ok(Some(cut))
    }

    /// The cached portion of a product slug: the filtered product name, with
    /// the parent category's name hyphen-prepended when the configuration
    /// asks for `parent` format without category directories.
    pub async fn product_base_slug(
        &mut self,
        id: i64,
        cpath_leaf: Option<i64>,
    ) -> Result<Option<String>> {
        if let Some(slug) = self.overrides.products.get(&id) {
            return Ok(Some(slug.clone()));
        }
        if let Some(slug) = self.names.products.get(&id) {
            return Ok(Some(slug.clone()));
        }

        let Some(raw) = self.host.product_name(id, self.language_id()).await? else {
            return Ok(None);
        };
        let mut slug = self.filter.filter(&raw);
        if slug.is_empty() {
            return Ok(None);
        }

        if self.config.format == NameFormat::Parent && self.config.category_dir == CategoryDir::Off
        {
            let category_id = match cpath_leaf {
                Some(c) if c != 0 => Some(c),
                _ => self.host.product_master_category(id).await?,
            };
            let Some(category_id) = category_id else {
                return Ok(None);
            };
            let Some(category) = self
                .category_slug(&category_id.to_string(), NameFormat::Original)
                .await?
            else {
                return Ok(None);
            };
            slug = format!("{}-{slug}", category.slug);
        }

        self.names.products.insert(id, slug.clone());
        self.persist_products().await?;
        Ok(Some(slug))
    }

    /// Full product slug including the category directory segment when the
    /// configuration emits one.
    ///
    /// `cpath_leaf` is the trailing id of a `cPath` supplied with the link;
    /// it selects the directory segment only when the product actually
    /// belongs to that category.
    pub async fn product_slug(
        &mut self,
        id: i64,
        cpath_leaf: Option<i64>,
    ) -> Result<Option<String>> {
        let Some(base) = self.product_base_slug(id, cpath_leaf).await? else {
            return Ok(None);
        };

        if self.config.category_dir == CategoryDir::Off {
            return Ok(Some(base));
        }

        let prefix = match cpath_leaf {
            Some(c) if c != 0 => {
                if self.host.product_in_category(id, c).await? {
                    match self.directory_prefix(c).await? {
                        Some(p) => p,
                        None => return Ok(None),
                    }
                } else {
                    String::new()
                }
            }
            _ => {
                let Some(master) = self.host.product_master_category(id).await? else {
                    return Ok(None);
                };
                match self.directory_prefix(master).await? {
                    Some(p) => p,
                    None => return Ok(None),
                }
            }
        };

        Ok(Some(format!("{prefix}{base}")))
    }

    /// `category-slug-c-<full_cpath>/` directory prefix for a product slug.
    async fn directory_prefix(&mut self, category_id: i64) -> Result<Option<String>> {
        let format = self.config.format;
        let Some(category) = self.category_slug(&category_id.to_string(), format).await? else {
            return Ok(None);
        };
        Ok(Some(format!(
            "{}{}{}/",
            category.slug,
            Anchor::CategoryPath.token(),
            category.full_cpath
        )))
    }

    /// Canonical slug for a product: its master-category directory path plus
    /// the base name. Only meaningful when category directories are enabled
    /// (otherwise every product has a single path already).
    pub async fn product_canonical(&mut self, id: i64) -> Result<Option<String>> {
        if self.config.category_dir == CategoryDir::Off {
            return Ok(None);
        }
        if self.host.product_name(id, self.language_id()).await?.is_none() {
            return Ok(None);
        }
        let Some(master) = self.host.product_master_category(id).await? else {
            return Ok(None);
        };
        let Some(prefix) = self.directory_prefix(master).await? else {
            return Ok(None);
        };
        let Some(base) = self.product_base_slug(id, None).await? else {
            return Ok(None);
        };
        Ok(Some(format!("{prefix}{base}")))
    }

    pub async fn manufacturer_slug(&mut self, id: i64) -> Result<Option<String>> {
        if let Some(slug) = self.overrides.manufacturers.get(&id) {
            return Ok(Some(slug.clone()));
        }
        if let Some(slug) = self.names.manufacturers.get(&id) {
            return Ok(Some(slug.clone()));
        }
        let Some(raw) = self.host.manufacturer_name(id, self.language_id()).await? else {
            return Ok(None);
        };
        let slug = self.filter.filter(&raw);
        if slug.is_empty() {
            return Ok(None);
        }
        self.names.manufacturers.insert(id, slug.clone());
        self.persist_manufacturers().await?;
        Ok(Some(slug))
    }

    pub async fn page_slug(&mut self, id: i64) -> Result<Option<String>> {
        if let Some(slug) = self.overrides.pages.get(&id) {
            return Ok(Some(slug.clone()));
        }
        if let Some(slug) = self.names.pages.get(&id) {
            return Ok(Some(slug.clone()));
        }
        let Some(raw) = self.host.page_name(id, self.language_id()).await? else {
            return Ok(None);
        };
        let slug = self.filter.filter(&raw);
        if slug.is_empty() {
            return Ok(None);
        }
        self.names.pages.insert(id, slug.clone());
        self.persist_pages().await?;
        Ok(Some(slug))
    }

    /// Bulk pre-warm of the request cache from the store.
    ///
    /// For each enabled entity kind: load the consolidated global entry if
    /// one is fresh, otherwise walk the host's full collection, resolve every
    /// name, and write one consolidated entry back. Also runs the
    /// best-effort expired-row sweep.
    pub async fn warm(&mut self) -> Result<()> {
        if !self.config.cache.global || self.store.is_none() {
            return Ok(());
        }

        if let Some(store) = &self.store {
            let swept = store.invalidate_expired().await?;
            if swept > 0 {
                tracing::debug!(swept, "removed expired slug-cache rows");
            }
        }

        let mut global = match &self.store {
            Some(store) => store.load_global(self.language_id()).await?,
            None => HashMap::new(),
        };

        self.warming = true;
        let result = self.warm_kinds(&mut global).await;
        self.warming = false;
        result
    }

    async fn warm_kinds(&mut self, global: &mut HashMap<String, Vec<u8>>) -> Result<()> {
        if self.config.cache.products {
            match global.remove(KEY_PRODUCTS).and_then(|p| decode_payload(&p)) {
                Some(map) => self.names.products = map,
                None => {
                    for id in self.host.product_ids().await? {
                        // Missing names are skipped; a lookup later will
                        // flag the individual link as invalid.
                        let _ = self.product_base_slug(id, None).await?;
                    }
                    self.put_kind(KEY_PRODUCTS).await?;
                }
            }
        }

        if self.config.cache.categories {
            match global.remove(KEY_CATEGORIES).and_then(|p| decode_payload(&p)) {
                Some(map) => self.names.categories = map,
                None => {
                    for id in self.host.category_ids().await? {
                        let format = self.config.format;
                        let _ = self.category_slug(&id.to_string(), format).await?;
                    }
                    self.put_kind(KEY_CATEGORIES).await?;
                }
            }
        }

        if self.config.cache.manufacturers {
            match global.remove(KEY_MANUFACTURERS).and_then(|p| decode_payload(&p)) {
                Some(map) => self.names.manufacturers = map,
                None => {
                    for id in self.host.manufacturer_ids().await? {
                        let _ = self.manufacturer_slug(id).await?;
                    }
                    self.put_kind(KEY_MANUFACTURERS).await?;
                }
            }
        }

        if self.config.cache.pages {
            match global.remove(KEY_PAGES).and_then(|p| decode_payload(&p)) {
                Some(map) => self.names.pages = map,
                None => {
                    for id in self.host.page_ids(self.language_id()).await? {
                        let _ = self.page_slug(id).await?;
                    }
                    self.put_kind(KEY_PAGES).await?;
                }
            }
        }

        Ok(())
    }

    /// Write one kind's consolidated map to the store as a global entry.
    async fn put_kind(&self, key: &str) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let ttl = self.ttl();
        let lang = self.language_id();
        match key {
            KEY_PRODUCTS => store.put(key, lang, &self.names.products, ttl, true, true).await,
            KEY_CATEGORIES => store.put(key, lang, &self.names.categories, ttl, true, true).await,
            KEY_MANUFACTURERS => {
                store.put(key, lang, &self.names.manufacturers, ttl, true, true).await
            }
            KEY_PAGES => store.put(key, lang, &self.names.pages, ttl, true, true).await,
            _ => Ok(()),
        }
    }

    async fn persist_products(&self) -> Result<()> {
        if !self.warming && self.config.cache.global && self.config.cache.products {
            self.put_kind(KEY_PRODUCTS).await?;
        }
        Ok(())
    }

    async fn persist_categories(&self) -> Result<()> {
        if !self.warming && self.config.cache.global && self.config.cache.categories {
            self.put_kind(KEY_CATEGORIES).await?;
        }
        Ok(())
    }

    async fn persist_manufacturers(&self) -> Result<()> {
        if !self.warming && self.config.cache.global && self.config.cache.manufacturers {
            self.put_kind(KEY_MANUFACTURERS).await?;
        }
        Ok(())
    }

    async fn persist_pages(&self) -> Result<()> {
        if !self.warming && self.config.cache.global && self.config.cache.pages {
            self.put_kind(KEY_PAGES).await?;
        }
        Ok(())
    }
}

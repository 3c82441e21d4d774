//! File-backed demo catalog.
//!
//! Implements the core's [`Host`] port from a TOML file, so the rewriter can
//! be exercised without a storefront database. The catalog is single-language
//! and small; lookups are plain map reads.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use slugcart_core::host::{Host, DEFAULT_INFO_PAGE};
use slugcart_core::types::Overrides;

#[derive(Debug, Deserialize)]
struct ProductEntry {
    id: i64,
    name: String,
    #[serde(default)]
    master: Option<i64>,
    #[serde(default)]
    categories: Vec<i64>,
    #[serde(default)]
    info_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    id: i64,
    name: String,
    #[serde(default)]
    parent: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    id: i64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct OverrideEntry {
    /// Numeric id for products/manufacturers/pages, full `cPath` for
    /// categories.
    key: String,
    slug: String,
}

#[derive(Debug, Default, Deserialize)]
struct OverrideSections {
    #[serde(default)]
    products: Vec<OverrideEntry>,
    #[serde(default)]
    categories: Vec<OverrideEntry>,
    #[serde(default)]
    manufacturers: Vec<OverrideEntry>,
    #[serde(default)]
    pages: Vec<OverrideEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    /// Directory checked for physical files; relative URIs resolve under it.
    #[serde(default)]
    docroot: Option<PathBuf>,
    #[serde(default)]
    products: Vec<ProductEntry>,
    #[serde(default)]
    categories: Vec<CategoryEntry>,
    #[serde(default)]
    manufacturers: Vec<NamedEntry>,
    #[serde(default)]
    pages: Vec<NamedEntry>,
    #[serde(default)]
    overrides: OverrideSections,
}

/// In-memory form of the TOML catalog.
#[derive(Debug, Default)]
pub struct TomlCatalog {
    docroot: Option<PathBuf>,
    products: HashMap<i64, String>,
    categories: HashMap<i64, (String, Option<i64>)>,
    manufacturers: HashMap<i64, String>,
    pages: HashMap<i64, String>,
    master: HashMap<i64, i64>,
    links: HashSet<(i64, i64)>,
    info_pages: HashMap<i64, String>,
}

impl TomlCatalog {
    /// Load a catalog file, returning the catalog and its override maps.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Overrides)> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        let file: CatalogFile = toml::from_str(&data)
            .with_context(|| format!("parsing catalog {}", path.display()))?;

        let mut catalog = TomlCatalog {
            docroot: file.docroot,
            ..TomlCatalog::default()
        };
        for product in file.products {
            if let Some(master) = product.master {
                catalog.master.insert(product.id, master);
                catalog.links.insert((product.id, master));
            }
            for category in product.categories {
                catalog.links.insert((product.id, category));
            }
            if let Some(page) = product.info_page {
                catalog.info_pages.insert(product.id, page);
            }
            catalog.products.insert(product.id, product.name);
        }
        for category in file.categories {
            catalog
                .categories
                .insert(category.id, (category.name, category.parent));
        }
        for m in file.manufacturers {
            catalog.manufacturers.insert(m.id, m.name);
        }
        for page in file.pages {
            catalog.pages.insert(page.id, page.name);
        }

        let overrides = build_overrides(file.overrides)?;
        tracing::debug!(
            products = catalog.products.len(),
            categories = catalog.categories.len(),
            "catalog loaded"
        );
        Ok((catalog, overrides))
    }
}

fn build_overrides(sections: OverrideSections) -> Result<Overrides> {
    let mut overrides = Overrides::default();
    for entry in sections.products {
        let id: i64 = entry.key.parse().context("product override key")?;
        overrides.products.insert(id, entry.slug);
    }
    for entry in sections.categories {
        overrides.categories.insert(entry.key, entry.slug);
    }
    for entry in sections.manufacturers {
        let id: i64 = entry.key.parse().context("manufacturer override key")?;
        overrides.manufacturers.insert(id, entry.slug);
    }
    for entry in sections.pages {
        let id: i64 = entry.key.parse().context("page override key")?;
        overrides.pages.insert(id, entry.slug);
    }
    Ok(overrides)
}

#[async_trait]
impl Host for TomlCatalog {
    async fn product_name(&self, id: i64, _language_id: i64) -> Result<Option<String>> {
        Ok(self.products.get(&id).cloned())
    }

    async fn category_name(&self, id: i64, _language_id: i64) -> Result<Option<String>> {
        Ok(self.categories.get(&id).map(|(name, _)| name.clone()))
    }

    async fn manufacturer_name(&self, id: i64, _language_id: i64) -> Result<Option<String>> {
        Ok(self.manufacturers.get(&id).cloned())
    }

    async fn page_name(&self, id: i64, _language_id: i64) -> Result<Option<String>> {
        Ok(self.pages.get(&id).cloned())
    }

    async fn parent_category(&self, id: i64) -> Result<Option<i64>> {
        Ok(self.categories.get(&id).and_then(|(_, parent)| *parent))
    }

    async fn product_master_category(&self, id: i64) -> Result<Option<i64>> {
        Ok(self.master.get(&id).copied())
    }

    async fn product_in_category(&self, product_id: i64, category_id: i64) -> Result<bool> {
        Ok(self.links.contains(&(product_id, category_id)))
    }

    async fn product_info_page(&self, id: i64) -> Result<String> {
        Ok(self
            .info_pages
            .get(&id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_INFO_PAGE.to_string()))
    }

    async fn product_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.products.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn category_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.categories.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn manufacturer_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.manufacturers.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn page_ids(&self, _language_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.pages.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn is_physical_file(&self, uri: &str) -> bool {
        let Some(docroot) = &self.docroot else {
            return false;
        };
        let path = uri.split(|c| c == '?' || c == '#').next().unwrap_or(uri);
        let relative = path.trim_start_matches('/');
        if relative.is_empty() || relative.contains("..") {
            return false;
        }
        docroot.join(relative).is_file()
    }

    fn escape_attribute(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                c => out.push(c),
            }
        }
        out
    }
}

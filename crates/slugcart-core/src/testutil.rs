//! In-memory [`Host`] fixture shared by the unit tests.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use crate::host::Host;

/// Small fixed catalog backing the tests. Lookups ignore `language_id`
/// except that id 1 is the only language with names.
#[derive(Debug, Default)]
pub struct FixtureHost {
    pub products: HashMap<i64, String>,
    /// id -> (name, parent id); parent `None` marks a root category.
    pub categories: HashMap<i64, (String, Option<i64>)>,
    pub manufacturers: HashMap<i64, String>,
    pub pages: HashMap<i64, String>,
    pub master: HashMap<i64, i64>,
    pub links: HashSet<(i64, i64)>,
    pub physical: HashSet<String>,
    pub info_pages: HashMap<i64, String>,
}

impl FixtureHost {
    /// Shoes catalog: category 12 "Shoes" with child 34 "Running", product
    /// 42 "Running Shoe" mastered in 12 and linked into both.
    pub fn demo() -> Self {
        let mut host = FixtureHost::default();
        host.categories.insert(12, ("Shoes".to_string(), None));
        host.categories.insert(34, ("Running".to_string(), Some(12)));
        host.products.insert(42, "Running Shoe".to_string());
        host.master.insert(42, 12);
        host.links.insert((42, 12));
        host.links.insert((42, 34));
        host.manufacturers.insert(3, "Acme Corp".to_string());
        host.pages.insert(5, "About Our Store".to_string());
        host
    }
}

#[async_trait]
impl Host for FixtureHost {
    async fn product_name(&self, id: i64, language_id: i64) -> Result<Option<String>> {
        if language_id != 1 {
            return Ok(None);
        }
        Ok(self.products.get(&id).cloned())
    }

    async fn category_name(&self, id: i64, language_id: i64) -> Result<Option<String>> {
        if language_id != 1 {
            return Ok(None);
        }
        Ok(self.categories.get(&id).map(|(name, _)| name.clone()))
    }

    async fn manufacturer_name(&self, id: i64, language_id: i64) -> Result<Option<String>> {
        if language_id != 1 {
            return Ok(None);
        }
        Ok(self.manufacturers.get(&id).cloned())
    }

    async fn page_name(&self, id: i64, language_id: i64) -> Result<Option<String>> {
        if language_id != 1 {
            return Ok(None);
        }
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
            .unwrap_or_else(|| crate::host::DEFAULT_INFO_PAGE.to_string()))
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
        let path = uri.split('?').next().unwrap_or(uri);
        self.physical.contains(path)
    }

    fn escape_attribute(&self, value: &str) -> String {
        value
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }
}

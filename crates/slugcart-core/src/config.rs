use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::types::ConnectionKind;

/// Rewrite engine variant. Only one engine exists today; the enum keeps the
/// call sites stable if an alternative scheme is added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Rewrite,
}

/// Slug format for category and product names.
///
/// `original` uses the bare entity name; `parent` prefixes the parent
/// category's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameFormat {
    #[default]
    Original,
    Parent,
}

/// How category directory segments are emitted in front of product slugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryDir {
    /// No directory segment.
    #[default]
    Off,
    /// One segment, named per [`NameFormat`].
    Short,
    /// The full ancestor chain as nested segments.
    Full,
}

/// Whether a raw `cPath` query parameter may ride along on product links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpathMode {
    /// Keep the parameter only when it is needed to place a linked product.
    #[default]
    Auto,
    /// Never append the parameter.
    Disable,
}

/// Which characters the slug filter removes from display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RemoveChars {
    /// All characters that are not letters, digits or whitespace.
    #[default]
    #[serde(rename = "non-alphanumerical")]
    NonAlphanumerical,
    /// Unicode punctuation and symbol characters only.
    #[serde(rename = "punctuation")]
    Punctuation,
}

/// Per-kind toggles for the persistent slug cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch; nothing is persisted or pre-warmed when off.
    pub global: bool,
    pub products: bool,
    pub categories: bool,
    pub manufacturers: bool,
    pub pages: bool,
    /// Entry lifetime in days.
    pub ttl_days: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            global: true,
            products: true,
            categories: true,
            manufacturers: true,
            pages: true,
            ttl_days: 30,
        }
    }
}

/// Scheme/host/base-path combinations links are generated against.
///
/// The `catalog_*` servers are used for links generated from the
/// administrative context, which always point at the storefront.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_server: String,
    pub https_server: String,
    #[serde(default)]
    pub catalog_http_server: String,
    #[serde(default)]
    pub catalog_https_server: String,
    /// Base path under the plain server, e.g. `/shop/`.
    #[serde(default)]
    pub catalog_dir: String,
    /// Base path under the secure server.
    #[serde(default)]
    pub catalog_https_dir: String,
    pub enable_ssl: bool,
    #[serde(default)]
    pub enable_ssl_catalog: bool,
}

impl ServerConfig {
    /// Selects one of the four precomputed bases for a generated link.
    pub fn base_for(
        &self,
        connection: ConnectionKind,
        is_admin: bool,
        use_catalog_dir: bool,
    ) -> String {
        let (server, dir) = if is_admin {
            if connection == ConnectionKind::Secure && self.enable_ssl_catalog {
                (&self.catalog_https_server, &self.catalog_https_dir)
            } else {
                (&self.catalog_http_server, &self.catalog_dir)
            }
        } else if connection == ConnectionKind::Secure && self.enable_ssl {
            (&self.https_server, &self.catalog_https_dir)
        } else {
            (&self.http_server, &self.catalog_dir)
        };

        let mut base = server.clone();
        if use_catalog_dir {
            base.push_str(dir);
        }
        base
    }
}

/// Session-related host behavior the rewriter must honor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// When true the host forces cookie sessions and no session token is
    /// ever appended to generated links.
    pub force_cookie_use: bool,
    /// When true a page-cache layer sits in front of the storefront and
    /// anonymous links get a placeholder token it can substitute later.
    pub page_cache_enabled: bool,
}

/// Full configuration surface of the rewrite core. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoConfig {
    /// Master switch; when false every rewrite yields "do not rewrite".
    pub enabled: bool,
    #[serde(default)]
    pub engine: EngineKind,
    /// Suffix appended to rewritten URLs, e.g. `.html`. May be empty.
    pub url_suffix: String,
    #[serde(default)]
    pub format: NameFormat,
    #[serde(default)]
    pub category_dir: CategoryDir,
    #[serde(default)]
    pub cpath: CpathMode,
    #[serde(default)]
    pub remove_chars: RemoveChars,
    /// Ordered literal substitutions in `find=>replace,find=>replace` form,
    /// applied before any other filtering (typically diacritic folding).
    #[serde(default)]
    pub substitutions: String,
    /// Slug tokens of this length or shorter are dropped; 0 disables.
    pub short_word_length: usize,
    /// Use Unicode character classes in the filter; when off the filter
    /// degrades to ASCII-only classes and case folding.
    pub unicode_aware: bool,
    /// Pages eligible for rewriting. Empty means every page.
    #[serde(default)]
    pub rewrite_pages: Vec<String>,
    /// Issue 301 redirects to the canonical form of rewritten pages.
    pub redirect_enabled: bool,
    /// Language this module instance generates names for.
    pub language_id: i64,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            engine: EngineKind::Rewrite,
            url_suffix: ".html".to_string(),
            format: NameFormat::Original,
            category_dir: CategoryDir::Off,
            cpath: CpathMode::Auto,
            remove_chars: RemoveChars::NonAlphanumerical,
            substitutions: "ä=>ae,ö=>oe,ü=>ue,ß=>ss,é=>e,è=>e,Ä=>Ae,Ö=>Oe,Ü=>Ue".to_string(),
            short_word_length: 3,
            unicode_aware: true,
            rewrite_pages: Vec::new(),
            redirect_enabled: true,
            language_id: 1,
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl SeoConfig {
    /// Parses [`SeoConfig::substitutions`] into ordered (find, replace)
    /// pairs. Malformed entries are skipped.
    pub fn substitution_rules(&self) -> Vec<(String, String)> {
        self.substitutions
            .split(',')
            .filter_map(|pair| {
                let (find, replace) = pair.split_once("=>")?;
                let find = find.trim();
                if find.is_empty() {
                    return None;
                }
                Some((find.to_string(), replace.trim().to_string()))
            })
            .collect()
    }

    /// True when `page` is eligible for rewriting.
    pub fn page_allowed(&self, page: &str) -> bool {
        self.rewrite_pages.is_empty() || self.rewrite_pages.iter().any(|p| p == page)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("slugcart")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SeoConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SeoConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: SeoConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SeoConfig::default();
        assert!(cfg.enabled);
        assert_eq!(cfg.url_suffix, ".html");
        assert_eq!(cfg.category_dir, CategoryDir::Off);
        assert_eq!(cfg.format, NameFormat::Original);
        assert_eq!(cfg.short_word_length, 3);
        assert!(cfg.page_allowed("anything"));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SeoConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SeoConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.url_suffix, cfg.url_suffix);
        assert_eq!(parsed.category_dir, cfg.category_dir);
        assert_eq!(parsed.remove_chars, cfg.remove_chars);
        assert_eq!(parsed.cache.ttl_days, cfg.cache.ttl_days);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            enabled = true
            url_suffix = ".htm"
            format = "parent"
            category_dir = "full"
            remove_chars = "punctuation"
            short_word_length = 0
            unicode_aware = false
            rewrite_pages = ["index", "product_info"]
            redirect_enabled = false
            language_id = 2
        "#;
        let cfg: SeoConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.url_suffix, ".htm");
        assert_eq!(cfg.format, NameFormat::Parent);
        assert_eq!(cfg.category_dir, CategoryDir::Full);
        assert_eq!(cfg.remove_chars, RemoveChars::Punctuation);
        assert!(!cfg.unicode_aware);
        assert!(cfg.page_allowed("index"));
        assert!(!cfg.page_allowed("contact_us"));
    }

    #[test]
    fn substitution_rules_parse_in_order() {
        let mut cfg = SeoConfig::default();
        cfg.substitutions = "ä=>ae, ö=>oe ,broken,ß=>ss".to_string();
        let rules = cfg.substitution_rules();
        assert_eq!(
            rules,
            vec![
                ("ä".to_string(), "ae".to_string()),
                ("ö".to_string(), "oe".to_string()),
                ("ß".to_string(), "ss".to_string()),
            ]
        );
    }

    #[test]
    fn base_for_selects_expected_combination() {
        let server = ServerConfig {
            http_server: "http://shop.example.com".into(),
            https_server: "https://secure.example.com".into(),
            catalog_http_server: "http://shop.example.com".into(),
            catalog_https_server: "https://secure.example.com".into(),
            catalog_dir: "/shop/".into(),
            catalog_https_dir: "/safe/".into(),
            enable_ssl: true,
            enable_ssl_catalog: false,
        };
        assert_eq!(
            server.base_for(ConnectionKind::Plain, false, true),
            "http://shop.example.com/shop/"
        );
        assert_eq!(
            server.base_for(ConnectionKind::Secure, false, true),
            "https://secure.example.com/safe/"
        );
        assert_eq!(
            server.base_for(ConnectionKind::Secure, false, false),
            "https://secure.example.com"
        );
        // Admin links always target the catalog servers; SSL is off there.
        assert_eq!(
            server.base_for(ConnectionKind::Secure, true, true),
            "http://shop.example.com/shop/"
        );
    }
}

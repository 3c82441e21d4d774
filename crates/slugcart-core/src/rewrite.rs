//! Parameter-string to rewritten-URL engine.
//!
//! Turns a `(page, raw query string)` pair into a search-friendly URL such as
//! `shoes-c-12/running-shoe-p-42.html`, or declines (`None`) so the caller
//! can fall back to the plain dynamic link. Declining is an outcome, not an
//! error; `Err` is reserved for lookup failures in the backing services.

use std::sync::Arc;

use anyhow::Result;
use regex::Regex;

use crate::anchors::Anchor;
use crate::config::{CategoryDir, CpathMode, EngineKind, SeoConfig};
use crate::host::Host;
use crate::resolver::NameResolver;
use crate::store::CacheStore;
use crate::types::{Overrides, RequestContext, RewriteRequest};

/// Main listing page; `cPath` becomes the slug itself here.
pub const PAGE_DEFAULT: &str = "index";
/// Reviews listing for one product.
pub const PAGE_PRODUCT_REVIEWS: &str = "product_reviews";
/// One review's detail page.
pub const PAGE_PRODUCT_REVIEWS_INFO: &str = "product_reviews_info";
/// Product image popup.
pub const PAGE_POPUP_IMAGE: &str = "popup_image";
/// Static-page front controller.
pub const PAGE_EZPAGE: &str = "page";

/// Marker a page-cache layer substitutes with the real session id.
pub const SESSION_ID_PLACEHOLDER: &str = "<sessid>";

/// The rewrite engine. One instance per request/session; holds the
/// request-scoped name caches and the validity flag of the last rewrite.
pub struct Rewriter<H: Host> {
    config: Arc<SeoConfig>,
    resolver: NameResolver<H>,
    ctx: RequestContext,
    cpath_pair: Regex,
    info_page: Regex,
    /// False when any lookup during the current rewrite found no entity.
    valid: bool,
}

/// Accumulator for one parameter walk.
struct ParsedLink {
    slug: Option<String>,
    passthrough: Vec<(String, String)>,
    /// Leaf id of a `cPath` pair seen on a product page, for placement.
    cpath_leaf: Option<i64>,
    /// The raw `cPath` value, kept around until the suppression decision.
    cpath_raw: Option<String>,
    /// Overrides the configured suffix; category listings in a directory
    /// mode end in `/` so they nest over their product paths.
    extension: Option<&'static str>,
}

impl<H: Host> Rewriter<H> {
    pub fn new(
        config: Arc<SeoConfig>,
        host: H,
        store: Option<CacheStore>,
        overrides: Overrides,
        ctx: RequestContext,
    ) -> Result<Self> {
        let resolver = NameResolver::new(config.clone(), host, store, overrides)?;
        Ok(Self {
            config,
            resolver,
            ctx,
            cpath_pair: Regex::new(r"(?:^|&)c[Pp]ath=([^&]*)")?,
            info_page: Regex::new(r"^product_(\S+_)?info$")?,
            valid: true,
        })
    }

    pub fn resolver(&mut self) -> &mut NameResolver<H> {
        &mut self.resolver
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub(crate) fn config(&self) -> &SeoConfig {
        &self.config
    }

    /// Pre-warm the name caches from the store (see the resolver).
    pub async fn warm(&mut self) -> Result<()> {
        self.resolver.warm().await
    }

    /// Rewrite a link request into a full, HTML-attribute-escaped URL.
    ///
    /// `Ok(None)` means "do not rewrite": rewriting disabled, a physical
    /// file, a page outside the allow-list, or a parameter referencing an
    /// entity that does not exist.
    pub async fn rewrite(&mut self, req: &RewriteRequest) -> Result<Option<String>> {
        let raw = self.rewrite_raw(req).await?;
        Ok(raw.map(|url| self.resolver.host().escape_attribute(&url)))
    }

    /// Rewrite without the final escaping step; the redirect decider compares
    /// against this form.
    pub(crate) async fn rewrite_raw(&mut self, req: &RewriteRequest) -> Result<Option<String>> {
        self.valid = true;

        if !self.config.enabled {
            return Ok(None);
        }
        // Single engine today; the match keeps the dispatch point explicit
        // for any future scheme.
        match self.config.engine {
            EngineKind::Rewrite => {}
        }

        let (page, parameters) = split_front_controller(&req.page, &req.parameters);

        if self.resolver.host().is_physical_file(&page) {
            return Ok(None);
        }
        if !self.config.page_allowed(&page) {
            return Ok(None);
        }

        // Re-rewriting an already-rewritten page token only strips the
        // suffix again.
        let page = if self.config.url_suffix.is_empty() {
            page
        } else if let Some(stripped) = page.strip_suffix(&self.config.url_suffix) {
            stripped.to_string()
        } else {
            page
        };

        let parsed = self.parse_parameters(&page, &parameters).await?;
        if !self.valid {
            tracing::debug!(%page, "link parameters reference an unknown entity, not rewriting");
            return Ok(None);
        }

        // The home page with nothing to say is the base URL alone.
        let mut url = match parsed.slug {
            Some(ref slug) => format!(
                "{slug}{}",
                parsed.extension.unwrap_or(self.config.url_suffix.as_str())
            ),
            None if page == PAGE_DEFAULT && parameters.is_empty() => String::new(),
            None => format!("{page}{}", self.config.url_suffix),
        };

        let query = parsed
            .passthrough
            .iter()
            .map(|(key, value)| format!("{key}={}", reencode(value)))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }

        if let Some(sid) = self.session_token(req) {
            url.push(if query.is_empty() { '?' } else { '&' });
            url.push_str(&sid);
        }

        let base = self
            .config
            .server
            .base_for(req.connection, self.ctx.is_admin, req.use_catalog_dir);
        Ok(Some(format!("{base}{url}")))
    }

    /// Walk the normalized parameter pairs, building the base slug from the
    /// first recognized entity pair and collecting everything else for
    /// pass-through in original order.
    async fn parse_parameters(&mut self, page: &str, parameters: &str) -> Result<ParsedLink> {
        let pairs = self.normalized_pairs(parameters);

        let has_product = pairs.iter().any(|(k, _)| k == "products_id");
        let has_cpath = pairs.iter().any(|(k, _)| k == "cPath");

        let mut out = ParsedLink {
            slug: None,
            passthrough: Vec::new(),
            cpath_leaf: None,
            cpath_raw: None,
            extension: None,
        };

        for (key, value) in pairs {
            match key.as_str() {
                "cPath" => self.take_cpath(page, &value, &mut out).await?,
                "products_id" => self.take_products_id(page, &value, &mut out).await?,
                "manufacturers_id" => {
                    if page == PAGE_DEFAULT && !has_product && !has_cpath && out.slug.is_none() {
                        match self.resolver.manufacturer_slug(parse_id(&value)).await? {
                            Some(slug) => {
                                out.slug = Some(format!(
                                    "{slug}{}{value}",
                                    Anchor::Manufacturer.token()
                                ));
                            }
                            None => self.valid = false,
                        }
                    } else if self.info_page.is_match(page) {
                        // A manufacturer filter is meaningless on a product
                        // details page; drop it.
                    } else {
                        out.passthrough.push((key, value));
                    }
                }
                "pID" if page == PAGE_POPUP_IMAGE => {
                    if out.slug.is_some() {
                        out.passthrough.push((key, value));
                        continue;
                    }
                    match self.resolver.product_slug(parse_id(&value), None).await? {
                        Some(slug) => {
                            out.slug =
                                Some(format!("{slug}{}{value}", Anchor::PopupImage.token()));
                        }
                        None => self.valid = false,
                    }
                }
                "id" if page == PAGE_EZPAGE => {
                    if out.slug.is_some() {
                        out.passthrough.push((key, value));
                        continue;
                    }
                    match self.resolver.page_slug(parse_id(&value)).await? {
                        Some(slug) => {
                            out.slug =
                                Some(format!("{slug}{}{value}", Anchor::StaticPage.token()));
                        }
                        None => self.valid = false,
                    }
                }
                _ => out.passthrough.push((key, value)),
            }
        }

        // A cPath that placed a product is now encoded in the path; append it
        // as a query parameter only in the one configuration that wants it.
        if let Some(raw) = out.cpath_raw.take() {
            let suppressed = out.slug.is_some()
                && (self.config.category_dir != CategoryDir::Off
                    || self.config.cpath != CpathMode::Auto);
            if !suppressed {
                out.passthrough.push(("cPath".to_string(), raw));
            }
        }

        Ok(out)
    }

    async fn take_cpath(&mut self, page: &str, value: &str, out: &mut ParsedLink) -> Result<()> {
        // An empty cPath contributes nothing.
        if value.is_empty() {
            return Ok(());
        }
        if page == PAGE_DEFAULT {
            if out.slug.is_some() {
                out.passthrough.push(("cPath".to_string(), value.to_string()));
                return Ok(());
            }
            let format = self.config.format;
            match self.resolver.category_slug(value, format).await? {
                Some(category) => {
                    out.slug = Some(format!(
                        "{}{}{}",
                        category.slug,
                        Anchor::CategoryPath.token(),
                        category.full_cpath
                    ));
                    if self.config.category_dir != CategoryDir::Off {
                        out.extension = Some("/");
                    }
                }
                None => self.valid = false,
            }
        } else if self.info_page.is_match(page)
            || page == PAGE_PRODUCT_REVIEWS
            || page == PAGE_PRODUCT_REVIEWS_INFO
        {
            // Remember it for product placement; emitted or suppressed after
            // the walk.
            out.cpath_leaf = Some(
                value
                    .rsplit('_')
                    .next()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),
            );
            out.cpath_raw = Some(value.to_string());
        } else {
            out.passthrough.push(("cPath".to_string(), value.to_string()));
        }
        Ok(())
    }

    async fn take_products_id(
        &mut self,
        page: &str,
        value: &str,
        out: &mut ParsedLink,
    ) -> Result<()> {
        if out.slug.is_some() {
            out.passthrough.push(("products_id".to_string(), value.to_string()));
            return Ok(());
        }

        let id = parse_id(value);
        let anchor = if page == PAGE_PRODUCT_REVIEWS {
            Some(Anchor::ProductReview)
        } else if page == PAGE_PRODUCT_REVIEWS_INFO {
            Some(Anchor::ProductReviewInfo)
        } else if page == self.resolver.host().product_info_page(id).await? {
            Some(Anchor::Product)
        } else {
            None
        };

        let Some(anchor) = anchor else {
            // The id belongs to some other page kind; it rides along as a
            // plain parameter.
            out.passthrough.push(("products_id".to_string(), value.to_string()));
            return Ok(());
        };

        match self.resolver.product_slug(id, out.cpath_leaf).await? {
            Some(slug) => {
                out.slug = Some(format!("{slug}{}{id}", anchor.token()));
                // An attribute-qualified id (`42:d41d8c`) keeps its qualifier
                // as a plain parameter on the details page.
                if matches!(anchor, Anchor::Product) && id.to_string() != value {
                    out.passthrough
                        .push(("products_id".to_string(), value.to_string()));
                }
            }
            None => self.valid = false,
        }
        Ok(())
    }

    /// Normalizes entity-encoding artifacts and splits into ordered pairs,
    /// with any `cPath`/`cpath` pair relocated to the front.
    fn normalized_pairs(&self, parameters: &str) -> Vec<(String, String)> {
        let cleaned = parameters
            .trim_start_matches("amp;")
            .replace("&amp;", "&");

        let mut cpath_value = None;
        let stripped = self
            .cpath_pair
            .replace(&cleaned, |caps: &regex::Captures<'_>| {
                cpath_value = Some(caps[1].to_string());
                String::new()
            })
            .into_owned();

        let mut pairs = Vec::new();
        if let Some(value) = cpath_value {
            pairs.push(("cPath".to_string(), value));
        }
        for pair in stripped.split('&') {
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((key, value)) => pairs.push((key.to_string(), value.to_string())),
                None => pairs.push((pair.to_string(), String::new())),
            }
        }
        pairs
    }

    /// Session-continuation token for a generated link, if one is needed.
    fn session_token(&self, req: &RewriteRequest) -> Option<String> {
        if !req.add_session_id
            || self.config.session.force_cookie_use
            || !self.ctx.session_started
        {
            return None;
        }

        // In front of a page cache, anonymous links carry a placeholder the
        // cache layer substitutes on delivery.
        if self.config.session.page_cache_enabled && !self.ctx.customer_authenticated {
            return Some(format!("{}={SESSION_ID_PLACEHOLDER}", self.ctx.session_name));
        }

        if let Some(token) = &self.ctx.session_token {
            return Some(token.clone());
        }

        // Crossing schemes loses the cookie only when the hosts differ.
        let crossing = req.connection != self.ctx.request_scheme
            && self.ctx.http_domain != self.ctx.https_domain;
        if crossing {
            if let Some(id) = &self.ctx.session_id {
                return Some(format!("{}={id}", self.ctx.session_name));
            }
        }
        None
    }
}

/// A link targeting the front controller itself carries the real page in its
/// `main_page` parameter; fold that back into (page, parameters) form.
fn split_front_controller(page: &str, parameters: &str) -> (String, String) {
    if page != "index.php" && !page.starts_with("index.php?") {
        return (page.to_string(), parameters.to_string());
    }

    let embedded = page.splitn(2, '?').nth(1).unwrap_or("");
    let merged = match (embedded.is_empty(), parameters.is_empty()) {
        (true, _) => parameters.to_string(),
        (false, true) => embedded.to_string(),
        (false, false) => format!("{embedded}&{parameters}"),
    };

    let mut main_page = None;
    let mut rest = Vec::new();
    for pair in merged.split('&') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some(("main_page", value)) if main_page.is_none() => {
                main_page = Some(value.to_string());
            }
            _ => rest.push(pair),
        }
    }
    (
        main_page.unwrap_or_else(|| PAGE_DEFAULT.to_string()),
        rest.join("&"),
    )
}

/// Leading integer of a parameter value; `42:d41d8c` yields 42, garbage 0.
pub(crate) fn parse_id(value: &str) -> i64 {
    value
        .split(':')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Decode then conservatively re-encode a pass-through value, so mixed input
/// encodings come out uniform.
fn reencode(value: &str) -> String {
    let decoded = urlencoding::decode(value)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| value.to_string());
    urlencoding::encode(&decoded).into_owned()
}

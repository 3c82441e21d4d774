//! Canonical-form redirect decisions.
//!
//! Given the URI a client actually requested and the (page, parameters) pair
//! the front controller resolved it to, regenerate the canonical rewritten
//! URL and decide whether to answer with a 301. The comparison is structural:
//! decoded paths, then query parameter sets ignoring order.

use anyhow::Result;
use url::Url;

use crate::anchors::Anchor;
use crate::host::Host;
use crate::rewrite::{parse_id, Rewriter};
use crate::types::{RedirectDecision, RewriteRequest};

/// A requested or generated URI broken into comparable pieces.
struct ParsedUri {
    path: String,
    query: String,
    decoded_path: String,
    /// Decoded key/value pairs, original order.
    pairs: Vec<(String, String)>,
}

impl<H: Host> Rewriter<H> {
    /// Decide whether `requested_uri` should be 301-redirected to the
    /// canonical rewritten form of the current request.
    ///
    /// Never redirects for: a disabled redirector, a foreign-language
    /// session, the admin context, POST requests, physical files, or any
    /// request whose parameters cannot be rewritten at all.
    pub async fn decide(
        &mut self,
        requested_uri: &str,
        req: &RewriteRequest,
    ) -> Result<RedirectDecision> {
        if !self.config().redirect_enabled {
            return Ok(RedirectDecision::stay());
        }
        let ctx = self.context().clone();
        if ctx.language_id != self.config().language_id
            || ctx.is_admin
            || ctx.method_post
            || self.resolver().host().is_physical_file(requested_uri)
        {
            return Ok(RedirectDecision::stay());
        }

        let mut normalized = req.clone();
        normalized.parameters = normalized.parameters.replace("cpath=", "cPath=");
        // Session continuation tokens never belong in a canonical target.
        normalized.add_session_id = false;

        let Some(generated) = self.rewrite_raw(&normalized).await? else {
            return Ok(RedirectDecision::stay());
        };

        let canonical = self.canonical_for(&normalized, ctx.is_admin).await?;

        let Some(generated) = parse_uri(&generated) else {
            return Ok(RedirectDecision::stay());
        };
        let Some(requested) = parse_uri(requested_uri) else {
            // A URI we cannot even parse is by definition not canonical.
            tracing::debug!(requested_uri, "unparseable request uri, redirecting");
            return Ok(redirect_to(&generated));
        };

        if generated.decoded_path != requested.decoded_path {
            match canonical.as_deref().and_then(parse_uri_ref) {
                Some(canonical) if canonical.decoded_path == requested.decoded_path => {
                    // The request sits on the product's canonical path; only
                    // its query can still disqualify it.
                }
                _ => return Ok(redirect_to(&generated)),
            }
        }

        // Parameter sets must match ignoring order; the session parameter
        // and the front controller's own page selector on the requested side
        // are never counted.
        let mut requested_pairs: Vec<(String, String)> = requested
            .pairs
            .into_iter()
            .filter(|(key, _)| *key != ctx.session_name && key != "main_page")
            .collect();
        let mut generated_pairs = generated.pairs.clone();
        requested_pairs.sort();
        generated_pairs.sort();
        if requested_pairs != generated_pairs {
            return Ok(redirect_to(&generated));
        }

        Ok(RedirectDecision::stay())
    }

    /// Canonical full URL for a product details request, when one exists.
    async fn canonical_for(
        &mut self,
        req: &RewriteRequest,
        is_admin: bool,
    ) -> Result<Option<String>> {
        let Some(value) = req
            .parameters
            .split('&')
            .find_map(|pair| pair.strip_prefix("products_id="))
        else {
            return Ok(None);
        };
        let id = parse_id(value);
        if req.page != self.resolver().host().product_info_page(id).await? {
            return Ok(None);
        }
        let Some(slug) = self.resolver().product_canonical(id).await? else {
            return Ok(None);
        };
        let base =
            self.config()
                .server
                .base_for(req.connection, is_admin, req.use_catalog_dir);
        Ok(Some(format!(
            "{base}{slug}{}{id}{}",
            Anchor::Product.token(),
            self.config().url_suffix
        )))
    }
}

fn redirect_to(target: &ParsedUri) -> RedirectDecision {
    RedirectDecision {
        should_redirect: true,
        target_path: target.path.clone(),
        target_query: target.query.clone(),
    }
}

fn parse_uri_ref(uri: &str) -> Option<ParsedUri> {
    parse_uri(uri)
}

/// Split a (possibly relative) URI into decoded comparable parts. Relative
/// URIs are resolved against a throwaway base.
fn parse_uri(uri: &str) -> Option<ParsedUri> {
    let base = Url::parse("http://canonical.invalid/").ok()?;
    let url = base.join(uri).ok()?;
    let path = url.path().to_string();
    let query = url.query().unwrap_or("").to_string();
    let decoded_path = urlencoding::decode(&path)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| path.clone());
    let pairs = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Some(ParsedUri {
        path,
        query,
        decoded_path,
        pairs,
    })
}

#[cfg(test)]
mod tests;

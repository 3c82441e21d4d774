//! Shared request/response types for the rewrite core.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Connection kind a link should be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Plain,
    Secure,
}

/// One request to the rewrite engine. Immutable per call.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    /// Storefront page name (`main_page` value), e.g. `product_info`.
    pub page: String,
    /// Raw parameter string, e.g. `products_id=42&cPath=12_34`.
    pub parameters: String,
    /// Whether the link targets the plain or secure base URL.
    pub connection: ConnectionKind,
    /// Append a session-continuation token when one is needed.
    pub add_session_id: bool,
    /// Prefix the configured catalog directory to the base URL.
    pub use_catalog_dir: bool,
}

impl RewriteRequest {
    /// A storefront link request with the usual defaults: plain connection,
    /// session continuation on, catalog directory prefixed.
    pub fn new(page: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            parameters: parameters.into(),
            connection: ConnectionKind::Plain,
            add_session_id: true,
            use_catalog_dir: true,
        }
    }
}

/// Snapshot of the inbound request the core is running under.
///
/// All of this is owned by the host; the core only reads it. One context is
/// built per request/session and passed to the rewriter at construction.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Language of the session issuing the request.
    pub language_id: i64,
    /// True when running under the administrative context.
    pub is_admin: bool,
    /// Scheme the current request arrived on.
    pub request_scheme: ConnectionKind,
    /// True when the request carried body-form (POST) data.
    pub method_post: bool,
    /// True when a session is active for this request.
    pub session_started: bool,
    /// Session cookie/parameter name, e.g. `sid`.
    pub session_name: String,
    /// Active session id, if any.
    pub session_id: Option<String>,
    /// Pre-formatted `name=id` token the host wants appended verbatim, if any.
    pub session_token: Option<String>,
    /// True when an authenticated customer is attached to the session.
    pub customer_authenticated: bool,
    /// Hostname served over plain HTTP.
    pub http_domain: String,
    /// Hostname served over HTTPS.
    pub https_domain: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            language_id: 1,
            is_admin: false,
            request_scheme: ConnectionKind::Plain,
            method_post: false,
            session_started: false,
            session_name: "sid".to_string(),
            session_id: None,
            session_token: None,
            customer_authenticated: false,
            http_domain: String::new(),
            https_domain: String::new(),
        }
    }
}

/// Outcome of a canonical/redirect decision.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectDecision {
    /// True when the request should be answered with a 301.
    pub should_redirect: bool,
    /// Path component of the canonical target.
    pub target_path: String,
    /// Query component of the canonical target (no leading `?`).
    pub target_query: String,
}

impl RedirectDecision {
    pub fn stay() -> Self {
        Self::default()
    }
}

/// In-memory slug cache, scoped to one request/session.
///
/// This is the deserialized form of a consolidated cache-store payload; it is
/// never shared across concurrent requests and needs no synchronization.
/// Category keys are full underscore-joined ancestor paths so that the same
/// category id is cached uniformly regardless of how it was referenced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameCache {
    pub products: HashMap<i64, String>,
    pub categories: HashMap<String, String>,
    pub manufacturers: HashMap<i64, String>,
    pub pages: HashMap<i64, String>,
}

/// Host-predefined name overrides, checked before any cache or source lookup.
///
/// Categories are keyed by full `cPath` for the same reason as [`NameCache`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    pub products: HashMap<i64, String>,
    #[serde(default)]
    pub categories: HashMap<String, String>,
    #[serde(default)]
    pub manufacturers: HashMap<i64, String>,
    #[serde(default)]
    pub pages: HashMap<i64, String>,
}

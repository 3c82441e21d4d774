use std::sync::Arc;

use crate::config::{CategoryDir, SeoConfig};
use crate::testutil::FixtureHost;
use crate::types::{Overrides, RequestContext, RewriteRequest};

use super::super::rewrite::Rewriter;

fn rewriter_with(
    ctx: RequestContext,
    f: impl FnOnce(&mut SeoConfig),
) -> Rewriter<FixtureHost> {
    rewriter_on(FixtureHost::demo(), ctx, f)
}

fn rewriter_on(
    host: FixtureHost,
    ctx: RequestContext,
    f: impl FnOnce(&mut SeoConfig),
) -> Rewriter<FixtureHost> {
    let mut cfg = SeoConfig::default();
    cfg.short_word_length = 0;
    f(&mut cfg);
    Rewriter::new(Arc::new(cfg), host, None, Overrides::default(), ctx).unwrap()
}

#[tokio::test]
async fn canonical_request_stays_put() {
    let mut rw = rewriter_with(RequestContext::default(), |cfg| {
        cfg.category_dir = CategoryDir::Short;
    });
    let req = RewriteRequest::new("product_info", "products_id=42");
    let decision = rw
        .decide("/shoes-c-12/running-shoe-p-42.html", &req)
        .await
        .unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn legacy_dynamic_uri_redirects_to_the_rewritten_form() {
    let mut rw = rewriter_with(RequestContext::default(), |cfg| {
        cfg.category_dir = CategoryDir::Short;
    });
    let req = RewriteRequest::new("product_info", "products_id=42");
    let decision = rw
        .decide("/index.php?main_page=product_info&products_id=42", &req)
        .await
        .unwrap();
    assert!(decision.should_redirect);
    assert_eq!(decision.target_path, "/shoes-c-12/running-shoe-p-42.html");
    assert_eq!(decision.target_query, "");
}

#[tokio::test]
async fn redirects_even_without_a_canonical_alternative() {
    // Directories off: products have no canonical alternative, so a wrong
    // path redirects as long as the parameters were all resolvable.
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("product_info", "products_id=42");
    let decision = rw.decide("/some-old-name-p-42.html", &req).await.unwrap();
    assert!(decision.should_redirect);
    assert_eq!(decision.target_path, "/running-shoe-p-42.html");
}

#[tokio::test]
async fn invalid_parameters_never_redirect() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("product_info", "products_id=999");
    let decision = rw.decide("/ghost-product-p-999.html", &req).await.unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn alternate_category_path_is_accepted_via_the_canonical() {
    // The link was generated through category 34, but the request came in on
    // the master-category (canonical) path; that path is not redirected.
    let mut rw = rewriter_with(RequestContext::default(), |cfg| {
        cfg.category_dir = CategoryDir::Short;
    });
    let req = RewriteRequest::new("product_info", "products_id=42&cPath=34");
    let decision = rw
        .decide("/shoes-c-12/running-shoe-p-42.html", &req)
        .await
        .unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn home_page_request_is_not_redirected() {
    // A bare home link regenerates to the base URL alone, so `/` is already
    // canonical.
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("index", "");
    assert!(!rw.decide("/", &req).await.unwrap().should_redirect);
}

#[tokio::test]
async fn query_comparison_ignores_order() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("index", "sort=price&page=2&cPath=12");
    let decision = rw
        .decide("/shoes-c-12.html?page=2&sort=price", &req)
        .await
        .unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn extra_or_missing_parameters_redirect() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("index", "cPath=12&sort=price");
    let decision = rw
        .decide("/shoes-c-12.html?sort=price&stray=1", &req)
        .await
        .unwrap();
    assert!(decision.should_redirect);
    assert_eq!(decision.target_path, "/shoes-c-12.html");
    assert_eq!(decision.target_query, "sort=price");

    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let decision = rw.decide("/shoes-c-12.html", &req).await.unwrap();
    assert!(decision.should_redirect);
}

#[tokio::test]
async fn session_parameter_on_the_request_is_ignored() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("index", "cPath=12");
    let decision = rw
        .decide("/shoes-c-12.html?sid=abc123", &req)
        .await
        .unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn lowercase_cpath_is_normalized_before_comparison() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("index", "cpath=12");
    let decision = rw.decide("/shoes-c-12.html", &req).await.unwrap();
    assert!(!decision.should_redirect);
}

#[tokio::test]
async fn early_outs_never_redirect() {
    let req = RewriteRequest::new("product_info", "products_id=42");

    let mut rw = rewriter_with(RequestContext::default(), |cfg| {
        cfg.redirect_enabled = false;
    });
    assert!(!rw.decide("/wrong.html", &req).await.unwrap().should_redirect);

    let ctx = RequestContext { language_id: 2, ..RequestContext::default() };
    let mut rw = rewriter_with(ctx, |_| {});
    assert!(!rw.decide("/wrong.html", &req).await.unwrap().should_redirect);

    let ctx = RequestContext { is_admin: true, ..RequestContext::default() };
    let mut rw = rewriter_with(ctx, |_| {});
    assert!(!rw.decide("/wrong.html", &req).await.unwrap().should_redirect);

    let ctx = RequestContext { method_post: true, ..RequestContext::default() };
    let mut rw = rewriter_with(ctx, |_| {});
    assert!(!rw.decide("/wrong.html", &req).await.unwrap().should_redirect);

    let mut host = FixtureHost::demo();
    host.physical.insert("/download/file.pdf".to_string());
    let mut rw = rewriter_on(host, RequestContext::default(), |_| {});
    assert!(!rw
        .decide("/download/file.pdf", &req)
        .await
        .unwrap()
        .should_redirect);
}

#[tokio::test]
async fn unparseable_request_uri_redirects_to_canonical() {
    let mut rw = rewriter_with(RequestContext::default(), |_| {});
    let req = RewriteRequest::new("product_info", "products_id=42");
    let decision = rw.decide("http://[broken", &req).await.unwrap();
    assert!(decision.should_redirect);
    assert_eq!(decision.target_path, "/running-shoe-p-42.html");
}

#[tokio::test]
async fn accepted_uri_round_trips_through_rewrite() {
    // Redirect symmetry: a URI the decider accepts regenerates to itself.
    let mut rw = rewriter_with(RequestContext::default(), |cfg| {
        cfg.category_dir = CategoryDir::Short;
    });
    let req = RewriteRequest::new("product_info", "products_id=42");
    let uri = "/shoes-c-12/running-shoe-p-42.html";
    assert!(!rw.decide(uri, &req).await.unwrap().should_redirect);

    let regenerated = rw.rewrite(&req).await.unwrap().unwrap();
    assert_eq!(format!("/{regenerated}"), uri);
}

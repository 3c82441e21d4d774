//! Slug anchor tokens.
//!
//! Every rewritten URL carries exactly one anchor separating the slug text
//! from the entity id, e.g. `running-shoe-p-42.html`. The token identifies
//! the entity kind when the URL is later parsed back by the storefront's
//! front controller, so these values are process-wide constants.

/// Entity kinds that can define the base slug of a rewritten URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Product details page (`products_id`).
    Product,
    /// Category listing (`cPath`, underscore-joined ancestor chain).
    CategoryPath,
    /// Manufacturer listing (`manufacturers_id`).
    Manufacturer,
    /// Product popup image (`pID`).
    PopupImage,
    /// Listing of a product's reviews.
    ProductReview,
    /// A single review's detail page.
    ProductReviewInfo,
    /// Static page (`id`).
    StaticPage,
}

impl Anchor {
    /// The fixed separator token between slug and id.
    pub fn token(self) -> &'static str {
        match self {
            Anchor::Product => "-p-",
            Anchor::CategoryPath => "-c-",
            Anchor::Manufacturer => "-m-",
            Anchor::PopupImage => "-pi-",
            Anchor::ProductReview => "-pr-",
            Anchor::ProductReviewInfo => "-pri-",
            Anchor::StaticPage => "-ezp-",
        }
    }
}

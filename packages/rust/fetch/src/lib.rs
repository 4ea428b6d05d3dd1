//! Source page fetching and site indexing for copydesk.
//!
//! [`ArticleFetcher`] turns one URL into a normalized [`SourceDocument`]
//! (title, meta description, headings, images, readable body text).
//! [`site_index`] builds the internal-link candidate list from a site's
//! sitemap. Both talk HTTP; neither retries, so a failed call is final
//! for its caller.

mod article;
mod sitemap;

pub use article::ArticleFetcher;
pub use sitemap::site_index;

pub use copydesk_shared::SourceDocument;

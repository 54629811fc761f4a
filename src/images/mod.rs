//! Cover image handling.
//!
//! Catalog posters are normally stored by URL. In binary cover mode they are
//! downloaded, fitted to the site's cover size and uploaded to the content
//! store instead; see [`CoverFetcher`].

mod cover;

pub use cover::CoverFetcher;

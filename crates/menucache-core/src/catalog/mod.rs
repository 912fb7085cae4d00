//! Menu catalog.
//!
//! `CatalogStore` holds the menu items loaded for the session and exposes
//! the filtered views the menu screen renders: by category, by name, and
//! the specials bar.

pub mod error;
pub mod store;

pub use error::CatalogError;
pub use store::{fetch_catalog, CatalogStore, ALL_CATEGORIES};

//! Data models for menu entities.
//!
//! - `MenuItem`: a dish as delivered by the menu data endpoint
//! - `Tag`: badges attached to items (new, popular, bestseller, ...)

pub mod menu;

pub use menu::{normalize_category, MenuItem, Tag};

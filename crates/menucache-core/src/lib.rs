//! Core library for menucache.
//!
//! - `catalog`: the menu item collection and its category/name filters
//! - `gateway`: cache-first offline gateway for every outbound GET
//! - `order`: order drafts and the WhatsApp deep link
//! - `config`: user configuration and environment overrides
//! - `models`: menu data types
//! - `utils`: display formatting helpers

pub mod catalog;
pub mod config;
pub mod gateway;
pub mod models;
pub mod order;
pub mod utils;

//! Tote Core - Shared domain types.
//!
//! This crate provides the value types used across all Tote components:
//! - `tote-client` - Cart store, catalog client, and identity client
//! - `tote-cli` - Command-line storefront
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product IDs, prices, and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

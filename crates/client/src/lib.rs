//! Tote storefront client library.
//!
//! The cart store, catalog client, and identity client behind the `tote`
//! front end, provided as a library so they can be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod state;
pub mod storage;

pub use error::{Result, ToteError};
pub use state::AppContext;

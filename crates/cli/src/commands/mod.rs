//! Subcommand implementations.
//!
//! Output goes through `tracing::info!` so it respects the log filter.

pub mod account;
pub mod cart;
pub mod catalog;

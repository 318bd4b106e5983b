//! QuickBite Core - Shared types library.
//!
//! This crate provides common types used across all QuickBite components:
//! - `client` - Customer/rider-facing ordering client core
//! - `integration-tests` - Cross-crate journey tests
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no async. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, roles,
//!   and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

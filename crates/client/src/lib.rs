//! QuickBite client core.
//!
//! The reusable, UI-agnostic core of the QuickBite ordering client:
//!
//! - [`session`] - process-wide authentication/profile state machine
//! - [`cart`] - the shopping basket with its persisted snapshot
//! - [`nav`] - role-gated route access decisions
//! - [`backend`] - interfaces to the hosted backend (auth, rows, realtime,
//!   blob storage) plus the HTTP and in-memory implementations
//! - [`services`] - checkout and rider dashboard flows built on the above
//!
//! # Architecture
//!
//! All business state lives in the hosted backend; this crate holds the only
//! two pieces of genuinely client-owned state - the cart (persisted to a
//! single local snapshot slot) and the cached session - and the pure
//! decision logic that gates navigation. Page rendering and routing belong
//! to the embedding UI layer and are out of scope.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod cart;
pub mod config;
pub mod nav;
pub mod services;
pub mod session;

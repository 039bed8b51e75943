//! GameLink Core - Shared domain types.
//!
//! This crate provides the types shared by every GameLink component:
//! - `server` - The account-linking and commerce HTTP service
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, currency amounts, roles, voucher
//!   codes, verification tokens and goods entries

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

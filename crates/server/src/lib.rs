//! GameLink server library.
//!
//! Links player identities to game accounts, sells catalog items for in-game
//! currency and redeems voucher codes, delivering goods through a game store
//! gateway. Exposed as a library so the router can be tested in-process.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

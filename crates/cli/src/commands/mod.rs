//! CLI command implementations.

pub mod balance;
pub mod migrate;
pub mod seed;

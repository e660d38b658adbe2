//! Persistence contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define repository traits consumed by services.
//! - Keep SQL inside this module tree.

pub mod account_repo;
pub mod entity_repo;

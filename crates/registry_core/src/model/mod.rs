//! Registry domain model.
//!
//! # Responsibility
//! - Describe the six registry entities and their relations (`entity`).
//! - Define the read models handed to callers (`record`).
//! - Validate and normalize write payloads before storage (`validate`).
//!
//! # Invariants
//! - Lookup entities have no outgoing foreign keys.
//! - Dependent entities reference lookups (and, for namboodiri, an illam)
//!   through required foreign keys.

pub mod entity;
pub mod record;
pub mod validate;

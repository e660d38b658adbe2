//! Core domain logic for the community registry.
//! This crate is the single source of truth for registry invariants.

pub mod auth;
pub mod db;
pub mod error;
pub mod guard;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use auth::{AuthError, CurrentUser, Session, UserRecord, UserRole};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::ErrorKind;
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::entity::{EntityKind, NAME_MAX_CHARS};
pub use model::record::{Illam, IllamRecord, LookupRecord, Namboodiri, Record, RecordId};
pub use model::validate::{parse_record_id, ValidationError};
pub use repo::account_repo::{AccountRepository, SqliteAccountRepository};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use service::auth_service::{
    AdminBootstrap, AuthService, DEFAULT_SESSION_TTL, MAX_SESSION_TTL,
};
pub use service::registry_service::{ConflictReason, RegistryService, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Registry use-case service.
//!
//! # Responsibility
//! - Provide list/get/create/update/delete for every entity kind.
//! - Run validation, reference checks and delete guards in a fixed order.
//! - Read written rows back so callers always get relations inlined.
//!
//! # Invariants
//! - Every operation requires a `CurrentUser`.
//! - Check-then-write sequences run inside one repository transaction.
//! - Update of a missing row reports not-found before any reference check.
//! - Nothing is written when any check fails.

use crate::auth::CurrentUser;
use crate::guard::{check_delete, check_references, GuardError};
use crate::model::entity::EntityKind;
use crate::model::record::{Record, RecordId};
use crate::model::validate::{validate_payload, ValidationError};
use crate::repo::entity_repo::{EntityRepository, RepoError};
use log::{error, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a write conflicts with existing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// `(nameEn, nameMl)` already taken.
    DuplicateName(EntityKind),
    /// Delete blocked by dependents.
    Referenced {
        kind: EntityKind,
        dependent: EntityKind,
    },
    /// The store rejected the write on a constraint the guards did not see.
    ConstraintViolation(EntityKind),
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName(kind) => {
                let article = match kind.label().chars().next() {
                    Some('a' | 'e' | 'i' | 'o' | 'u') => "An",
                    _ => "A",
                };
                write!(f, "{article} {kind} with this name already exists")
            }
            Self::Referenced { kind, dependent } => write!(
                f,
                "Cannot delete {kind} as it is being used by {}",
                dependent.plural()
            ),
            Self::ConstraintViolation(kind) => {
                write!(f, "Cannot modify {kind} due to a related record")
            }
        }
    }
}

/// Service error for registry use-cases.
#[derive(Debug)]
pub enum ServiceError {
    /// Input failed field or reference validation.
    Validation(ValidationError),
    /// Target row does not exist.
    NotFound { kind: EntityKind, id: RecordId },
    /// Write would violate uniqueness or integrity.
    Conflict(ConflictReason),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { kind, .. } => {
                let mut chars = kind.label().chars();
                match chars.next() {
                    Some(first) => {
                        write!(f, "{}{} not found", first.to_uppercase(), chars.as_str())
                    }
                    None => write!(f, "not found"),
                }
            }
            Self::Conflict(reason) => write!(f, "{reason}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent registry state: {details}")
            }
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::NotFound { kind, id },
            RepoError::Duplicate(kind) => Self::Conflict(ConflictReason::DuplicateName(kind)),
            RepoError::ForeignKeyViolation(kind) => {
                Self::Conflict(ConflictReason::ConstraintViolation(kind))
            }
            other => Self::Repo(other),
        }
    }
}

impl From<GuardError> for ServiceError {
    fn from(value: GuardError) -> Self {
        match value {
            GuardError::InvalidReference(kind) => {
                Self::Validation(ValidationError::InvalidReference(kind))
            }
            GuardError::Referenced {
                kind, dependent, ..
            } => Self::Conflict(ConflictReason::Referenced { kind, dependent }),
            GuardError::Repo(err) => err.into(),
        }
    }
}

/// Registry service facade over an entity repository.
pub struct RegistryService<R: EntityRepository> {
    repo: R,
}

impl<R: EntityRepository> RegistryService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists every row of `kind`, sorted by English name.
    pub fn list(
        &self,
        _user: &CurrentUser,
        kind: EntityKind,
    ) -> Result<Vec<Record>, ServiceError> {
        Ok(self.repo.list(kind)?)
    }

    /// Loads one row with relations inlined.
    pub fn get(
        &self,
        _user: &CurrentUser,
        kind: EntityKind,
        id: RecordId,
    ) -> Result<Record, ServiceError> {
        self.repo
            .get(kind, id)?
            .ok_or(ServiceError::NotFound { kind, id })
    }

    /// Validates `payload`, checks its references and inserts one row.
    pub fn create(
        &self,
        user: &CurrentUser,
        kind: EntityKind,
        payload: &Value,
    ) -> Result<Record, ServiceError> {
        let draft = validate_payload(kind, payload)?;
        let result = self.repo.in_transaction(|repo| -> Result<Record, ServiceError> {
            check_references(repo, &draft)?;
            let id = repo.insert(&draft)?;
            repo.get(kind, id)?
                .ok_or(ServiceError::InconsistentState("created row not found in read-back"))
        });
        log_write("entity_create", kind, None, user, &result);
        result
    }

    /// Replaces every writable field of row `id`.
    pub fn update(
        &self,
        user: &CurrentUser,
        kind: EntityKind,
        id: RecordId,
        payload: &Value,
    ) -> Result<Record, ServiceError> {
        let draft = validate_payload(kind, payload)?;
        let result = self.repo.in_transaction(|repo| -> Result<Record, ServiceError> {
            if !repo.exists(kind, id)? {
                return Err(ServiceError::NotFound { kind, id });
            }
            check_references(repo, &draft)?;
            repo.update(id, &draft)?;
            repo.get(kind, id)?
                .ok_or(ServiceError::InconsistentState("updated row not found in read-back"))
        });
        log_write("entity_update", kind, Some(id), user, &result);
        result
    }

    /// Deletes row `id` unless a dependent still references it.
    pub fn delete(
        &self,
        user: &CurrentUser,
        kind: EntityKind,
        id: RecordId,
    ) -> Result<(), ServiceError> {
        let result = self.repo.in_transaction(|repo| -> Result<(), ServiceError> {
            if !repo.exists(kind, id)? {
                return Err(ServiceError::NotFound { kind, id });
            }
            check_delete(repo, kind, id)?;
            repo.delete(kind, id)?;
            Ok(())
        });
        match &result {
            Ok(()) => info!(
                "event=entity_delete module=service status=ok entity={} id={} user_id={}",
                kind,
                id,
                user.user_id()
            ),
            Err(err) => warn!(
                "event=entity_delete module=service status=rejected entity={} id={} user_id={} error={}",
                kind,
                id,
                user.user_id(),
                err
            ),
        }
        result
    }
}

fn log_write(
    event: &str,
    kind: EntityKind,
    requested_id: Option<RecordId>,
    user: &CurrentUser,
    result: &Result<Record, ServiceError>,
) {
    match result {
        Ok(record) => info!(
            "event={} module=service status=ok entity={} id={} user_id={}",
            event,
            kind,
            record.id(),
            user.user_id()
        ),
        Err(ServiceError::Repo(err)) => error!(
            "event={} module=service status=error entity={} user_id={} error={}",
            event,
            kind,
            user.user_id(),
            err
        ),
        Err(err) => warn!(
            "event={} module=service status=rejected entity={} id={} user_id={} error={}",
            event,
            kind,
            requested_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            user.user_id(),
            err
        ),
    }
}

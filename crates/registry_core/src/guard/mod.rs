//! Referential-integrity and delete guards.
//!
//! # Responsibility
//! - Confirm every foreign key of a draft points at an existing row.
//! - Refuse deletes while dependent rows still reference the target.
//!
//! # Invariants
//! - Reference checks run in catalogue order; the first failure wins.
//! - Delete guards come from `DELETE_GUARDS`; deletes never cascade.
//! - Guards only read. Callers run them inside the same transaction as the
//!   write they protect.

use crate::model::entity::EntityKind;
use crate::model::record::RecordId;
use crate::model::validate::{EntityDraft, ValidationError};
use crate::repo::entity_repo::{EntityRepository, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons a guard blocks a write.
#[derive(Debug)]
pub enum GuardError {
    /// A foreign key names a missing row.
    InvalidReference(EntityKind),
    /// Delete blocked by live dependents.
    Referenced {
        kind: EntityKind,
        dependent: EntityKind,
        count: u64,
    },
    Repo(RepoError),
}

impl Display for GuardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidReference(kind) => {
                write!(f, "{}", ValidationError::InvalidReference(*kind))
            }
            Self::Referenced {
                kind, dependent, ..
            } => write!(
                f,
                "Cannot delete {kind} as it is being used by {}",
                dependent.plural()
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GuardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GuardError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Checks that each foreign key in `draft` resolves to an existing row.
pub fn check_references<R: EntityRepository>(
    repo: &R,
    draft: &EntityDraft,
) -> Result<(), GuardError> {
    for (target, id) in draft.references() {
        if !repo.exists(target, id)? {
            return Err(GuardError::InvalidReference(target));
        }
    }
    Ok(())
}

/// Checks that no dependent row references `kind` row `id`.
pub fn check_delete<R: EntityRepository>(
    repo: &R,
    kind: EntityKind,
    id: RecordId,
) -> Result<(), GuardError> {
    for guard in kind.delete_guards() {
        let count = repo.count_references(guard, id)?;
        if count > 0 {
            return Err(GuardError::Referenced {
                kind,
                dependent: guard.dependent,
                count,
            });
        }
    }
    Ok(())
}

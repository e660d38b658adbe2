//! Accounts, sessions and the typed current-user identity.
//!
//! # Responsibility
//! - Define `CurrentUser`, the proof that a request carries a live session.
//! - Hash and verify passwords.
//! - Provide account/session use-cases through `service::auth_service`.
//!
//! # Invariants
//! - `CurrentUser` is only constructed by resolving a stored, unexpired
//!   session; callers outside this crate cannot fabricate one.
//! - Password hashes and session tokens are never logged.

pub mod password;

use crate::model::record::RecordId;
use crate::repo::entity_repo::RepoError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Account role. Every authenticated role may use every registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<UserRole> {
        match value {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Public account view; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: RecordId,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
    pub created_at: i64,
}

/// Authenticated identity injected into every registry operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    user: UserRecord,
    session_token: String,
}

impl CurrentUser {
    pub(crate) fn new(user: UserRecord, session_token: String) -> Self {
        Self {
            user,
            session_token,
        }
    }

    pub fn user_id(&self) -> RecordId {
        self.user.id
    }

    pub fn email(&self) -> &str {
        self.user.email.as_str()
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub(crate) fn session_token(&self) -> &str {
        self.session_token.as_str()
    }
}

/// Issued login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
    pub user: UserRecord,
}

/// Errors from account and session use-cases.
#[derive(Debug)]
pub enum AuthError {
    /// Missing, unknown or expired session.
    Unauthorized,
    /// Email/password pair did not match. Does not say which half failed.
    InvalidCredentials,
    /// Malformed account input (blank email, empty password).
    InvalidInput(String),
    /// An account with this email already exists.
    UserExists(String),
    /// Password hashing backend failure.
    Hash(String),
    Repo(RepoError),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "Unauthorized"),
            Self::InvalidCredentials => write!(f, "Invalid email or password"),
            Self::InvalidInput(message) => write!(f, "{message}"),
            Self::UserExists(email) => write!(f, "user already exists: {email}"),
            Self::Hash(message) => write!(f, "{message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AuthError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

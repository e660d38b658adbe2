//! Account and session use-case service.
//!
//! # Responsibility
//! - Exchange email/password for a session token and back for a user.
//! - Create accounts, including the idempotent admin bootstrap.
//!
//! # Invariants
//! - Emails are trimmed and lowercased before every lookup and insert.
//! - Unknown email and wrong password fail identically.
//! - Tokens are random UUIDv4 strings; they are never logged.

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, CurrentUser, Session, UserRecord, UserRole};
use crate::repo::account_repo::AccountRepository;
use log::{info, warn};
use std::time::Duration;
use uuid::Uuid;

/// Default lifetime of a login session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest accepted session lifetime; larger values are clamped.
pub const MAX_SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Outcome of `ensure_admin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminBootstrap {
    Created(UserRecord),
    AlreadyExists(UserRecord),
}

/// Auth service facade over an account repository.
pub struct AuthService<R: AccountRepository> {
    repo: R,
    session_ttl: Duration,
}

impl<R: AccountRepository> AuthService<R> {
    pub fn new(repo: R, session_ttl: Duration) -> Self {
        Self {
            repo,
            session_ttl: session_ttl.min(MAX_SESSION_TTL),
        }
    }

    /// Verifies credentials and issues a new session.
    pub fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let Some(credentials) = self.repo.find_credentials(email.as_str())? else {
            warn!("event=auth_login module=auth status=rejected reason=unknown_email");
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, credentials.password_hash.as_str())? {
            warn!(
                "event=auth_login module=auth status=rejected reason=bad_password user_id={}",
                credentials.user.id
            );
            return Err(AuthError::InvalidCredentials);
        }

        let token = Uuid::new_v4().to_string();
        let ttl_ms = session_ttl_ms(self.session_ttl);
        let expires_at = self
            .repo
            .insert_session(token.as_str(), credentials.user.id, ttl_ms)?;
        info!(
            "event=auth_login module=auth status=ok user_id={} expires_at={}",
            credentials.user.id, expires_at
        );
        Ok(Session {
            token,
            expires_at,
            user: credentials.user,
        })
    }

    /// Resolves a bearer token to the current user.
    pub fn resolve(&self, token: Option<&str>) -> Result<CurrentUser, AuthError> {
        let token = token.map(str::trim).filter(|value| !value.is_empty());
        let Some(token) = token else {
            return Err(AuthError::Unauthorized);
        };
        match self.repo.find_session_user(token)? {
            Some(user) => Ok(CurrentUser::new(user, token.to_string())),
            None => Err(AuthError::Unauthorized),
        }
    }

    /// Ends the session `user` was resolved from.
    pub fn logout(&self, user: &CurrentUser) -> Result<(), AuthError> {
        self.repo.delete_session(user.session_token())?;
        info!(
            "event=auth_logout module=auth status=ok user_id={}",
            user.user_id()
        );
        Ok(())
    }

    /// Creates one account with a freshly hashed password.
    pub fn create_user(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
        role: UserRole,
    ) -> Result<UserRecord, AuthError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AuthError::InvalidInput("email must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput(
                "password must not be empty".to_string(),
            ));
        }
        if self.repo.find_credentials(email.as_str())?.is_some() {
            return Err(AuthError::UserExists(email));
        }

        let name = name.map(str::trim).filter(|value| !value.is_empty());
        let password_hash = hash_password(password)?;
        let user = self
            .repo
            .insert_user(email.as_str(), name, role, password_hash.as_str())?;
        info!(
            "event=user_create module=auth status=ok user_id={} role={}",
            user.id,
            role.as_str()
        );
        Ok(user)
    }

    /// Creates an admin account unless one with this email already exists.
    pub fn ensure_admin(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AdminBootstrap, AuthError> {
        let normalized = normalize_email(email);
        if let Some(existing) = self.repo.find_credentials(normalized.as_str())? {
            info!(
                "event=admin_bootstrap module=auth status=skipped user_id={}",
                existing.user.id
            );
            return Ok(AdminBootstrap::AlreadyExists(existing.user));
        }
        self.create_user(email, password, name, UserRole::Admin)
            .map(AdminBootstrap::Created)
    }

    /// Removes expired sessions; returns how many were deleted.
    pub fn purge_expired_sessions(&self) -> Result<u64, AuthError> {
        let removed = self.repo.delete_expired_sessions()?;
        if removed > 0 {
            info!("event=session_purge module=auth status=ok removed={removed}");
        }
        Ok(removed)
    }
}

fn session_ttl_ms(ttl: Duration) -> i64 {
    let clamped = ttl.min(MAX_SESSION_TTL).as_millis();
    i64::try_from(clamped).unwrap_or(i64::MAX)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

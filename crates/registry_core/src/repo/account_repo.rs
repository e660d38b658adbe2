//! Account and session repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist users and their login sessions.
//! - Resolve a session token to its user while the session is live.
//!
//! # Invariants
//! - Emails are stored as given; callers normalize before lookup/insert.
//! - Session expiry is compared against SQLite's clock, in epoch ms.

use crate::auth::{UserRecord, UserRole};
use crate::model::record::RecordId;
use crate::repo::entity_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NOW_MS_SQL: &str = "(strftime('%s', 'now') * 1000)";

/// User row plus its stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub user: UserRecord,
    pub password_hash: String,
}

/// Repository interface for accounts and sessions.
pub trait AccountRepository {
    /// Finds a user and its password hash by exact email.
    fn find_credentials(&self, email: &str) -> RepoResult<Option<StoredCredentials>>;
    /// Inserts one user and returns it.
    fn insert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
        password_hash: &str,
    ) -> RepoResult<UserRecord>;
    /// Stores a session valid for `ttl_ms` and returns its expiry (epoch ms).
    fn insert_session(&self, token: &str, user_id: RecordId, ttl_ms: i64) -> RepoResult<i64>;
    /// Returns the user owning a live (unexpired) session.
    fn find_session_user(&self, token: &str) -> RepoResult<Option<UserRecord>>;
    /// Deletes one session; returns whether it existed.
    fn delete_session(&self, token: &str) -> RepoResult<bool>;
    /// Deletes every expired session; returns how many were removed.
    fn delete_expired_sessions(&self) -> RepoResult<u64>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn find_credentials(&self, email: &str) -> RepoResult<Option<StoredCredentials>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, email, name, role, created_at, password_hash
             FROM users
             WHERE email = ?1;",
        )?;
        let mut rows = stmt.query([email])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(StoredCredentials {
                user: parse_user_row(row)?,
                password_hash: row.get("password_hash")?,
            }));
        }
        Ok(None)
    }

    fn insert_user(
        &self,
        email: &str,
        name: Option<&str>,
        role: UserRole,
        password_hash: &str,
    ) -> RepoResult<UserRecord> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO users (email, name, role, password_hash)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, email, name, role, created_at;",
        )?;
        let mut rows = stmt.query(params![email, name, role.as_str(), password_hash])?;
        let user = match rows.next()? {
            Some(row) => parse_user_row(row)?,
            None => {
                return Err(RepoError::InvalidData(
                    "user insert returned no row".to_string(),
                ))
            }
        };
        Ok(user)
    }

    fn insert_session(&self, token: &str, user_id: RecordId, ttl_ms: i64) -> RepoResult<i64> {
        let expires_at: i64 = self.conn.query_row(
            &format!(
                "INSERT INTO sessions (token, user_id, expires_at)
                 VALUES (?1, ?2, {NOW_MS_SQL} + ?3)
                 RETURNING expires_at;"
            ),
            params![token, user_id, ttl_ms],
            |row| row.get(0),
        )?;
        Ok(expires_at)
    }

    fn find_session_user(&self, token: &str) -> RepoResult<Option<UserRecord>> {
        let user = self
            .conn
            .query_row(
                &format!(
                    "SELECT u.id AS id,
                            u.email AS email,
                            u.name AS name,
                            u.role AS role,
                            u.created_at AS created_at
                     FROM sessions s
                     INNER JOIN users u ON u.id = s.user_id
                     WHERE s.token = ?1
                       AND s.expires_at > {NOW_MS_SQL};"
                ),
                [token],
                |row| Ok(parse_user_row(row)),
            )
            .optional()?;
        user.transpose()
    }

    fn delete_session(&self, token: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(changed > 0)
    }

    fn delete_expired_sessions(&self) -> RepoResult<u64> {
        let changed = self.conn.execute(
            &format!("DELETE FROM sessions WHERE expires_at <= {NOW_MS_SQL};"),
            [],
        )?;
        Ok(changed as u64)
    }
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<UserRecord> {
    let role_text: String = row.get("role")?;
    let role = UserRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in users.role"))
    })?;
    Ok(UserRecord {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        role,
        created_at: row.get("created_at")?,
    })
}

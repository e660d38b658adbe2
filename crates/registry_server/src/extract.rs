//! Request extractors.
//!
//! - `Authenticated`: access boundary, turns a bearer token into a `CurrentUser`.
//! - `RecordIdPath`: the `:id` path segment as a positive record id.

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRequestParts, Path};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use registry_core::{
    parse_record_id, AuthService, CurrentUser, RecordId, SqliteAccountRepository,
    ValidationError,
};

const BEARER_PREFIX: &str = "bearer ";

/// Resolved session of the caller. Rejects with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct Authenticated(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts);
        let ttl = state.session_ttl();
        let user = state
            .with_conn(move |conn| {
                AuthService::new(SqliteAccountRepository::new(conn), ttl)
                    .resolve(token.as_deref())
            })
            .await?;
        Ok(Self(user))
    }
}

/// Record id from the `:id` segment. Any rejection, including a segment
/// that is not valid UTF-8, becomes a 400 envelope.
#[derive(Debug, Clone, Copy)]
pub struct RecordIdPath(pub RecordId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RecordIdPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(raw)) => Ok(Self(parse_record_id(raw.as_str())?)),
            Err(_) => {
                let raw = parts.uri.path().rsplit('/').next().unwrap_or_default();
                Err(ValidationError::InvalidId(raw.to_string()).into())
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    if value.len() <= BEARER_PREFIX.len()
        || !value[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
    {
        return None;
    }
    Some(value[BEARER_PREFIX.len()..].trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::Request;

    fn token_for(header: Option<&str>) -> Option<String> {
        let mut builder = Request::builder().uri("/gothram");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        bearer_token(&parts)
    }

    #[test]
    fn reads_bearer_token_case_insensitively() {
        assert_eq!(token_for(Some("Bearer abc")), Some("abc".to_string()));
        assert_eq!(token_for(Some("bearer  abc ")), Some("abc".to_string()));
    }

    #[test]
    fn other_schemes_and_missing_header_yield_none() {
        assert_eq!(token_for(None), None);
        assert_eq!(token_for(Some("Basic dXNlcjpwdw==")), None);
        assert_eq!(token_for(Some("Bearer ")), None);
    }
}

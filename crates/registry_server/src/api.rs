//! Route handlers.
//!
//! # Responsibility
//! - Decode path and body input, call one core use-case, encode the result.
//!
//! # Invariants
//! - Bodies are decoded from raw bytes so malformed JSON gets the standard
//!   error envelope instead of a framework rejection.
//! - Path ids are parsed by `RecordIdPath`; a malformed id never reaches
//!   the store.

use crate::error::ApiError;
use crate::extract::{Authenticated, RecordIdPath};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use registry_core::{
    core_version, AuthService, EntityKind, Record, RegistryService, Session,
    SqliteAccountRepository, SqliteEntityRepository, ValidationError,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    success: bool,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<Session>, ApiError> {
    let request: LoginRequest = parse_body(&body)?;
    let missing: Vec<&'static str> = [("email", &request.email), ("password", &request.password)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing).into());
    }
    let ttl = state.session_ttl();
    let session = state
        .with_conn(move |conn| {
            AuthService::new(SqliteAccountRepository::new(conn), ttl)
                .login(request.email.as_str(), request.password.as_str())
        })
        .await?;
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<SuccessResponse>, ApiError> {
    let ttl = state.session_ttl();
    state
        .with_conn(move |conn| {
            AuthService::new(SqliteAccountRepository::new(conn), ttl).logout(&user)
        })
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn list_entities(
    kind: EntityKind,
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<Vec<Record>>, ApiError> {
    let records = state
        .with_conn(move |conn| registry(conn)?.list(&user, kind))
        .await?;
    Ok(Json(records))
}

pub async fn get_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<Record>, ApiError> {
    let record = state
        .with_conn(move |conn| registry(conn)?.get(&user, kind, id))
        .await?;
    Ok(Json(record))
}

pub async fn create_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    body: Bytes,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let payload: Value = parse_body(&body)?;
    let record = state
        .with_conn(move |conn| registry(conn)?.create(&user, kind, &payload))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    RecordIdPath(id): RecordIdPath,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let payload: Value = parse_body(&body)?;
    let record = state
        .with_conn(move |conn| registry(conn)?.update(&user, kind, id, &payload))
        .await?;
    Ok(Json(record))
}

pub async fn delete_entity(
    kind: EntityKind,
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .with_conn(move |conn| registry(conn)?.delete(&user, kind, id))
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

fn registry(
    conn: &rusqlite::Connection,
) -> Result<RegistryService<SqliteEntityRepository<'_>>, registry_core::ServiceError> {
    Ok(RegistryService::new(SqliteEntityRepository::try_new(conn)?))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::InvalidBody("request body is empty".to_string()));
    }
    serde_json::from_slice(body).map_err(|err| ValidationError::InvalidBody(err.to_string()))
}

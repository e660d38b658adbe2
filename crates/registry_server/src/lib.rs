//! HTTP JSON API for the community registry.
//!
//! # Responsibility
//! - Map registry and auth use-cases onto HTTP routes.
//! - Own the shared database handle and run blocking store work off the
//!   async runtime.
//!
//! # Invariants
//! - Every entity route requires a resolved session.
//! - Every failure body is `{ "error": string, "details"?: string }`,
//!   including unknown paths and unsupported methods.

pub mod api;
pub mod error;
pub mod extract;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use log::{error, info};
use registry_core::{
    open_db, AuthService, EntityKind, SqliteAccountRepository, DEFAULT_SESSION_TTL,
};
use rusqlite::Connection;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub use error::ApiError;
pub use extract::{Authenticated, RecordIdPath};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Runtime settings for `serve`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, db_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr,
            db_path: db_path.into(),
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    session_ttl: Duration,
}

impl AppState {
    /// Wraps a migrated connection.
    pub fn new(conn: Connection, session_ttl: Duration) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            session_ttl,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Runs `f` against the connection on the blocking thread pool.
    pub async fn with_conn<T, E, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Connection) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<ApiError>,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| ApiError::internal("database mutex poisoned"))?;
            f(&*conn).map_err(Into::into)
        })
        .await
        .map_err(|err| ApiError::internal(format!("blocking task failed: {err}")))?
    }
}

/// Builds the full route table.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(api::health).fallback(api::method_not_allowed))
        .route("/auth/login", post(api::login).fallback(api::method_not_allowed))
        .route("/auth/logout", post(api::logout).fallback(api::method_not_allowed));

    for kind in EntityKind::ALL {
        router = router
            .route(
                &format!("/{}", kind.label()),
                get(move |state: State<AppState>, user: Authenticated| {
                    api::list_entities(kind, state, user)
                })
                .post(
                    move |state: State<AppState>, user: Authenticated, body: Bytes| {
                        api::create_entity(kind, state, user, body)
                    },
                )
                .fallback(api::method_not_allowed),
            )
            .route(
                &format!("/{}/:id", kind.label()),
                get(
                    move |state: State<AppState>, user: Authenticated, id: RecordIdPath| {
                        api::get_entity(kind, state, user, id)
                    },
                )
                .put(
                    move |state: State<AppState>,
                          user: Authenticated,
                          id: RecordIdPath,
                          body: Bytes| {
                        api::update_entity(kind, state, user, id, body)
                    },
                )
                .delete(
                    move |state: State<AppState>, user: Authenticated, id: RecordIdPath| {
                        api::delete_entity(kind, state, user, id)
                    },
                )
                .fallback(api::method_not_allowed),
            );
    }

    router
        .fallback(api::not_found)
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Opens the database, binds `bind_addr` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(&config.db_path)?;
    let state = AppState::new(conn, config.session_ttl);
    spawn_session_purge(state.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        "event=server_start module=server status=ok addr={} db={}",
        config.bind_addr,
        config.db_path.display()
    );
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=server status=ok");
    Ok(())
}

fn spawn_session_purge(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            // Store failures are logged when converted to `ApiError`.
            let _ = purge_sessions(&state).await;
        }
    });
}

/// Deletes expired sessions once; returns how many were removed.
pub async fn purge_sessions(state: &AppState) -> Result<u64, ApiError> {
    let ttl = state.session_ttl();
    state
        .with_conn(move |conn| {
            AuthService::new(SqliteAccountRepository::new(conn), ttl).purge_expired_sessions()
        })
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("event=server_signal module=server status=error error={err}");
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration_ms = started_at.elapsed().as_millis();
    if status.is_server_error() {
        error!(
            "event=http_request module=server status={} method={} path={} duration_ms={}",
            status.as_u16(),
            method,
            path,
            duration_ms
        );
    } else {
        info!(
            "event=http_request module=server status={} method={} path={} duration_ms={}",
            status.as_u16(),
            method,
            path,
            duration_ms
        );
    }
    response
}

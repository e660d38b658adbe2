use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use registry_core::{
    open_db_in_memory, AuthService, SqliteAccountRepository, UserRole, DEFAULT_SESSION_TTL,
};
use registry_server::{build_router, purge_sessions, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

const EMAIL: &str = "admin@example.org";
const PASSWORD: &str = "correct horse";

fn app() -> Router {
    let conn = open_db_in_memory().unwrap();
    AuthService::new(SqliteAccountRepository::new(&conn), DEFAULT_SESSION_TTL)
        .create_user(EMAIL, PASSWORD, Some("Admin"), UserRole::Admin)
        .unwrap();
    build_router(AppState::new(conn, DEFAULT_SESSION_TTL))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(Body::from(body.unwrap_or_default().to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router) -> String {
    let body = json!({ "email": EMAIL, "password": PASSWORD }).to_string();
    let (status, value) = send(app, Method::POST, "/auth/login", None, Some(&body)).await;
    assert_eq!(status, StatusCode::OK);
    value["token"].as_str().unwrap().to_string()
}

async fn create(app: &Router, token: &str, path: &str, payload: Value) -> Value {
    let (status, value) = send(
        app,
        Method::POST,
        path,
        Some(token),
        Some(&payload.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create {path}: {value}");
    value
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, value) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["status"], "ok");
    assert!(value["version"].as_str().is_some());
}

#[tokio::test]
async fn entity_routes_require_a_session() {
    let app = app();
    for path in [
        "/gothram",
        "/gramam",
        "/vedam",
        "/profession",
        "/illam",
        "/namboodiri",
    ] {
        let (status, value) = send(&app, Method::GET, path, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{path}");
        assert_eq!(value["error"], "Unauthorized");
    }

    let (status, _) = send(
        &app,
        Method::POST,
        "/gothram",
        Some("not-a-session"),
        Some(r#"{"nameEn":"Bhargava","nameMl":"ഭാർഗവ"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = app();
    let body = json!({ "email": EMAIL, "password": "wrong" }).to_string();
    let (status, value) = send(&app, Method::POST, "/auth/login", None, Some(&body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value["error"], "Invalid email or password");

    let (status, value) = send(&app, Method::POST, "/auth/login", None, Some("{}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Missing required fields: email, password");
}

#[tokio::test]
async fn logout_invalidates_the_token() {
    let app = app();
    let token = login(&app).await;

    let (status, value) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "success": true }));

    let (status, _) = send(&app, Method::GET, "/vedam", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lookup_crud_flow() {
    let app = app();
    let token = login(&app).await;

    let created = create(
        &app,
        &token,
        "/gothram",
        json!({ "nameEn": "Bhargava", "nameMl": "ഭാർഗവ" }),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    assert_eq!(created["nameEn"], "Bhargava");
    assert!(created["createdAt"].as_i64().is_some());

    let item = format!("/gothram/{id}");
    let (status, fetched) = send(&app, Method::GET, &item, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &item,
        Some(&token),
        Some(r#"{"nameEn":"Bharadwaja","nameMl":"ഭരദ്വാജ"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id);
    assert_eq!(updated["nameEn"], "Bharadwaja");

    let (status, listed) = send(&app, Method::GET, "/gothram", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, value) = send(&app, Method::DELETE, &item, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value, json!({ "success": true }));

    let (status, value) = send(&app, Method::GET, &item, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "Gothram not found");
}

#[tokio::test]
async fn validation_failures_are_bad_requests() {
    let app = app();
    let token = login(&app).await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/illam",
        Some(&token),
        Some(r#"{"nameEn":"Kidangazhi"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        value["error"],
        "Missing required fields: nameMl, gothramId, gramamId, vedamId"
    );

    let (status, value) = send(
        &app,
        Method::POST,
        "/vedam",
        Some(&token),
        Some(r#"{"nameEn": "Rig", "#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Invalid request body");
    assert!(value["details"].as_str().is_some());

    let (status, value) = send(&app, Method::GET, "/vedam/abc", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Invalid ID: `abc`");

    let (status, _) = send(&app, Method::DELETE, "/vedam/-3", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, value) = send(&app, Method::GET, "/vedam/%FF", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Invalid ID: `%FF`");
}

#[tokio::test]
async fn unsupported_methods_use_the_error_envelope() {
    let app = app();
    let token = login(&app).await;

    let (status, value) = send(&app, Method::PATCH, "/vedam", Some(&token), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(value["error"], "Method not allowed");

    let (status, value) = send(&app, Method::POST, "/vedam/1", Some(&token), None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(value["error"], "Method not allowed");

    let (status, value) = send(&app, Method::GET, "/auth/login", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(value["error"], "Method not allowed");
}

#[tokio::test]
async fn session_purge_removes_only_expired_sessions() {
    let conn = open_db_in_memory().unwrap();
    AuthService::new(SqliteAccountRepository::new(&conn), DEFAULT_SESSION_TTL)
        .create_user(EMAIL, PASSWORD, None, UserRole::Admin)
        .unwrap();
    AuthService::new(SqliteAccountRepository::new(&conn), Duration::ZERO)
        .login(EMAIL, PASSWORD)
        .unwrap();
    let state = AppState::new(conn, DEFAULT_SESSION_TTL);
    let app = build_router(state.clone());
    let live = login(&app).await;

    assert_eq!(purge_sessions(&state).await.unwrap(), 1);
    assert_eq!(purge_sessions(&state).await.unwrap(), 0);
    let (status, _) = send(&app, Method::GET, "/vedam", Some(&live), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn integrity_rules_surface_as_conflicts() {
    let app = app();
    let token = login(&app).await;

    let gothram = create(
        &app,
        &token,
        "/gothram",
        json!({ "nameEn": "Bhargava", "nameMl": "ഭാർഗവ" }),
    )
    .await;
    let gramam = create(
        &app,
        &token,
        "/gramam",
        json!({ "nameEn": "Sukapuram", "nameMl": "ശുകപുരം" }),
    )
    .await;
    let vedam = create(
        &app,
        &token,
        "/vedam",
        json!({ "nameEn": "Rig", "nameMl": "ഋക്" }),
    )
    .await;

    let (status, value) = send(
        &app,
        Method::POST,
        "/gothram",
        Some(&token),
        Some(r#"{"nameEn":"Bhargava","nameMl":"ഭാർഗവ"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(value["error"], "A gothram with this name already exists");

    let mut illam_payload = json!({
        "nameEn": "Kidangazhi",
        "nameMl": "കിടങ്ങഴി",
        "gothramId": gothram["id"],
        "gramamId": gramam["id"],
        "vedamId": 424242
    });
    let (status, value) = send(
        &app,
        Method::POST,
        "/illam",
        Some(&token),
        Some(&illam_payload.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "Invalid vedam selected");
    let (_, listed) = send(&app, Method::GET, "/illam", Some(&token), None).await;
    assert_eq!(listed, json!([]));

    illam_payload["vedamId"] = vedam["id"].clone();
    let illam = create(&app, &token, "/illam", illam_payload).await;
    assert_eq!(illam["gothram"]["nameEn"], "Bhargava");
    assert_eq!(illam["vedam"]["id"], vedam["id"]);

    let (status, value) = send(
        &app,
        Method::DELETE,
        &format!("/gothram/{}", gothram["id"]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        value["error"],
        "Cannot delete gothram as it is being used by illams"
    );
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/gothram/{}", gothram["id"]),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() {
    let app = app();
    let (status, value) = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(value["error"], "Not found");
}

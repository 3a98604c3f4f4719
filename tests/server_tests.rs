//! Integration tests for the HTTP adapter.
//!
//! These use axum-test to drive the router without binding a real socket.

#![cfg(feature = "server")]

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use tempfile::TempDir;

use flatbase::auth::session;
use flatbase::server::{router, AppState};
use flatbase::store::{Resource, Store, Value};

use common::fixture_dir;

/// Test application wrapper that keeps its data directory alive.
struct TestApp {
    server: TestServer,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> anyhow::Result<Self> {
        // Process-wide; the first TestApp installs it.
        let _ = session::init_secret("server-test-secret");
        let dir = fixture_dir();
        let state = AppState::new(Store::open(dir.path())?);
        let server = TestServer::new(router(state))?;
        Ok(Self { server, _dir: dir })
    }
}

fn basic(user: &str, pass: &str) -> String {
    use data_encoding::BASE64;
    format!("Basic {}", BASE64.encode(format!("{user}:{pass}").as_bytes()))
}

// =============================================================================
// Health and public reads
// =============================================================================

#[tokio::test]
async fn test_health() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
    Ok(())
}

#[tokio::test]
async fn test_list_books_is_public() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let response = app.server.get("/api/books").await;
    response.assert_status_ok();
    let books: Vec<Resource> = response.json();
    assert_eq!(books.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_list_sorted_by_query_param() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let response = app.server.get("/api/books").add_query_param("sort", "year").await;
    response.assert_status_ok();
    let books: Vec<Resource> = response.json();
    assert_eq!(books[0]["year"], Value::Number(1949.0));
    assert_eq!(books[1]["year"], Value::Number(2020.0));
    Ok(())
}

#[tokio::test]
async fn test_get_book_public() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let response = app.server.get("/api/books/book1").await;
    response.assert_status_ok();
    let book: Resource = response.json();
    assert_eq!(book["title"], Value::Text("Test Book".into()));

    let response = app.server.get("/api/books/missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

// =============================================================================
// Authentication and authorization
// =============================================================================

#[tokio::test]
async fn test_create_requires_credentials() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let body = serde_json::json!({"title": "New Book"});
    let response = app.server.post("/api/books").json(&body).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = app
        .server
        .post("/api/books")
        .add_header("authorization", basic("alice", "wrongpass"))
        .json(&body)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_create_update_delete_flow() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    // Editor creates
    let body = serde_json::json!({
        "title": "Valid Book",
        "author": "Unknown Author",
        "year": 2023,
        "genres": ["fiction"],
    });
    let response = app
        .server
        .post("/api/books")
        .add_header("authorization", basic("alice", "alicepass"))
        .json(&body)
        .await;
    response.assert_status(StatusCode::CREATED);
    let location = response.header("location");
    let location = location.to_str()?;
    assert!(location.starts_with("/api/books/"));
    let id = location.rsplit('/').next().unwrap().to_string();

    // Everyone can read it back
    let response = app.server.get(location).await;
    response.assert_status_ok();
    let book: Resource = response.json();
    assert_eq!(book["_v"], Value::Number(1.0));
    assert_eq!(book["_id"], Value::Text(id.clone()));

    // Nobody owns it, so even the creator cannot update...
    let patch = serde_json::json!({"title": "Renamed"});
    let response = app
        .server
        .put(location)
        .add_header("authorization", basic("alice", "alicepass"))
        .json(&patch)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    // ...but the admin role can, partially
    let response = app
        .server
        .put(location)
        .add_header("authorization", basic("admin", "admin123"))
        .json(&patch)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    let book: Resource = app.server.get(location).await.json();
    assert_eq!(book["title"], Value::Text("Renamed".into()));
    assert_eq!(book["author"], Value::Text("Unknown Author".into()));
    assert_eq!(book["_v"], Value::Number(2.0));

    // Delete needs admin too
    let response = app.server.delete(location).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let response = app
        .server
        .delete(location)
        .add_header("authorization", basic("admin", "admin123"))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    app.server.get(location).await.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_owner_can_update_via_ownership_field() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let patch = serde_json::json!({"title": "Bob's Edit"});
    let response = app
        .server
        .put("/api/books/book1")
        .add_header("authorization", basic("bob", "bobpass"))
        .json(&patch)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn test_create_invalid_book_is_rejected() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    // Year above the schema's bound
    let body = serde_json::json!({"title": "Book 123", "year": 3000});
    let response = app
        .server
        .post("/api/books")
        .add_header("authorization", basic("alice", "alicepass"))
        .json(&body)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_login_sets_usable_session_cookie() -> anyhow::Result<()> {
    let app = TestApp::new()?;

    let body = serde_json::json!({"username": "alice", "password": "alicepass"});
    let response = app.server.post("/auth/login").json(&body).await;
    response.assert_status(StatusCode::NO_CONTENT);
    let cookie = response.header("set-cookie");
    let cookie = cookie.to_str()?;
    assert!(cookie.starts_with("session="));
    let token = cookie
        .trim_start_matches("session=")
        .split(';')
        .next()
        .unwrap()
        .to_string();

    // The cookie authenticates a create
    let book = serde_json::json!({"title": "Cookie Book"});
    let response = app
        .server
        .post("/api/books")
        .add_header("cookie", format!("session={token}"))
        .json(&book)
        .await;
    response.assert_status(StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let body = serde_json::json!({"username": "alice", "password": "nope"});
    let response = app.server.post("/auth/login").json(&body).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_logout_clears_cookie() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let response = app.server.post("/auth/logout").await;
    response.assert_status(StatusCode::NO_CONTENT);
    let cookie = response.header("set-cookie");
    assert!(cookie.to_str()?.contains("Max-Age=0"));
    Ok(())
}

#[tokio::test]
async fn test_tampered_session_cookie_is_ignored() -> anyhow::Result<()> {
    let app = TestApp::new()?;
    let book = serde_json::json!({"title": "Forged"});
    let response = app
        .server
        .post("/api/books")
        .add_header("cookie", "session=alice:9999999999.AAAAAAAAAAAAAAAA")
        .json(&book)
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

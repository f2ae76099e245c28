use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vault_panel::comms::local_api::{create_router, AppState};
use vault_panel::config::Config;

fn test_config(rate_limit_per_min: usize) -> Arc<Config> {
    Arc::new(Config {
        jwt_secret: Some("http-routes-secret".to_string()),
        rate_limit_per_min,
        ..Config::default()
    })
}

// Router plus a handle on its state for inspecting the stores
fn test_app() -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(test_config(1000)));
    (create_router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/login",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

fn ids(body: &Value) -> Vec<i64> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_post_success() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "user1", "password": "password1"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().unwrap().split('.').count() == 3);
    assert_eq!(body["user"]["id"], 1);
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("secret").is_none());
}

#[tokio::test]
async fn test_login_post_failure() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({"username": "user1", "password": "wrongpass"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Invalid credentials"}));
}

#[tokio::test]
async fn test_login_malformed_body() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "POST", "/login", None, Some(json!({"username": "user1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid arguments"));
}

#[tokio::test]
async fn test_vault_items_requires_token() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/vault/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");
}

#[tokio::test]
async fn test_vault_items_for_user() {
    let (app, _) = test_app();
    let token = login(&app, "user1", "password1").await;
    let (status, body) = send(&app, "GET", "/vault/items", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![1, 3]);
}

#[tokio::test]
async fn test_public_items_anonymous() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/vault/items/public", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![3]);
}

#[tokio::test]
async fn test_search_anonymous_and_owner() {
    let (app, _) = test_app();
    let (status, body) = send(&app, "GET", "/vault/search?searchTerm=user2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), Vec::<i64>::new());

    let token = login(&app, "user2", "password2").await;
    let (_, body) = send(&app, "GET", "/vault/search?searchTerm=user2", Some(&token), None).await;
    assert_eq!(ids(&body), vec![2]);
}

#[tokio::test]
async fn test_search_requires_term() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "GET", "/vault/search", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_item() {
    let (app, state) = test_app();
    let token = login(&app, "user2", "password2").await;
    let (status, body) = send(
        &app,
        "POST",
        "/vault/items",
        Some(&token),
        Some(json!({"content": "new secret", "isPublic": false})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 5);
    assert_eq!(body["ownerId"], 2);
    assert_eq!(body["isPublic"], false);
    assert_eq!(state.policy.items().len().await, 5);
}

#[tokio::test]
async fn test_create_item_anonymous_leaves_store_unchanged() {
    let (app, state) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/vault/items",
        None,
        Some(json!({"content": "sneaky", "isPublic": true})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");
    assert_eq!(state.policy.items().len().await, 4);
}

#[tokio::test]
async fn test_publish_foreign_item_then_visible_publicly() {
    let (app, _) = test_app();
    let token = login(&app, "user1", "password1").await;

    let (status, body) = send(&app, "POST", "/vault/items/2/publish", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ownerId"], 2);
    assert_eq!(body["isPublic"], true);

    let (_, body) = send(&app, "GET", "/vault/items/public", None, None).await;
    assert_eq!(ids(&body), vec![2, 3]);
}

#[tokio::test]
async fn test_publish_errors() {
    let (app, _) = test_app();
    let (status, _) = send(&app, "POST", "/vault/items/2/publish", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "user1", "password1").await;
    let (status, body) = send(&app, "POST", "/vault/items/99/publish", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Vault item 99 not found");

    let (status, _) = send(&app, "POST", "/vault/items/abc/publish", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_operations_endpoint() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "login", "args": {"username": "user2", "password": "password2"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        Some(&token),
        Some(json!({"operation": "vaultItems"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body["data"]), vec![2, 3]);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        Some(&token),
        Some(json!({"operation": "makeVaultItemPublic", "args": {"id": "1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 1);
    assert_eq!(body["data"]["isPublic"], true);
}

#[tokio::test]
async fn test_operations_endpoint_errors() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "dropVault"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown operation: dropVault");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "searchVault", "args": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "createVaultItem", "args": {"content": "x", "isPublic": true}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Not authenticated"}));
}

#[tokio::test]
async fn test_session_checked_before_arguments_on_every_route() {
    let (app, state) = test_app();
    let (status, body) = send(&app, "POST", "/vault/items", None, Some(json!({"content": 5}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "createVaultItem", "args": {"content": 5}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not authenticated");

    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/operations",
        None,
        Some(json!({"operation": "makeVaultItemPublic", "args": {"id": "abc"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "POST", "/vault/items/abc/publish", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.policy.items().len().await, 4);

    let token = login(&app, "user1", "password1").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/v1/operations",
        Some(&token),
        Some(json!({"operation": "createVaultItem", "args": {"content": 5}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "POST", "/vault/items", Some(&token), Some(json!({"content": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limit() {
    let state = Arc::new(AppState::new(test_config(2)));
    let app = create_router(state);

    for _ in 0..2 {
        let (status, _) = send(&app, "GET", "/vault/items/public", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(&app, "GET", "/vault/items/public", None, None).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests");

    // Health is outside the limiter.
    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

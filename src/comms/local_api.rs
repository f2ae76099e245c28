use anyhow::Result;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{ConnectInfo, FromRequestParts, Path, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::VaultError;
use crate::policy::{LoginPayload, OperationRequest, VaultPolicy};
use crate::security::rate_limit::RateLimiter;
use crate::security::{SessionContext, SessionResolver, TokenService};
use crate::store::{CredentialStore, ItemStore, VaultItem};

type SharedState = Arc<AppState>;

// Client IP from ConnectInfo, proxy headers, or 127.0.0.1
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(ClientIp(addr.ip().to_string()));
        }

        for name in ["x-forwarded-for", "x-real-ip"] {
            let ip = parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(str::trim)
                .unwrap_or_default();
            if !ip.is_empty() {
                return Ok(ClientIp(ip.to_string()));
            }
        }

        Ok(ClientIp("127.0.0.1".to_string()))
    }
}

/// Raw `Authorization` header value, if any.
#[derive(Debug, Clone)]
pub struct Credential(pub Option<String>);

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Non-UTF-8 values are kept lossily so they fail verification
        // instead of looking like an absent header.
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        Ok(Credential(raw))
    }
}

#[derive(Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub policy: VaultPolicy,
    pub resolver: SessionResolver,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Builds both stores and the token service from `config`. Expects a
    /// validated config.
    pub fn new(config: Arc<Config>) -> Self {
        let credentials = Arc::new(CredentialStore::new(config.identities.clone()));
        let items = ItemStore::new(config.items.clone());
        let tokens = Arc::new(TokenService::new(config.secret_bytes()));
        debug!(
            identities = credentials.len(),
            items = config.items.len(),
            "vault stores seeded"
        );

        Self {
            policy: VaultPolicy::new(credentials.clone(), items, tokens.clone()),
            resolver: SessionResolver::new(tokens, credentials),
            rate_limiter: RateLimiter::per_minute(config.rate_limit_per_min),
            config,
        }
    }

    fn session(&self, credential: &Credential) -> SessionContext {
        self.resolver.resolve(credential.0.as_deref())
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub content: String,
    pub is_public: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub search_term: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for VaultError {
    fn into_response(self) -> Response {
        let status = match &self {
            VaultError::InvalidCredentials | VaultError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            VaultError::ItemNotFound(_) => StatusCode::NOT_FOUND,
            VaultError::UnknownOperation(_) | VaultError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
            VaultError::Internal(detail) => {
                error!("internal error: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn bad_json(rejection: JsonRejection) -> VaultError {
    VaultError::InvalidArguments(rejection.body_text())
}

fn bad_query(rejection: QueryRejection) -> VaultError {
    VaultError::InvalidArguments(rejection.body_text())
}

// Health check
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn rate_limit(
    State(state): State<SharedState>,
    ClientIp(client_ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    if !state.rate_limiter.allow(&client_ip).await {
        warn!(client_ip = %client_ip, limit = state.rate_limiter.limit(), "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "Too many requests".to_string(),
            }),
        )
            .into_response();
    }
    next.run(request).await
}

// Named-operation dispatch: {"operation": "...", "args": {...}}
async fn operations_handler(
    State(state): State<SharedState>,
    credential: Credential,
    payload: Result<Json<OperationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VaultError> {
    let context = state.session(&credential);
    let Json(request) = payload.map_err(bad_json)?;
    let output = state.policy.execute_request(request, &context).await?;
    Ok(Json(json!({ "data": output })))
}

async fn login_handler(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginPayload>, VaultError> {
    let Json(req) = payload.map_err(bad_json)?;
    Ok(Json(state.policy.login(&req.username, &req.password)?))
}

async fn list_items(
    State(state): State<SharedState>,
    credential: Credential,
) -> Result<Json<Vec<VaultItem>>, VaultError> {
    let context = state.session(&credential);
    Ok(Json(state.policy.vault_items(&context).await?))
}

async fn public_items(State(state): State<SharedState>) -> Json<Vec<VaultItem>> {
    Json(state.policy.public_vault_items().await)
}

async fn search_items(
    State(state): State<SharedState>,
    credential: Credential,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<VaultItem>>, VaultError> {
    let context = state.session(&credential);
    let Query(query) = query.map_err(bad_query)?;
    Ok(Json(state.policy.search_vault(&query.search_term, &context).await))
}

async fn create_item(
    State(state): State<SharedState>,
    credential: Credential,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VaultError> {
    let context = state.session(&credential);
    // session before body, as in every authenticated route
    if context.principal().is_none() {
        return Err(VaultError::NotAuthenticated);
    }
    let Json(req) = payload.map_err(bad_json)?;
    let item = state
        .policy
        .create_vault_item(req.content, req.is_public, &context)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn publish_item(
    State(state): State<SharedState>,
    credential: Credential,
    Path(id): Path<String>,
) -> Result<Json<VaultItem>, VaultError> {
    let context = state.session(&credential);
    if context.principal().is_none() {
        return Err(VaultError::NotAuthenticated);
    }
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| VaultError::InvalidArguments(format!("id {id:?} is not an integer")))?;
    Ok(Json(state.policy.make_vault_item_public(id, &context).await?))
}

pub fn create_router(state: SharedState) -> Router {
    let vault_routes = Router::new()
        .route("/api/v1/operations", post(operations_handler))
        .route("/login", post(login_handler))
        .route("/vault/items", get(list_items).post(create_item))
        .route("/vault/items/public", get(public_items))
        .route("/vault/items/{id}/publish", post(publish_item))
        .route("/vault/search", get(search_items))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health))
        .merge(vault_routes)
        .with_state(state)
}

pub async fn serve(config: Config, port: u16) -> Result<()> {
    let state = Arc::new(AppState::new(Arc::new(config)));
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;
    Ok(())
}

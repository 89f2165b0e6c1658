//! `pactum serve` -- the contract lifecycle HTTP JSON API.
//!
//! axum + tokio, JSON everywhere. Bearer-token auth on every route
//! except /api/health and /api/auth/login, per-IP rate limiting,
//! permissive CORS for local dev, request body size limit.
//!
//! Endpoints:
//! - POST /api/auth/login                        - Issue a bearer token
//! - GET  /api/auth/me                           - The authenticated user
//! - POST /api/auth/change-password              - Change own password
//! - GET  /api/contracts                         - List (filtered, paginated, role-scoped)
//! - POST /api/contracts                         - Create (finance forbidden)
//! - GET/PUT/DELETE /api/contracts/{id}          - Read, edit, delete
//! - POST /api/contracts/{id}/submit | withdraw | approve-finance |
//!        reject-finance | withdraw-finance | approve-admin | reject-admin
//! - GET  /api/contracts/{id}/actions            - Action space for the caller
//! - GET  /api/contracts/{id}/logs               - Audit trail
//! - GET  /api/contracts/{id}/export             - Print-ready contract sheet
//! - GET/POST /api/contracts/{id}/attachments    - List, upload
//! - GET  /api/contracts/{id}/attachments/{aid}  - Download
//! - GET  /api/operations                        - Global log (super_admin)
//! - GET/POST /api/users, PUT/DELETE /api/users/{id} (super_admin)
//! - GET  /api/health                            - Unauthenticated status

mod attachments;
mod contracts;
mod dto;
mod error;
mod export;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{middleware as axum_middleware, Json, Router};
use time::OffsetDateTime;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use pactum_core::{Role, User};
use pactum_storage::{ContractStore as _, LocalBlobStore, MemoryStore};

use crate::auth::{hash_password, TokenSigner};
use crate::config::ServerConfig;

use self::attachments::{
    handle_download_attachment, handle_list_attachments, handle_upload_attachment,
};
use self::contracts::{
    handle_action_space, handle_approve_admin, handle_approve_finance, handle_contract_logs,
    handle_create_contract, handle_delete_contract, handle_get_contract, handle_list_contracts,
    handle_reject_admin, handle_reject_finance, handle_submit, handle_update_contract,
    handle_withdraw, handle_withdraw_finance,
};
use self::export::handle_export_contract;
use self::handlers::{
    handle_change_password, handle_create_user, handle_delete_user, handle_health,
    handle_list_operations, handle_list_users, handle_login, handle_me, handle_not_found,
    handle_update_user,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};

/// Maximum request body size: 20 MB, sized for attachment uploads.
const MAX_BODY_SIZE: usize = 20 * 1024 * 1024;

/// Rate limit window duration in seconds (1 minute).
const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn load_signer(config: &ServerConfig) -> Result<TokenSigner, Box<dyn std::error::Error>> {
    match &config.token_key {
        Some(path) if path.exists() => {
            tracing::info!("loading token signing key from {}", path.display());
            Ok(TokenSigner::from_seed_file(path)?)
        }
        Some(path) => {
            tracing::info!("writing new token signing key to {}", path.display());
            let signer = TokenSigner::generate();
            signer.write_seed_file(path)?;
            Ok(signer)
        }
        None => {
            tracing::warn!(
                "no token key configured; tokens will not survive a restart \
                 (run `pactum keygen` and set PACTUM_TOKEN_KEY)"
            );
            Ok(TokenSigner::generate())
        }
    }
}

/// Seed the bootstrap super-admin when the user directory is empty.
async fn seed_admin(store: &MemoryStore, config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if store.user_count().await? > 0 {
        return Ok(());
    }
    let admin = User {
        id: Uuid::new_v4(),
        username: config.admin_user.clone(),
        role: Role::SuperAdmin,
        password_hash: hash_password(&config.admin_password),
        created_at: OffsetDateTime::now_utc(),
    };
    store.insert_user(admin).await?;
    tracing::info!(username = %config.admin_user, "seeded bootstrap super_admin");
    if config.admin_password == "admin123" {
        tracing::warn!("bootstrap super_admin uses the default password; set PACTUM_ADMIN_PASSWORD");
    }
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/change-password", post(handle_change_password))
        .route(
            "/api/contracts",
            get(handle_list_contracts).post(handle_create_contract),
        )
        .route(
            "/api/contracts/{id}",
            get(handle_get_contract)
                .put(handle_update_contract)
                .delete(handle_delete_contract),
        )
        .route("/api/contracts/{id}/submit", post(handle_submit))
        .route("/api/contracts/{id}/withdraw", post(handle_withdraw))
        .route(
            "/api/contracts/{id}/approve-finance",
            post(handle_approve_finance),
        )
        .route(
            "/api/contracts/{id}/reject-finance",
            post(handle_reject_finance),
        )
        .route(
            "/api/contracts/{id}/withdraw-finance",
            post(handle_withdraw_finance),
        )
        .route(
            "/api/contracts/{id}/approve-admin",
            post(handle_approve_admin),
        )
        .route(
            "/api/contracts/{id}/reject-admin",
            post(handle_reject_admin),
        )
        .route("/api/contracts/{id}/actions", get(handle_action_space))
        .route("/api/contracts/{id}/logs", get(handle_contract_logs))
        .route("/api/contracts/{id}/export", get(handle_export_contract))
        .route(
            "/api/contracts/{id}/attachments",
            get(handle_list_attachments).post(handle_upload_attachment),
        )
        .route(
            "/api/contracts/{id}/attachments/{attachment_id}",
            get(handle_download_attachment),
        )
        .route("/api/operations", get(handle_list_operations))
        .route("/api/users", get(handle_list_users).post(handle_create_user))
        .route(
            "/api/users/{id}",
            put(handle_update_user).delete(handle_delete_user),
        )
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the HTTP server with the given configuration.
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let store = MemoryStore::new();
    seed_admin(&store, &config).await?;
    let signer = load_signer(&config)?;

    tracing::info!("rate limit: {} requests per minute per IP", config.rate_limit);

    let state = Arc::new(AppState {
        store,
        blobs: LocalBlobStore::new(&config.upload_dir),
        signer,
        token_ttl_secs: config.token_ttl_secs,
        rate_limiter: RateLimiter::new(config.rate_limit),
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("pactum listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {}", e);
    }
}

//! Route handlers for health, authentication, the user directory and
//! the global operations log.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use uuid::Uuid;

use pactum_core::{Role, User};
use pactum_storage::{ContractStore as _, OperationLogFilter, UserPatch};

use crate::auth::{hash_password, verify_password};

use super::dto::{
    page_offset, ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse,
    OperationLogQuery, OperationLogView, PageResponse, UpdateUserRequest, UserView,
};
use super::error::ApiError;
use super::state::AppState;
use super::json_error;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /api/health
pub(crate) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn require_super_admin(user: &User) -> Result<(), ApiError> {
    if user.role != Role::SuperAdmin {
        return Err(ApiError::forbidden("super_admin role required"));
    }
    Ok(())
}

/// POST /api/auth/login
///
/// Unknown usernames and wrong passwords yield the same 401 so the
/// response does not leak which usernames exist.
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || ApiError::unauthorized("invalid username or password");
    let user = state
        .store
        .get_user_by_username(&req.username)
        .await
        .map_err(|_| invalid())?;
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = state.signer.issue(&user, state.token_ttl_secs);
    tracing::info!(username = %user.username, "login");
    Ok(Json(LoginResponse {
        token,
        user: user.into(),
    }))
}

/// GET /api/auth/me
pub(crate) async fn handle_me(Extension(user): Extension<User>) -> Json<UserView> {
    Json(user.into())
}

/// POST /api/auth/change-password
pub(crate) async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("current password does not match"));
    }
    if req.new_password.len() < 6 {
        return Err(ApiError::bad_request(
            "new password must be at least 6 characters",
        ));
    }
    state
        .store
        .update_user(
            user.id,
            UserPatch {
                password_hash: Some(hash_password(&req.new_password)),
                role: None,
            },
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users (super_admin)
pub(crate) async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<UserView>>, ApiError> {
    require_super_admin(&user)?;
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// POST /api/users (super_admin)
pub(crate) async fn handle_create_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    require_super_admin(&user)?;
    if req.username.trim().is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }
    if req.password.len() < 6 {
        return Err(ApiError::bad_request(
            "password must be at least 6 characters",
        ));
    }

    let new_user = User {
        id: Uuid::new_v4(),
        username: req.username,
        role: req.role,
        password_hash: hash_password(&req.password),
        created_at: time::OffsetDateTime::now_utc(),
    };
    state.store.insert_user(new_user.clone()).await?;
    tracing::info!(username = %new_user.username, role = %new_user.role, "user created");
    Ok((StatusCode::CREATED, Json(new_user.into())))
}

/// PUT /api/users/{id} (super_admin)
pub(crate) async fn handle_update_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    require_super_admin(&user)?;
    if let Some(password) = &req.password {
        if password.len() < 6 {
            return Err(ApiError::bad_request(
                "password must be at least 6 characters",
            ));
        }
    }
    let patch = UserPatch {
        password_hash: req.password.as_deref().map(hash_password),
        role: req.role,
    };
    let updated = state.store.update_user(user_id, patch).await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/users/{id} (super_admin)
pub(crate) async fn handle_delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_super_admin(&user)?;
    if user_id == user.id {
        return Err(ApiError::bad_request("cannot delete your own account"));
    }
    state.store.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/operations (super_admin) -- the global operations log,
/// newest first, joined with contract numbers.
pub(crate) async fn handle_list_operations(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<OperationLogQuery>,
) -> Result<Json<PageResponse<OperationLogView>>, ApiError> {
    require_super_admin(&user)?;
    let filter = OperationLogFilter {
        contract_id: query.contract_id,
        user_id: query.user_id,
        offset: page_offset(query.page, query.page_size),
        limit: query.page_size,
    };
    let (total, rows) = state.store.list_operation_logs(&filter).await?;
    Ok(Json(PageResponse {
        total,
        items: rows.into_iter().map(OperationLogView::from).collect(),
    }))
}

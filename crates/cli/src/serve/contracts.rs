//! Contract CRUD, workflow actions, the per-contract audit trail and the
//! action-space endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use uuid::Uuid;

use pactum_core::{guards, Actor, OperationLogEntry, User, WorkflowAction};
use pactum_storage::{apply, ContractFilter, ContractStore as _};

use super::dto::{
    page_offset, ActionRequest, ActionSpaceResponse, ContractListQuery, ContractView,
    CreateContractRequest, PageResponse, UpdateContractRequest,
};
use super::error::ApiError;
use super::state::AppState;

/// GET /api/contracts -- filtered, paginated, visibility-scoped.
pub(crate) async fn handle_list_contracts(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ContractListQuery>,
) -> Result<Json<PageResponse<ContractView>>, ApiError> {
    let actor = Actor::from(&user);
    let filter = ContractFilter {
        keyword: query.keyword,
        status: query.status,
        sign_date_from: query.sign_date_from,
        sign_date_to: query.sign_date_to,
        created_by: guards::visible_scope(&actor),
        offset: page_offset(query.page, query.page_size),
        limit: query.page_size,
    };
    let (total, records) = state.store.list_contracts(&filter).await?;
    let items = records
        .into_iter()
        .map(|r| ContractView {
            contract: r.contract,
            version: r.version,
        })
        .collect();
    Ok(Json(PageResponse { total, items }))
}

/// POST /api/contracts
pub(crate) async fn handle_create_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(req): Json<CreateContractRequest>,
) -> Result<(StatusCode, Json<ContractView>), ApiError> {
    let actor = Actor::from(&user);
    let contract = apply::create_contract(&state.store, req.into(), &actor).await?;
    Ok((
        StatusCode::CREATED,
        Json(ContractView {
            contract,
            version: 0,
        }),
    ))
}

/// GET /api/contracts/{id}
pub(crate) async fn handle_get_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ContractView>, ApiError> {
    let actor = Actor::from(&user);
    let record = apply::fetch_contract(&state.store, contract_id, &actor).await?;
    Ok(Json(ContractView {
        contract: record.contract,
        version: record.version,
    }))
}

/// PUT /api/contracts/{id} -- field edits under the edit guard; status
/// never moves here.
pub(crate) async fn handle_update_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
    Json(req): Json<UpdateContractRequest>,
) -> Result<Json<ContractView>, ApiError> {
    let actor = Actor::from(&user);
    let contract = apply::update_contract(&state.store, contract_id, req.into(), &actor).await?;
    let record = state.store.get_contract(contract_id).await?;
    Ok(Json(ContractView {
        contract,
        version: record.version,
    }))
}

/// DELETE /api/contracts/{id}
pub(crate) async fn handle_delete_contract(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let actor = Actor::from(&user);
    apply::delete_contract(&state.store, contract_id, &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_action(
    state: Arc<AppState>,
    user: User,
    contract_id: Uuid,
    action: WorkflowAction,
    body: Option<Json<ActionRequest>>,
) -> Result<Json<ContractView>, ApiError> {
    let actor = Actor::from(&user);
    let remark = body.and_then(|Json(req)| req.remark);
    let (contract, _entry) =
        apply::apply_workflow_action(&state.store, contract_id, action, &actor, remark).await?;
    let record = state.store.get_contract(contract_id).await?;
    Ok(Json(ContractView {
        contract,
        version: record.version,
    }))
}

macro_rules! action_handler {
    ($name:ident, $action:expr) => {
        pub(crate) async fn $name(
            State(state): State<Arc<AppState>>,
            Extension(user): Extension<User>,
            Path(contract_id): Path<Uuid>,
            body: Option<Json<ActionRequest>>,
        ) -> Result<Json<ContractView>, ApiError> {
            run_action(state, user, contract_id, $action, body).await
        }
    };
}

action_handler!(handle_submit, WorkflowAction::Submit);
action_handler!(handle_withdraw, WorkflowAction::WithdrawCreator);
action_handler!(handle_approve_finance, WorkflowAction::ApproveFinance);
action_handler!(handle_reject_finance, WorkflowAction::RejectFinance);
action_handler!(handle_withdraw_finance, WorkflowAction::WithdrawFinance);
action_handler!(handle_approve_admin, WorkflowAction::ApproveAdmin);
action_handler!(handle_reject_admin, WorkflowAction::RejectAdmin);

/// GET /api/contracts/{id}/actions -- which workflow actions the caller
/// may run right now, and why the rest are blocked. Advisory for UI
/// gating; the executor re-checks everything.
pub(crate) async fn handle_action_space(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ActionSpaceResponse>, ApiError> {
    let actor = Actor::from(&user);
    let record = apply::fetch_contract(&state.store, contract_id, &actor).await?;
    Ok(Json(ActionSpaceResponse {
        status: record.contract.status,
        actions: guards::action_space(&record.contract, &actor),
    }))
}

/// GET /api/contracts/{id}/logs -- the audit trail, oldest first.
pub(crate) async fn handle_contract_logs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<Vec<OperationLogEntry>>, ApiError> {
    let actor = Actor::from(&user);
    apply::fetch_contract(&state.store, contract_id, &actor).await?;
    let logs = state.store.list_contract_logs(contract_id).await?;
    Ok(Json(logs))
}

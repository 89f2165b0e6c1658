//! Request and response bodies for the JSON API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use pactum_core::{guards::ActionSpace, Contract, ContractStatus, Role};
use pactum_storage::{ContractPatch, NewContract};

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    pub user: UserView,
}

/// A user without the password hash.
#[derive(Debug, Serialize)]
pub(crate) struct UserView {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: time::OffsetDateTime,
}

impl From<pactum_core::User> for UserView {
    fn from(user: pactum_core::User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateUserRequest {
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateContractRequest {
    pub title: String,
    pub contract_no: String,
    pub party_a: String,
    pub party_b: String,
    pub amount: Decimal,
    pub sign_date: Option<Date>,
    pub expire_date: Option<Date>,
    pub note: Option<String>,
}

impl From<CreateContractRequest> for NewContract {
    fn from(req: CreateContractRequest) -> Self {
        NewContract {
            title: req.title,
            contract_no: req.contract_no,
            party_a: req.party_a,
            party_b: req.party_b,
            amount: req.amount,
            sign_date: req.sign_date,
            expire_date: req.expire_date,
            note: req.note,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateContractRequest {
    pub title: Option<String>,
    pub contract_no: Option<String>,
    pub party_a: Option<String>,
    pub party_b: Option<String>,
    pub amount: Option<Decimal>,
    pub sign_date: Option<Date>,
    pub expire_date: Option<Date>,
    pub note: Option<String>,
}

impl From<UpdateContractRequest> for ContractPatch {
    fn from(req: UpdateContractRequest) -> Self {
        ContractPatch {
            title: req.title,
            contract_no: req.contract_no,
            party_a: req.party_a,
            party_b: req.party_b,
            amount: req.amount,
            sign_date: req.sign_date,
            expire_date: req.expire_date,
            note: req.note,
        }
    }
}

/// A contract plus its version counter, as returned by the API.
#[derive(Debug, Serialize)]
pub(crate) struct ContractView {
    #[serde(flatten)]
    pub contract: Contract,
    pub version: i64,
}

/// Optional remark carried by workflow action requests. Reject actions
/// usually set it; any action accepts it.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActionRequest {
    pub remark: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContractListQuery {
    pub keyword: Option<String>,
    pub status: Option<ContractStatus>,
    pub sign_date_from: Option<Date>,
    pub sign_date_to: Option<Date>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OperationLogQuery {
    pub contract_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

pub(crate) fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1).saturating_mul(page_size)
}

#[derive(Debug, Serialize)]
pub(crate) struct PageResponse<T> {
    pub total: usize,
    pub items: Vec<T>,
}

/// A global-log row: the entry joined with its contract number.
#[derive(Debug, Serialize)]
pub(crate) struct OperationLogView {
    #[serde(flatten)]
    pub entry: pactum_core::OperationLogEntry,
    pub contract_no: String,
}

impl From<pactum_storage::OperationLogRow> for OperationLogView {
    fn from(row: pactum_storage::OperationLogRow) -> Self {
        OperationLogView {
            entry: row.entry,
            contract_no: row.contract_no,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActionSpaceResponse {
    pub status: ContractStatus,
    #[serde(flatten)]
    pub actions: ActionSpace,
}

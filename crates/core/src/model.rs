//! Domain model: contracts, users, attachments, and the operation log.
//!
//! These types are shared verbatim between the storage layer and the HTTP
//! layer so the transition table in [`crate::workflow`] stays the single
//! source of truth for both.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Lifecycle status of a contract.
///
/// `Expired` and `Terminated` are absorbing for the workflow: they are
/// reached only through external administrative action, and no workflow
/// action transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    PendingFinance,
    FinanceApproved,
    Active,
    Rejected,
    Expired,
    Terminated,
}

impl ContractStatus {
    /// Every status, in lifecycle order. Used by tests and filters.
    pub const ALL: [ContractStatus; 7] = [
        ContractStatus::Draft,
        ContractStatus::PendingFinance,
        ContractStatus::FinanceApproved,
        ContractStatus::Active,
        ContractStatus::Rejected,
        ContractStatus::Expired,
        ContractStatus::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::PendingFinance => "pending_finance",
            ContractStatus::FinanceApproved => "finance_approved",
            ContractStatus::Active => "active",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Expired => "expired",
            ContractStatus::Terminated => "terminated",
        }
    }

    /// Whether contract fields may be modified in this status.
    pub fn is_editable(&self) -> bool {
        matches!(self, ContractStatus::Draft | ContractStatus::Rejected)
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContractStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown contract status '{}'", s))
    }
}

/// User role. Determines which workflow actions an actor may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Finance,
    Normal,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Finance, Role::Normal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Finance => "finance",
            Role::Normal => "normal",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

/// The core business record tracked through the approval workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub title: String,
    /// Human-assigned contract number, unique per deployment.
    pub contract_no: String,
    pub party_a: String,
    pub party_b: String,
    /// Non-negative, two fractional digits.
    pub amount: Decimal,
    pub sign_date: Option<Date>,
    pub expire_date: Option<Date>,
    pub status: ContractStatus,
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Attachment metadata. The bytes live in a blob store, keyed by
/// `storage_key`. Immutable once uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub storage_key: String,
    pub created_at: OffsetDateTime,
}

/// One append-only audit record. Exactly one entry is written per
/// state-changing or recorded action; entries are never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub action: crate::workflow::WorkflowAction,
    /// None for non-transition actions (create has no prior status).
    pub from_status: Option<ContractStatus>,
    pub to_status: Option<ContractStatus>,
    pub remark: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A directory user. The password credential is opaque to the workflow
/// core; hashing lives at the service boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// The authenticated identity a request acts as.
///
/// Passed explicitly into every guarded call; there is no ambient auth
/// state anywhere in the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, username: impl Into<String>, role: Role) -> Self {
        Actor {
            id,
            username: username.into(),
            role,
        }
    }

    /// Whether this actor is the creator of the given contract.
    pub fn is_creator_of(&self, contract: &Contract) -> bool {
        self.id == contract.created_by
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::Date;
use uuid::Uuid;

use pactum_core::{Attachment, Contract, ContractStatus, OperationLogEntry, Role, User};

use crate::error::StorageError;

/// A contract row together with its OCC version counter.
#[derive(Debug, Clone)]
pub struct ContractRecord {
    pub contract: Contract,
    pub version: i64,
}

/// Field-level patch applied by `edit`. `None` leaves a field unchanged;
/// the status field is deliberately absent; status moves only through
/// the workflow executor.
#[derive(Debug, Clone, Default)]
pub struct ContractPatch {
    pub title: Option<String>,
    pub contract_no: Option<String>,
    pub party_a: Option<String>,
    pub party_b: Option<String>,
    pub amount: Option<Decimal>,
    pub sign_date: Option<Date>,
    pub expire_date: Option<Date>,
    pub note: Option<String>,
}

impl ContractPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.contract_no.is_none()
            && self.party_a.is_none()
            && self.party_b.is_none()
            && self.amount.is_none()
            && self.sign_date.is_none()
            && self.expire_date.is_none()
            && self.note.is_none()
    }

    /// Apply the patch to a contract in place.
    pub fn apply_to(&self, contract: &mut Contract) {
        if let Some(v) = &self.title {
            contract.title = v.clone();
        }
        if let Some(v) = &self.contract_no {
            contract.contract_no = v.clone();
        }
        if let Some(v) = &self.party_a {
            contract.party_a = v.clone();
        }
        if let Some(v) = &self.party_b {
            contract.party_b = v.clone();
        }
        if let Some(v) = self.amount {
            contract.amount = v;
        }
        if let Some(v) = self.sign_date {
            contract.sign_date = Some(v);
        }
        if let Some(v) = self.expire_date {
            contract.expire_date = Some(v);
        }
        if let Some(v) = &self.note {
            contract.note = Some(v.clone());
        }
    }
}

/// List-query filter for contracts. `created_by` carries the caller's
/// visibility scope; `keyword` matches title, contract_no, party_a and
/// party_b case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ContractFilter {
    pub keyword: Option<String>,
    pub status: Option<ContractStatus>,
    pub sign_date_from: Option<Date>,
    pub sign_date_to: Option<Date>,
    pub created_by: Option<Uuid>,
    pub offset: usize,
    pub limit: usize,
}

/// Filter for the global operation log.
#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    pub contract_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub offset: usize,
    pub limit: usize,
}

/// A log entry joined with the contract number it belongs to, for the
/// global operations view.
#[derive(Debug, Clone)]
pub struct OperationLogRow {
    pub entry: OperationLogEntry,
    pub contract_no: String,
}

/// Changes applied to a directory user. `None` leaves the field as-is.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub password_hash: Option<String>,
    pub role: Option<Role>,
}

/// The persistence collaborator for the contract workflow.
///
/// ## Snapshot semantics
///
/// Mutating operations run inside a `Snapshot`, an in-progress
/// transaction:
///
/// 1. `begin_snapshot()` starts the transaction
/// 2. mutating methods take `&mut Snapshot`
/// 3. `commit_snapshot(snapshot)` makes all mutations durable,
///    `abort_snapshot(snapshot)` discards them
///
/// A snapshot dropped without commit must roll back. The atomicity
/// invariant of the workflow (status change and audit entry commit as
/// one unit, or neither does) rests entirely on these semantics.
///
/// ## Concurrency control
///
/// `update_contract_status` and `update_contract_fields` are
/// version-conditional: if the contract's version no longer equals
/// `expected_version` at commit, the store returns
/// `StorageError::ConcurrentConflict` and the whole snapshot is rolled
/// back. Two actors racing the same transition serialize; the loser sees
/// the conflict.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` for use in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait ContractStore: Send + Sync + 'static {
    /// The snapshot (transaction) type. Must be `Send`.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Contract mutations (within snapshot) ──────────────────────────

    /// Insert a new contract at version 0.
    async fn insert_contract(
        &self,
        snapshot: &mut Self::Snapshot,
        contract: Contract,
    ) -> Result<(), StorageError>;

    /// Read a contract for update. The observed version becomes the
    /// snapshot's expected version for this row at commit.
    async fn get_contract_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
    ) -> Result<ContractRecord, StorageError>;

    /// Version-conditional status update. Returns the new version.
    async fn update_contract_status(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
        expected_version: i64,
        new_status: ContractStatus,
    ) -> Result<i64, StorageError>;

    /// Version-conditional field patch. Returns the new version.
    async fn update_contract_fields(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
        expected_version: i64,
        patch: ContractPatch,
    ) -> Result<i64, StorageError>;

    /// Delete a contract. Cascades to its log entries and attachment
    /// metadata.
    async fn delete_contract(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
    ) -> Result<(), StorageError>;

    /// Append an audit entry. Must land in the same snapshot as the
    /// status mutation it records.
    async fn append_operation_log(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: OperationLogEntry,
    ) -> Result<(), StorageError>;

    /// Insert attachment metadata.
    async fn insert_attachment(
        &self,
        snapshot: &mut Self::Snapshot,
        attachment: Attachment,
    ) -> Result<(), StorageError>;

    // ── Queries (outside snapshots) ───────────────────────────────────

    async fn get_contract(&self, contract_id: Uuid) -> Result<ContractRecord, StorageError>;

    /// Filtered, paginated contract listing ordered by `updated_at`
    /// descending. Returns (total matching, page of records).
    async fn list_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<(usize, Vec<ContractRecord>), StorageError>;

    /// Full audit trail for one contract, oldest first.
    async fn list_contract_logs(
        &self,
        contract_id: Uuid,
    ) -> Result<Vec<OperationLogEntry>, StorageError>;

    /// Global operation log, newest first, joined with contract numbers.
    /// Returns (total matching, page of rows).
    async fn list_operation_logs(
        &self,
        filter: &OperationLogFilter,
    ) -> Result<(usize, Vec<OperationLogRow>), StorageError>;

    async fn get_attachment(
        &self,
        contract_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment, StorageError>;

    async fn list_attachments(&self, contract_id: Uuid) -> Result<Vec<Attachment>, StorageError>;

    // ── User directory ────────────────────────────────────────────────

    /// Insert a user. Fails with `DuplicateUsername` when taken.
    async fn insert_user(&self, user: User) -> Result<(), StorageError>;

    async fn get_user(&self, user_id: Uuid) -> Result<User, StorageError>;

    async fn get_user_by_username(&self, username: &str) -> Result<User, StorageError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<User>, StorageError>;

    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, StorageError>;

    async fn delete_user(&self, user_id: Uuid) -> Result<(), StorageError>;

    /// Whether the user directory has any entries. Used for bootstrap
    /// seeding of the first super-admin.
    async fn user_count(&self) -> Result<usize, StorageError>;
}

/// Byte storage for attachment content, keyed by the attachment's
/// storage key. Metadata lives in the `ContractStore`; these are the
/// raw bytes only.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

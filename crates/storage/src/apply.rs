//! The atomic workflow executor.
//!
//! Couples the pure decisions of `pactum_core` to durable state: every
//! function here runs begin-snapshot → guard/evaluate → mutate → append
//! audit entry → commit, aborting the snapshot on any failure. A status
//! change therefore never lands without its matching log entry, and a
//! log entry never lands for a change that was rolled back.

use time::OffsetDateTime;
use uuid::Uuid;

use pactum_core::{
    authorize_create, evaluate, guards, Actor, Attachment, Contract, ContractStatus,
    OperationLogEntry, WorkflowAction, WorkflowError,
};
use rust_decimal::Decimal;
use time::Date;

use crate::error::StorageError;
use crate::traits::{BlobStore, ContractPatch, ContractRecord, ContractStore};

/// Errors surfaced by the executor: a workflow rule said no, the store
/// failed, or a coarse permission check (view/manage) failed.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("'{username}' is not permitted to {what}")]
    Forbidden { username: String, what: String },
}

impl ApplyError {
    fn forbidden(actor: &Actor, what: &str) -> Self {
        ApplyError::Forbidden {
            username: actor.username.clone(),
            what: what.to_string(),
        }
    }
}

/// Input for contract creation. Status is not accepted here: contracts
/// are born in draft.
#[derive(Debug, Clone)]
pub struct NewContract {
    pub title: String,
    pub contract_no: String,
    pub party_a: String,
    pub party_b: String,
    pub amount: Decimal,
    pub sign_date: Option<Date>,
    pub expire_date: Option<Date>,
    pub note: Option<String>,
}

fn validate_amount(amount: Decimal) -> Result<(), WorkflowError> {
    if amount < Decimal::ZERO {
        return Err(WorkflowError::validation(format!(
            "amount must be non-negative, got {}",
            amount
        )));
    }
    Ok(())
}

fn validate_new(input: &NewContract) -> Result<(), WorkflowError> {
    if input.title.trim().is_empty() {
        return Err(WorkflowError::validation("title must not be empty"));
    }
    if input.contract_no.trim().is_empty() {
        return Err(WorkflowError::validation("contract_no must not be empty"));
    }
    validate_amount(input.amount)
}

/// Create a contract in draft and log the creation, atomically.
pub async fn create_contract<S: ContractStore>(
    store: &S,
    input: NewContract,
    actor: &Actor,
) -> Result<Contract, ApplyError> {
    authorize_create(actor)?;
    validate_new(&input)?;

    let now = OffsetDateTime::now_utc();
    let contract = Contract {
        id: Uuid::new_v4(),
        title: input.title,
        contract_no: input.contract_no,
        party_a: input.party_a,
        party_b: input.party_b,
        amount: input.amount,
        sign_date: input.sign_date,
        expire_date: input.expire_date,
        status: ContractStatus::Draft,
        note: input.note,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };

    let mut snapshot = store.begin_snapshot().await?;
    if let Err(e) = store.insert_contract(&mut snapshot, contract.clone()).await {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    let entry = OperationLogEntry::record(
        contract.id,
        actor,
        WorkflowAction::Create,
        None,
        Some(ContractStatus::Draft),
        None,
    );
    if let Err(e) = store.append_operation_log(&mut snapshot, entry).await {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    store.commit_snapshot(snapshot).await?;

    tracing::info!(
        contract_id = %contract.id,
        contract_no = %contract.contract_no,
        actor = %actor.username,
        "contract created"
    );
    Ok(contract)
}

/// Perform one table-driven transition and its audit entry as a single
/// commit unit. Returns the updated contract and the entry written.
///
/// A concurrent loser either sees `IllegalTransition` (the status moved
/// before we read it) or `ConcurrentConflict` (it moved between our read
/// and our commit); in both cases nothing was written.
pub async fn apply_workflow_action<S: ContractStore>(
    store: &S,
    contract_id: Uuid,
    action: WorkflowAction,
    actor: &Actor,
    remark: Option<String>,
) -> Result<(Contract, OperationLogEntry), ApplyError> {
    if matches!(action, WorkflowAction::Create | WorkflowAction::Edit) {
        return Err(WorkflowError::validation(format!(
            "{} is not a status transition",
            action
        ))
        .into());
    }

    let mut snapshot = store.begin_snapshot().await?;
    let record = match store.get_contract_for_update(&mut snapshot, contract_id).await {
        Ok(r) => r,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    if !guards::can_view(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "view this contract"));
    }

    let transition = match evaluate(action, &record.contract, actor) {
        Ok(t) => t,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };

    if let Err(e) = store
        .update_contract_status(&mut snapshot, contract_id, record.version, transition.to)
        .await
    {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }

    let entry = OperationLogEntry::record(
        contract_id,
        actor,
        action,
        Some(transition.from),
        Some(transition.to),
        remark,
    );
    if let Err(e) = store
        .append_operation_log(&mut snapshot, entry.clone())
        .await
    {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    store.commit_snapshot(snapshot).await?;

    tracing::info!(
        contract_id = %contract_id,
        action = %action,
        from = %transition.from,
        to = %transition.to,
        actor = %actor.username,
        "workflow transition"
    );

    let mut contract = record.contract;
    contract.status = transition.to;
    contract.updated_at = OffsetDateTime::now_utc();
    Ok((contract, entry))
}

/// Patch contract fields under the edit guard and log the edit.
pub async fn update_contract<S: ContractStore>(
    store: &S,
    contract_id: Uuid,
    patch: ContractPatch,
    actor: &Actor,
) -> Result<Contract, ApplyError> {
    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
    }

    let mut snapshot = store.begin_snapshot().await?;
    let record = match store.get_contract_for_update(&mut snapshot, contract_id).await {
        Ok(r) => r,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    if !guards::can_view(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "view this contract"));
    }

    // Edit authorizes and logs but never moves status.
    let transition = match evaluate(WorkflowAction::Edit, &record.contract, actor) {
        Ok(t) => t,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };

    if let Err(e) = store
        .update_contract_fields(&mut snapshot, contract_id, record.version, patch.clone())
        .await
    {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }

    let entry = OperationLogEntry::record(
        contract_id,
        actor,
        WorkflowAction::Edit,
        Some(transition.from),
        Some(transition.to),
        None,
    );
    if let Err(e) = store.append_operation_log(&mut snapshot, entry).await {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    store.commit_snapshot(snapshot).await?;

    let mut contract = record.contract;
    patch.apply_to(&mut contract);
    contract.updated_at = OffsetDateTime::now_utc();
    Ok(contract)
}

/// Delete a contract (and, by cascade, its logs and attachments).
/// Super-admins may delete anything; creators only their own drafts and
/// rejected contracts; finance nothing.
pub async fn delete_contract<S: ContractStore>(
    store: &S,
    contract_id: Uuid,
    actor: &Actor,
) -> Result<(), ApplyError> {
    let mut snapshot = store.begin_snapshot().await?;
    let record = match store.get_contract_for_update(&mut snapshot, contract_id).await {
        Ok(r) => r,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    if !guards::can_view(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "view this contract"));
    }
    if !guards::can_manage(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "delete this contract"));
    }
    if actor.role != pactum_core::Role::SuperAdmin && !record.contract.status.is_editable() {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(
            actor,
            "delete a contract that is past draft/rejected",
        ));
    }

    if let Err(e) = store.delete_contract(&mut snapshot, contract_id).await {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    store.commit_snapshot(snapshot).await?;

    tracing::info!(contract_id = %contract_id, actor = %actor.username, "contract deleted");
    Ok(())
}

/// Read a contract, enforcing visibility.
pub async fn fetch_contract<S: ContractStore>(
    store: &S,
    contract_id: Uuid,
    actor: &Actor,
) -> Result<ContractRecord, ApplyError> {
    let record = store.get_contract(contract_id).await?;
    if !guards::can_view(&record.contract, actor) {
        return Err(ApplyError::forbidden(actor, "view this contract"));
    }
    Ok(record)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Store attachment bytes and metadata. The blob write happens before
/// the metadata commit; if the commit fails the blob is deleted again on
/// a best-effort basis.
pub async fn add_attachment<S: ContractStore, B: BlobStore>(
    store: &S,
    blobs: &B,
    contract_id: Uuid,
    file_name: &str,
    bytes: &[u8],
    actor: &Actor,
) -> Result<Attachment, ApplyError> {
    let mut snapshot = store.begin_snapshot().await?;
    let record = match store.get_contract_for_update(&mut snapshot, contract_id).await {
        Ok(r) => r,
        Err(e) => {
            let _ = store.abort_snapshot(snapshot).await;
            return Err(e.into());
        }
    };
    if !guards::can_view(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "view this contract"));
    }
    if !guards::can_manage(&record.contract, actor) {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(ApplyError::forbidden(actor, "upload attachments"));
    }

    let file_name = sanitize_file_name(file_name);
    let attachment = Attachment {
        id: Uuid::new_v4(),
        contract_id,
        file_name: file_name.clone(),
        file_size: bytes.len() as i64,
        storage_key: format!("contracts/{}/{}_{}", contract_id, Uuid::new_v4(), file_name),
        created_at: OffsetDateTime::now_utc(),
    };

    if let Err(e) = blobs.save(&attachment.storage_key, bytes).await {
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    if let Err(e) = store.insert_attachment(&mut snapshot, attachment.clone()).await {
        let _ = blobs.delete(&attachment.storage_key).await;
        let _ = store.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    if let Err(e) = store.commit_snapshot(snapshot).await {
        let _ = blobs.delete(&attachment.storage_key).await;
        return Err(e.into());
    }

    Ok(attachment)
}

/// Read attachment metadata and bytes, enforcing visibility.
pub async fn fetch_attachment<S: ContractStore, B: BlobStore>(
    store: &S,
    blobs: &B,
    contract_id: Uuid,
    attachment_id: Uuid,
    actor: &Actor,
) -> Result<(Attachment, Vec<u8>), ApplyError> {
    fetch_contract(store, contract_id, actor).await?;
    let attachment = store.get_attachment(contract_id, attachment_id).await?;
    let bytes = blobs.read(&attachment.storage_key).await?;
    Ok((attachment, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::test_support::{actor, new_contract_input, user_with_role};
    use pactum_core::Role;

    async fn seeded_draft(store: &MemoryStore, creator: &Actor) -> Contract {
        create_contract(store, new_contract_input(), creator)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_logs_atomically() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let contract = seeded_draft(&store, &alice).await;

        let logs = store.list_contract_logs(contract.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, WorkflowAction::Create);
        assert_eq!(logs[0].from_status, None);
        assert_eq!(logs[0].to_status, Some(ContractStatus::Draft));
        assert!(logs[0].is_consistent());
    }

    #[tokio::test]
    async fn finance_cannot_create() {
        let store = MemoryStore::new();
        let fiona = actor("fiona", Role::Finance);
        let err = create_contract(&store, new_contract_input(), &fiona)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Workflow(WorkflowError::Authorization { .. })
        ));
    }

    #[tokio::test]
    async fn negative_amount_is_rejected() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let mut input = new_contract_input();
        input.amount = Decimal::new(-100, 2);
        let err = create_contract(&store, input, &alice).await.unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Workflow(WorkflowError::Validation { .. })
        ));
    }

    /// The full review loop: submit, finance rejection with a remark,
    /// edit, resubmit, with the audit trail checked at each step.
    #[tokio::test]
    async fn reject_edit_resubmit_scenario() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let fiona = actor("fiona", Role::Finance);
        let contract = seeded_draft(&store, &alice).await;

        let (c, entry) =
            apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &alice, None)
                .await
                .unwrap();
        assert_eq!(c.status, ContractStatus::PendingFinance);
        assert_eq!(entry.from_status, Some(ContractStatus::Draft));
        assert_eq!(entry.to_status, Some(ContractStatus::PendingFinance));

        let (c, entry) = apply_workflow_action(
            &store,
            contract.id,
            WorkflowAction::RejectFinance,
            &fiona,
            Some("missing signature".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(c.status, ContractStatus::Rejected);
        assert_eq!(entry.remark.as_deref(), Some("missing signature"));

        // Edit in rejected keeps the status.
        let patch = ContractPatch {
            note: Some("signed and rescanned".to_string()),
            ..Default::default()
        };
        let c = update_contract(&store, contract.id, patch, &alice)
            .await
            .unwrap();
        assert_eq!(c.status, ContractStatus::Rejected);

        // Resubmit straight from rejected.
        let (c, _) =
            apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &alice, None)
                .await
                .unwrap();
        assert_eq!(c.status, ContractStatus::PendingFinance);

        let logs = store.list_contract_logs(contract.id).await.unwrap();
        let actions: Vec<WorkflowAction> = logs.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                WorkflowAction::Create,
                WorkflowAction::Submit,
                WorkflowAction::RejectFinance,
                WorkflowAction::Edit,
                WorkflowAction::Submit,
            ]
        );
        assert!(logs.iter().all(|e| e.is_consistent()));
    }

    #[tokio::test]
    async fn failed_action_writes_nothing() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let fiona = actor("fiona", Role::Finance);
        let contract = seeded_draft(&store, &alice).await;

        // Finance cannot approve a draft: wrong status.
        let err = apply_workflow_action(
            &store,
            contract.id,
            WorkflowAction::ApproveFinance,
            &fiona,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Workflow(WorkflowError::IllegalTransition { .. })
        ));

        let record = store.get_contract(contract.id).await.unwrap();
        assert_eq!(record.contract.status, ContractStatus::Draft);
        // Only the create entry exists.
        assert_eq!(store.list_contract_logs(contract.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn race_loser_gets_illegal_transition() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let fiona = actor("fiona", Role::Finance);
        let root = actor("root", Role::SuperAdmin);
        let contract = seeded_draft(&store, &alice).await;
        apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &alice, None)
            .await
            .unwrap();

        // Finance approves; the admin's competing rejection of the same
        // pending contract now starts from finance_approved and fails.
        apply_workflow_action(
            &store,
            contract.id,
            WorkflowAction::ApproveFinance,
            &fiona,
            None,
        )
        .await
        .unwrap();
        let err = apply_workflow_action(
            &store,
            contract.id,
            WorkflowAction::RejectFinance,
            &root,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ApplyError::Workflow(WorkflowError::IllegalTransition { .. })
        ));
    }

    #[tokio::test]
    async fn normal_user_cannot_touch_foreign_contracts() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let bob = actor("bob", Role::Normal);
        let contract = seeded_draft(&store, &alice).await;

        let err = fetch_contract(&store, contract.id, &bob).await.unwrap_err();
        assert!(matches!(err, ApplyError::Forbidden { .. }));

        let err =
            apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &bob, None)
                .await
                .unwrap_err();
        assert!(matches!(err, ApplyError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn delete_rules() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let root = actor("root", Role::SuperAdmin);
        let contract = seeded_draft(&store, &alice).await;
        apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &alice, None)
            .await
            .unwrap();

        // Creator cannot delete once mid-review.
        let err = delete_contract(&store, contract.id, &alice).await.unwrap_err();
        assert!(matches!(err, ApplyError::Forbidden { .. }));

        // Super-admin can.
        delete_contract(&store, contract.id, &root).await.unwrap();
        assert!(matches!(
            store.get_contract(contract.id).await,
            Err(StorageError::ContractNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn attachment_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = crate::blob::LocalBlobStore::new(dir.path());
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let fiona = actor("fiona", Role::Finance);
        let contract = seeded_draft(&store, &alice).await;

        let attachment = add_attachment(
            &store,
            &blobs,
            contract.id,
            "合同扫描件.pdf",
            b"%PDF-1.4",
            &alice,
        )
        .await
        .unwrap();
        assert_eq!(attachment.file_size, 8);

        let (meta, bytes) =
            fetch_attachment(&store, &blobs, contract.id, attachment.id, &fiona)
                .await
                .unwrap();
        assert_eq!(meta.file_name, "合同扫描件.pdf");
        assert_eq!(bytes, b"%PDF-1.4");

        // Finance may download but not upload.
        let err = add_attachment(&store, &blobs, contract.id, "x.bin", b"x", &fiona)
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn global_log_join_carries_contract_no() {
        let store = MemoryStore::new();
        let alice = actor("alice", Role::Normal);
        let contract = seeded_draft(&store, &alice).await;
        apply_workflow_action(&store, contract.id, WorkflowAction::Submit, &alice, None)
            .await
            .unwrap();

        let (total, rows) = store
            .list_operation_logs(&crate::traits::OperationLogFilter::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(rows.iter().all(|r| r.contract_no == contract.contract_no));
        // Newest first.
        assert_eq!(rows[0].entry.action, WorkflowAction::Submit);
    }

    #[tokio::test]
    async fn users_are_seedable_for_tests() {
        // Keeps user_with_role honest about unique ids.
        let store = MemoryStore::new();
        let u = user_with_role("root", Role::SuperAdmin);
        store.insert_user(u.clone()).await.unwrap();
        assert_eq!(store.get_user(u.id).await.unwrap().username, "root");
    }
}

//! In-memory reference backend.
//!
//! Snapshots stage mutations against a private copy of the store and
//! record the version of every row read for update. Commit re-validates
//! those versions under the write lock and replays the staged mutations,
//! so concurrent transition attempts on the same contract serialize and
//! the loser observes `ConcurrentConflict`, the same contract a SQL
//! backend provides with `UPDATE ... WHERE version = ?`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use pactum_core::{Attachment, Contract, ContractStatus, OperationLogEntry, User};

use crate::error::StorageError;
use crate::traits::{
    ContractFilter, ContractPatch, ContractRecord, ContractStore, OperationLogFilter,
    OperationLogRow, UserPatch,
};

#[derive(Debug, Clone, Default)]
struct Inner {
    contracts: BTreeMap<Uuid, ContractRecord>,
    logs: Vec<OperationLogEntry>,
    attachments: BTreeMap<Uuid, Attachment>,
    users: BTreeMap<Uuid, User>,
}

#[derive(Debug, Clone)]
enum Mutation {
    InsertContract(ContractRecord),
    UpdateStatus {
        contract_id: Uuid,
        expected_version: i64,
        new_status: ContractStatus,
    },
    UpdateFields {
        contract_id: Uuid,
        expected_version: i64,
        patch: ContractPatch,
    },
    DeleteContract(Uuid),
    AppendLog(OperationLogEntry),
    InsertAttachment(Attachment),
}

/// An in-progress transaction over a [`MemoryStore`].
pub struct MemorySnapshot {
    /// Consistent view taken at begin; staged mutations apply here too so
    /// reads within the snapshot see their own writes.
    view: Inner,
    /// contract id -> version observed by `get_contract_for_update`.
    reads: BTreeMap<Uuid, i64>,
    mutations: Vec<Mutation>,
}

/// The in-memory `ContractStore`. Clone shares the underlying state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_keyword(contract: &Contract, keyword: &str) -> bool {
    let kw = keyword.to_lowercase();
    contract.title.to_lowercase().contains(&kw)
        || contract.contract_no.to_lowercase().contains(&kw)
        || contract.party_a.to_lowercase().contains(&kw)
        || contract.party_b.to_lowercase().contains(&kw)
}

fn matches_filter(record: &ContractRecord, filter: &ContractFilter) -> bool {
    let c = &record.contract;
    if let Some(creator) = filter.created_by {
        if c.created_by != creator {
            return false;
        }
    }
    if let Some(status) = filter.status {
        if c.status != status {
            return false;
        }
    }
    if let Some(kw) = &filter.keyword {
        if !kw.is_empty() && !matches_keyword(c, kw) {
            return false;
        }
    }
    // A date bound excludes contracts without a sign date, matching SQL
    // comparison semantics against NULL.
    if let Some(from) = filter.sign_date_from {
        match c.sign_date {
            Some(d) if d >= from => {}
            _ => return false,
        }
    }
    if let Some(to) = filter.sign_date_to {
        match c.sign_date {
            Some(d) if d <= to => {}
            _ => return false,
        }
    }
    true
}

fn page<T: Clone>(items: &[T], offset: usize, limit: usize) -> Vec<T> {
    let start = offset.min(items.len());
    let end = if limit == 0 {
        items.len()
    } else {
        (start + limit).min(items.len())
    };
    items[start..end].to_vec()
}

impl Inner {
    fn apply(&mut self, mutation: Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::InsertContract(record) => {
                self.contracts.insert(record.contract.id, record);
            }
            Mutation::UpdateStatus {
                contract_id,
                expected_version,
                new_status,
            } => {
                let record = self.contracts.get_mut(&contract_id).ok_or(
                    StorageError::ContractNotFound { contract_id },
                )?;
                if record.version != expected_version {
                    return Err(StorageError::ConcurrentConflict {
                        contract_id,
                        expected_version,
                    });
                }
                record.contract.status = new_status;
                record.contract.updated_at = OffsetDateTime::now_utc();
                record.version += 1;
            }
            Mutation::UpdateFields {
                contract_id,
                expected_version,
                patch,
            } => {
                let record = self.contracts.get_mut(&contract_id).ok_or(
                    StorageError::ContractNotFound { contract_id },
                )?;
                if record.version != expected_version {
                    return Err(StorageError::ConcurrentConflict {
                        contract_id,
                        expected_version,
                    });
                }
                patch.apply_to(&mut record.contract);
                record.contract.updated_at = OffsetDateTime::now_utc();
                record.version += 1;
            }
            Mutation::DeleteContract(contract_id) => {
                self.contracts.remove(&contract_id);
                // Cascade, as the SQL schema would via ON DELETE CASCADE.
                self.logs.retain(|e| e.contract_id != contract_id);
                self.attachments.retain(|_, a| a.contract_id != contract_id);
            }
            Mutation::AppendLog(entry) => {
                self.logs.push(entry);
            }
            Mutation::InsertAttachment(attachment) => {
                self.attachments.insert(attachment.id, attachment);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContractStore for MemoryStore {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        let view = self.inner.read().await.clone();
        Ok(MemorySnapshot {
            view,
            reads: BTreeMap::new(),
            mutations: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        // Re-validate every row read for update before replaying anything.
        for (contract_id, base_version) in &snapshot.reads {
            match inner.contracts.get(contract_id) {
                Some(record) if record.version == *base_version => {}
                _ => {
                    return Err(StorageError::ConcurrentConflict {
                        contract_id: *contract_id,
                        expected_version: *base_version,
                    })
                }
            }
        }
        for mutation in snapshot.mutations {
            inner.apply(mutation)?;
        }
        Ok(())
    }

    async fn abort_snapshot(&self, _snapshot: Self::Snapshot) -> Result<(), StorageError> {
        // Dropping the snapshot discards all staged mutations.
        Ok(())
    }

    async fn insert_contract(
        &self,
        snapshot: &mut Self::Snapshot,
        contract: Contract,
    ) -> Result<(), StorageError> {
        let record = ContractRecord {
            contract,
            version: 0,
        };
        snapshot
            .view
            .contracts
            .insert(record.contract.id, record.clone());
        snapshot.mutations.push(Mutation::InsertContract(record));
        Ok(())
    }

    async fn get_contract_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
    ) -> Result<ContractRecord, StorageError> {
        let record = snapshot
            .view
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or(StorageError::ContractNotFound { contract_id })?;
        snapshot.reads.entry(contract_id).or_insert(record.version);
        Ok(record)
    }

    async fn update_contract_status(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
        expected_version: i64,
        new_status: ContractStatus,
    ) -> Result<i64, StorageError> {
        let mutation = Mutation::UpdateStatus {
            contract_id,
            expected_version,
            new_status,
        };
        snapshot.view.apply(mutation.clone())?;
        snapshot.mutations.push(mutation);
        Ok(expected_version + 1)
    }

    async fn update_contract_fields(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
        expected_version: i64,
        patch: ContractPatch,
    ) -> Result<i64, StorageError> {
        let mutation = Mutation::UpdateFields {
            contract_id,
            expected_version,
            patch,
        };
        snapshot.view.apply(mutation.clone())?;
        snapshot.mutations.push(mutation);
        Ok(expected_version + 1)
    }

    async fn delete_contract(
        &self,
        snapshot: &mut Self::Snapshot,
        contract_id: Uuid,
    ) -> Result<(), StorageError> {
        if !snapshot.view.contracts.contains_key(&contract_id) {
            return Err(StorageError::ContractNotFound { contract_id });
        }
        let mutation = Mutation::DeleteContract(contract_id);
        snapshot.view.apply(mutation.clone())?;
        snapshot.mutations.push(mutation);
        Ok(())
    }

    async fn append_operation_log(
        &self,
        snapshot: &mut Self::Snapshot,
        entry: OperationLogEntry,
    ) -> Result<(), StorageError> {
        let mutation = Mutation::AppendLog(entry);
        snapshot.view.apply(mutation.clone())?;
        snapshot.mutations.push(mutation);
        Ok(())
    }

    async fn insert_attachment(
        &self,
        snapshot: &mut Self::Snapshot,
        attachment: Attachment,
    ) -> Result<(), StorageError> {
        let mutation = Mutation::InsertAttachment(attachment);
        snapshot.view.apply(mutation.clone())?;
        snapshot.mutations.push(mutation);
        Ok(())
    }

    async fn get_contract(&self, contract_id: Uuid) -> Result<ContractRecord, StorageError> {
        self.inner
            .read()
            .await
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or(StorageError::ContractNotFound { contract_id })
    }

    async fn list_contracts(
        &self,
        filter: &ContractFilter,
    ) -> Result<(usize, Vec<ContractRecord>), StorageError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<ContractRecord> = inner
            .contracts
            .values()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.contract.updated_at.cmp(&a.contract.updated_at));
        let total = matched.len();
        Ok((total, page(&matched, filter.offset, filter.limit)))
    }

    async fn list_contract_logs(
        &self,
        contract_id: Uuid,
    ) -> Result<Vec<OperationLogEntry>, StorageError> {
        let inner = self.inner.read().await;
        let mut entries: Vec<OperationLogEntry> = inner
            .logs
            .iter()
            .filter(|e| e.contract_id == contract_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn list_operation_logs(
        &self,
        filter: &OperationLogFilter,
    ) -> Result<(usize, Vec<OperationLogRow>), StorageError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<OperationLogRow> = inner
            .logs
            .iter()
            .filter(|e| {
                filter.contract_id.map_or(true, |id| e.contract_id == id)
                    && filter.user_id.map_or(true, |id| e.user_id == id)
            })
            .filter_map(|e| {
                // Inner join: entries for deleted contracts are gone via
                // the cascade, but be defensive anyway.
                inner.contracts.get(&e.contract_id).map(|r| OperationLogRow {
                    entry: e.clone(),
                    contract_no: r.contract.contract_no.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| b.entry.created_at.cmp(&a.entry.created_at));
        let total = rows.len();
        Ok((total, page(&rows, filter.offset, filter.limit)))
    }

    async fn get_attachment(
        &self,
        contract_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<Attachment, StorageError> {
        self.inner
            .read()
            .await
            .attachments
            .get(&attachment_id)
            .filter(|a| a.contract_id == contract_id)
            .cloned()
            .ok_or(StorageError::AttachmentNotFound { attachment_id })
    }

    async fn list_attachments(&self, contract_id: Uuid) -> Result<Vec<Attachment>, StorageError> {
        let inner = self.inner.read().await;
        let mut items: Vec<Attachment> = inner
            .attachments
            .values()
            .filter(|a| a.contract_id == contract_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn insert_user(&self, user: User) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::DuplicateUsername {
                username: user.username,
            });
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<User, StorageError> {
        self.inner
            .read()
            .await
            .users
            .get(&user_id)
            .cloned()
            .ok_or(StorageError::UserNotFound { user_id })
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StorageError> {
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| StorageError::UnknownUsername {
                username: username.to_string(),
            })
    }

    async fn list_users(&self) -> Result<Vec<User>, StorageError> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user(&self, user_id: Uuid, patch: UserPatch) -> Result<User, StorageError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StorageError::UserNotFound { user_id })?;
        if let Some(hash) = patch.password_hash {
            user.password_hash = hash;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner
            .users
            .remove(&user_id)
            .map(|_| ())
            .ok_or(StorageError::UserNotFound { user_id })
    }

    async fn user_count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.read().await.users.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{draft_contract, user_with_role};
    use pactum_core::Role;

    #[tokio::test]
    async fn commit_makes_mutations_visible() {
        let store = MemoryStore::new();
        let contract = draft_contract(Uuid::new_v4());
        let id = contract.id;

        let mut snap = store.begin_snapshot().await.unwrap();
        store.insert_contract(&mut snap, contract).await.unwrap();
        store.commit_snapshot(snap).await.unwrap();

        let record = store.get_contract(id).await.unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.contract.status, ContractStatus::Draft);
    }

    #[tokio::test]
    async fn aborted_snapshot_leaves_no_trace() {
        let store = MemoryStore::new();
        let contract = draft_contract(Uuid::new_v4());
        let id = contract.id;

        let mut snap = store.begin_snapshot().await.unwrap();
        store.insert_contract(&mut snap, contract).await.unwrap();
        store.abort_snapshot(snap).await.unwrap();

        assert!(matches!(
            store.get_contract(id).await,
            Err(StorageError::ContractNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_snapshots_serialize_and_loser_conflicts() {
        let store = MemoryStore::new();
        let contract = draft_contract(Uuid::new_v4());
        let id = contract.id;
        let mut snap = store.begin_snapshot().await.unwrap();
        store.insert_contract(&mut snap, contract).await.unwrap();
        store.commit_snapshot(snap).await.unwrap();

        // Two actors read the same version.
        let mut first = store.begin_snapshot().await.unwrap();
        let mut second = store.begin_snapshot().await.unwrap();
        let rec_a = store.get_contract_for_update(&mut first, id).await.unwrap();
        let rec_b = store.get_contract_for_update(&mut second, id).await.unwrap();
        assert_eq!(rec_a.version, rec_b.version);

        store
            .update_contract_status(&mut first, id, rec_a.version, ContractStatus::PendingFinance)
            .await
            .unwrap();
        store.commit_snapshot(first).await.unwrap();

        store
            .update_contract_status(&mut second, id, rec_b.version, ContractStatus::PendingFinance)
            .await
            .unwrap();
        let err = store.commit_snapshot(second).await.unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentConflict { .. }));

        // The winner's write stands, exactly once.
        let record = store.get_contract(id).await.unwrap();
        assert_eq!(record.contract.status, ContractStatus::PendingFinance);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn delete_cascades_to_logs_and_attachments() {
        let store = MemoryStore::new();
        let creator = user_with_role("alice", Role::Normal);
        let contract = draft_contract(creator.id);
        let id = contract.id;

        let mut snap = store.begin_snapshot().await.unwrap();
        store.insert_contract(&mut snap, contract).await.unwrap();
        let actor = pactum_core::Actor::from(&creator);
        let entry = OperationLogEntry::record(
            id,
            &actor,
            pactum_core::WorkflowAction::Create,
            None,
            Some(ContractStatus::Draft),
            None,
        );
        store.append_operation_log(&mut snap, entry).await.unwrap();
        store
            .insert_attachment(
                &mut snap,
                Attachment {
                    id: Uuid::new_v4(),
                    contract_id: id,
                    file_name: "scan.pdf".to_string(),
                    file_size: 4,
                    storage_key: "k".to_string(),
                    created_at: OffsetDateTime::now_utc(),
                },
            )
            .await
            .unwrap();
        store.commit_snapshot(snap).await.unwrap();

        let mut snap = store.begin_snapshot().await.unwrap();
        store.get_contract_for_update(&mut snap, id).await.unwrap();
        store.delete_contract(&mut snap, id).await.unwrap();
        store.commit_snapshot(snap).await.unwrap();

        assert!(store.list_contract_logs(id).await.unwrap().is_empty());
        assert!(store.list_attachments(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_usernames_are_rejected() {
        let store = MemoryStore::new();
        store
            .insert_user(user_with_role("alice", Role::Normal))
            .await
            .unwrap();
        let err = store
            .insert_user(user_with_role("alice", Role::Finance))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUsername { .. }));
        assert_eq!(store.user_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_contracts_filters_and_paginates() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let mut snap = store.begin_snapshot().await.unwrap();
        for (i, owner) in [(0, alice), (1, alice), (2, bob)] {
            let mut c = draft_contract(owner);
            c.title = format!("Deal {}", i);
            c.contract_no = format!("HT-{:03}", i);
            store.insert_contract(&mut snap, c).await.unwrap();
        }
        store.commit_snapshot(snap).await.unwrap();

        let (total, items) = store
            .list_contracts(&ContractFilter {
                created_by: Some(alice),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(items.len(), 2);

        let (total, items) = store
            .list_contracts(&ContractFilter {
                keyword: Some("ht-002".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].contract.contract_no, "HT-002");

        let (total, items) = store
            .list_contracts(&ContractFilter {
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(items.len(), 2);
    }
}

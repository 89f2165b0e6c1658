//! Persistence for the contract workflow: the `ContractStore` and
//! `BlobStore` traits, an in-memory reference backend with transactional
//! snapshots and optimistic concurrency, a local-filesystem blob backend,
//! and the atomic workflow executor that ties status changes and audit
//! entries into single commit units.

pub mod apply;
pub mod blob;
pub mod error;
pub mod memory;
pub mod traits;

pub use apply::{ApplyError, NewContract};
pub use blob::LocalBlobStore;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use traits::{
    BlobStore, ContractFilter, ContractPatch, ContractRecord, ContractStore, OperationLogFilter,
    OperationLogRow, UserPatch,
};

#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal::Decimal;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use pactum_core::{Actor, Contract, ContractStatus, Role, User};

    use crate::apply::NewContract;

    pub fn draft_contract(created_by: Uuid) -> Contract {
        let now = OffsetDateTime::now_utc();
        Contract {
            id: Uuid::new_v4(),
            title: "服务器采购合同".to_string(),
            contract_no: format!("HT-{}", &Uuid::new_v4().simple().to_string()[..8]),
            party_a: "甲方科技有限公司".to_string(),
            party_b: "乙方信息技术有限公司".to_string(),
            amount: Decimal::new(12_345_678, 2),
            sign_date: None,
            expire_date: None,
            status: ContractStatus::Draft,
            note: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn user_with_role(name: &str, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.to_string(),
            role,
            password_hash: "unused".to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn actor(name: &str, role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), name, role)
    }

    pub fn new_contract_input() -> NewContract {
        NewContract {
            title: "服务器采购合同".to_string(),
            contract_no: format!("HT-{}", &Uuid::new_v4().simple().to_string()[..8]),
            party_a: "甲方科技有限公司".to_string(),
            party_b: "乙方信息技术有限公司".to_string(),
            amount: Decimal::new(12_345_678, 2),
            sign_date: None,
            expire_date: None,
            note: None,
        }
    }
}

//! Pactum workflow core -- the contract approval state machine, the
//! authorization guards derived from it, and the Chinese uppercase
//! currency formatter.
//!
//! Everything here is pure and synchronous: no IO, no clock beyond
//! timestamping log entries, no persistence. The storage layer
//! (`pactum-storage`) couples these decisions to durable state; the
//! HTTP layer exposes them. Both consume the same transition table, so
//! client-side gating and server-side enforcement cannot drift.

pub mod amount;
pub mod error;
pub mod guards;
pub mod model;
pub mod workflow;

pub use amount::to_chinese_amount;
pub use error::WorkflowError;
pub use guards::{action_space, ActionSpace, BlockedAction, BlockedReason};
pub use model::{Actor, Attachment, Contract, ContractStatus, OperationLogEntry, Role, User};
pub use workflow::{
    authorize_create, evaluate, rule_for, Transition, WorkflowAction, TRANSITION_TABLE,
};

#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal::Decimal;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use crate::model::{Actor, Contract, ContractStatus, Role};

    pub fn normal_user(name: &str) -> Actor {
        Actor::new(Uuid::new_v4(), name, Role::Normal)
    }

    pub fn finance(name: &str) -> Actor {
        Actor::new(Uuid::new_v4(), name, Role::Finance)
    }

    pub fn super_admin(name: &str) -> Actor {
        Actor::new(Uuid::new_v4(), name, Role::SuperAdmin)
    }

    pub fn contract_with_status(status: ContractStatus, created_by: Uuid) -> Contract {
        let now = OffsetDateTime::now_utc();
        Contract {
            id: Uuid::new_v4(),
            title: "Consulting agreement".to_string(),
            contract_no: "HT-2025-001".to_string(),
            party_a: "Acme Ltd".to_string(),
            party_b: "Widget Co".to_string(),
            amount: Decimal::new(123_456, 2),
            sign_date: None,
            expire_date: None,
            status,
            note: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// ──────────────────────────────────────────────
// Integration tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::test_support::{contract_with_status, finance, normal_user};

    /// The full review round-trip: submit, finance rejection with a
    /// remark, edit, resubmit. Each step's log entry carries the exact
    /// pre/post statuses.
    #[test]
    fn reject_and_resubmit_round_trip() {
        let alice = normal_user("alice");
        let fiona = finance("fiona");
        let mut contract = contract_with_status(ContractStatus::Draft, alice.id);
        let mut log = Vec::new();

        // A submits.
        let t = evaluate(WorkflowAction::Submit, &contract, &alice).unwrap();
        log.push(OperationLogEntry::record(
            contract.id,
            &alice,
            WorkflowAction::Submit,
            Some(t.from),
            Some(t.to),
            None,
        ));
        contract.status = t.to;
        assert_eq!(contract.status, ContractStatus::PendingFinance);

        // Finance rejects with a remark.
        let t = evaluate(WorkflowAction::RejectFinance, &contract, &fiona).unwrap();
        log.push(OperationLogEntry::record(
            contract.id,
            &fiona,
            WorkflowAction::RejectFinance,
            Some(t.from),
            Some(t.to),
            Some("missing signature".to_string()),
        ));
        contract.status = t.to;
        assert_eq!(contract.status, ContractStatus::Rejected);

        // A edits in place (no status change) and resubmits.
        let t = evaluate(WorkflowAction::Edit, &contract, &alice).unwrap();
        assert!(!t.changes_status());

        let t = evaluate(WorkflowAction::Submit, &contract, &alice).unwrap();
        log.push(OperationLogEntry::record(
            contract.id,
            &alice,
            WorkflowAction::Submit,
            Some(t.from),
            Some(t.to),
            None,
        ));
        contract.status = t.to;
        assert_eq!(contract.status, ContractStatus::PendingFinance);

        // Verify the trail.
        assert_eq!(log.len(), 3);
        assert!(log.iter().all(|e| e.is_consistent()));
        assert_eq!(log[0].from_status, Some(ContractStatus::Draft));
        assert_eq!(log[0].to_status, Some(ContractStatus::PendingFinance));
        assert_eq!(log[1].from_status, Some(ContractStatus::PendingFinance));
        assert_eq!(log[1].to_status, Some(ContractStatus::Rejected));
        assert_eq!(log[1].remark.as_deref(), Some("missing signature"));
        assert_eq!(log[2].from_status, Some(ContractStatus::Rejected));
        assert_eq!(log[2].to_status, Some(ContractStatus::PendingFinance));
    }

    /// Happy path through both review gates.
    #[test]
    fn draft_to_active_through_both_gates() {
        let alice = normal_user("alice");
        let fiona = finance("fiona");
        let root = crate::test_support::super_admin("root");
        let mut contract = contract_with_status(ContractStatus::Draft, alice.id);

        for (action, actor, expected) in [
            (WorkflowAction::Submit, &alice, ContractStatus::PendingFinance),
            (
                WorkflowAction::ApproveFinance,
                &fiona,
                ContractStatus::FinanceApproved,
            ),
            (WorkflowAction::ApproveAdmin, &root, ContractStatus::Active),
        ] {
            let t = evaluate(action, &contract, actor).unwrap();
            assert_eq!(t.from, contract.status);
            contract.status = t.to;
            assert_eq!(contract.status, expected);
        }

        // Active is re-enterable only through the table; no direct edit.
        assert!(evaluate(WorkflowAction::Edit, &contract, &alice).is_err());
    }
}

//! The contract approval state machine.
//!
//! A static transition table drives every status change: which statuses an
//! action may fire from, which status it produces, and who may trigger it.
//! [`evaluate`] is a pure function of (action, contract, actor) with no IO
//! and no side effects; the storage executor re-runs it authoritatively
//! inside the same transaction that commits the status change, so UI-side
//! gating and the enforcement path cannot drift apart.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::model::{Actor, Contract, ContractStatus, OperationLogEntry, Role};

/// Every action recorded in the operation log.
///
/// `Create` and `Edit` are logged actions that do not go through the
/// transition table; the remaining seven are status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Create,
    Edit,
    Submit,
    WithdrawCreator,
    ApproveFinance,
    RejectFinance,
    WithdrawFinance,
    ApproveAdmin,
    RejectAdmin,
}

impl WorkflowAction {
    /// The seven actions driven by the transition table.
    pub const TRANSITIONS: [WorkflowAction; 7] = [
        WorkflowAction::Submit,
        WorkflowAction::WithdrawCreator,
        WorkflowAction::ApproveFinance,
        WorkflowAction::RejectFinance,
        WorkflowAction::WithdrawFinance,
        WorkflowAction::ApproveAdmin,
        WorkflowAction::RejectAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowAction::Create => "create",
            WorkflowAction::Edit => "edit",
            WorkflowAction::Submit => "submit",
            WorkflowAction::WithdrawCreator => "withdraw_creator",
            WorkflowAction::ApproveFinance => "approve_finance",
            WorkflowAction::RejectFinance => "reject_finance",
            WorkflowAction::WithdrawFinance => "withdraw_finance",
            WorkflowAction::ApproveAdmin => "approve_admin",
            WorkflowAction::RejectAdmin => "reject_admin",
        }
    }
}

impl std::fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who may trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRequirement {
    /// Only the contract's creator, whatever their role.
    Creator,
    /// Finance or super-admin role.
    FinanceOrSuperAdmin,
    /// Super-admin role only.
    SuperAdmin,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub action: WorkflowAction,
    pub allowed_from: &'static [ContractStatus],
    pub to: ContractStatus,
    pub requirement: ActorRequirement,
}

/// The full transition table. Single source of truth for both the
/// UI-gating predicates and the authoritative enforcement path.
pub const TRANSITION_TABLE: [TransitionRule; 7] = [
    TransitionRule {
        action: WorkflowAction::Submit,
        // Rejected is re-enterable: the creator fixes the contract and
        // resubmits without a separate back-to-draft step.
        allowed_from: &[ContractStatus::Draft, ContractStatus::Rejected],
        to: ContractStatus::PendingFinance,
        requirement: ActorRequirement::Creator,
    },
    TransitionRule {
        action: WorkflowAction::WithdrawCreator,
        allowed_from: &[ContractStatus::PendingFinance],
        to: ContractStatus::Draft,
        requirement: ActorRequirement::Creator,
    },
    TransitionRule {
        action: WorkflowAction::ApproveFinance,
        allowed_from: &[ContractStatus::PendingFinance],
        to: ContractStatus::FinanceApproved,
        requirement: ActorRequirement::FinanceOrSuperAdmin,
    },
    TransitionRule {
        action: WorkflowAction::RejectFinance,
        allowed_from: &[ContractStatus::PendingFinance],
        to: ContractStatus::Rejected,
        requirement: ActorRequirement::FinanceOrSuperAdmin,
    },
    TransitionRule {
        action: WorkflowAction::WithdrawFinance,
        allowed_from: &[ContractStatus::FinanceApproved],
        to: ContractStatus::PendingFinance,
        requirement: ActorRequirement::FinanceOrSuperAdmin,
    },
    TransitionRule {
        action: WorkflowAction::ApproveAdmin,
        allowed_from: &[ContractStatus::FinanceApproved],
        to: ContractStatus::Active,
        requirement: ActorRequirement::SuperAdmin,
    },
    TransitionRule {
        action: WorkflowAction::RejectAdmin,
        allowed_from: &[ContractStatus::FinanceApproved],
        to: ContractStatus::Rejected,
        requirement: ActorRequirement::SuperAdmin,
    },
];

/// Look up the table row for a transition action. Returns `None` for
/// `Create` and `Edit`, which are not table-driven.
pub fn rule_for(action: WorkflowAction) -> Option<&'static TransitionRule> {
    TRANSITION_TABLE.iter().find(|r| r.action == action)
}

/// A permitted status change computed by [`evaluate`].
///
/// `from == to` for `Edit`, which is authorized and logged but does not
/// move the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ContractStatus,
    pub to: ContractStatus,
}

impl Transition {
    pub fn changes_status(&self) -> bool {
        self.from != self.to
    }
}

fn check_requirement(
    req: ActorRequirement,
    contract: &Contract,
    actor: &Actor,
    action: WorkflowAction,
) -> Result<(), WorkflowError> {
    let ok = match req {
        ActorRequirement::Creator => actor.is_creator_of(contract),
        ActorRequirement::FinanceOrSuperAdmin => {
            matches!(actor.role, Role::Finance | Role::SuperAdmin)
        }
        ActorRequirement::SuperAdmin => actor.role == Role::SuperAdmin,
    };
    if ok {
        return Ok(());
    }
    let reason = match req {
        ActorRequirement::Creator => "only the contract's creator may do this",
        ActorRequirement::FinanceOrSuperAdmin => "requires the finance or super_admin role",
        ActorRequirement::SuperAdmin => "requires the super_admin role",
    };
    Err(WorkflowError::Authorization {
        action,
        username: actor.username.clone(),
        reason: reason.to_string(),
    })
}

/// Whether an actor may create contracts at all. Finance users review
/// contracts, they do not author them.
pub fn authorize_create(actor: &Actor) -> Result<(), WorkflowError> {
    if actor.role == Role::Finance {
        return Err(WorkflowError::Authorization {
            action: WorkflowAction::Create,
            username: actor.username.clone(),
            reason: "finance users cannot create contracts".to_string(),
        });
    }
    Ok(())
}

/// Decide whether `actor` may perform `action` on `contract`, and what the
/// resulting status would be.
///
/// The identity/role requirement is checked first (Authorization error),
/// then the allowed-from set (IllegalTransition error), so a
/// wrongly-roled caller gets Authorization regardless of status. Never
/// silently no-ops.
///
/// `Create` does not apply to an existing contract and is rejected here;
/// it is gated by [`authorize_create`] before the record exists.
pub fn evaluate(
    action: WorkflowAction,
    contract: &Contract,
    actor: &Actor,
) -> Result<Transition, WorkflowError> {
    match action {
        WorkflowAction::Create => Err(WorkflowError::validation(
            "create does not apply to an existing contract",
        )),
        WorkflowAction::Edit => {
            // Creator or super_admin; finance edits nothing. Checked before
            // status so an unauthorized caller learns nothing about state.
            let allowed = actor.role == Role::SuperAdmin
                || (actor.role != Role::Finance && actor.is_creator_of(contract));
            if !allowed {
                return Err(WorkflowError::Authorization {
                    action,
                    username: actor.username.clone(),
                    reason: "only the creator or a super_admin may edit".to_string(),
                });
            }
            if !contract.status.is_editable() {
                return Err(WorkflowError::IllegalTransition {
                    action,
                    status: contract.status,
                });
            }
            Ok(Transition {
                from: contract.status,
                to: contract.status,
            })
        }
        _ => {
            let Some(rule) = rule_for(action) else {
                return Err(WorkflowError::validation(format!(
                    "{} is not a status transition",
                    action
                )));
            };
            check_requirement(rule.requirement, contract, actor, action)?;
            if !rule.allowed_from.contains(&contract.status) {
                return Err(WorkflowError::IllegalTransition {
                    action,
                    status: contract.status,
                });
            }
            Ok(Transition {
                from: contract.status,
                to: rule.to,
            })
        }
    }
}

impl OperationLogEntry {
    /// Build the audit entry for a performed action. The timestamp is
    /// assigned here, immediately before the entry enters the commit unit.
    pub fn record(
        contract_id: Uuid,
        actor: &Actor,
        action: WorkflowAction,
        from_status: Option<ContractStatus>,
        to_status: Option<ContractStatus>,
        remark: Option<String>,
    ) -> Self {
        OperationLogEntry {
            id: Uuid::new_v4(),
            contract_id,
            user_id: actor.id,
            username: actor.username.clone(),
            action,
            from_status,
            to_status,
            remark,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Check this entry against the transition table. An entry whose
    /// from/to pair is not a table row indicates a corrupted or
    /// externally-injected log.
    pub fn is_consistent(&self) -> bool {
        match self.action {
            WorkflowAction::Create => {
                self.from_status.is_none() && self.to_status == Some(ContractStatus::Draft)
            }
            WorkflowAction::Edit => {
                self.from_status.is_some() && self.from_status == self.to_status
            }
            _ => match (rule_for(self.action), self.from_status, self.to_status) {
                (Some(rule), Some(from), Some(to)) => {
                    rule.allowed_from.contains(&from) && rule.to == to
                }
                _ => false,
            },
        }
    }
}

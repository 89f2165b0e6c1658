//! Derived authorization predicates and the action space.
//!
//! Each predicate is exactly the conjunction of "role matches" and
//! "status matches" from the transition table. They exist for UI gating;
//! the storage executor re-enforces every precondition authoritatively,
//! so these are advisory by construction, never the security boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::model::{Actor, Contract, ContractStatus, Role};
use crate::workflow::{evaluate, ActorRequirement, WorkflowAction, TRANSITION_TABLE};

/// Whether the actor may see this contract at all. Super-admins and
/// finance see everything; normal users see only their own records.
pub fn can_view(contract: &Contract, actor: &Actor) -> bool {
    match actor.role {
        Role::SuperAdmin | Role::Finance => true,
        Role::Normal => actor.is_creator_of(contract),
    }
}

/// Whether the actor may delete the contract or manage its attachments.
/// Super-admins always, finance never, otherwise the creator.
pub fn can_manage(contract: &Contract, actor: &Actor) -> bool {
    match actor.role {
        Role::SuperAdmin => true,
        Role::Finance => false,
        Role::Normal => actor.is_creator_of(contract),
    }
}

pub fn can_edit(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::Edit, contract, actor).is_ok()
}

pub fn can_submit(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::Submit, contract, actor).is_ok()
}

pub fn can_withdraw_by_creator(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::WithdrawCreator, contract, actor).is_ok()
}

pub fn can_finance_approve(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::ApproveFinance, contract, actor).is_ok()
}

pub fn can_withdraw_by_finance(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::WithdrawFinance, contract, actor).is_ok()
}

pub fn can_admin_approve(contract: &Contract, actor: &Actor) -> bool {
    evaluate(WorkflowAction::ApproveAdmin, contract, actor).is_ok()
}

/// List-query visibility scope: `None` means unrestricted, `Some(id)`
/// restricts to contracts created by that user.
pub fn visible_scope(actor: &Actor) -> Option<Uuid> {
    match actor.role {
        Role::SuperAdmin | Role::Finance => None,
        Role::Normal => Some(actor.id),
    }
}

/// Why an action is currently blocked for an actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockedReason {
    RoleNotAllowed,
    NotCreator,
    WrongStatus { current: ContractStatus },
}

/// An action that exists but is not currently executable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedAction {
    pub action: WorkflowAction,
    pub reason: BlockedReason,
}

/// What this actor can do to this contract right now, and why the rest
/// is blocked. Pure function, no IO.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpace {
    pub allowed: Vec<WorkflowAction>,
    pub blocked: Vec<BlockedAction>,
}

impl ActionSpace {
    pub fn permits(&self, action: WorkflowAction) -> bool {
        self.allowed.contains(&action)
    }
}

fn blocked_reason(
    action: WorkflowAction,
    contract: &Contract,
    err: WorkflowError,
) -> BlockedReason {
    match err {
        WorkflowError::IllegalTransition { .. } => BlockedReason::WrongStatus {
            current: contract.status,
        },
        _ => {
            let requires_creator = crate::workflow::rule_for(action)
                .map(|r| r.requirement == ActorRequirement::Creator)
                .unwrap_or(false);
            if requires_creator {
                BlockedReason::NotCreator
            } else {
                BlockedReason::RoleNotAllowed
            }
        }
    }
}

/// Compute the action space for an actor over one contract: `Edit` plus
/// every transition in the table, classified as allowed or blocked.
pub fn action_space(contract: &Contract, actor: &Actor) -> ActionSpace {
    let mut allowed = Vec::new();
    let mut blocked = Vec::new();

    let mut consider = vec![WorkflowAction::Edit];
    consider.extend(TRANSITION_TABLE.iter().map(|r| r.action));

    for action in consider {
        match evaluate(action, contract, actor) {
            Ok(_) => allowed.push(action),
            Err(err) => blocked.push(BlockedAction {
                action,
                reason: blocked_reason(action, contract, err),
            }),
        }
    }

    ActionSpace { allowed, blocked }
}

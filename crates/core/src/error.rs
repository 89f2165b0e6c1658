use crate::model::ContractStatus;
use crate::workflow::WorkflowAction;

/// All errors the workflow core can produce.
///
/// Every variant is terminal for the requested operation: the core never
/// retries, and the caller is responsible for surfacing a message and
/// refreshing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// The actor's role or identity does not satisfy the action's
    /// requirement.
    #[error("'{username}' is not authorized to {action}: {reason}")]
    Authorization {
        action: WorkflowAction,
        username: String,
        reason: String,
    },

    /// The contract's current status is not in the action's allowed-from
    /// set. Also produced when a concurrent actor won the race and the
    /// precondition status no longer matches.
    #[error("cannot {action} a contract in status '{status}'")]
    IllegalTransition {
        action: WorkflowAction,
        status: ContractStatus,
    },

    /// Malformed field-level input (negative amount, out-of-range
    /// formatter input, and the like).
    #[error("validation failed: {message}")]
    Validation { message: String },
}

impl WorkflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            message: message.into(),
        }
    }
}

use uuid::Uuid;

/// All errors a `ContractStore` or `BlobStore` implementation can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency check failed: another transaction modified
    /// the contract after this snapshot read it. The caller lost the race.
    #[error("concurrent conflict on contract {contract_id}: expected version {expected_version}")]
    ConcurrentConflict {
        contract_id: Uuid,
        expected_version: i64,
    },

    #[error("contract not found: {contract_id}")]
    ContractNotFound { contract_id: Uuid },

    #[error("attachment not found: {attachment_id}")]
    AttachmentNotFound { attachment_id: Uuid },

    #[error("user not found: {user_id}")]
    UserNotFound { user_id: Uuid },

    #[error("username already taken: {username}")]
    DuplicateUsername { username: String },

    #[error("no user named '{username}'")]
    UnknownUsername { username: String },

    #[error("stored object not found: {key}")]
    BlobNotFound { key: String },

    /// A backend-specific failure (IO, connection, serialization).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StorageError::Backend(err.to_string())
    }
}

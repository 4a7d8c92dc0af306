use roster_core::error::CoreError;
use roster_core::password::HashingError;
use roster_db::StoreError;

/// Error type for [`UserDirectory`](crate::UserDirectory) operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Bad caller input or a missing record.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The password could not be hashed. Raised before any store call.
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] HashingError),

    /// The store rejected or timed out the operation.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl DirectoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Core(CoreError::Validation(msg.into()))
    }
}

use crate::models::AlbumId;
use thiserror::Error;

/// Catalog mutation and lookup failures.
///
/// Every variant is recoverable: the store is left exactly as it was before
/// the failed call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("An album named \"{name}\" already exists")]
    DuplicateName { name: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl LibraryError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        LibraryError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Duplicate or malformed input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LibraryError::DuplicateName { .. } | LibraryError::InvalidInput { .. }
        )
    }

    /// A stale id reference, including a missing reparent target or source.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LibraryError::NotFound { .. }
                | LibraryError::Merge(MergeError::TargetNotFound { .. })
                | LibraryError::Merge(MergeError::SourceNotFound { .. })
        )
    }
}

/// Reasons a reparent ("merge") request is rejected.
///
/// Checks run in declaration order and the first failure wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    #[error("Target album not found: {target_id}")]
    TargetNotFound { target_id: AlbumId },

    #[error("Album {target_id} cannot be made its own parent")]
    SelfParenting { target_id: AlbumId },

    #[error(
        "Cannot make \"{source_name}\" a sub-album of \"{target_name}\": \
         \"{target_name}\" is already a descendant of \"{source_name}\""
    )]
    CyclicDependency {
        source_id: AlbumId,
        target_id: AlbumId,
        source_name: String,
        target_name: String,
    },

    #[error("Source album not found: {source_id}")]
    SourceNotFound { source_id: AlbumId },
}

pub type Result<T> = std::result::Result<T, LibraryError>;

//! Custom error handler for domain (core).

pub type Result<T> = std::result::Result<T, DomainError>;

/// Enum representing custom domain errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("`{value}` is not a valid {kind}")]
    InvalidEnum { kind: &'static str, value: String },
    #[error("a post must be owned by exactly one user or one community")]
    InvalidPostOwner,
    #[error("a user cannot be related to themselves")]
    SelfRelation,
}

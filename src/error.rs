//! Application-level errors.

use std::fmt::Display;

use crate::domain::error::DomainError;

pub type Result<T> = std::result::Result<T, ApplicationError>;

/// Errors that can occur while evaluating permissions or running a
/// lifecycle transition.
///
/// A denied permission is never an error on `can_*` predicates: they return
/// `false`. [`ApplicationError::Forbidden`] is only returned by operations
/// that mutate state behind a gate.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} already exists")]
    AlreadyExists { entity: &'static str },
    #[error("action is not permitted")]
    Forbidden,

    #[error("internal server error")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(err))
    }
}

pub trait ToInternal<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToInternal<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn catch(self) -> Result<T> {
        self.map_err(|e| ApplicationError::Internal(Box::new(e)))
    }
}

/// Turn a missing row into [`ApplicationError::NotFound`].
pub trait OrNotFound<T> {
    fn or_not_found(self, entity: &'static str, id: impl Display) -> Result<T>;
}

impl<T> OrNotFound<T> for Option<T> {
    fn or_not_found(self, entity: &'static str, id: impl Display) -> Result<T> {
        self.ok_or_else(|| ApplicationError::not_found(entity, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_not_found() {
        let err = None::<u8>.or_not_found("chat", 42).unwrap_err();
        assert_eq!(err.to_string(), "chat 42 not found");
        assert_eq!(Some(1).or_not_found("chat", 42).unwrap(), 1);
    }

    #[test]
    fn test_catch_wraps_foreign_errors() {
        let res: std::result::Result<(), std::fmt::Error> = Err(std::fmt::Error);
        assert!(matches!(res.catch(), Err(ApplicationError::Internal(_))));
    }
}

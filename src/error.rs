//! Domain error taxonomy.
//!
//! Repository functions return `anyhow::Result` and raise these values when a
//! request cannot be honored. Callers recover the class with [`SapError::classify`].

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SapError {
    /// Caller-supplied ids or payloads do not match existing rows
    #[error("{0}")]
    Validation(String),

    /// Dependent rows still reference the target of a deletion
    #[error("{0}")]
    Conflict(String),

    /// The pipeline is not in the state the operation presupposes
    #[error("{0}")]
    State(String),

    /// The job-execution service refused or could not be reached
    #[error("{0}")]
    ExternalService(String),

    #[error("Invalid association strategy: {0}")]
    InvalidStrategy(i64),
}

/// HTTP-equivalent classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    BadRequest,
    Internal,
}

impl SapError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SapError::Validation(_)
            | SapError::Conflict(_)
            | SapError::State(_)
            | SapError::InvalidStrategy(_) => ErrorClass::BadRequest,
            SapError::ExternalService(_) => ErrorClass::Internal,
        }
    }

    /// Classify any error from the library. Anything that is not a domain
    /// error (datastore failures included) is internal.
    pub fn classify(err: &anyhow::Error) -> ErrorClass {
        match err.downcast_ref::<SapError>() {
            Some(e) => e.class(),
            None => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_are_bad_requests() {
        assert_eq!(SapError::Validation("x".into()).class(), ErrorClass::BadRequest);
        assert_eq!(SapError::Conflict("x".into()).class(), ErrorClass::BadRequest);
        assert_eq!(SapError::State("x".into()).class(), ErrorClass::BadRequest);
        assert_eq!(SapError::InvalidStrategy(9).class(), ErrorClass::BadRequest);
        assert_eq!(SapError::ExternalService("x".into()).class(), ErrorClass::Internal);
    }

    #[test]
    fn test_classify_through_anyhow() {
        let err: anyhow::Error = SapError::Conflict("busy".into()).into();
        assert_eq!(SapError::classify(&err), ErrorClass::BadRequest);

        let err = anyhow::anyhow!("disk full");
        assert_eq!(SapError::classify(&err), ErrorClass::Internal);
    }

    #[test]
    fn test_classify_survives_context() {
        use anyhow::Context;
        let res: Result<(), SapError> = Err(SapError::State("no pipeline".into()));
        let err = res.context("Failed to create review cycle").unwrap_err();
        assert_eq!(SapError::classify(&err), ErrorClass::BadRequest);
    }
}

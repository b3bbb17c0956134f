//! Two-tier error model.
//!
//! RPC failures come in two distinct flavors that must never be conflated:
//!
//! - [`ProtocolAbort`]: the call itself is malformed (missing or unsupported
//!   version, or the plugin is decommissioning).  The transport layer turns
//!   these into a transport-level error; no response envelope is produced.
//! - [`GeneralError`]: the call was well-formed but semantically rejected.
//!   The transport returns a *successful* response whose payload carries the
//!   structured `{code, description, caller_must_not_retry}` error.
//!
//! [`RpcError`] keeps the two tiers apart at the type level.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use liblvm::LvmError;

/// Transport-level failures that abort a call before any response envelope
/// is produced.  None of them are retryable as-is.
#[derive(Debug, Error, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProtocolAbort {
    #[error("The version field must be specified.")]
    MissingVersion,
    #[error("The requested version is not supported.")]
    UnsupportedVersion,
    #[error("This service is running in 'remove volume group' mode.")]
    RemovingMode,
}

/// Machine-readable classification of an in-band error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    MissingRequiredField,
    InvalidArgument,
    UnsupportedFilesystem,
    UnexpectedPublishContext,
    AlreadyExists,
    InsufficientSpace,
    BackendError,
}

/// Structured error payload returned inside a successful response.
#[derive(Debug, Error, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[error("{description}")]
pub struct GeneralError {
    pub code: ErrorCode,
    pub description: String,
    /// `true` when retrying the identical call can never succeed.
    pub caller_must_not_retry: bool,
}

impl GeneralError {
    pub fn missing_field(description: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::MissingRequiredField,
            description: description.into(),
            caller_must_not_retry: false,
        }
    }

    pub fn invalid_argument(description: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidArgument,
            description: description.into(),
            caller_must_not_retry: false,
        }
    }

    pub fn unsupported_filesystem() -> Self {
        Self {
            code: ErrorCode::UnsupportedFilesystem,
            description: "The requested filesystem type is not supported.".to_owned(),
            caller_must_not_retry: true,
        }
    }

    pub fn unexpected_publish_context() -> Self {
        Self {
            code: ErrorCode::UnexpectedPublishContext,
            description: "The publish_context field must not be specified.".to_owned(),
            caller_must_not_retry: true,
        }
    }

    pub fn already_exists(description: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::AlreadyExists,
            description: description.into(),
            caller_must_not_retry: false,
        }
    }

    pub fn insufficient_space(description: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InsufficientSpace,
            description: description.into(),
            caller_must_not_retry: false,
        }
    }

    pub fn backend(description: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::BackendError,
            description: description.into(),
            caller_must_not_retry: false,
        }
    }
}

impl From<LvmError> for GeneralError {
    fn from(err: LvmError) -> Self {
        GeneralError::backend(err.to_string())
    }
}

/// Any failure an RPC entry point can produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Aborts the call at the transport level.
    #[error(transparent)]
    Abort(#[from] ProtocolAbort),
    /// Returned to the caller inside a successful response envelope.
    #[error(transparent)]
    Field(#[from] GeneralError),
}

impl From<LvmError> for RpcError {
    fn from(err: LvmError) -> Self {
        RpcError::Field(err.into())
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_messages() {
        assert_eq!(
            ProtocolAbort::MissingVersion.to_string(),
            "The version field must be specified."
        );
        assert_eq!(
            ProtocolAbort::UnsupportedVersion.to_string(),
            "The requested version is not supported."
        );
    }

    #[test]
    fn missing_field_is_retryable() {
        let err = GeneralError::missing_field("The name field must be specified.");
        assert_eq!(err.code, ErrorCode::MissingRequiredField);
        assert!(!err.caller_must_not_retry);
        assert_eq!(err.to_string(), "The name field must be specified.");
    }

    #[test]
    fn backend_error_keeps_operation_tag() {
        let lvm = LvmError::new("create_linear_volume", 5, "device lost\nretry later");
        let err = GeneralError::from(lvm);
        assert_eq!(err.code, ErrorCode::BackendError);
        assert_eq!(
            err.description,
            "lvm: create_linear_volume: device lost retry later (5)"
        );
    }

    #[test]
    fn general_error_serde_roundtrip() {
        let err = GeneralError::unsupported_filesystem();
        let json = serde_json::to_string(&err).expect("serialize");
        let de: GeneralError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(de, err);
    }

    #[test]
    fn tiers_stay_distinct() {
        let abort: RpcError = ProtocolAbort::RemovingMode.into();
        assert!(matches!(abort, RpcError::Abort(_)));
        let field: RpcError = GeneralError::missing_field("x").into();
        assert!(matches!(field, RpcError::Field(_)));
    }
}

//! Volume-manager error type.
//!
//! Every failure that crosses the [`VolumeManager`](crate::manager::VolumeManager)
//! boundary is an [`LvmError`]: the native errno, a single-line message, and
//! the name of the operation that failed.

use thiserror::Error;

/// A failure reported by the volume manager.
///
/// The native library produces multi-line diagnostics; [`LvmError::new`]
/// collapses embedded line breaks so the message stays usable in structured
/// log fields and single-line error chains.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("lvm: {op}: {message} ({errno})")]
pub struct LvmError {
    /// Name of the volume-manager operation that failed.
    pub op: &'static str,
    /// Errno reported by the native library.
    pub errno: i32,
    /// Single-line failure message.
    pub message: String,
}

impl LvmError {
    /// Build an error for `op`, collapsing any embedded line breaks in
    /// `message` into single spaces.
    pub fn new(op: &'static str, errno: i32, message: impl Into<String>) -> Self {
        let message = message
            .into()
            .replace('\n', " ")
            .trim_end()
            .to_owned();
        Self { op, errno, message }
    }
}

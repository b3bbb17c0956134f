//! # liblvm: serialized volume-manager access for the CSI plugin
//!
//! `liblvm` defines the boundary between the CSI volume lifecycle engine and
//! the underlying logical-volume manager.  The native lvm2 library has no
//! concurrency contract of its own, so every call must funnel through a
//! single process-wide lock, and every group-level operation must be
//! bracketed by an open/close pair that takes and releases the on-disk
//! volume group lock.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`manager`] | [`VolumeManager`] trait: the raw capability set of the native library. |
//! | [`handle`] | [`LvmHandle`]: mutex-serialized, scoped open/close access. |
//! | [`memory`] | [`MemoryVolumeManager`]: in-memory backend for tests and development. |
//! | [`error`] | [`LvmError`]: native failure with errno and operation tag. |

pub mod error;
pub mod handle;
pub mod manager;
pub mod memory;

// Re-export the most commonly used items at crate root for convenience.
pub use error::LvmError;
pub use handle::LvmHandle;
pub use manager::{GroupId, LvInfo, OpenMode, VolumeManager};
pub use memory::MemoryVolumeManager;

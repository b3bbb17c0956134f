//! # liblvmcsi: CSI volume lifecycle engine over LVM
//!
//! `liblvmcsi` implements the storage-plugin side of the Container Storage
//! Interface for a single LVM volume group: request validation, idempotent
//! volume provisioning, capacity reporting, and node-local publish into the
//! mount table.  It is transport-agnostic; a server in front of it decodes
//! wire frames into the request types here and encodes the results back.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`plugin`] | [`LvmCsiPlugin`]: one entry point per RPC. |
//! | [`validate`] | [`RequestValidator`]: ordered, first-failure request checks. |
//! | [`lifecycle`] | [`VolumeLifecycle`]: idempotent create/delete/list/capacity. |
//! | [`node`] | [`NodeMountController`]: publish and unpublish at a target path. |
//! | [`capacity`] | Extent-size arithmetic. |
//! | [`types`] | Protocol data model. |
//! | [`error`] | Two-tier error model: protocol aborts vs in-band errors. |
//! | [`config`] | Immutable startup configuration. |

pub mod capacity;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod node;
pub mod plugin;
pub mod types;
pub mod validate;

pub use config::PluginConfig;
pub use error::{ErrorCode, GeneralError, ProtocolAbort, RpcError, RpcResult};
pub use lifecycle::VolumeLifecycle;
pub use node::{MountEntry, MountError, Mounter, NodeMountController, SysMounter};
pub use plugin::{LvmCsiPlugin, PLUGIN_NAME};
pub use types::{SUPPORTED_VERSION, Version, VolumeCapability, VolumeInfo};
pub use validate::RequestValidator;

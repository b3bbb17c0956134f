//! Node-local publish and unpublish.
//!
//! [`NodeMountController`] makes a provisioned logical volume available at a
//! target path on the node: mount capabilities become a filesystem mount of
//! the volume's device node, block capabilities become a bind-mount of the
//! device node itself.  Both directions are idempotent; the mount table is
//! the source of truth, not directory existence.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use liblvm::{LvmHandle, OpenMode};

use crate::config::PluginConfig;
use crate::error::{GeneralError, RpcError};
use crate::types::{AccessType, NodePublishVolumeRequest, NodeUnpublishVolumeRequest};

/// A mount or unmount failure, tagged with the operation that produced it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{op} {target}: {message}")]
pub struct MountError {
    pub op: &'static str,
    pub target: String,
    pub message: String,
}

impl MountError {
    fn new(op: &'static str, target: &str, message: impl Into<String>) -> Self {
        Self {
            op,
            target: target.to_owned(),
            message: message.into(),
        }
    }
}

impl From<MountError> for GeneralError {
    fn from(err: MountError) -> Self {
        GeneralError::backend(err.to_string())
    }
}

impl From<MountError> for RpcError {
    fn from(err: MountError) -> Self {
        RpcError::Field(err.into())
    }
}

/// How a mounted filesystem appears in the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub fs_type: String,
    pub read_only: bool,
}

/// Mount-table operations, abstracted so tests can run without privileges.
pub trait Mounter: Send + Sync {
    /// Mount `source` at `target` with the given filesystem, creating the
    /// target directory if needed.
    fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        flags: &[String],
        read_only: bool,
    ) -> Result<(), MountError>;

    /// Bind-mount the file or device node `source` onto `target`.
    fn bind_mount(&self, source: &str, target: &str, read_only: bool) -> Result<(), MountError>;

    /// Unmount `target`.
    fn unmount(&self, target: &str) -> Result<(), MountError>;

    /// The mount-table entry for `target`, if it is currently a mount point.
    fn entry_for(&self, target: &str) -> Result<Option<MountEntry>, MountError>;
}

/// [`Mounter`] backed by `mount(2)`/`umount(2)` and `/proc/self/mounts`.
#[derive(Debug, Default)]
pub struct SysMounter;

impl SysMounter {
    fn ensure_dir(target: &str) -> Result<(), MountError> {
        fs::create_dir_all(target)
            .map_err(|e| MountError::new("create_target", target, e.to_string()))
    }
}

impl Mounter for SysMounter {
    fn mount(
        &self,
        source: &str,
        target: &str,
        fs_type: &str,
        flags: &[String],
        read_only: bool,
    ) -> Result<(), MountError> {
        Self::ensure_dir(target)?;
        let mut ms_flags = nix::mount::MsFlags::empty();
        if read_only {
            ms_flags |= nix::mount::MsFlags::MS_RDONLY;
        }
        let data = flags.join(",");
        nix::mount::mount(
            Some(source),
            target,
            Some(fs_type),
            ms_flags,
            if data.is_empty() {
                None
            } else {
                Some(data.as_str())
            },
        )
        .map_err(|e| MountError::new("mount", target, e.to_string()))
    }

    fn bind_mount(&self, source: &str, target: &str, read_only: bool) -> Result<(), MountError> {
        // Bind-mounting a device node needs an existing file as the target.
        if let Some(parent) = Path::new(target).parent() {
            fs::create_dir_all(parent)
                .map_err(|e| MountError::new("create_target", target, e.to_string()))?;
        }
        if !Path::new(target).exists() {
            fs::File::create(target)
                .map_err(|e| MountError::new("create_target", target, e.to_string()))?;
        }

        nix::mount::mount(
            Some(source),
            target,
            None::<&str>,
            nix::mount::MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| MountError::new("bind_mount", target, e.to_string()))?;

        // MS_RDONLY is ignored on the initial bind call on some kernels; a
        // remount is required to actually enforce read-only access.
        if read_only {
            nix::mount::mount(
                None::<&str>,
                target,
                None::<&str>,
                nix::mount::MsFlags::MS_BIND
                    | nix::mount::MsFlags::MS_REMOUNT
                    | nix::mount::MsFlags::MS_RDONLY,
                None::<&str>,
            )
            .map_err(|e| MountError::new("remount_read_only", target, e.to_string()))?;
        }
        Ok(())
    }

    fn unmount(&self, target: &str) -> Result<(), MountError> {
        nix::mount::umount(target).map_err(|e| MountError::new("unmount", target, e.to_string()))
    }

    fn entry_for(&self, target: &str) -> Result<Option<MountEntry>, MountError> {
        let contents = fs::read_to_string("/proc/self/mounts")
            .map_err(|e| MountError::new("read_mount_table", target, e.to_string()))?;
        // Format: <device> <mountpoint> <fstype> <options> <dump> <pass>.
        // Target paths must not contain whitespace, so direct comparison of
        // the second column is safe.
        for line in contents.lines() {
            let mut fields = line.split_whitespace();
            let source = fields.next();
            let mountpoint = fields.next();
            let fs_type = fields.next();
            let options = fields.next().unwrap_or_default();
            if mountpoint == Some(target) {
                return Ok(Some(MountEntry {
                    source: source.unwrap_or_default().to_owned(),
                    fs_type: fs_type.unwrap_or_default().to_owned(),
                    read_only: options.split(',').any(|o| o == "ro"),
                }));
            }
        }
        Ok(None)
    }
}

/// Publish/unpublish orchestration for one volume group.
pub struct NodeMountController {
    handle: LvmHandle,
    group_name: String,
    default_fs: String,
    supported_fs: Vec<String>,
    mounter: Box<dyn Mounter>,
}

impl NodeMountController {
    pub fn new(handle: LvmHandle, config: &PluginConfig, mounter: impl Mounter + 'static) -> Self {
        Self {
            handle,
            group_name: config.volume_group.clone(),
            default_fs: config.default_filesystem().to_owned(),
            supported_fs: config
                .supported_filesystems
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
            mounter: Box::new(mounter),
        }
    }

    /// Device node of a logical volume as exposed by the device mapper.
    fn device_path(&self, volume_id: &str) -> String {
        format!("/dev/{}/{}", self.group_name, volume_id)
    }

    /// Filesystem a mount capability resolves to.
    fn resolve_fs<'a>(&'a self, fs_type: &'a str) -> &'a str {
        if fs_type.is_empty() {
            self.default_fs.as_str()
        } else {
            fs_type
        }
    }

    /// Whether an existing mount at the target already satisfies the
    /// requested capability.  A block publish is a bind of the raw device
    /// node and never shows up under one of the mountable filesystems, so a
    /// supported-filesystem entry means the target was published with a
    /// mount capability.
    fn entry_matches(&self, entry: &MountEntry, access_type: &AccessType, read_only: bool) -> bool {
        if entry.read_only != read_only {
            return false;
        }
        match access_type {
            AccessType::Mount { fs_type, .. } => entry
                .fs_type
                .eq_ignore_ascii_case(self.resolve_fs(fs_type)),
            AccessType::Block => !self
                .supported_fs
                .iter()
                .any(|f| entry.fs_type.eq_ignore_ascii_case(f)),
        }
    }

    /// Mount a volume at the request's target path.
    ///
    /// Publishing an already-published volume at the same target with the
    /// same capability is a no-op; a target claimed by a different device,
    /// or by this device with a different capability, is a conflict.
    #[instrument(skip(self, req), fields(volume = %req.volume_id, target = %req.target_path))]
    pub fn publish(&self, req: &NodePublishVolumeRequest) -> Result<(), RpcError> {
        let device = self.device_path(&req.volume_id);

        // The volume must exist before the mount table is touched.
        let exists = self
            .handle
            .with_group(&self.group_name, OpenMode::ReadOnly, |vm, group| {
                Ok::<_, RpcError>(vm.find_volume(group, &req.volume_id)?.is_some())
            })?;
        if !exists {
            return Err(GeneralError::invalid_argument(format!(
                "The volume {} does not exist.",
                req.volume_id
            ))
            .into());
        }

        // Validation guarantees the capability and its access type are set.
        let access_type = req
            .volume_capability
            .as_ref()
            .and_then(|cap| cap.access_type.as_ref())
            .ok_or_else(|| {
                GeneralError::missing_field(
                    "The volume_capability.access_type field must be specified.",
                )
            })?;

        if let Some(entry) = self.mounter.entry_for(&req.target_path)? {
            if entry.source != device {
                return Err(GeneralError::already_exists(format!(
                    "The target_path is already mounted from {}.",
                    entry.source
                ))
                .into());
            }
            if self.entry_matches(&entry, access_type, req.read_only) {
                debug!("target already mounted from this volume, publish is a no-op");
                return Ok(());
            }
            return Err(GeneralError::already_exists(
                "The volume is already published at the target_path with a \
                 different capability.",
            )
            .into());
        }

        match access_type {
            AccessType::Mount {
                fs_type,
                mount_flags,
            } => {
                let fs = self.resolve_fs(fs_type);
                self.mounter
                    .mount(&device, &req.target_path, fs, mount_flags, req.read_only)?;
            }
            AccessType::Block => {
                self.mounter
                    .bind_mount(&device, &req.target_path, req.read_only)?;
            }
        }

        info!(device, read_only = req.read_only, "volume published");
        Ok(())
    }

    /// Unmount the request's target path.  An unmounted target is a no-op;
    /// a target mounted from anything other than this volume's device is
    /// rejected; an unmount failure is reported, never swallowed.
    #[instrument(skip(self, req), fields(volume = %req.volume_id, target = %req.target_path))]
    pub fn unpublish(&self, req: &NodeUnpublishVolumeRequest) -> Result<(), RpcError> {
        let device = self.device_path(&req.volume_id);
        let Some(entry) = self.mounter.entry_for(&req.target_path)? else {
            debug!("target not mounted, unpublish is a no-op");
            return Ok(());
        };
        if entry.source != device {
            return Err(GeneralError::invalid_argument(format!(
                "The target_path is mounted from {}, not from the volume {}.",
                entry.source, req.volume_id
            ))
            .into());
        }
        if let Err(err) = self.mounter.unmount(&req.target_path) {
            warn!(error = %err, "unmount failed");
            return Err(err.into());
        }
        info!("volume unpublished");
        Ok(())
    }
}

//! Idempotent volume lifecycle orchestration.
//!
//! [`VolumeLifecycle`] turns validated controller requests into serialized
//! operations against one volume group.  Every method reopens the group
//! under the [`LvmHandle`] lock and closes it before returning, so the
//! values handed back to callers never hold an open native handle.

use tracing::{debug, info, instrument};

use liblvm::{LvmHandle, OpenMode};

use crate::capacity;
use crate::error::{GeneralError, RpcError};
use crate::types::{CreateVolumeRequest, VolumeCapability, VolumeInfo};

pub struct VolumeLifecycle {
    handle: LvmHandle,
    group_name: String,
}

impl VolumeLifecycle {
    pub fn new(handle: LvmHandle, group_name: impl Into<String>) -> Self {
        Self {
            handle,
            group_name: group_name.into(),
        }
    }

    /// Open and close the volume group, verifying it exists and its lock can
    /// be taken.
    pub fn probe(&self) -> Result<(), RpcError> {
        self.handle
            .with_group(&self.group_name, OpenMode::ReadOnly, |_, _| Ok(()))
    }

    /// Provision a volume, or return the existing one when the request is an
    /// idempotent retry.
    ///
    /// The provisioned size is a whole number of extents and may exceed the
    /// requested byte count.  A request of zero bytes allocates all remaining
    /// free space.
    #[instrument(skip(self, req), fields(volume = %req.name))]
    pub fn create(&self, req: &CreateVolumeRequest) -> Result<VolumeInfo, RpcError> {
        let range = req.capacity_range.unwrap_or_default();
        // Validation has already rejected negative values.
        let required = range.required_bytes as u64;
        let limit = range.limit_bytes as u64;

        self.handle
            .with_group(&self.group_name, OpenMode::ReadWrite, |vm, group| {
                if let Some(existing) = vm.find_volume(group, &req.name)? {
                    // Idempotent create: a volume that already satisfies the
                    // requested capacity range is returned unchanged.  The
                    // comparison is against the range, not the rounded size,
                    // so a retry stays a no-op even after free space moved.
                    if existing.size_bytes >= required
                        && (limit == 0 || existing.size_bytes <= limit)
                    {
                        debug!(size_bytes = existing.size_bytes, "volume already exists");
                        return Ok(VolumeInfo {
                            id: existing.name,
                            capacity_bytes: existing.size_bytes,
                        });
                    }
                    return Err(GeneralError::already_exists(format!(
                        "A volume named {} already exists with an incompatible size.",
                        req.name
                    ))
                    .into());
                }

                let extent_size = vm.group_extent_size_bytes(group)?;
                let free_extents = vm.group_free_extents(group)?;
                let size_bytes =
                    capacity::resolve_requested_bytes(required, free_extents, extent_size);
                let extents = capacity::extents_for(size_bytes, extent_size);
                capacity::check_fits(extents, free_extents)?;
                let provisioned = capacity::provisioned_bytes(extents, extent_size);
                if limit > 0 && provisioned > limit {
                    return Err(GeneralError::invalid_argument(format!(
                        "The volume would be rounded up to {provisioned} bytes, \
                         above capacity_range.limit_bytes."
                    ))
                    .into());
                }

                let lv = vm.create_linear_volume(group, &req.name, provisioned)?;
                info!(size_bytes = lv.size_bytes, "volume created");
                Ok(VolumeInfo {
                    id: lv.name,
                    capacity_bytes: lv.size_bytes,
                })
            })
    }

    /// Remove a volume.  Deleting a volume that does not exist is a no-op.
    #[instrument(skip(self))]
    pub fn delete(&self, volume_id: &str) -> Result<(), RpcError> {
        self.handle
            .with_group(&self.group_name, OpenMode::ReadWrite, |vm, group| {
                if vm.find_volume(group, volume_id)?.is_none() {
                    debug!("volume absent, delete is a no-op");
                    return Ok(());
                }
                vm.remove_volume(group, volume_id)?;
                info!("volume deleted");
                Ok(())
            })
    }

    /// All volumes in the group, sorted by name.
    pub fn list(&self) -> Result<Vec<VolumeInfo>, RpcError> {
        let mut volumes: Vec<VolumeInfo> =
            self.handle
                .with_group(&self.group_name, OpenMode::ReadOnly, |vm, group| {
                    Ok::<_, RpcError>(
                        vm.list_volumes(group)?
                            .into_iter()
                            .map(|lv| VolumeInfo {
                                id: lv.name,
                                capacity_bytes: lv.size_bytes,
                            })
                            .collect(),
                    )
                })?;
        volumes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(volumes)
    }

    /// Free space usable by volumes with the given capabilities.
    ///
    /// Logical volumes are node-local, so a capability asking for multi-node
    /// access can never be satisfied: the answer is 0 bytes, not an error.
    pub fn available_capacity(&self, caps: &[VolumeCapability]) -> Result<u64, RpcError> {
        let unsatisfiable = caps
            .iter()
            .any(|cap| matches!(cap.access_mode, Some(mode) if mode.is_multi_node()));
        if unsatisfiable {
            debug!("capability requires multi-node access, reporting zero capacity");
            return Ok(0);
        }
        self.handle
            .with_group(&self.group_name, OpenMode::ReadOnly, |vm, group| {
                Ok(vm.group_free_bytes(group)?)
            })
    }
}

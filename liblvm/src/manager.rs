//! The volume-manager capability set.
//!
//! [`VolumeManager`] is the narrow waist between the lifecycle engine and the
//! native logical-volume library.  Implementations are free to call into
//! lvm2, shell out, or keep everything in memory ([`crate::memory`]); the
//! engine only ever drives this trait, and only while holding the
//! [`LvmHandle`](crate::handle::LvmHandle) lock.

use crate::error::LvmError;

/// Open mode for a volume group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Opaque token for an open volume group handle.
///
/// Tokens are only valid between the `open_group` (or `create_group`) call
/// that produced them and the matching `close_group`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub(crate) u64);

/// A logical volume as reported by the volume manager.
///
/// `size_bytes` is the allocated size, always a whole number of extents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LvInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Raw operations of the native volume-management library.
///
/// The library is not reentrant: implementations may assume at most one call
/// is in flight at a time, and at most one volume group is open at any
/// instant.  Both invariants are enforced by
/// [`LvmHandle`](crate::handle::LvmHandle), which is the only way the engine
/// reaches this trait.
pub trait VolumeManager: Send {
    /// Names of all known volume groups.  Does not scan for new devices.
    fn list_group_names(&mut self) -> Result<Vec<String>, LvmError>;

    /// UUIDs of all known volume groups.  Does not scan for new devices.
    fn list_group_uuids(&mut self) -> Result<Vec<String>, LvmError>;

    /// Scan for new devices and volume groups.
    fn scan(&mut self) -> Result<(), LvmError>;

    /// Check `name` against the volume-group naming grammar.
    fn validate_group_name(&mut self, name: &str) -> Result<(), LvmError>;

    /// Open a volume group, acquiring its lock.
    fn open_group(&mut self, name: &str, mode: OpenMode) -> Result<GroupId, LvmError>;

    /// Close an open volume group, releasing its lock.
    fn close_group(&mut self, group: GroupId) -> Result<(), LvmError>;

    /// Create a volume group from the given physical-volume device paths.
    /// The group is returned open in read-write mode.
    fn create_group(&mut self, name: &str, devices: &[String]) -> Result<GroupId, LvmError>;

    /// Remove an open volume group from disk.  The handle must still be
    /// closed afterwards.
    fn remove_group(&mut self, group: GroupId) -> Result<(), LvmError>;

    /// Add the physical volume at `device` to an open volume group.
    fn extend_group(&mut self, group: GroupId, device: &str) -> Result<(), LvmError>;

    /// Create a linearly-allocated logical volume.  `size_bytes` must already
    /// be a whole number of extents; extent arithmetic is the caller's job.
    fn create_linear_volume(
        &mut self,
        group: GroupId,
        name: &str,
        size_bytes: u64,
    ) -> Result<LvInfo, LvmError>;

    /// Look up a logical volume by name.  Absence is not an error.
    fn find_volume(&mut self, group: GroupId, name: &str) -> Result<Option<LvInfo>, LvmError>;

    /// All logical volumes in the group, in no particular order.
    fn list_volumes(&mut self, group: GroupId) -> Result<Vec<LvInfo>, LvmError>;

    /// Remove a logical volume by name.
    fn remove_volume(&mut self, group: GroupId, name: &str) -> Result<(), LvmError>;

    /// Total size of the group in bytes.
    fn group_size_bytes(&mut self, group: GroupId) -> Result<u64, LvmError>;

    /// Unallocated space in the group in bytes.
    fn group_free_bytes(&mut self, group: GroupId) -> Result<u64, LvmError>;

    /// Number of unallocated extents in the group.
    fn group_free_extents(&mut self, group: GroupId) -> Result<u64, LvmError>;

    /// Size of one extent in bytes.
    fn group_extent_size_bytes(&mut self, group: GroupId) -> Result<u64, LvmError>;

    /// Initialize `device` as a physical volume.  A size of 0 uses the whole
    /// device.
    fn create_physical_volume(&mut self, device: &str, size_bytes: u64) -> Result<(), LvmError>;

    /// Remove the physical-volume label from `device`.
    fn remove_physical_volume(&mut self, device: &str) -> Result<(), LvmError>;
}

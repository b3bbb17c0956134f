//! In-memory volume manager.
//!
//! [`MemoryVolumeManager`] implements the full [`VolumeManager`] capability
//! set against plain maps: extent-allocated groups, physical-volume
//! bookkeeping, and the same open/close discipline the native library
//! enforces (single open handle, errors on double open, panic on unbalanced
//! close).  Every test in the workspace runs against it, and it doubles as a
//! development backend when no real volume group is available.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::error::LvmError;
use crate::manager::{GroupId, LvInfo, OpenMode, VolumeManager};

// Errno values mirrored from the native library's failure modes.
const ENOENT: i32 = 2;
const EBUSY: i32 = 16;
const EEXIST: i32 = 17;
const EINVAL: i32 = 22;
const ENOSPC: i32 = 28;

/// Default extent size for groups created through `create_group`: 4 MiB,
/// matching the lvm2 default.
const DEFAULT_EXTENT_SIZE: u64 = 4 << 20;

#[derive(Debug)]
struct MemGroup {
    uuid: String,
    extent_size_bytes: u64,
    total_extents: u64,
    devices: Vec<String>,
    /// Logical volumes by name, sized in extents.
    volumes: BTreeMap<String, u64>,
}

impl MemGroup {
    fn used_extents(&self) -> u64 {
        self.volumes.values().sum()
    }

    fn free_extents(&self) -> u64 {
        self.total_extents - self.used_extents()
    }
}

/// Map-backed [`VolumeManager`] implementation.
#[derive(Debug, Default)]
pub struct MemoryVolumeManager {
    groups: BTreeMap<String, MemGroup>,
    /// Physical volumes by device path, sized in bytes.  A device is either
    /// unattached or a member of exactly one group.
    physical_volumes: BTreeMap<String, u64>,
    /// The single open group, if any: (token, group name).
    open: Option<(u64, String)>,
    next_token: u64,
}

impl MemoryVolumeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a volume group directly, bypassing physical-volume setup.
    /// Intended for tests and development bootstrap.
    pub fn add_group(&mut self, name: &str, extent_size_bytes: u64, total_extents: u64) {
        self.groups.insert(
            name.to_owned(),
            MemGroup {
                uuid: Uuid::new_v4().to_string(),
                extent_size_bytes,
                total_extents,
                devices: Vec::new(),
                volumes: BTreeMap::new(),
            },
        );
    }

    fn open_group_mut(&mut self, group: GroupId) -> Result<&mut MemGroup, LvmError> {
        let (token, name) = self
            .open
            .as_ref()
            .ok_or_else(|| LvmError::new("group_handle", EINVAL, "no volume group is open"))?;
        if *token != group.0 {
            return Err(LvmError::new(
                "group_handle",
                EINVAL,
                "stale volume group handle",
            ));
        }
        let name = name.clone();
        self.groups
            .get_mut(&name)
            .ok_or_else(|| LvmError::new("group_handle", ENOENT, "volume group vanished"))
    }

    fn take_token(&mut self, name: &str) -> GroupId {
        self.next_token += 1;
        self.open = Some((self.next_token, name.to_owned()));
        GroupId(self.next_token)
    }
}

impl VolumeManager for MemoryVolumeManager {
    fn list_group_names(&mut self) -> Result<Vec<String>, LvmError> {
        Ok(self.groups.keys().cloned().collect())
    }

    fn list_group_uuids(&mut self) -> Result<Vec<String>, LvmError> {
        Ok(self.groups.values().map(|g| g.uuid.clone()).collect())
    }

    fn scan(&mut self) -> Result<(), LvmError> {
        // Nothing to discover in memory.
        Ok(())
    }

    fn validate_group_name(&mut self, name: &str) -> Result<(), LvmError> {
        let valid = !name.is_empty()
            && name.len() <= 127
            && name != "."
            && name != ".."
            && !name.starts_with('-')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'));
        if valid {
            Ok(())
        } else {
            Err(LvmError::new(
                "validate_group_name",
                EINVAL,
                format!("invalid volume group name {name:?}"),
            ))
        }
    }

    fn open_group(&mut self, name: &str, _mode: OpenMode) -> Result<GroupId, LvmError> {
        if let Some((_, open_name)) = &self.open {
            return Err(LvmError::new(
                "open_group",
                EBUSY,
                format!("volume group {open_name} is already open"),
            ));
        }
        if !self.groups.contains_key(name) {
            return Err(LvmError::new(
                "open_group",
                ENOENT,
                format!("volume group {name} not found"),
            ));
        }
        Ok(self.take_token(name))
    }

    fn close_group(&mut self, group: GroupId) -> Result<(), LvmError> {
        match self.open {
            Some((token, _)) if token == group.0 => {
                self.open = None;
                Ok(())
            }
            _ => Err(LvmError::new(
                "close_group",
                EINVAL,
                "volume group is not open",
            )),
        }
    }

    fn create_group(&mut self, name: &str, devices: &[String]) -> Result<GroupId, LvmError> {
        if let Some((_, open_name)) = &self.open {
            return Err(LvmError::new(
                "create_group",
                EBUSY,
                format!("volume group {open_name} is already open"),
            ));
        }
        self.validate_group_name(name)?;
        if self.groups.contains_key(name) {
            return Err(LvmError::new(
                "create_group",
                EEXIST,
                format!("volume group {name} already exists"),
            ));
        }
        let mut size_bytes = 0u64;
        for device in devices {
            size_bytes += *self.physical_volumes.get(device).ok_or_else(|| {
                LvmError::new(
                    "create_group",
                    ENOENT,
                    format!("{device} is not a physical volume"),
                )
            })?;
        }
        self.groups.insert(
            name.to_owned(),
            MemGroup {
                uuid: Uuid::new_v4().to_string(),
                extent_size_bytes: DEFAULT_EXTENT_SIZE,
                total_extents: size_bytes / DEFAULT_EXTENT_SIZE,
                devices: devices.to_vec(),
                volumes: BTreeMap::new(),
            },
        );
        Ok(self.take_token(name))
    }

    fn remove_group(&mut self, group: GroupId) -> Result<(), LvmError> {
        let name = {
            let g = self.open_group_mut(group)?;
            if !g.volumes.is_empty() {
                return Err(LvmError::new(
                    "remove_group",
                    EBUSY,
                    "volume group still contains logical volumes",
                ));
            }
            self.open.as_ref().map(|(_, n)| n.clone())
        };
        if let Some(name) = name {
            self.groups.remove(&name);
        }
        // The handle stays open; the caller closes it as usual.
        Ok(())
    }

    fn extend_group(&mut self, group: GroupId, device: &str) -> Result<(), LvmError> {
        let size = *self.physical_volumes.get(device).ok_or_else(|| {
            LvmError::new(
                "extend_group",
                ENOENT,
                format!("{device} is not a physical volume"),
            )
        })?;
        let g = self.open_group_mut(group)?;
        if g.devices.iter().any(|d| d == device) {
            return Err(LvmError::new(
                "extend_group",
                EBUSY,
                format!("{device} already belongs to the volume group"),
            ));
        }
        g.devices.push(device.to_owned());
        g.total_extents += size / g.extent_size_bytes;
        Ok(())
    }

    fn create_linear_volume(
        &mut self,
        group: GroupId,
        name: &str,
        size_bytes: u64,
    ) -> Result<LvInfo, LvmError> {
        let g = self.open_group_mut(group)?;
        if g.volumes.contains_key(name) {
            return Err(LvmError::new(
                "create_linear_volume",
                EEXIST,
                format!("logical volume {name} already exists"),
            ));
        }
        let extents = size_bytes.div_ceil(g.extent_size_bytes);
        if extents == 0 {
            return Err(LvmError::new(
                "create_linear_volume",
                EINVAL,
                "logical volume size must be larger than zero",
            ));
        }
        if extents > g.free_extents() {
            return Err(LvmError::new(
                "create_linear_volume",
                ENOSPC,
                "insufficient free space",
            ));
        }
        g.volumes.insert(name.to_owned(), extents);
        Ok(LvInfo {
            name: name.to_owned(),
            size_bytes: extents * g.extent_size_bytes,
        })
    }

    fn find_volume(&mut self, group: GroupId, name: &str) -> Result<Option<LvInfo>, LvmError> {
        let g = self.open_group_mut(group)?;
        Ok(g.volumes.get(name).map(|extents| LvInfo {
            name: name.to_owned(),
            size_bytes: extents * g.extent_size_bytes,
        }))
    }

    fn list_volumes(&mut self, group: GroupId) -> Result<Vec<LvInfo>, LvmError> {
        let g = self.open_group_mut(group)?;
        Ok(g.volumes
            .iter()
            .map(|(name, extents)| LvInfo {
                name: name.clone(),
                size_bytes: extents * g.extent_size_bytes,
            })
            .collect())
    }

    fn remove_volume(&mut self, group: GroupId, name: &str) -> Result<(), LvmError> {
        let g = self.open_group_mut(group)?;
        if g.volumes.remove(name).is_none() {
            return Err(LvmError::new(
                "remove_volume",
                ENOENT,
                format!("logical volume {name} not found"),
            ));
        }
        Ok(())
    }

    fn group_size_bytes(&mut self, group: GroupId) -> Result<u64, LvmError> {
        let g = self.open_group_mut(group)?;
        Ok(g.total_extents * g.extent_size_bytes)
    }

    fn group_free_bytes(&mut self, group: GroupId) -> Result<u64, LvmError> {
        let g = self.open_group_mut(group)?;
        Ok(g.free_extents() * g.extent_size_bytes)
    }

    fn group_free_extents(&mut self, group: GroupId) -> Result<u64, LvmError> {
        Ok(self.open_group_mut(group)?.free_extents())
    }

    fn group_extent_size_bytes(&mut self, group: GroupId) -> Result<u64, LvmError> {
        Ok(self.open_group_mut(group)?.extent_size_bytes)
    }

    fn create_physical_volume(&mut self, device: &str, size_bytes: u64) -> Result<(), LvmError> {
        if self.physical_volumes.contains_key(device) {
            return Err(LvmError::new(
                "create_physical_volume",
                EEXIST,
                format!("{device} is already a physical volume"),
            ));
        }
        self.physical_volumes.insert(device.to_owned(), size_bytes);
        Ok(())
    }

    fn remove_physical_volume(&mut self, device: &str) -> Result<(), LvmError> {
        let in_use = self
            .groups
            .values()
            .any(|g| g.devices.iter().any(|d| d == device));
        if in_use {
            return Err(LvmError::new(
                "remove_physical_volume",
                EBUSY,
                format!("{device} belongs to a volume group"),
            ));
        }
        if self.physical_volumes.remove(device).is_none() {
            return Err(LvmError::new(
                "remove_physical_volume",
                ENOENT,
                format!("{device} is not a physical volume"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1 << 20;

    fn manager() -> MemoryVolumeManager {
        let mut m = MemoryVolumeManager::new();
        m.add_group("tank", 4 * MIB, 10);
        m
    }

    #[test]
    fn open_close_bookkeeping() {
        let mut m = manager();
        let g = m.open_group("tank", OpenMode::ReadWrite).unwrap();

        let err = m.open_group("tank", OpenMode::ReadOnly).unwrap_err();
        assert_eq!(err.errno, 16);

        m.close_group(g).unwrap();
        let err = m.close_group(g).unwrap_err();
        assert_eq!(err.message, "volume group is not open");
    }

    #[test]
    fn create_volume_rounds_up_to_extent() {
        let mut m = manager();
        let g = m.open_group("tank", OpenMode::ReadWrite).unwrap();
        let lv = m.create_linear_volume(g, "vol", 4 * MIB + 1).unwrap();
        assert_eq!(lv.size_bytes, 8 * MIB);
        assert_eq!(m.group_free_extents(g).unwrap(), 8);
        m.close_group(g).unwrap();
    }

    #[test]
    fn create_volume_without_space_fails() {
        let mut m = manager();
        let g = m.open_group("tank", OpenMode::ReadWrite).unwrap();
        let err = m.create_linear_volume(g, "vol", 11 * 4 * MIB).unwrap_err();
        assert_eq!(err.errno, 28);
        assert_eq!(m.group_free_extents(g).unwrap(), 10);
        m.close_group(g).unwrap();
    }

    #[test]
    fn find_and_remove_volume() {
        let mut m = manager();
        let g = m.open_group("tank", OpenMode::ReadWrite).unwrap();
        m.create_linear_volume(g, "vol", 4 * MIB).unwrap();

        let found = m.find_volume(g, "vol").unwrap().unwrap();
        assert_eq!(found.size_bytes, 4 * MIB);
        assert!(m.find_volume(g, "other").unwrap().is_none());

        m.remove_volume(g, "vol").unwrap();
        assert!(m.find_volume(g, "vol").unwrap().is_none());
        assert_eq!(m.remove_volume(g, "vol").unwrap_err().errno, 2);
        m.close_group(g).unwrap();
    }

    #[test]
    fn group_name_grammar() {
        let mut m = MemoryVolumeManager::new();
        m.validate_group_name("tank-01.data_x+y").unwrap();
        assert!(m.validate_group_name("").is_err());
        assert!(m.validate_group_name("-leading-dash").is_err());
        assert!(m.validate_group_name("..").is_err());
        assert!(m.validate_group_name("has space").is_err());
    }

    #[test]
    fn physical_volume_and_group_lifecycle() {
        let mut m = MemoryVolumeManager::new();
        m.create_physical_volume("/dev/sdb", 40 * MIB).unwrap();
        m.create_physical_volume("/dev/sdc", 40 * MIB).unwrap();

        let g = m
            .create_group("pool", &["/dev/sdb".to_owned()])
            .unwrap();
        assert_eq!(m.group_size_bytes(g).unwrap(), 40 * MIB);

        // A member device cannot lose its label while attached.
        assert_eq!(m.remove_physical_volume("/dev/sdb").unwrap_err().errno, 16);

        m.extend_group(g, "/dev/sdc").unwrap();
        assert_eq!(m.group_size_bytes(g).unwrap(), 80 * MIB);

        m.remove_group(g).unwrap();
        m.close_group(g).unwrap();
        assert!(m.list_group_names().unwrap().is_empty());

        m.remove_physical_volume("/dev/sdb").unwrap();
        m.remove_physical_volume("/dev/sdc").unwrap();
    }

    #[test]
    fn group_uuids_are_reported() {
        let mut m = manager();
        let uuids = m.list_group_uuids().unwrap();
        assert_eq!(uuids.len(), 1);
        assert!(Uuid::parse_str(&uuids[0]).is_ok());
    }
}

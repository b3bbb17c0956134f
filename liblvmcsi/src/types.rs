//! Protocol data model: versions, capabilities, requests, and responses.
//!
//! These types mirror the decoded form of the CSI wire messages.  The
//! transport layer (out of scope for this crate) decodes incoming frames into
//! these structs and encodes the results; everything here is
//! [`Serialize`]/[`Deserialize`] so any serialization format can carry them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol version
// ---------------------------------------------------------------------------

/// A protocol version triple, carried on every request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The single protocol version this plugin speaks.
pub const SUPPORTED_VERSION: Version = Version::new(0, 1, 0);

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// How many nodes and writers may use a volume at once.
///
/// `Unknown` is the wire sentinel for an unset enum field; validation rejects
/// it before any operation sees it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessMode {
    Unknown,
    SingleNodeWriter,
    SingleNodeReaderOnly,
    MultiNodeReaderOnly,
    MultiNodeSingleWriter,
    MultiNodeMultiWriter,
}

impl AccessMode {
    /// Whether this mode requires the volume to be reachable from more than
    /// one node.  Logical volumes are node-local, so these modes can never be
    /// satisfied.
    pub fn is_multi_node(self) -> bool {
        matches!(
            self,
            AccessMode::MultiNodeReaderOnly
                | AccessMode::MultiNodeSingleWriter
                | AccessMode::MultiNodeMultiWriter
        )
    }
}

/// Whether the volume is consumed as a raw block device or a mounted
/// filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessType {
    Block,
    Mount {
        /// Filesystem to mount.  Empty selects the plugin default.
        fs_type: String,
        /// Mount options passed through to the mount call.
        #[serde(default)]
        mount_flags: Vec<String>,
    },
}

/// The capability a caller requires of a volume.
///
/// Both fields arrive as optional wire messages; validation reports each
/// missing piece with its own error description.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCapability {
    pub access_type: Option<AccessType>,
    pub access_mode: Option<AccessMode>,
}

impl VolumeCapability {
    /// A single-node read-write mount capability, the common case.
    pub fn mount(fs_type: impl Into<String>) -> Self {
        Self {
            access_type: Some(AccessType::Mount {
                fs_type: fs_type.into(),
                mount_flags: Vec::new(),
            }),
            access_mode: Some(AccessMode::SingleNodeWriter),
        }
    }

    /// A single-node read-write block capability.
    pub fn block() -> Self {
        Self {
            access_type: Some(AccessType::Block),
            access_mode: Some(AccessMode::SingleNodeWriter),
        }
    }
}

/// Requested capacity bounds for a new volume, in bytes.
///
/// `required_bytes == 0` means "allocate all remaining free space".  The
/// fields are signed because the wire carries them signed; negative values
/// are rejected during validation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRange {
    pub required_bytes: i64,
    #[serde(default)]
    pub limit_bytes: i64,
}

// ---------------------------------------------------------------------------
// Volume metadata
// ---------------------------------------------------------------------------

/// A provisioned volume as reported to the orchestrator.
///
/// The id is the logical volume name; `capacity_bytes` is the allocated size,
/// always a whole number of extents and therefore possibly larger than the
/// size originally requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeInfo {
    pub id: String,
    pub capacity_bytes: u64,
}

// ---------------------------------------------------------------------------
// Identity requests & responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetPluginInfoRequest {
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub version: Option<Version>,
}

// ---------------------------------------------------------------------------
// Controller requests & responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerProbeRequest {
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerGetCapabilitiesRequest {
    pub version: Option<Version>,
}

/// Optional controller features this plugin implements.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControllerCapability {
    CreateDeleteVolume,
    ListVolumes,
    GetCapacity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub version: Option<Version>,
    pub name: String,
    pub capacity_range: Option<CapacityRange>,
    /// `None` when the field was absent from the wire message; an empty list
    /// is reported with a different error than a missing one.
    #[serde(default)]
    pub volume_capabilities: Option<Vec<VolumeCapability>>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteVolumeRequest {
    pub version: Option<Version>,
    pub volume_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListVolumesRequest {
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCapacityRequest {
    pub version: Option<Version>,
    /// Capabilities the reported capacity must be able to satisfy.  May be
    /// empty, in which case the raw free space is reported.
    #[serde(default)]
    pub volume_capabilities: Vec<VolumeCapability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateVolumeCapabilitiesRequest {
    pub version: Option<Version>,
    pub volume_id: String,
    #[serde(default)]
    pub volume_capabilities: Option<Vec<VolumeCapability>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidateVolumeCapabilitiesResponse {
    pub supported: bool,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Node requests & responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeProbeRequest {
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeGetCapabilitiesRequest {
    pub version: Option<Version>,
}

/// Optional node features.  The node service implements only the operations
/// every plugin must provide, so there is nothing to advertise yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeCapability {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetNodeIdRequest {
    pub version: Option<Version>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodePublishVolumeRequest {
    pub version: Option<Version>,
    pub volume_id: String,
    /// Opaque context from a controller-side publish step.  This plugin's
    /// controller issues none, so any entries signal a contract mismatch and
    /// are rejected.
    #[serde(default)]
    pub publish_context: HashMap<String, String>,
    pub target_path: String,
    pub volume_capability: Option<VolumeCapability>,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeUnpublishVolumeRequest {
    pub version: Option<Version>,
    pub volume_id: String,
    pub target_path: String,
}

//! Per-RPC request validation.
//!
//! Every RPC runs through [`RequestValidator`] before any side effect.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. Decommission gate (controller and node RPCs only).
//! 2. Protocol version present.
//! 3. Protocol version exactly matches the supported version.
//! 4. RPC-specific required fields, each with its own description.
//! 5. Semantic checks: filesystem allowlist, publish-context absence,
//!    non-negative capacity range.
//!
//! Steps 1-3 fail with a [`ProtocolAbort`]; steps 4-5 fail with an in-band
//! [`GeneralError`].

use crate::config::PluginConfig;
use crate::error::{GeneralError, ProtocolAbort, RpcError};
use crate::types::*;

/// Stateless first-failure validator, configured once at plugin construction.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    supported_version: Version,
    removing: bool,
    supported_filesystems: Vec<String>,
}

impl RequestValidator {
    pub fn new(config: &PluginConfig) -> Self {
        Self {
            supported_version: SUPPORTED_VERSION,
            removing: config.remove_volume_group,
            supported_filesystems: config
                .supported_filesystems
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
        }
    }

    /// Version checks shared by every RPC.
    fn check_version(&self, version: Option<&Version>) -> Result<(), ProtocolAbort> {
        let version = version.ok_or(ProtocolAbort::MissingVersion)?;
        if *version != self.supported_version {
            return Err(ProtocolAbort::UnsupportedVersion);
        }
        Ok(())
    }

    /// Gate + version checks for controller and node RPCs.  The decommission
    /// gate comes first: once the plugin is draining it refuses all work,
    /// well-formed or not.
    fn check_general(&self, version: Option<&Version>) -> Result<(), ProtocolAbort> {
        if self.removing {
            return Err(ProtocolAbort::RemovingMode);
        }
        self.check_version(version)
    }

    fn check_capability(&self, cap: &VolumeCapability) -> Result<(), GeneralError> {
        let access_type = cap.access_type.as_ref().ok_or_else(|| {
            GeneralError::missing_field(
                "The volume_capability.access_type field must be specified.",
            )
        })?;
        if let AccessType::Mount { fs_type, .. } = access_type {
            // An empty fs_type selects the plugin default and is always fine.
            if !fs_type.is_empty()
                && !self
                    .supported_filesystems
                    .iter()
                    .any(|f| *f == fs_type.to_lowercase())
            {
                return Err(GeneralError::unsupported_filesystem());
            }
        }
        let mode = cap.access_mode.as_ref().ok_or_else(|| {
            GeneralError::missing_field(
                "The volume_capability.access_mode field must be specified.",
            )
        })?;
        if *mode == AccessMode::Unknown {
            return Err(GeneralError::missing_field(
                "The volume_capability.access_mode.mode field must be specified.",
            ));
        }
        Ok(())
    }

    fn check_capabilities_required(
        &self,
        caps: Option<&[VolumeCapability]>,
    ) -> Result<(), GeneralError> {
        let caps = caps.ok_or_else(|| {
            GeneralError::missing_field("The volume_capabilities field must be specified.")
        })?;
        if caps.is_empty() {
            return Err(GeneralError::missing_field(
                "One or more volume_capabilities must be specified.",
            ));
        }
        for cap in caps {
            self.check_capability(cap)?;
        }
        Ok(())
    }

    fn check_volume_id(volume_id: &str) -> Result<(), GeneralError> {
        if volume_id.is_empty() {
            return Err(GeneralError::missing_field(
                "The volume_id field must be specified.",
            ));
        }
        Ok(())
    }

    // --- Identity -----------------------------------------------------------

    pub fn get_plugin_info(&self, req: &GetPluginInfoRequest) -> Result<(), RpcError> {
        Ok(self.check_version(req.version.as_ref())?)
    }

    pub fn probe(&self, req: &ProbeRequest) -> Result<(), RpcError> {
        Ok(self.check_version(req.version.as_ref())?)
    }

    // --- Controller ---------------------------------------------------------

    pub fn controller_probe(&self, req: &ControllerProbeRequest) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn controller_get_capabilities(
        &self,
        req: &ControllerGetCapabilitiesRequest,
    ) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn create_volume(&self, req: &CreateVolumeRequest) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        if req.name.is_empty() {
            return Err(GeneralError::missing_field("The name field must be specified.").into());
        }
        self.check_capabilities_required(req.volume_capabilities.as_deref())?;
        if let Some(range) = &req.capacity_range {
            if range.required_bytes < 0 || range.limit_bytes < 0 {
                return Err(GeneralError::invalid_argument(
                    "The capacity_range fields must not be negative.",
                )
                .into());
            }
            if range.limit_bytes > 0 && range.limit_bytes < range.required_bytes {
                return Err(GeneralError::invalid_argument(
                    "The capacity_range.limit_bytes field must not be less than required_bytes.",
                )
                .into());
            }
        }
        Ok(())
    }

    pub fn delete_volume(&self, req: &DeleteVolumeRequest) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        Self::check_volume_id(&req.volume_id)?;
        Ok(())
    }

    pub fn list_volumes(&self, req: &ListVolumesRequest) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn get_capacity(&self, req: &GetCapacityRequest) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        // Capabilities are optional here, but any that are given must be
        // well-formed.
        for cap in &req.volume_capabilities {
            self.check_capability(cap)?;
        }
        Ok(())
    }

    pub fn validate_volume_capabilities(
        &self,
        req: &ValidateVolumeCapabilitiesRequest,
    ) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        Self::check_volume_id(&req.volume_id)?;
        self.check_capabilities_required(req.volume_capabilities.as_deref())?;
        Ok(())
    }

    // --- Node ---------------------------------------------------------------

    pub fn node_probe(&self, req: &NodeProbeRequest) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn node_get_capabilities(&self, req: &NodeGetCapabilitiesRequest) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn get_node_id(&self, req: &GetNodeIdRequest) -> Result<(), RpcError> {
        Ok(self.check_general(req.version.as_ref())?)
    }

    pub fn node_publish_volume(&self, req: &NodePublishVolumeRequest) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        Self::check_volume_id(&req.volume_id)?;
        if req.target_path.is_empty() {
            return Err(
                GeneralError::missing_field("The target_path field must be specified.").into(),
            );
        }
        let cap = req.volume_capability.as_ref().ok_or_else(|| {
            GeneralError::missing_field("The volume_capability field must be specified.")
        })?;
        self.check_capability(cap)?;
        // The controller issues no publish context; receiving one means the
        // node and controller components disagree about the contract.
        if !req.publish_context.is_empty() {
            return Err(GeneralError::unexpected_publish_context().into());
        }
        Ok(())
    }

    pub fn node_unpublish_volume(&self, req: &NodeUnpublishVolumeRequest) -> Result<(), RpcError> {
        self.check_general(req.version.as_ref())?;
        Self::check_volume_id(&req.volume_id)?;
        if req.target_path.is_empty() {
            return Err(
                GeneralError::missing_field("The target_path field must be specified.").into(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::collections::HashMap;

    fn validator() -> RequestValidator {
        RequestValidator::new(&PluginConfig::new("tank", "node-01"))
    }

    fn removing_validator() -> RequestValidator {
        let mut config = PluginConfig::new("tank", "node-01");
        config.remove_volume_group = true;
        RequestValidator::new(&config)
    }

    fn create_request() -> CreateVolumeRequest {
        CreateVolumeRequest {
            version: Some(SUPPORTED_VERSION),
            name: "test-volume".into(),
            capacity_range: None,
            volume_capabilities: Some(vec![VolumeCapability::mount("xfs")]),
            parameters: HashMap::new(),
        }
    }

    fn caps_mut(req: &mut CreateVolumeRequest) -> &mut Vec<VolumeCapability> {
        req.volume_capabilities.as_mut().unwrap()
    }

    fn publish_request() -> NodePublishVolumeRequest {
        NodePublishVolumeRequest {
            version: Some(SUPPORTED_VERSION),
            volume_id: "test-volume".into(),
            publish_context: HashMap::new(),
            target_path: "/mnt/test-volume".into(),
            volume_capability: Some(VolumeCapability::mount("xfs")),
            read_only: false,
        }
    }

    fn expect_missing(result: Result<(), RpcError>, description: &str) {
        match result {
            Err(RpcError::Field(err)) => {
                assert_eq!(err.code, ErrorCode::MissingRequiredField);
                assert_eq!(err.description, description);
                assert!(!err.caller_must_not_retry);
            }
            other => panic!("expected missing-field error, got {other:?}"),
        }
    }

    /// Every entry point, driven with the given version and otherwise
    /// well-formed fields so the version checks are what fails.
    fn all_rpcs(
        v: &RequestValidator,
        version: Option<Version>,
    ) -> Vec<(&'static str, Result<(), RpcError>)> {
        let mut create = create_request();
        create.version = version;
        let mut publish = publish_request();
        publish.version = version;
        vec![
            (
                "GetPluginInfo",
                v.get_plugin_info(&GetPluginInfoRequest { version }),
            ),
            ("Probe", v.probe(&ProbeRequest { version })),
            (
                "ControllerProbe",
                v.controller_probe(&ControllerProbeRequest { version }),
            ),
            (
                "ControllerGetCapabilities",
                v.controller_get_capabilities(&ControllerGetCapabilitiesRequest { version }),
            ),
            ("CreateVolume", v.create_volume(&create)),
            (
                "DeleteVolume",
                v.delete_volume(&DeleteVolumeRequest {
                    version,
                    volume_id: "vol".into(),
                }),
            ),
            ("ListVolumes", v.list_volumes(&ListVolumesRequest { version })),
            (
                "GetCapacity",
                v.get_capacity(&GetCapacityRequest {
                    version,
                    volume_capabilities: Vec::new(),
                }),
            ),
            (
                "ValidateVolumeCapabilities",
                v.validate_volume_capabilities(&ValidateVolumeCapabilitiesRequest {
                    version,
                    volume_id: "vol".into(),
                    volume_capabilities: Some(vec![VolumeCapability::mount("xfs")]),
                }),
            ),
            ("NodeProbe", v.node_probe(&NodeProbeRequest { version })),
            (
                "NodeGetCapabilities",
                v.node_get_capabilities(&NodeGetCapabilitiesRequest { version }),
            ),
            ("GetNodeID", v.get_node_id(&GetNodeIdRequest { version })),
            ("NodePublishVolume", v.node_publish_volume(&publish)),
            (
                "NodeUnpublishVolume",
                v.node_unpublish_volume(&NodeUnpublishVolumeRequest {
                    version,
                    volume_id: "vol".into(),
                    target_path: "/mnt/vol".into(),
                }),
            ),
        ]
    }

    #[test]
    fn every_rpc_aborts_without_a_version() {
        let v = validator();
        for (rpc, result) in all_rpcs(&v, None) {
            assert_eq!(
                result,
                Err(RpcError::Abort(ProtocolAbort::MissingVersion)),
                "{rpc}"
            );
        }
    }

    #[test]
    fn every_rpc_aborts_on_an_unsupported_version() {
        let v = validator();
        for (rpc, result) in all_rpcs(&v, Some(Version::new(0, 2, 0))) {
            assert_eq!(
                result,
                Err(RpcError::Abort(ProtocolAbort::UnsupportedVersion)),
                "{rpc}"
            );
        }
    }

    #[test]
    fn removing_mode_gates_before_version_checks() {
        let mut req = create_request();
        req.version = None;
        assert_eq!(
            removing_validator().create_volume(&req),
            Err(RpcError::Abort(ProtocolAbort::RemovingMode))
        );
    }

    #[test]
    fn removing_mode_leaves_identity_reachable() {
        let v = removing_validator();
        v.get_plugin_info(&GetPluginInfoRequest {
            version: Some(SUPPORTED_VERSION),
        })
        .unwrap();
        v.probe(&ProbeRequest {
            version: Some(SUPPORTED_VERSION),
        })
        .unwrap();
    }

    #[test]
    fn removing_mode_gates_node_rpcs() {
        let v = removing_validator();
        assert_eq!(
            v.node_unpublish_volume(&NodeUnpublishVolumeRequest {
                version: Some(SUPPORTED_VERSION),
                volume_id: "v".into(),
                target_path: "/mnt/v".into(),
            }),
            Err(RpcError::Abort(ProtocolAbort::RemovingMode))
        );
        assert_eq!(
            v.get_node_id(&GetNodeIdRequest {
                version: Some(SUPPORTED_VERSION)
            }),
            Err(RpcError::Abort(ProtocolAbort::RemovingMode))
        );
    }

    #[test]
    fn create_volume_missing_name() {
        let mut req = create_request();
        req.name.clear();
        expect_missing(
            validator().create_volume(&req),
            "The name field must be specified.",
        );
    }

    #[test]
    fn create_volume_missing_capabilities() {
        let mut req = create_request();
        req.volume_capabilities = None;
        expect_missing(
            validator().create_volume(&req),
            "The volume_capabilities field must be specified.",
        );
    }

    #[test]
    fn create_volume_empty_capabilities() {
        let mut req = create_request();
        caps_mut(&mut req).clear();
        expect_missing(
            validator().create_volume(&req),
            "One or more volume_capabilities must be specified.",
        );
    }

    #[test]
    fn create_volume_missing_access_type() {
        let mut req = create_request();
        caps_mut(&mut req)[0].access_type = None;
        expect_missing(
            validator().create_volume(&req),
            "The volume_capability.access_type field must be specified.",
        );
    }

    #[test]
    fn create_volume_missing_access_mode() {
        let mut req = create_request();
        caps_mut(&mut req)[0].access_mode = None;
        expect_missing(
            validator().create_volume(&req),
            "The volume_capability.access_mode field must be specified.",
        );
    }

    #[test]
    fn create_volume_unknown_access_mode() {
        let mut req = create_request();
        caps_mut(&mut req)[0].access_mode = Some(AccessMode::Unknown);
        expect_missing(
            validator().create_volume(&req),
            "The volume_capability.access_mode.mode field must be specified.",
        );
    }

    #[test]
    fn create_volume_negative_capacity() {
        let mut req = create_request();
        req.capacity_range = Some(CapacityRange {
            required_bytes: -1,
            limit_bytes: 0,
        });
        match validator().create_volume(&req) {
            Err(RpcError::Field(err)) => assert_eq!(err.code, ErrorCode::InvalidArgument),
            other => panic!("expected invalid-argument error, got {other:?}"),
        }
    }

    #[test]
    fn create_volume_bad_filesystem() {
        let mut req = create_request();
        caps_mut(&mut req)[0] = VolumeCapability::mount("ext4");
        match validator().create_volume(&req) {
            Err(RpcError::Field(err)) => {
                assert_eq!(err.code, ErrorCode::UnsupportedFilesystem);
                assert!(err.caller_must_not_retry);
            }
            other => panic!("expected unsupported-filesystem error, got {other:?}"),
        }
    }

    #[test]
    fn empty_fs_type_selects_default_and_passes() {
        let mut req = create_request();
        caps_mut(&mut req)[0] = VolumeCapability::mount("");
        validator().create_volume(&req).unwrap();
    }

    #[test]
    fn filesystem_match_is_case_insensitive() {
        let mut req = create_request();
        caps_mut(&mut req)[0] = VolumeCapability::mount("XFS");
        validator().create_volume(&req).unwrap();
    }

    #[test]
    fn delete_volume_missing_volume_id() {
        let req = DeleteVolumeRequest {
            version: Some(SUPPORTED_VERSION),
            volume_id: String::new(),
        };
        expect_missing(
            validator().delete_volume(&req),
            "The volume_id field must be specified.",
        );
    }

    #[test]
    fn validate_capabilities_requires_volume_id_and_caps() {
        let v = validator();
        let mut req = ValidateVolumeCapabilitiesRequest {
            version: Some(SUPPORTED_VERSION),
            volume_id: "vol".into(),
            volume_capabilities: Some(vec![VolumeCapability::block()]),
        };
        v.validate_volume_capabilities(&req).unwrap();

        req.volume_id.clear();
        expect_missing(
            v.validate_volume_capabilities(&req),
            "The volume_id field must be specified.",
        );

        req.volume_id = "vol".into();
        req.volume_capabilities = None;
        expect_missing(
            v.validate_volume_capabilities(&req),
            "The volume_capabilities field must be specified.",
        );

        req.volume_capabilities = Some(Vec::new());
        expect_missing(
            v.validate_volume_capabilities(&req),
            "One or more volume_capabilities must be specified.",
        );
    }

    #[test]
    fn get_capacity_allows_empty_capabilities() {
        validator()
            .get_capacity(&GetCapacityRequest {
                version: Some(SUPPORTED_VERSION),
                volume_capabilities: Vec::new(),
            })
            .unwrap();
    }

    #[test]
    fn get_capacity_rejects_unknown_mode() {
        let mut cap = VolumeCapability::mount("xfs");
        cap.access_mode = Some(AccessMode::Unknown);
        expect_missing(
            validator().get_capacity(&GetCapacityRequest {
                version: Some(SUPPORTED_VERSION),
                volume_capabilities: vec![cap],
            }),
            "The volume_capability.access_mode.mode field must be specified.",
        );
    }

    #[test]
    fn get_capacity_bad_filesystem() {
        match validator().get_capacity(&GetCapacityRequest {
            version: Some(SUPPORTED_VERSION),
            volume_capabilities: vec![VolumeCapability::mount("ext4")],
        }) {
            Err(RpcError::Field(err)) => assert_eq!(err.code, ErrorCode::UnsupportedFilesystem),
            other => panic!("expected unsupported-filesystem error, got {other:?}"),
        }
    }

    #[test]
    fn node_publish_missing_fields() {
        let v = validator();

        let mut req = publish_request();
        req.volume_id.clear();
        expect_missing(
            v.node_publish_volume(&req),
            "The volume_id field must be specified.",
        );

        let mut req = publish_request();
        req.target_path.clear();
        expect_missing(
            v.node_publish_volume(&req),
            "The target_path field must be specified.",
        );

        let mut req = publish_request();
        req.volume_capability = None;
        expect_missing(
            v.node_publish_volume(&req),
            "The volume_capability field must be specified.",
        );
    }

    #[test]
    fn node_publish_rejects_publish_context() {
        let mut req = publish_request();
        req.publish_context
            .insert("device".into(), "/dev/tank/test-volume".into());
        match validator().node_publish_volume(&req) {
            Err(RpcError::Field(err)) => {
                assert_eq!(err.code, ErrorCode::UnexpectedPublishContext);
                assert_eq!(
                    err.description,
                    "The publish_context field must not be specified."
                );
            }
            other => panic!("expected publish-context error, got {other:?}"),
        }
    }

    #[test]
    fn node_publish_bad_filesystem_fails_before_mount() {
        let mut req = publish_request();
        req.volume_capability = Some(VolumeCapability::mount("ext4"));
        match validator().node_publish_volume(&req) {
            Err(RpcError::Field(err)) => assert_eq!(err.code, ErrorCode::UnsupportedFilesystem),
            other => panic!("expected unsupported-filesystem error, got {other:?}"),
        }
    }

    #[test]
    fn node_unpublish_missing_target_path() {
        let req = NodeUnpublishVolumeRequest {
            version: Some(SUPPORTED_VERSION),
            volume_id: "vol".into(),
            target_path: String::new(),
        };
        expect_missing(
            validator().node_unpublish_volume(&req),
            "The target_path field must be specified.",
        );
    }
}

//! The plugin facade: one entry point per RPC.
//!
//! [`LvmCsiPlugin`] is what a transport layer calls into.  Every method runs
//! the request through [`RequestValidator`] first and only then touches the
//! volume group, so no side effect ever happens on a malformed request.

use liblvm::{LvmHandle, VolumeManager};

use crate::config::PluginConfig;
use crate::error::RpcResult;
use crate::lifecycle::VolumeLifecycle;
use crate::node::{Mounter, NodeMountController};
use crate::types::*;
use crate::validate::RequestValidator;

/// Name reported by `GetPluginInfo`.
pub const PLUGIN_NAME: &str = "csilvm";

pub struct LvmCsiPlugin {
    validator: RequestValidator,
    lifecycle: VolumeLifecycle,
    node: NodeMountController,
    node_id: String,
}

impl LvmCsiPlugin {
    pub fn new(
        config: PluginConfig,
        manager: impl VolumeManager + 'static,
        mounter: impl Mounter + 'static,
    ) -> Self {
        let handle = LvmHandle::new(manager);
        Self {
            validator: RequestValidator::new(&config),
            lifecycle: VolumeLifecycle::new(handle.clone(), config.volume_group.clone()),
            node: NodeMountController::new(handle, &config, mounter),
            node_id: config.node_id,
        }
    }

    // --- Identity -----------------------------------------------------------

    pub fn get_plugin_info(&self, req: &GetPluginInfoRequest) -> RpcResult<PluginInfo> {
        self.validator.get_plugin_info(req)?;
        Ok(PluginInfo {
            name: PLUGIN_NAME.to_owned(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
        })
    }

    pub fn probe(&self, req: &ProbeRequest) -> RpcResult<()> {
        self.validator.probe(req)?;
        Ok(())
    }

    // --- Controller ---------------------------------------------------------

    /// Verify the volume group exists and its lock can be taken.
    pub fn controller_probe(&self, req: &ControllerProbeRequest) -> RpcResult<()> {
        self.validator.controller_probe(req)?;
        self.lifecycle.probe()
    }

    pub fn controller_get_capabilities(
        &self,
        req: &ControllerGetCapabilitiesRequest,
    ) -> RpcResult<Vec<ControllerCapability>> {
        self.validator.controller_get_capabilities(req)?;
        Ok(vec![
            ControllerCapability::CreateDeleteVolume,
            ControllerCapability::ListVolumes,
            ControllerCapability::GetCapacity,
        ])
    }

    pub fn create_volume(&self, req: &CreateVolumeRequest) -> RpcResult<VolumeInfo> {
        self.validator.create_volume(req)?;
        self.lifecycle.create(req)
    }

    pub fn delete_volume(&self, req: &DeleteVolumeRequest) -> RpcResult<()> {
        self.validator.delete_volume(req)?;
        self.lifecycle.delete(&req.volume_id)
    }

    pub fn list_volumes(&self, req: &ListVolumesRequest) -> RpcResult<Vec<VolumeInfo>> {
        self.validator.list_volumes(req)?;
        self.lifecycle.list()
    }

    pub fn get_capacity(&self, req: &GetCapacityRequest) -> RpcResult<u64> {
        self.validator.get_capacity(req)?;
        self.lifecycle.available_capacity(&req.volume_capabilities)
    }

    /// Report whether the given capabilities can be satisfied at all.
    ///
    /// This never fails for an unsatisfiable capability; it answers the
    /// question in-band via `supported: false`.
    pub fn validate_volume_capabilities(
        &self,
        req: &ValidateVolumeCapabilitiesRequest,
    ) -> RpcResult<ValidateVolumeCapabilitiesResponse> {
        self.validator.validate_volume_capabilities(req)?;
        // Validation guarantees the list is present and non-empty.
        let caps = req.volume_capabilities.as_deref().unwrap_or_default();
        let multi_node = caps
            .iter()
            .any(|cap| matches!(cap.access_mode, Some(mode) if mode.is_multi_node()));
        if multi_node {
            return Ok(ValidateVolumeCapabilitiesResponse {
                supported: false,
                message: "Logical volumes are only accessible from a single node.".to_owned(),
            });
        }
        Ok(ValidateVolumeCapabilitiesResponse {
            supported: true,
            message: String::new(),
        })
    }

    // --- Node ---------------------------------------------------------------

    /// Same health check as [`Self::controller_probe`], run on the node side.
    pub fn node_probe(&self, req: &NodeProbeRequest) -> RpcResult<()> {
        self.validator.node_probe(req)?;
        self.lifecycle.probe()
    }

    pub fn node_get_capabilities(
        &self,
        req: &NodeGetCapabilitiesRequest,
    ) -> RpcResult<Vec<NodeCapability>> {
        self.validator.node_get_capabilities(req)?;
        Ok(Vec::new())
    }

    pub fn get_node_id(&self, req: &GetNodeIdRequest) -> RpcResult<String> {
        self.validator.get_node_id(req)?;
        Ok(self.node_id.clone())
    }

    pub fn node_publish_volume(&self, req: &NodePublishVolumeRequest) -> RpcResult<()> {
        self.validator.node_publish_volume(req)?;
        self.node.publish(req)
    }

    pub fn node_unpublish_volume(&self, req: &NodeUnpublishVolumeRequest) -> RpcResult<()> {
        self.validator.node_unpublish_volume(req)?;
        self.node.unpublish(req)
    }
}

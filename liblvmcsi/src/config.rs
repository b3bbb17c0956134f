//! Plugin configuration.
//!
//! All runtime knobs are collected at process start into one immutable
//! [`PluginConfig`] value that is threaded into
//! [`LvmCsiPlugin`](crate::plugin::LvmCsiPlugin) at construction.  Nothing in
//! the engine mutates configuration after startup; in particular the
//! decommission flag, once set, stays set for the process lifetime.

use serde::{Deserialize, Serialize};

/// Immutable plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Name of the volume group this plugin provisions from.
    pub volume_group: String,
    /// Identifier reported by `GetNodeID`.
    pub node_id: String,
    /// Decommission ("removing") mode: when set, every controller and node
    /// RPC is refused so the volume group can be torn down safely.  Identity
    /// RPCs stay reachable so orchestrators can still probe the plugin.
    #[serde(default)]
    pub remove_volume_group: bool,
    /// Filesystems the node service may mount.  The first entry is the
    /// default when a request leaves `fs_type` empty.
    #[serde(default = "default_filesystems")]
    pub supported_filesystems: Vec<String>,
}

fn default_filesystems() -> Vec<String> {
    vec!["xfs".to_owned()]
}

impl PluginConfig {
    pub fn new(volume_group: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            volume_group: volume_group.into(),
            node_id: node_id.into(),
            remove_volume_group: false,
            supported_filesystems: default_filesystems(),
        }
    }

    /// The filesystem used when a mount capability does not name one.
    pub fn default_filesystem(&self) -> &str {
        self.supported_filesystems
            .first()
            .map(String::as_str)
            .unwrap_or("xfs")
    }
}

//! Request payloads and response records for the VM API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;
use vmmanager_core::{AccountId, DiskId, NodeId, VmId};

/// Parameters for provisioning a new VM (`POST host`).
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct NewVmConfig {
    /// VM name.
    #[validate(length(min = 1, max = 63))]
    pub name: String,
    /// Cluster to place the VM in.
    pub cluster: u64,
    /// Owning account.
    pub account: AccountId,
    /// Operating system template id.
    pub os: u64,
    /// Initial root password.
    #[validate(length(min = 6))]
    pub password: String,
    /// Number of virtual CPUs.
    #[validate(range(min = 1))]
    pub cpu_number: u32,
    /// Memory in MiB.
    #[validate(range(min = 1))]
    pub ram_mib: u64,
    /// Primary disk size in MiB.
    #[validate(range(min = 1))]
    pub hdd_mib: u64,
    /// Number of IPv4 addresses to allocate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_number: Option<u32>,
    /// IPv4 pools to allocate from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_pool: Option<Vec<u64>>,
    /// Pin the VM to a specific node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// Resource preset id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<u64>,
    /// Domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// CPU/memory/bandwidth changes (`POST host/{id}/resource`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourcesConfig {
    /// Number of virtual CPUs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_number: Option<u32>,
    /// Memory in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_mib: Option<u64>,
    /// CPU weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_weight: Option<u32>,
    /// Network bandwidth cap in Mbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_bandwidth_mbitps: Option<u64>,
    /// Disk read cap in Mbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_read_mbitps: Option<u64>,
    /// Disk write cap in Mbit/s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_write_mbitps: Option<u64>,
}

/// Disk resize request. Only `size_mib` is sent; `id` selects the disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskConfig {
    /// Disk to resize.
    pub id: DiskId,
    /// New size in MiB.
    pub size_mib: u64,
}

/// Descriptive settings (`POST host/{id}`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateConfig {
    /// New VM name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Free-form comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Domain name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Guest CPU mode (e.g. `host-passthrough`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_mode: Option<String>,
    /// Whether the guest agent channel is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qemu_agent: Option<bool>,
}

/// OS reinstall request (`POST host/{id}/reinstall`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReinstallConfig {
    /// Operating system template id.
    pub os: u64,
    /// New root password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Notification mode (`default`, `all`, `none`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_email_mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResizeDiskRequest {
    pub size_mib: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordChange<'a> {
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct OwnerChange {
    pub account: AccountId,
}

/// VM record as returned by `GET host`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VmInfo {
    /// VM id.
    pub id: VmId,
    /// VM name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Lifecycle state (`active`, `creating`, `stopped`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Primary IPv4 address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip4: Option<Value>,
    /// Hosting node (object or id depending on API version).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Value>,
    /// Owning account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<Value>,
    /// Every other field, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cluster node record as returned by `GET node`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeInfo {
    /// Node id.
    pub id: NodeId,
    /// Node name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Node state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Every other field, untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `{ "list": [...] }` envelope used by listing endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    /// Matching records; absent or `null` when nothing matched.
    pub list: Option<Vec<T>>,
    /// Total number of records, when the service reports it.
    pub size: Option<u64>,
}

impl<T> Listing<T> {
    /// Consume the envelope, treating an absent list as empty.
    #[must_use]
    pub fn into_records(self) -> Vec<T> {
        self.list.unwrap_or_default()
    }
}

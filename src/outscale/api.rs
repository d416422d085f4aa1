//! Wire types for the Outscale JSON API.
//!
//! One request/response pair per call, named after the API action. Fields
//! the crate never reads are left out; unknown response fields are ignored
//! by serde.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct VmFilters {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vm_ids: Vec<String>,
    /// Tag equality requirements rendered as `key=value`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadVmsRequest {
    pub filters: VmFilters,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadVmsResponse {
    #[serde(default)]
    pub vms: Vec<Vm>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Vm {
    pub vm_id: String,
    pub state: String,
    #[serde(default)]
    pub private_ip: Option<String>,
    #[serde(default)]
    pub public_ip: Option<String>,
    #[serde(default)]
    pub vm_type: String,
    #[serde(default)]
    pub keypair_name: String,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupLink>,
    #[serde(default)]
    pub tags: Vec<ResourceTag>,
    #[serde(default)]
    pub placement: Option<Placement>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SecurityGroupLink {
    pub security_group_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ResourceTag {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Placement {
    #[serde(default)]
    pub subregion_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct VmIdsRequest {
    pub vm_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateImageRequest {
    pub vm_id: String,
    pub image_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateImageResponse {
    pub image: Image,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Image {
    pub image_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct BlockDeviceMapping {
    #[serde(default)]
    pub bsu: Option<Bsu>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Bsu {
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadImagesRequest {
    pub filters: ImageFilters,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ImageFilters {
    pub image_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadImagesResponse {
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteImageRequest {
    pub image_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateVmsRequest {
    pub image_id: String,
    pub vm_type: String,
    pub keypair_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    pub vm_initiated_shutdown_behavior: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<PlacementRequest>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct PlacementRequest {
    pub subregion_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateVmsResponse {
    #[serde(default)]
    pub vms: Vec<Vm>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateTagsRequest {
    pub resource_ids: Vec<String>,
    pub tags: Vec<ResourceTag>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadTagsRequest {
    pub filters: TagResourceFilters,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct TagResourceFilters {
    pub resource_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadTagsResponse {
    #[serde(default)]
    pub tags: Vec<ResourceTag>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteTagsRequest {
    pub resource_ids: Vec<String>,
    pub tags: Vec<ResourceTag>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadVolumesRequest {
    pub filters: VolumeFilters,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct VolumeFilters {
    pub volume_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadVolumesResponse {
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Volume {
    pub volume_id: String,
    pub size: u32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub linked_volumes: Vec<LinkedVolume>,
    #[serde(default)]
    pub subregion_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct LinkedVolume {
    pub vm_id: String,
    #[serde(default)]
    pub device_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateSnapshotRequest {
    pub volume_id: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateSnapshotResponse {
    pub snapshot: Snapshot,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Snapshot {
    pub snapshot_id: String,
    #[serde(default)]
    pub volume_id: String,
    #[serde(default)]
    pub progress: u32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadSnapshotsRequest {
    pub filters: SnapshotFilters,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SnapshotFilters {
    pub snapshot_ids: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadSnapshotsResponse {
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteSnapshotRequest {
    pub snapshot_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateVolumeRequest {
    pub snapshot_id: String,
    pub size: u32,
    pub subregion_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateVolumeResponse {
    pub volume: Volume,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteVolumeRequest {
    pub volume_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct LinkVolumeRequest {
    pub volume_id: String,
    pub vm_id: String,
    pub device_name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct UnlinkVolumeRequest {
    pub volume_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadSecurityGroupsRequest {}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadSecurityGroupsResponse {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct SecurityGroup {
    pub security_group_id: String,
    pub security_group_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateSecurityGroupRequest {
    pub security_group_name: String,
    pub description: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateSecurityGroupResponse {
    pub security_group: SecurityGroup,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteSecurityGroupRequest {
    pub security_group_id: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadKeypairsRequest {}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct ReadKeypairsResponse {
    #[serde(default)]
    pub keypairs: Vec<Keypair>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct Keypair {
    pub keypair_name: String,
    #[serde(default)]
    pub keypair_fingerprint: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateKeypairRequest {
    pub keypair_name: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct CreateKeypairResponse {
    pub keypair: Keypair,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(super) struct DeleteKeypairRequest {
    pub keypair_name: String,
}

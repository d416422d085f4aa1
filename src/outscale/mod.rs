//! Outscale implementation of the provider traits.
//!
//! Calls the JSON-over-HTTPS API directly with a shared `reqwest` client:
//! every action is a POST of a typed request body to
//! `<endpoint>/api/v1/<Action>`. Credentials travel as headers; request
//! signing is intentionally not implemented here.

mod api;
mod error;

use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::OutscaleConfig;
use crate::provider::{
    AccountOps, AttachmentState, ImageDescriptor, InstanceDescriptor, InstanceOps, InstanceState,
    KeyPairDescriptor, KeyPairMaterial, LaunchSpec, ProviderFuture, SecurityGroupDescriptor,
    SnapshotDescriptor, TagFilter, TagSet, VolumeAttachment, VolumeDescriptor, VolumeOps,
};

pub use error::OutscaleError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const ACCESS_KEY_HEADER: &str = "X-Osc-Access-Key";
const SECRET_KEY_HEADER: &str = "X-Osc-Secret-Key";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Provider that drives the estate through the Outscale API.
#[derive(Clone, Debug)]
pub struct OutscaleProvider {
    config: OutscaleConfig,
}

impl OutscaleProvider {
    /// Constructs a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OutscaleError::Config`] when the configuration fails
    /// validation.
    pub fn new(config: OutscaleConfig) -> Result<Self, OutscaleError> {
        config
            .validate()
            .map_err(|err| OutscaleError::Config(err.to_string()))?;
        Ok(Self { config })
    }

    /// Zone used when a workflow has no better hint.
    #[must_use]
    pub fn default_zone(&self) -> &str {
        &self.config.default_zone
    }

    async fn call<Req, Resp>(&self, action: &str, payload: &Req) -> Result<Resp, OutscaleError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!(
            "{}/api/v1/{action}",
            self.config.endpoint.trim_end_matches('/')
        );
        let response = HTTP_CLIENT
            .post(&url)
            .header(ACCESS_KEY_HEADER, &self.config.access_key)
            .header(SECRET_KEY_HEADER, &self.config.secret_key)
            .json(payload)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|err| OutscaleError::Http {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutscaleError::Provider {
                message: error::api_error_message(status.as_u16(), &body),
            });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|err| OutscaleError::Decode {
                message: err.to_string(),
            })
    }

    async fn read_vm(&self, instance_id: &str) -> Result<api::Vm, OutscaleError> {
        let request = api::ReadVmsRequest {
            filters: api::VmFilters {
                vm_ids: vec![instance_id.to_owned()],
                tags: Vec::new(),
            },
        };
        let mut response: api::ReadVmsResponse = self.call("ReadVms", &request).await?;
        response.vms.pop().ok_or_else(|| OutscaleError::NotFound {
            resource: "vm",
            id: instance_id.to_owned(),
        })
    }

    async fn read_volume_raw(&self, volume_id: &str) -> Result<api::Volume, OutscaleError> {
        let request = api::ReadVolumesRequest {
            filters: api::VolumeFilters {
                volume_ids: vec![volume_id.to_owned()],
            },
        };
        let mut response: api::ReadVolumesResponse = self.call("ReadVolumes", &request).await?;
        response
            .volumes
            .pop()
            .ok_or_else(|| OutscaleError::NotFound {
                resource: "volume",
                id: volume_id.to_owned(),
            })
    }

    async fn read_image_raw(&self, image_id: &str) -> Result<api::Image, OutscaleError> {
        let request = api::ReadImagesRequest {
            filters: api::ImageFilters {
                image_ids: vec![image_id.to_owned()],
            },
        };
        let mut response: api::ReadImagesResponse = self.call("ReadImages", &request).await?;
        response
            .images
            .pop()
            .ok_or_else(|| OutscaleError::NotFound {
                resource: "image",
                id: image_id.to_owned(),
            })
    }

    async fn simple_vm_action(
        &self,
        action: &str,
        instance_id: &str,
    ) -> Result<(), OutscaleError> {
        let request = api::VmIdsRequest {
            vm_ids: vec![instance_id.to_owned()],
        };
        let _ignored: serde_json::Value = self.call(action, &request).await?;
        Ok(())
    }
}

fn instance_from_vm(vm: api::Vm) -> InstanceDescriptor {
    let tags: TagSet = vm
        .tags
        .into_iter()
        .map(|tag| (tag.key, tag.value))
        .collect();
    InstanceDescriptor {
        id: vm.vm_id,
        state: InstanceState::from_wire(&vm.state),
        private_ip: vm.private_ip,
        public_ip: vm.public_ip,
        instance_type: vm.vm_type,
        key_name: vm.keypair_name,
        security_group_ids: vm
            .security_groups
            .into_iter()
            .map(|link| link.security_group_id)
            .collect(),
        tags,
        zone: vm.placement.map(|place| place.subregion_name).unwrap_or_default(),
    }
}

fn volume_from_wire(volume: api::Volume) -> VolumeDescriptor {
    let attachment = volume.linked_volumes.first().map(|link| VolumeAttachment {
        instance_id: link.vm_id.clone(),
        device: link.device_name.clone(),
    });
    let state = if attachment.is_some() {
        AttachmentState::Attached
    } else {
        AttachmentState::from_wire(&volume.state)
    };
    VolumeDescriptor {
        id: volume.volume_id,
        size_gb: volume.size,
        state,
        attachment,
        zone: volume.subregion_name,
    }
}

fn snapshot_from_wire(snapshot: api::Snapshot) -> SnapshotDescriptor {
    SnapshotDescriptor {
        id: snapshot.snapshot_id,
        volume_id: snapshot.volume_id,
        progress: format!("{}%", snapshot.progress),
    }
}

impl InstanceOps for OutscaleProvider {
    type Error = OutscaleError;

    fn describe_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, InstanceDescriptor, Self::Error> {
        Box::pin(async move { self.read_vm(instance_id).await.map(instance_from_vm) })
    }

    fn stop_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.simple_vm_action("StopVms", instance_id).await })
    }

    fn start_instance<'a>(&'a self, instance_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.simple_vm_action("StartVms", instance_id).await })
    }

    fn terminate_instance<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move { self.simple_vm_action("DeleteVms", instance_id).await })
    }

    fn create_image<'a>(
        &'a self,
        instance_id: &'a str,
        name: &'a str,
    ) -> ProviderFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let request = api::CreateImageRequest {
                vm_id: instance_id.to_owned(),
                image_name: name.to_owned(),
            };
            let response: api::CreateImageResponse = self.call("CreateImage", &request).await?;
            Ok(response.image.image_id)
        })
    }

    fn describe_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> ProviderFuture<'a, ImageDescriptor, Self::Error> {
        Box::pin(async move {
            let image = self.read_image_raw(image_id).await?;
            Ok(ImageDescriptor {
                id: image.image_id,
                state: image.state,
            })
        })
    }

    fn deregister_image<'a>(
        &'a self,
        image_id: &'a str,
        delete_backing_snapshot: bool,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let image = self.read_image_raw(image_id).await?;
            let request = api::DeleteImageRequest {
                image_id: image_id.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("DeleteImage", &request).await?;

            if delete_backing_snapshot {
                for mapping in &image.block_device_mappings {
                    let Some(snapshot_id) = mapping
                        .bsu
                        .as_ref()
                        .and_then(|bsu| bsu.snapshot_id.as_deref())
                    else {
                        continue;
                    };
                    let delete = api::DeleteSnapshotRequest {
                        snapshot_id: snapshot_id.to_owned(),
                    };
                    let _also_ignored: serde_json::Value =
                        self.call("DeleteSnapshot", &delete).await?;
                }
            }
            Ok(())
        })
    }

    fn run_instance<'a>(
        &'a self,
        spec: &'a LaunchSpec,
    ) -> ProviderFuture<'a, InstanceDescriptor, Self::Error> {
        Box::pin(async move {
            let request = api::CreateVmsRequest {
                image_id: spec.image_id.clone(),
                vm_type: spec.instance_type.clone(),
                keypair_name: spec.key_name.clone(),
                security_group_ids: spec.security_group_ids.clone(),
                user_data: spec.user_data.clone(),
                vm_initiated_shutdown_behavior: spec.shutdown_behavior.wire().to_owned(),
                placement: spec.zone.clone().map(|zone| api::PlacementRequest {
                    subregion_name: zone,
                }),
            };
            let mut response: api::CreateVmsResponse = self.call("CreateVms", &request).await?;
            let vm = response.vms.pop().ok_or_else(|| OutscaleError::Decode {
                message: String::from("CreateVms returned no vm"),
            })?;

            let mut instance = instance_from_vm(vm);
            if !spec.tags.is_empty() {
                self.replace_tags(&instance.id, &spec.tags).await?;
                instance.tags = spec.tags.clone();
            }
            Ok(instance)
        })
    }

    fn replace_tags<'a>(
        &'a self,
        resource_id: &'a str,
        tags: &'a TagSet,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let read = api::ReadTagsRequest {
                filters: api::TagResourceFilters {
                    resource_ids: vec![resource_id.to_owned()],
                },
            };
            let existing: api::ReadTagsResponse = self.call("ReadTags", &read).await?;
            if !existing.tags.is_empty() {
                let delete = api::DeleteTagsRequest {
                    resource_ids: vec![resource_id.to_owned()],
                    tags: existing.tags,
                };
                let _ignored: serde_json::Value = self.call("DeleteTags", &delete).await?;
            }

            if tags.is_empty() {
                return Ok(());
            }
            let create = api::CreateTagsRequest {
                resource_ids: vec![resource_id.to_owned()],
                tags: tags
                    .iter()
                    .map(|(key, value)| api::ResourceTag {
                        key: key.to_owned(),
                        value: value.to_owned(),
                    })
                    .collect(),
            };
            let _also_ignored: serde_json::Value = self.call("CreateTags", &create).await?;
            Ok(())
        })
    }
}

impl VolumeOps for OutscaleProvider {
    fn describe_volume<'a>(
        &'a self,
        volume_id: &'a str,
    ) -> ProviderFuture<'a, VolumeDescriptor, Self::Error> {
        Box::pin(async move { self.read_volume_raw(volume_id).await.map(volume_from_wire) })
    }

    fn create_snapshot<'a>(
        &'a self,
        volume_id: &'a str,
        name: &'a str,
    ) -> ProviderFuture<'a, SnapshotDescriptor, Self::Error> {
        Box::pin(async move {
            let request = api::CreateSnapshotRequest {
                volume_id: volume_id.to_owned(),
                description: name.to_owned(),
            };
            let response: api::CreateSnapshotResponse =
                self.call("CreateSnapshot", &request).await?;
            Ok(snapshot_from_wire(response.snapshot))
        })
    }

    fn describe_snapshot<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> ProviderFuture<'a, SnapshotDescriptor, Self::Error> {
        Box::pin(async move {
            let request = api::ReadSnapshotsRequest {
                filters: api::SnapshotFilters {
                    snapshot_ids: vec![snapshot_id.to_owned()],
                },
            };
            let mut response: api::ReadSnapshotsResponse =
                self.call("ReadSnapshots", &request).await?;
            response
                .snapshots
                .pop()
                .map(snapshot_from_wire)
                .ok_or_else(|| OutscaleError::NotFound {
                    resource: "snapshot",
                    id: snapshot_id.to_owned(),
                })
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        snapshot_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::DeleteSnapshotRequest {
                snapshot_id: snapshot_id.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("DeleteSnapshot", &request).await?;
            Ok(())
        })
    }

    fn create_volume_from_snapshot<'a>(
        &'a self,
        snapshot_id: &'a str,
        zone: &'a str,
        size_gb: u32,
    ) -> ProviderFuture<'a, VolumeDescriptor, Self::Error> {
        Box::pin(async move {
            let request = api::CreateVolumeRequest {
                snapshot_id: snapshot_id.to_owned(),
                size: size_gb,
                subregion_name: zone.to_owned(),
            };
            let response: api::CreateVolumeResponse = self.call("CreateVolume", &request).await?;
            Ok(volume_from_wire(response.volume))
        })
    }

    fn delete_volume<'a>(&'a self, volume_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::DeleteVolumeRequest {
                volume_id: volume_id.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("DeleteVolume", &request).await?;
            Ok(())
        })
    }

    fn attach_volume<'a>(
        &'a self,
        volume_id: &'a str,
        instance_id: &'a str,
        device: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::LinkVolumeRequest {
                volume_id: volume_id.to_owned(),
                vm_id: instance_id.to_owned(),
                device_name: device.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("LinkVolume", &request).await?;
            Ok(())
        })
    }

    fn detach_volume<'a>(&'a self, volume_id: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::UnlinkVolumeRequest {
                volume_id: volume_id.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("UnlinkVolume", &request).await?;
            Ok(())
        })
    }
}

impl AccountOps for OutscaleProvider {
    fn list_instances<'a>(
        &'a self,
        filter: &'a TagFilter,
    ) -> ProviderFuture<'a, Vec<InstanceDescriptor>, Self::Error> {
        Box::pin(async move {
            let request = api::ReadVmsRequest {
                filters: api::VmFilters {
                    vm_ids: Vec::new(),
                    tags: filter
                        .iter()
                        .map(|(key, value)| format!("{key}={value}"))
                        .collect(),
                },
            };
            let response: api::ReadVmsResponse = self.call("ReadVms", &request).await?;
            // The filter is re-applied locally so callers see consistent
            // semantics even when the API matches tags loosely.
            Ok(response
                .vms
                .into_iter()
                .map(instance_from_vm)
                .filter(|instance| filter.matches(&instance.tags))
                .collect())
        })
    }

    fn list_security_groups<'a>(
        &'a self,
    ) -> ProviderFuture<'a, Vec<SecurityGroupDescriptor>, Self::Error> {
        Box::pin(async move {
            let response: api::ReadSecurityGroupsResponse = self
                .call("ReadSecurityGroups", &api::ReadSecurityGroupsRequest {})
                .await?;
            Ok(response
                .security_groups
                .into_iter()
                .map(|group| SecurityGroupDescriptor {
                    id: group.security_group_id,
                    name: group.security_group_name,
                    description: group.description,
                })
                .collect())
        })
    }

    fn create_security_group<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ProviderFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let request = api::CreateSecurityGroupRequest {
                security_group_name: name.to_owned(),
                description: description.to_owned(),
            };
            let response: api::CreateSecurityGroupResponse =
                self.call("CreateSecurityGroup", &request).await?;
            Ok(response.security_group.security_group_id)
        })
    }

    fn delete_security_group<'a>(
        &'a self,
        group_id: &'a str,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::DeleteSecurityGroupRequest {
                security_group_id: group_id.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("DeleteSecurityGroup", &request).await?;
            Ok(())
        })
    }

    fn list_key_pairs<'a>(&'a self) -> ProviderFuture<'a, Vec<KeyPairDescriptor>, Self::Error> {
        Box::pin(async move {
            let response: api::ReadKeypairsResponse = self
                .call("ReadKeypairs", &api::ReadKeypairsRequest {})
                .await?;
            Ok(response
                .keypairs
                .into_iter()
                .map(|pair| KeyPairDescriptor {
                    name: pair.keypair_name,
                    fingerprint: pair.keypair_fingerprint,
                })
                .collect())
        })
    }

    fn create_key_pair<'a>(
        &'a self,
        name: &'a str,
    ) -> ProviderFuture<'a, KeyPairMaterial, Self::Error> {
        Box::pin(async move {
            let request = api::CreateKeypairRequest {
                keypair_name: name.to_owned(),
            };
            let response: api::CreateKeypairResponse = self.call("CreateKeypair", &request).await?;
            let material = response
                .keypair
                .private_key
                .ok_or_else(|| OutscaleError::Decode {
                    message: String::from("CreateKeypair returned no private key"),
                })?;
            Ok(KeyPairMaterial {
                name: response.keypair.keypair_name,
                material,
            })
        })
    }

    fn delete_key_pair<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let request = api::DeleteKeypairRequest {
                keypair_name: name.to_owned(),
            };
            let _ignored: serde_json::Value = self.call("DeleteKeypair", &request).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(public_ip: Option<&str>) -> api::Vm {
        let body = format!(
            r#"{{"VmId":"i-1","State":"running","PrivateIp":"10.0.0.5"{},"VmType":"t2.micro","KeypairName":"web-1","SecurityGroups":[{{"SecurityGroupId":"sg-1"}}],"Tags":[{{"Key":"name","Value":"web-1"}}],"Placement":{{"SubregionName":"eu-west-2a"}}}}"#,
            public_ip.map_or_else(String::new, |ip| format!(r#","PublicIp":"{ip}""#))
        );
        serde_json::from_str(&body).unwrap_or_else(|err| panic!("decode vm fixture: {err}"))
    }

    #[test]
    fn vm_maps_onto_instance_descriptor() {
        let instance = instance_from_vm(vm(Some("203.0.113.9")));
        assert_eq!(instance.id, "i-1");
        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(instance.public_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(instance.security_group_ids, ["sg-1"]);
        assert_eq!(instance.tags.get("name"), Some("web-1"));
        assert_eq!(instance.zone, "eu-west-2a");
    }

    #[test]
    fn private_vm_has_no_public_address() {
        let instance = instance_from_vm(vm(None));
        assert_eq!(instance.public_ip, None);
    }

    #[test]
    fn linked_volume_maps_onto_attached_state() {
        let body = r#"{"VolumeId":"vol-1","Size":5,"State":"in-use","LinkedVolumes":[{"VmId":"i-1","DeviceName":"/dev/sdb"}],"SubregionName":"eu-west-2a"}"#;
        let wire: api::Volume =
            serde_json::from_str(body).unwrap_or_else(|err| panic!("decode volume: {err}"));
        let volume = volume_from_wire(wire);
        assert_eq!(volume.state, AttachmentState::Attached);
        let attachment = volume
            .attachment
            .unwrap_or_else(|| panic!("expected attachment"));
        assert_eq!(attachment.instance_id, "i-1");
        assert_eq!(attachment.device, "/dev/sdb");
    }

    #[test]
    fn snapshot_progress_is_rendered_as_a_percentage() {
        let snapshot = snapshot_from_wire(api::Snapshot {
            snapshot_id: String::from("snap-1"),
            volume_id: String::from("vol-1"),
            progress: 100,
        });
        assert_eq!(snapshot.progress, "100%");
    }
}

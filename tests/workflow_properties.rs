//! End-to-end workflow behaviour against the scripted provider.
//!
//! Covers the observable guarantees of the resize, privacy, provision, and
//! decommission workflows: rollback branches restore the pre-call state,
//! the unrecoverable branch deletes nothing, and replacement instances keep
//! the identity of the original.

use std::time::Duration;

use skylift::decommission::{Approval, DecommissionError, Decommissioner};
use skylift::key_store::{KeyStore, KeyWriter};
use skylift::privacy::{ConvertError, PrivacyConverter};
use skylift::provider::{
    AttachmentState, InstanceDescriptor, InstanceOps, InstanceState, KeyPairDescriptor,
    SecurityGroupDescriptor, TagSet,
};
use skylift::provision::{ProvisionError, ProvisionRequest, QuickProvisioner, STANDARD_GROUP};
use skylift::resize::{ResizeError, VolumeResizer};
use skylift::test_support::{
    ScriptedProvider, attached_volume_fixture, instance_fixture, volume_fixture,
};
use skylift::wait::WaitOptions;

fn fast_options() -> WaitOptions {
    WaitOptions::new(Duration::from_millis(1), Duration::from_millis(200))
}

fn resizer(provider: &ScriptedProvider) -> VolumeResizer<ScriptedProvider> {
    VolumeResizer::new(provider.clone(), fast_options())
}

fn converter(provider: &ScriptedProvider) -> PrivacyConverter<ScriptedProvider> {
    PrivacyConverter::new(provider.clone(), fast_options())
}

#[tokio::test]
async fn unattached_resize_replaces_the_volume() {
    let provider = ScriptedProvider::new();
    provider.insert_volume(volume_fixture("vol-src", 5));

    let report = resizer(&provider)
        .resize("vol-src", 10)
        .await
        .unwrap_or_else(|err| panic!("resize should succeed: {err}"));

    assert_eq!(report.volume.size_gb, 10);
    assert_eq!(report.volume.state, AttachmentState::Available);
    assert_eq!(report.volume.zone, "eu-west-2a");
    assert_eq!(report.replaced_volume_id, "vol-src");
    assert_eq!(provider.volume("vol-src"), None);
    assert!(provider.snapshot_ids().is_empty());
}

#[tokio::test]
async fn resize_rejects_sizes_that_do_not_grow() {
    let provider = ScriptedProvider::new();
    provider.insert_volume(volume_fixture("vol-src", 5));

    let result = resizer(&provider).resize("vol-src", 5).await;
    assert!(matches!(
        result,
        Err(ResizeError::InvalidArgument {
            current_gb: 5,
            requested_gb: 5,
            ..
        })
    ));
    // The precondition is checked before any mutation.
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn attached_resize_swaps_the_volume_and_restarts() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    provider.insert_volume(attached_volume_fixture("vol-src", 5, "i-1", "/dev/sdb"));

    let report = resizer(&provider)
        .resize("vol-src", 15)
        .await
        .unwrap_or_else(|err| panic!("resize should succeed: {err}"));

    assert_eq!(report.volume.size_gb, 15);
    assert_eq!(report.volume.state, AttachmentState::Attached);
    let attachment = report
        .volume
        .attachment
        .unwrap_or_else(|| panic!("replacement should be attached"));
    assert_eq!(attachment.instance_id, "i-1");
    assert_eq!(attachment.device, "/dev/sdb");

    let instance = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("instance should survive"));
    assert_eq!(instance.state, InstanceState::Running);
    assert_eq!(provider.volume("vol-src"), None);
    assert!(provider.snapshot_ids().is_empty());
}

#[tokio::test]
async fn snapshot_is_taken_before_any_destructive_step() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    provider.insert_volume(attached_volume_fixture("vol-src", 5, "i-1", "/dev/sdb"));

    resizer(&provider)
        .resize("vol-src", 15)
        .await
        .unwrap_or_else(|err| panic!("resize should succeed: {err}"));

    let snapshot_at = provider
        .call_position("create_snapshot")
        .unwrap_or_else(|| panic!("snapshot call missing"));
    let stop_at = provider
        .call_position("stop_instance")
        .unwrap_or_else(|| panic!("stop call missing"));
    assert!(snapshot_at < stop_at, "snapshot must precede the stop");
}

#[tokio::test]
async fn detach_failure_restores_the_running_instance() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    provider.insert_volume(attached_volume_fixture("vol-src", 5, "i-1", "/dev/sdb"));
    provider.fail_detach();

    let result = resizer(&provider).resize("vol-src", 15).await;
    assert!(matches!(result, Err(ResizeError::DetachFailed { .. })));

    let volume = provider
        .volume("vol-src")
        .unwrap_or_else(|| panic!("original volume must survive"));
    assert_eq!(volume.state, AttachmentState::Attached);
    assert_eq!(provider.volume_ids(), ["vol-src"]);
    assert!(provider.snapshot_ids().is_empty());
    let instance = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("instance should survive"));
    assert_eq!(instance.state, InstanceState::Running);
}

#[tokio::test]
async fn attach_failure_reattaches_the_original_volume() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    provider.insert_volume(attached_volume_fixture("vol-src", 5, "i-1", "/dev/sdb"));
    // The replacement is the second resource the workflow creates.
    provider.fail_attach_of("vol-2");

    let result = resizer(&provider).resize("vol-src", 15).await;
    assert!(matches!(result, Err(ResizeError::AttachFailed { .. })));

    let volume = provider
        .volume("vol-src")
        .unwrap_or_else(|| panic!("original volume must survive"));
    assert_eq!(volume.state, AttachmentState::Attached);
    let attachment = volume
        .attachment
        .unwrap_or_else(|| panic!("original must be re-attached"));
    assert_eq!(attachment.instance_id, "i-1");
    assert_eq!(attachment.device, "/dev/sdb");

    assert_eq!(provider.volume_ids(), ["vol-src"]);
    assert!(provider.snapshot_ids().is_empty());
    let instance = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("instance should survive"));
    assert_eq!(instance.state, InstanceState::Running);
}

#[tokio::test]
async fn double_attach_failure_retains_everything_for_forensics() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    provider.insert_volume(attached_volume_fixture("vol-src", 5, "i-1", "/dev/sdb"));
    provider.fail_attach_of("vol-2");
    provider.fail_attach_of("vol-src");

    let result = resizer(&provider).resize("vol-src", 15).await;
    let stranded = match result {
        Err(ResizeError::CriticalInconsistency(stranded)) => stranded,
        other => panic!("expected critical inconsistency, got {other:?}"),
    };
    assert_eq!(stranded.instance_id, "i-1");
    assert_eq!(stranded.device, "/dev/sdb");
    assert_eq!(stranded.old_volume_id, "vol-src");
    assert_eq!(stranded.new_volume_id, "vol-2");
    assert_eq!(stranded.snapshot_id, "snap-1");

    // Nothing is deleted in the unrecoverable branch.
    let mut volumes = provider.volume_ids();
    volumes.sort();
    assert_eq!(volumes, ["vol-2", "vol-src"]);
    assert_eq!(provider.snapshot_ids(), ["snap-1"]);
    let instance = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("instance should survive"));
    assert_eq!(instance.state, InstanceState::Stopped);
}

#[tokio::test]
async fn privacy_conversion_preserves_identity_and_drops_public_address() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", Some("203.0.113.5")));
    let original = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("seeded instance"));

    let report = converter(&provider)
        .convert_to_private("i-1", false)
        .await
        .unwrap_or_else(|err| panic!("conversion should succeed: {err}"));

    let replacement = provider
        .instance(&report.new_instance_id)
        .unwrap_or_else(|| panic!("replacement should exist"));
    assert_eq!(replacement.public_ip, None);
    assert_eq!(replacement.tags, original.tags);
    assert_eq!(replacement.security_group_ids, original.security_group_ids);
    assert_eq!(replacement.key_name, original.key_name);
    assert_eq!(replacement.instance_type, original.instance_type);
    assert_eq!(report.old_private_ip, original.private_ip);
    assert_eq!(report.new_private_ip, replacement.private_ip);

    // The temporary image and its backing snapshot are cleaned up.
    assert!(provider.image_ids().is_empty());
    assert!(provider.snapshot_ids().is_empty());

    // Without terminate_old the original stays stopped.
    let old = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("original should survive"));
    assert_eq!(old.state, InstanceState::Stopped);
}

#[tokio::test]
async fn privacy_conversion_can_terminate_the_original() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", Some("203.0.113.5")));

    let report = converter(&provider)
        .convert_to_private("i-1", true)
        .await
        .unwrap_or_else(|err| panic!("conversion should succeed: {err}"));

    let old = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("original should still be listed"));
    assert_eq!(old.state, InstanceState::Terminated);
    assert!(provider.image_ids().is_empty());
    assert!(report.new_private_ip.is_some());
}

#[tokio::test]
async fn privacy_conversion_rolls_back_a_failed_launch() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", Some("203.0.113.5")));
    provider.fail_launch();

    let result = converter(&provider).convert_to_private("i-1", true).await;
    assert!(matches!(result, Err(ConvertError::LaunchFailed { .. })));

    // Rollback removed the temporary image and restarted the original.
    assert!(provider.image_ids().is_empty());
    assert!(provider.snapshot_ids().is_empty());
    let old = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("original should survive"));
    assert_eq!(old.state, InstanceState::Running);
}

#[tokio::test]
async fn provisioning_follows_the_estate_conventions() {
    let provider = ScriptedProvider::new();
    provider.insert_security_group(SecurityGroupDescriptor {
        id: String::from("sg-standard"),
        name: String::from(STANDARD_GROUP),
        description: String::from("bastion and proxy access"),
    });
    provider.insert_instance(instance_fixture("i-base", "base-host", None));
    let image_id = provider
        .create_image("i-base", "base")
        .await
        .unwrap_or_else(|err| panic!("fixture image: {err}"));

    let tmp = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let dir = camino::Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("non-utf8 tempdir: {}", path.display()));
    let provisioner = QuickProvisioner::new(provider.clone(), KeyStore::new(dir.clone()));

    let request = ProvisionRequest::new("render-1", image_id, "t2.medium").env_tag("prod");
    let outcome = provisioner
        .provision(&request)
        .await
        .unwrap_or_else(|err| panic!("provision should succeed: {err}"));

    assert_eq!(outcome.instance.public_ip, None);
    assert_eq!(outcome.instance.tags.get("name"), Some("render-1"));
    assert_eq!(outcome.instance.tags.get("env"), Some("prod"));
    assert_eq!(outcome.instance.tags.get("privacy"), Some("true"));
    assert!(
        outcome
            .instance
            .security_group_ids
            .contains(&String::from("sg-standard"))
    );
    assert_eq!(outcome.key_path, dir.join("render-1.pem"));
    assert!(provider.key_pair_names().contains(&String::from("render-1")));
    assert!(
        provider
            .security_groups()
            .iter()
            .any(|group| group.name == "render-1")
    );
}

#[tokio::test]
async fn provisioning_refuses_a_taken_name() {
    let provider = ScriptedProvider::new();
    provider.insert_security_group(SecurityGroupDescriptor {
        id: String::from("sg-standard"),
        name: String::from(STANDARD_GROUP),
        description: String::new(),
    });
    provider.insert_instance(instance_fixture("i-base", "base-host", None));
    let image_id = provider
        .create_image("i-base", "base")
        .await
        .unwrap_or_else(|err| panic!("fixture image: {err}"));
    provider.insert_instance(instance_fixture("i-existing", "render-1", None));

    let provisioner = QuickProvisioner::new(provider, NullKeyWriter);
    let request = ProvisionRequest::new("render-1", image_id, "t2.medium");
    let result = provisioner.provision(&request).await;
    assert!(matches!(result, Err(ProvisionError::NameTaken { .. })));
}

#[tokio::test]
async fn provisioning_refuses_an_unknown_env_tag() {
    let provisioner = QuickProvisioner::new(ScriptedProvider::new(), NullKeyWriter);
    let request = ProvisionRequest::new("render-1", "ami-1", "t2.medium").env_tag("staging");
    let result = provisioner.provision(&request).await;
    assert!(matches!(result, Err(ProvisionError::InvalidEnvTag { .. })));
}

#[tokio::test]
async fn provisioning_requires_the_standard_group() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-base", "base-host", None));
    let image_id = provider
        .create_image("i-base", "base")
        .await
        .unwrap_or_else(|err| panic!("fixture image: {err}"));

    let provisioner = QuickProvisioner::new(provider, NullKeyWriter);
    let request = ProvisionRequest::new("render-1", image_id, "t2.medium");
    let result = provisioner.provision(&request).await;
    assert!(matches!(
        result,
        Err(ProvisionError::StandardGroupAmbiguous { count: 0 })
    ));
}

#[tokio::test]
async fn decommission_requires_approval() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(instance_fixture("i-1", "web-1", None));
    let decommissioner = Decommissioner::new(provider.clone(), fast_options());

    let result = decommissioner.decommission("i-1", Approval::Withheld).await;
    assert!(matches!(
        result,
        Err(DecommissionError::ApprovalWithheld { .. })
    ));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn decommission_requires_a_name_tag() {
    let provider = ScriptedProvider::new();
    provider.insert_instance(InstanceDescriptor {
        id: String::from("i-anon"),
        state: InstanceState::Running,
        private_ip: Some(String::from("10.0.0.9")),
        public_ip: None,
        instance_type: String::from("t2.micro"),
        key_name: String::from("anon"),
        security_group_ids: Vec::new(),
        tags: TagSet::new(),
        zone: String::from("eu-west-2a"),
    });
    let decommissioner = Decommissioner::new(provider, fast_options());

    let result = decommissioner.decommission("i-anon", Approval::Granted).await;
    assert!(matches!(
        result,
        Err(DecommissionError::MissingNameTag { .. })
    ));
}

#[tokio::test]
async fn decommission_deletes_only_exclusive_groups() {
    let provider = ScriptedProvider::new();
    let mut doomed = instance_fixture("i-1", "web-1", None);
    doomed.security_group_ids = vec![String::from("sg-standard"), String::from("sg-web")];
    provider.insert_instance(doomed);
    provider.insert_instance(instance_fixture("i-2", "other", None));
    provider.insert_security_group(SecurityGroupDescriptor {
        id: String::from("sg-standard"),
        name: String::from(STANDARD_GROUP),
        description: String::new(),
    });
    provider.insert_security_group(SecurityGroupDescriptor {
        id: String::from("sg-web"),
        name: String::from("web-1"),
        description: String::from("SG applied to web-1 VM"),
    });
    provider.insert_key_pair(KeyPairDescriptor {
        name: String::from("web-1"),
        fingerprint: None,
    });

    let decommissioner = Decommissioner::new(provider.clone(), fast_options());
    let report = decommissioner
        .decommission("i-1", Approval::Granted)
        .await
        .unwrap_or_else(|err| panic!("decommission should succeed: {err}"));

    assert_eq!(report.deleted_security_group_ids, ["sg-web"]);
    assert_eq!(report.deleted_key_pair.as_deref(), Some("web-1"));
    let instance = provider
        .instance("i-1")
        .unwrap_or_else(|| panic!("instance still listed"));
    assert_eq!(instance.state, InstanceState::Terminated);
    assert!(
        provider
            .security_groups()
            .iter()
            .any(|group| group.id == "sg-standard")
    );
    assert!(!provider.key_pair_names().contains(&String::from("web-1")));
}

/// Key writer that records nothing, for pre-flight failure tests.
#[derive(Clone, Copy, Debug)]
struct NullKeyWriter;

impl KeyWriter for NullKeyWriter {
    fn write_key(
        &self,
        material: &skylift::provider::KeyPairMaterial,
    ) -> Result<camino::Utf8PathBuf, skylift::key_store::KeyStoreError> {
        Ok(camino::Utf8PathBuf::from(format!("/dev/null/{}", material.name)))
    }
}

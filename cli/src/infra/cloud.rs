//! `CloudApi` implementation over the EC2 control plane.
//!
//! Only the call pattern lives here: filtered, paginated describes and a
//! polled modification status. Chunk sizing for filter values is the resize
//! service's concern.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::types::{Filter, Tag, VolumeModificationState};
use swell_common::{AttachedVolume, Instance};

use crate::application::ports::{CloudApi, VolumeModState};

/// Page size for paginated describe calls.
const PAGE_SIZE: i32 = 200;

pub struct Ec2Cloud {
    client: aws_sdk_ec2::Client,
}

impl Ec2Cloud {
    /// Resolve the default credential chain, with optional region and
    /// profile overrides, and build a client from it.
    pub async fn from_env(region: Option<String>, profile: Option<String>) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        Ok(Self { client: aws_sdk_ec2::Client::new(&config) })
    }
}

fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter().find(|tag| tag.key() == Some(key)).and_then(Tag::value)
}

fn map_mod_state(state: Option<&VolumeModificationState>) -> VolumeModState {
    match state {
        Some(VolumeModificationState::Modifying) => VolumeModState::Modifying,
        Some(VolumeModificationState::Optimizing) => VolumeModState::Optimizing,
        Some(VolumeModificationState::Completed) => VolumeModState::Completed,
        Some(VolumeModificationState::Failed) => VolumeModState::Failed,
        _ => VolumeModState::Unknown,
    }
}

impl CloudApi for Ec2Cloud {
    async fn running_instances(&self) -> Result<Vec<Instance>> {
        let mut pages = self
            .client
            .describe_instances()
            .filters(Filter::builder().name("instance-state-name").values("running").build())
            .max_results(PAGE_SIZE)
            .into_paginator()
            .send();

        let mut out = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.context("describe-instances page")?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let Some(id) = instance.instance_id() else { continue };
                    let tags = instance.tags();
                    out.push(Instance {
                        id: id.to_string(),
                        name: tag_value(tags, "Name").unwrap_or_default().to_string(),
                        private_ip: instance.private_ip_address().unwrap_or_default().to_string(),
                        public_ip: instance.public_ip_address().map(str::to_string),
                        group: tag_value(tags, "Server-Group").unwrap_or_default().to_string(),
                        key_name: instance.key_name().unwrap_or_default().to_string(),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn all_volume_ids(&self) -> Result<Vec<String>> {
        let mut pages =
            self.client.describe_volumes().max_results(PAGE_SIZE).into_paginator().send();
        let mut ids = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.context("describe-volumes page")?;
            for volume in page.volumes() {
                if let Some(id) = volume.volume_id() {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn attached_volumes(&self, volume_ids: &[String]) -> Result<Vec<AttachedVolume>> {
        let output = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder().name("volume-id").set_values(Some(volume_ids.to_vec())).build(),
            )
            .send()
            .await
            .context("describe-volumes by id")?;

        let mut out = Vec::new();
        for volume in output.volumes() {
            let Some(id) = volume.volume_id() else { continue };
            let Some(size) = volume.size() else { continue };
            // The first attachment is the instance the volume is rooted on.
            let Some(attachment) = volume.attachments().first() else { continue };
            let Some(instance_id) = attachment.instance_id() else { continue };
            out.push(AttachedVolume {
                id: id.to_string(),
                size_gib: i64::from(size),
                new_size_gib: None,
                instance_id: instance_id.to_string(),
                device: attachment.device().unwrap_or_default().to_string(),
            });
        }
        Ok(out)
    }

    async fn resize_volume(&self, volume_id: &str, new_size_gib: i64) -> Result<()> {
        let size = i32::try_from(new_size_gib)
            .with_context(|| format!("volume size {new_size_gib} GiB does not fit the API"))?;
        self.client
            .modify_volume()
            .volume_id(volume_id)
            .size(size)
            .send()
            .await
            .with_context(|| format!("modify-volume {volume_id}"))?;
        Ok(())
    }

    async fn modification_state(&self, volume_id: &str) -> Result<VolumeModState> {
        let output = self
            .client
            .describe_volumes_modifications()
            .volume_ids(volume_id)
            .send()
            .await
            .with_context(|| format!("describe-volumes-modifications {volume_id}"))?;
        Ok(map_mod_state(
            output.volumes_modifications().first().and_then(|m| m.modification_state()),
        ))
    }
}

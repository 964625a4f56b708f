//! Canned port implementations shared by the service tests.
//!
//! Plain hand-rolled fakes, so each test file doesn't re-define the same
//! boilerplate.

#![allow(clippy::expect_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use swell_common::{AttachedVolume, Instance, UsageSample};

use crate::application::ports::{CloudApi, FleetConnector, VolumeModState};
use crate::domain::UnitError;

// ── Fixture helpers ───────────────────────────────────────────────────────────

pub fn instance(id: &str, key_name: &str) -> Instance {
    Instance {
        id: id.to_string(),
        name: format!("node-{id}"),
        private_ip: format!("10.0.0.{}", id.len()),
        public_ip: None,
        group: "web".to_string(),
        key_name: key_name.to_string(),
    }
}

pub fn fleet(count: usize) -> Vec<Instance> {
    (0..count).map(|i| instance(&format!("i-{i:03}"), "fleet")).collect()
}

pub fn volume(id: &str, instance_id: &str, size_gib: i64) -> AttachedVolume {
    AttachedVolume {
        id: id.to_string(),
        size_gib,
        new_size_gib: None,
        instance_id: instance_id.to_string(),
        device: "/dev/xvda".to_string(),
    }
}

// ── Canned FleetConnector ─────────────────────────────────────────────────────

enum Probe {
    Usage(u8),
    Fail(String),
    Hang,
}

/// Scripted `FleetConnector`: per-instance probe outcomes, per-instance grow
/// outcomes, and in-flight accounting for concurrency assertions.
#[derive(Default)]
pub struct CannedConnector {
    probes: HashMap<String, Probe>,
    fallback_usage: Option<u8>,
    grow_failures: HashMap<String, String>,
    grow_hangs: Vec<String>,
    probe_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    probe_count: AtomicUsize,
    grow_log: Mutex<Vec<(String, String)>>,
}

impl CannedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage(mut self, instance_id: &str, percent: u8) -> Self {
        self.probes.insert(instance_id.to_string(), Probe::Usage(percent));
        self
    }

    pub fn failing(mut self, instance_id: &str, reason: &str) -> Self {
        self.probes.insert(instance_id.to_string(), Probe::Fail(reason.to_string()));
        self
    }

    pub fn hanging(mut self, instance_id: &str) -> Self {
        self.probes.insert(instance_id.to_string(), Probe::Hang);
        self
    }

    pub fn default_usage(mut self, percent: u8) -> Self {
        self.fallback_usage = Some(percent);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn grow_failing(mut self, instance_id: &str, reason: &str) -> Self {
        self.grow_failures.insert(instance_id.to_string(), reason.to_string());
        self
    }

    pub fn grow_hanging(mut self, instance_id: &str) -> Self {
        self.grow_hangs.push(instance_id.to_string());
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    pub fn grow_calls(&self) -> Vec<(String, String)> {
        self.grow_log.lock().expect("grow log lock").clone()
    }
}

impl FleetConnector for CannedConnector {
    async fn disk_usage(&self, instance: &Instance) -> Result<UsageSample, UnitError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let outcome = match self.probes.get(&instance.id) {
            Some(Probe::Usage(percent)) => {
                UsageSample::new(&instance.id, i64::from(*percent)).map_err(UnitError::from)
            }
            Some(Probe::Fail(reason)) => Err(UnitError::Session(reason.clone())),
            Some(Probe::Hang) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
                unreachable!("pending probe never resolves")
            }
            None => match self.fallback_usage {
                Some(percent) => {
                    UsageSample::new(&instance.id, i64::from(percent)).map_err(UnitError::from)
                }
                None => Err(UnitError::Session(format!("no canned probe for {}", instance.id))),
            },
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn grow_filesystem(
        &self,
        instance: &Instance,
        volume: &AttachedVolume,
    ) -> Result<String, UnitError> {
        self.grow_log.lock().expect("grow log lock").push((instance.id.clone(), volume.id.clone()));
        if self.grow_hangs.contains(&instance.id) {
            std::future::pending::<()>().await;
            unreachable!("pending grow never resolves")
        }
        if let Some(reason) = self.grow_failures.get(&instance.id) {
            return Err(UnitError::Session(reason.clone()));
        }
        Ok(instance.private_ip.clone())
    }
}

// ── Canned CloudApi ───────────────────────────────────────────────────────────

/// Scripted `CloudApi`: fixed inventory, scripted per-volume modification
/// states, and a log of the filter chunk sizes it was queried with.
#[derive(Default)]
pub struct CannedCloud {
    pub instances: Vec<Instance>,
    pub volume_ids: Vec<String>,
    pub volumes: Vec<AttachedVolume>,
    pub modify_failures: HashMap<String, String>,
    pub fail_listing: bool,
    states: Mutex<HashMap<String, VecDeque<VolumeModState>>>,
    lookup_chunks: Mutex<Vec<usize>>,
    resized: Mutex<Vec<(String, i64)>>,
}

impl CannedCloud {
    pub fn new(instances: Vec<Instance>, volumes: Vec<AttachedVolume>) -> Self {
        Self {
            volume_ids: volumes.iter().map(|v| v.id.clone()).collect(),
            instances,
            volumes,
            ..Self::default()
        }
    }

    /// Pad the volume-id listing with unattached volumes, to exercise
    /// chunked lookups.
    pub fn pad_volume_ids(mut self, count: usize) -> Self {
        for i in 0..count {
            self.volume_ids.push(format!("vol-pad-{i:04}"));
        }
        self
    }

    pub fn modify_failing(mut self, volume_id: &str, reason: &str) -> Self {
        self.modify_failures.insert(volume_id.to_string(), reason.to_string());
        self
    }

    /// Script the sequence of modification states one volume reports; the
    /// last state repeats forever.
    pub fn states(self, volume_id: &str, sequence: &[VolumeModState]) -> Self {
        self.states
            .lock()
            .expect("states lock")
            .insert(volume_id.to_string(), sequence.iter().copied().collect());
        self
    }

    pub fn lookup_chunks(&self) -> Vec<usize> {
        self.lookup_chunks.lock().expect("chunk log lock").clone()
    }

    pub fn resized(&self) -> Vec<(String, i64)> {
        self.resized.lock().expect("resize log lock").clone()
    }
}

impl CloudApi for CannedCloud {
    async fn running_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.instances.clone())
    }

    async fn all_volume_ids(&self) -> Result<Vec<String>> {
        if self.fail_listing {
            anyhow::bail!("listing volumes failed");
        }
        Ok(self.volume_ids.clone())
    }

    async fn attached_volumes(&self, volume_ids: &[String]) -> Result<Vec<AttachedVolume>> {
        self.lookup_chunks.lock().expect("chunk log lock").push(volume_ids.len());
        Ok(self.volumes.iter().filter(|v| volume_ids.contains(&v.id)).cloned().collect())
    }

    async fn resize_volume(&self, volume_id: &str, new_size_gib: i64) -> Result<()> {
        if let Some(reason) = self.modify_failures.get(volume_id) {
            anyhow::bail!("{reason}");
        }
        self.resized.lock().expect("resize log lock").push((volume_id.to_string(), new_size_gib));
        Ok(())
    }

    async fn modification_state(&self, volume_id: &str) -> Result<VolumeModState> {
        let mut states = self.states.lock().expect("states lock");
        match states.get_mut(volume_id) {
            Some(queue) if queue.len() > 1 => Ok(queue.pop_front().expect("non-empty queue")),
            Some(queue) => Ok(*queue.front().expect("non-empty queue")),
            None => Ok(VolumeModState::Optimizing),
        }
    }
}

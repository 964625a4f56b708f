//! `FleetConnector` implementation over the bastion pool and tunnel.

use std::sync::Arc;

use russh::client;
use swell_common::{AttachedVolume, Instance, UsageSample};

use crate::application::ports::FleetConnector;
use crate::domain::UnitError;
use crate::infra::keys::KeyStore;

use super::exec::{self, DEFAULT_DEVICE, USAGE_PROBE};
use super::pool::{ConnectionPool, Dialer, PoolKey, PooledTransport};
use super::tunnel::{self, TargetClient};
use super::{ClientHandler, connect_bastion};

/// Shared handle to a pooled bastion connection.
pub type BastionHandle = Arc<client::Handle<ClientHandler>>;

/// Dials and authenticates bastion connections for the pool.
pub struct BastionDialer {
    keys: Arc<KeyStore>,
    user: String,
}

impl BastionDialer {
    #[must_use]
    pub fn new(keys: Arc<KeyStore>, user: impl Into<String>) -> Self {
        Self { keys, user: user.into() }
    }
}

impl Dialer for BastionDialer {
    type Conn = BastionHandle;

    async fn dial(&self, key: &PoolKey) -> Result<Self::Conn, UnitError> {
        let secret = self.keys.resolve(&key.key_name)?;
        let handle = connect_bastion(&key.host, secret, &self.user).await?;
        Ok(Arc::new(handle))
    }
}

impl PooledTransport for BastionHandle {
    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    async fn close(self) {
        let _ = self.disconnect(russh::Disconnect::ByApplication, "", "en").await;
    }
}

/// Remote disk operations against fleet instances, reached through one
/// operator-chosen bastion.
pub struct SshConnector {
    pool: Arc<ConnectionPool<BastionDialer>>,
    bastion: PoolKey,
    keys: Arc<KeyStore>,
    user: String,
}

impl SshConnector {
    #[must_use]
    pub fn new(
        pool: Arc<ConnectionPool<BastionDialer>>,
        bastion: PoolKey,
        keys: Arc<KeyStore>,
        user: impl Into<String>,
    ) -> Self {
        Self { pool, bastion, keys, user: user.into() }
    }

    /// Borrow the bastion from the pool and open a second-hop client to the
    /// instance. Each unit of work owns its target client end-to-end.
    async fn open(&self, instance: &Instance) -> Result<TargetClient, UnitError> {
        let bastion = self.pool.acquire(&self.bastion).await?;
        let key = self.keys.resolve(&instance.key_name)?;
        tunnel::open_target(bastion.as_ref(), &instance.private_ip, key, &self.user).await
    }
}

impl FleetConnector for SshConnector {
    async fn disk_usage(&self, instance: &Instance) -> Result<UsageSample, UnitError> {
        let target = self.open(instance).await?;
        let output = exec::run(&target, USAGE_PROBE).await;
        target.close().await;
        let value = exec::parse_usage(&output?)?;
        Ok(UsageSample::new(&instance.id, value)?)
    }

    async fn grow_filesystem(
        &self,
        instance: &Instance,
        volume: &AttachedVolume,
    ) -> Result<String, UnitError> {
        let device =
            if volume.device.is_empty() { DEFAULT_DEVICE } else { volume.device.as_str() };
        let target = self.open(instance).await?;
        // Two sessions: the type probe and the grow pair are separate
        // commands, and sessions are single-use.
        let outcome = async {
            let fstype = exec::run(&target, &exec::fstype_probe(device)).await?;
            exec::run(&target, &exec::grow_command(fstype.trim(), device)).await?;
            Ok::<_, UnitError>(())
        }
        .await;
        target.close().await;
        outcome?;
        Ok(instance.private_ip.clone())
    }
}

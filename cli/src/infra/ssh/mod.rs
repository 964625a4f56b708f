//! SSH infrastructure: bastion connection pool, second-hop tunnel, and
//! one-shot remote command execution.

pub mod exec;
pub mod pool;
pub mod tunnel;

mod connector;
pub use connector::{BastionDialer, BastionHandle, SshConnector};

use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::{PrivateKey, PrivateKeyWithHashAlg};

use crate::domain::UnitError;

/// Remote login user on fleet instances.
pub const DEFAULT_SSH_USER: &str = "ec2-user";

/// Budget for one dial attempt against a bastion.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn client_config() -> Arc<client::Config> {
    Arc::new(client::Config::default())
}

/// Accept-any host key policy. Fleet hosts are ephemeral; keys are not pinned.
#[derive(Clone)]
pub struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// One dial-and-authenticate attempt against a bastion's public address.
/// The pool wraps this in the fixed retry policy.
pub(crate) async fn connect_bastion(
    host: &str,
    key: Arc<PrivateKey>,
    user: &str,
) -> Result<client::Handle<ClientHandler>, UnitError> {
    let dial = client::connect(client_config(), (host, 22), ClientHandler);
    let mut handle = match tokio::time::timeout(DIAL_TIMEOUT, dial).await {
        Ok(Ok(handle)) => handle,
        Ok(Err(err)) => {
            return Err(UnitError::Dial {
                host: host.to_string(),
                attempts: 1,
                reason: err.to_string(),
            });
        }
        Err(_) => {
            return Err(UnitError::Dial {
                host: host.to_string(),
                attempts: 1,
                reason: format!("timed out after {DIAL_TIMEOUT:?}"),
            });
        }
    };
    authenticate(&mut handle, host, key, user).await?;
    Ok(handle)
}

/// Publickey authentication against an already-connected handle. Never
/// retried; a rejection here is a configuration error.
pub(crate) async fn authenticate(
    handle: &mut client::Handle<ClientHandler>,
    host: &str,
    key: Arc<PrivateKey>,
    user: &str,
) -> Result<(), UnitError> {
    let hash = handle
        .best_supported_rsa_hash()
        .await
        .map_err(|err| UnitError::Handshake { host: host.to_string(), reason: err.to_string() })?
        .flatten();
    let auth = handle
        .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash))
        .await
        .map_err(|err| UnitError::Handshake { host: host.to_string(), reason: err.to_string() })?;
    if !auth.success() {
        return Err(UnitError::AuthRejected { host: host.to_string() });
    }
    Ok(())
}

//! Second-hop target clients opened through a live bastion connection.
//!
//! The bastion relays bytes to the target's SSH port over a `direct-tcpip`
//! channel; a second handshake runs on top of that stream with the key
//! resolved from the target's key identifier.

use std::sync::Arc;

use russh::client;
use russh::keys::PrivateKey;

use crate::domain::UnitError;
use crate::retry::{MAX_ATTEMPTS, RETRY_DELAY, retry_fixed};

use super::{ClientHandler, authenticate, client_config};

/// SSH port on private-network targets.
pub const SSH_PORT: u32 = 22;

/// Target-scoped SSH client riding a tunneled channel. Usable for one or
/// more command sessions; the caller closes it.
pub struct TargetClient {
    handle: client::Handle<ClientHandler>,
    host: String,
}

impl TargetClient {
    pub(crate) fn handle(&self) -> &client::Handle<ClientHandler> {
        &self.handle
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Close the second-hop connection.
    pub async fn close(self) {
        let _ = self.handle.disconnect(russh::Disconnect::ByApplication, "", "en").await;
    }
}

/// Open a tunnel to `private_ip`'s SSH port through `bastion` and complete
/// the second handshake over it.
///
/// Only the channel dial is retried; handshake and authentication failures
/// are configuration errors and surface immediately.
///
/// # Errors
///
/// `UnitError::Dial` when the bastion cannot reach the target after all
/// attempts, `UnitError::Handshake`/`UnitError::AuthRejected` for the
/// second handshake.
pub async fn open_target(
    bastion: &client::Handle<ClientHandler>,
    private_ip: &str,
    key: Arc<PrivateKey>,
    user: &str,
) -> Result<TargetClient, UnitError> {
    let channel = retry_fixed(MAX_ATTEMPTS, RETRY_DELAY, || {
        bastion.channel_open_direct_tcpip(private_ip, SSH_PORT, "127.0.0.1", 0)
    })
    .await
    .map_err(|err| UnitError::Dial {
        host: private_ip.to_string(),
        attempts: MAX_ATTEMPTS,
        reason: err.to_string(),
    })?;

    let mut handle = client::connect_stream(client_config(), channel.into_stream(), ClientHandler)
        .await
        .map_err(|err| UnitError::Handshake {
            host: private_ip.to_string(),
            reason: err.to_string(),
        })?;
    authenticate(&mut handle, private_ip, key, user).await?;
    Ok(TargetClient { handle, host: private_ip.to_string() })
}

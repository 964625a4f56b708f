//! One-shot remote command execution over a target client.
//!
//! Sessions are single-use: every command opens its own exec channel. The
//! whole open-exec-collect step runs under the fixed retry policy. The
//! command set is fixed — a usage probe, a filesystem-type probe, and the
//! grow pair for the detected type.

use russh::ChannelMsg;

use crate::domain::UnitError;
use crate::retry::{MAX_ATTEMPTS, RETRY_DELAY, retry_fixed};

use super::tunnel::TargetClient;

/// Root filesystem usage as a bare integer percentage.
pub const USAGE_PROBE: &str = "df --output=pcent / | tail -1 | tr -dc '0-9'";

/// Device to grow when the attachment does not report a path.
pub const DEFAULT_DEVICE: &str = "/dev/xvda";

/// Filesystem type of the first partition on `device`.
#[must_use]
pub fn fstype_probe(device: &str) -> String {
    format!("sudo lsblk -f {device}1 -o FSTYPE | tail -n 1")
}

/// Partition-grow plus filesystem-grow pair for the detected type. `xfs`
/// gets `xfs_growfs`; every other type is treated as ext-family.
#[must_use]
pub fn grow_command(fstype: &str, device: &str) -> String {
    if fstype == "xfs" {
        format!("sudo growpart {device} 1 && sudo xfs_growfs {device}1")
    } else {
        format!("sudo growpart {device} 1 && sudo resize2fs {device}1")
    }
}

/// Parse the usage probe's output into an integer. Non-numeric output is an
/// error, never coerced to zero; range validation happens when the sample
/// is constructed.
pub fn parse_usage(output: &str) -> Result<i64, UnitError> {
    let trimmed = output.trim();
    trimmed.parse().map_err(|_| UnitError::UnparseableOutput { output: trimmed.to_string() })
}

/// Run one command on the target, capturing stdout.
///
/// # Errors
///
/// `UnitError::Session` when no channel can be opened or the remote side
/// closes without reporting a status, `UnitError::CommandFailed` on a
/// non-zero exit.
pub async fn run(client: &TargetClient, command: &str) -> Result<String, UnitError> {
    retry_fixed(MAX_ATTEMPTS, RETRY_DELAY, || run_once(client, command)).await
}

async fn run_once(client: &TargetClient, command: &str) -> Result<String, UnitError> {
    let mut channel = client
        .handle()
        .channel_open_session()
        .await
        .map_err(|err| UnitError::Session(err.to_string()))?;
    channel.exec(true, command).await.map_err(|err| UnitError::Session(err.to_string()))?;

    let mut stdout = Vec::new();
    let mut status = None;
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExitStatus { exit_status } => status = Some(exit_status),
            _ => {}
        }
    }
    match status {
        Some(0) => Ok(String::from_utf8_lossy(&stdout).trim().to_string()),
        Some(status) => {
            tracing::debug!(host = %client.host(), command, status, "remote command failed");
            Err(UnitError::CommandFailed { status })
        }
        None => Err(UnitError::Session("channel closed without an exit status".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usage_accepts_bare_integers() {
        assert_eq!(parse_usage("87").ok(), Some(87));
        assert_eq!(parse_usage(" 100\n").ok(), Some(100));
        assert_eq!(parse_usage("0").ok(), Some(0));
    }

    #[test]
    fn test_parse_usage_rejects_non_numeric_output() {
        assert!(matches!(
            parse_usage("df: /: No such file"),
            Err(UnitError::UnparseableOutput { .. })
        ));
        assert!(matches!(parse_usage(""), Err(UnitError::UnparseableOutput { .. })));
    }

    #[test]
    fn test_xfs_selects_the_xfs_grow_pair() {
        let cmd = grow_command("xfs", "/dev/xvda");
        assert_eq!(cmd, "sudo growpart /dev/xvda 1 && sudo xfs_growfs /dev/xvda1");
    }

    #[test]
    fn test_any_other_fstype_selects_the_ext_grow_pair() {
        for fstype in ["ext4", "ext3", "", "btrfs"] {
            let cmd = grow_command(fstype, "/dev/xvda");
            assert_eq!(cmd, "sudo growpart /dev/xvda 1 && sudo resize2fs /dev/xvda1", "{fstype}");
        }
    }

    #[test]
    fn test_fstype_probe_targets_the_first_partition() {
        assert_eq!(fstype_probe("/dev/nvme0n1"), "sudo lsblk -f /dev/nvme0n11 -o FSTYPE | tail -n 1");
    }
}

#[cfg(test)]
mod proptests {
    use super::parse_usage;
    use proptest::prelude::*;

    proptest! {
        /// Every decimal string parses back to its value.
        #[test]
        fn prop_parse_usage_round_trips_integers(value in 0i64..10_000) {
            prop_assert_eq!(parse_usage(&value.to_string()).ok(), Some(value));
        }

        /// Strings with any non-digit character never parse.
        #[test]
        fn prop_parse_usage_rejects_mixed_output(
            prefix in "[0-9]{0,3}",
            junk in "[a-zA-Z%/]{1,10}",
        ) {
            let output = format!("{prefix}{junk}");
            prop_assert!(parse_usage(&output).is_err());
        }
    }
}

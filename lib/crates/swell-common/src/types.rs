use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A running fleet instance, as reported by the compute control plane.
///
/// Instances are read-only to the core and re-fetched on every run; nothing
/// here is persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Instance {
    /// Stable provider-assigned identifier.
    pub id: String,
    /// Display name (from the `Name` tag; may be empty).
    pub name: String,
    /// Private-network address. Always set while the instance is running.
    pub private_ip: String,
    /// Public address, present only for externally reachable instances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Fleet group tag (may be empty).
    pub group: String,
    /// SSH key identifier; resolves to `~/.ssh/<key_name>.pem`.
    pub key_name: String,
}

impl Instance {
    /// Display label used in selection prompts and reports: `name (id)`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.id)
    }
}

/// A block volume attached to an instance.
///
/// `new_size_gib` is set once a resize has been applied by the provider;
/// until then the volume reflects the control plane's current view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachedVolume {
    /// Provider-assigned volume identifier.
    pub id: String,
    /// Current size in GiB.
    pub size_gib: i64,
    /// Size in GiB after a completed resize, if one happened this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_size_gib: Option<i64>,
    /// Owning instance. Must refer to an `Instance::id` known to the run.
    pub instance_id: String,
    /// OS device path reported by the attachment (may be empty).
    pub device: String,
}

/// A resized volume paired with its owning instance, handed to the
/// filesystem-grow stage and discarded afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeMapping {
    pub instance: Instance,
    pub volume: AttachedVolume,
}

/// Error returned when a probed usage value falls outside 0..=100.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("usage {0}% is outside 0..=100")]
pub struct UsageOutOfRange(pub i64);

/// One disk-usage observation for one instance.
///
/// The percentage is validated at construction; an out-of-range value is an
/// error path, never coerced into the valid range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageSample {
    pub instance_id: String,
    pub percent: u8,
}

impl UsageSample {
    /// Build a sample, rejecting percentages outside 0..=100.
    pub fn new(instance_id: impl Into<String>, percent: i64) -> Result<Self, UsageOutOfRange> {
        let validated =
            u8::try_from(percent).ok().filter(|p| *p <= 100).ok_or(UsageOutOfRange(percent))?;
        Ok(Self { instance_id: instance_id.into(), percent: validated })
    }
}

/// Size in GiB after growing `size_gib` by `increment_percent`:
/// `floor(size * (1 + increment / 100))`.
#[must_use]
pub fn grown_size(size_gib: i64, increment_percent: u32) -> i64 {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let grown = (size_gib as f64 * (1.0 + f64::from(increment_percent) / 100.0)).floor() as i64;
    grown
}


#[cfg(test)]
mod proptests {
    use super::{UsageSample, grown_size};
    use proptest::prelude::*;

    proptest! {
        /// Every accepted sample carries a percentage within 0..=100.
        #[test]
        fn prop_usage_sample_in_range(percent in -500i64..500) {
            match UsageSample::new("i-1", percent) {
                Ok(sample) => prop_assert!(sample.percent <= 100),
                Err(_) => prop_assert!(!(0..=100).contains(&percent)),
            }
        }

        /// Growing never shrinks a volume and matches the floor formula.
        #[test]
        fn prop_grown_size_monotone(size in 1i64..65_536, increment in 0u32..400) {
            let grown = grown_size(size, increment);
            prop_assert!(grown >= size);
            let expected = (size as f64 * (1.0 + f64::from(increment) / 100.0)).floor() as i64;
            prop_assert_eq!(grown, expected);
        }
    }
}

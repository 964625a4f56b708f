//! Domain layer: typed errors and pure fleet logic. No I/O.

pub mod error;

pub use error::{UnitError, VolumeError};

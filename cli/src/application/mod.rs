//! Application layer: port traits and the services composed from them.
//!
//! Imports only from `crate::domain`, `crate::retry` and `swell_common`.
//! All I/O is routed through injected port traits.

pub mod ports;
pub mod services;

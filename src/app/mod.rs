//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the stove remote: power
//! sequencing, intensity reconciliation, fill-level publication and the
//! maintenance override.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod inbox;
pub mod ports;
pub mod service;

//! Stovectl firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod fsm;
pub mod persist;
pub mod pins;

// Hardware-facing modules compile on the host too; the register and
// peripheral access inside them is cfg-gated.
pub mod adapters;
pub mod drivers;
pub mod sensors;

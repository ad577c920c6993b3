//! Scenario harness for blockpool.
//!
//! This crate provides:
//! - Scenarios (`scenarios`): deterministic drivers that exercise fixed
//!   pools and the size-class allocator and return serializable outcomes
//! - Payloads (`payload`): fixed-layout records written into blocks
//! - Logging (`logging`): `tracing-subscriber` setup for the CLI

#![deny(unsafe_code)]

pub mod error;
pub mod logging;
pub mod payload;
pub mod rng;
pub mod scenarios;

pub use error::HarnessError;
pub use scenarios::{Scenario, ScenarioOutcome};

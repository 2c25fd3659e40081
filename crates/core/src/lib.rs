//! Domain logic for the EHCo codec service.
//!
//! Everything in this crate is free of HTTP concerns: scratch-file
//! lifecycle, external tool invocation, metrics parsing, and the job model.
//! The `api` crate composes these into request pipelines.

pub mod error;
pub mod job;
pub mod metrics;
pub mod results;
pub mod scratch;
pub mod tooling;
pub mod types;

//! Pulso - request lifecycle profiler with per-component time attribution
//!
//! This library instruments one request of a hook-driven web host: it
//! brackets named lifecycle phases, pairs query start/end notifications
//! into a timing log with caller attribution, optionally profiles every
//! hook dispatch down to the owning component, and reduces the raw logs
//! into dashboard-ready summaries with sampled persistence.

pub mod cli;
pub mod clock;
pub mod config;
pub mod csv_output;
pub mod hook_profiler;
pub mod json_output;
pub mod phase;
pub mod provenance;
pub mod query_log;
pub mod replay;
pub mod reporter;
pub mod request;
pub mod sampler;
pub mod storage;

//! Live round-trip latency chart driven by the system `ping` utility.
//!
//! A [`sampler::Sampler`] probes one target per tick and keeps a bounded
//! [`history::History`] with rolling statistics; presenters read
//! [`sampler::Snapshot`]s of it.

pub mod app;
pub mod config;
pub mod constants;
pub mod history;
pub mod probe;
pub mod report;
pub mod sampler;
pub mod ui;
pub mod util;

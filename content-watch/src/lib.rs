#![doc = "content-watch: CLI for the scheduled content-monitoring pipeline."]

//! Thin binary crate: command parsing, environment-driven configuration, and
//! the concrete issue-tracker client. All reconciliation, sweeping and
//! extraction logic lives in `content-watch-core`.

pub mod cli;
pub mod github;
pub mod load_config;

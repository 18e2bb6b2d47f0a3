#![doc = "content-watch-core: core logic library for content-watch."]

//! This crate contains all change-detection, snapshot-state and retention logic
//! for content-watch. Concrete issue-tracker integration lives in the CLI crate.
//! Begin new modules as submodules below.
//!
//! # Usage
//! Add this as a dependency for all shared pipeline, reconciliation, sweep,
//! extraction and report code.

pub mod config;
pub mod contract;
pub mod download;
pub mod feed;
pub mod matrix;
pub mod monitor;
pub mod normalize;
pub mod reconcile;
pub mod report;
pub mod schema;
pub mod snapshot;
pub mod sweep;

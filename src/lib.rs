//! Host-resident telemetry agent for `PostgreSQL` servers and poolers.
//!
//! The core of this crate is the metric collection engine: a static
//! [`catalog`] of [`Schedule`]d stat descriptors, a per-service [`exporter::Exporter`]
//! that drives them across one or more databases, a [`projector`] that turns
//! tabular query results into labeled samples, and an [`adjuster`] that
//! rewrites version-sensitive queries. Everything around that (CLI, HTTP
//! surface, auto-update) is ambient plumbing described in `SPEC_FULL.md`.

pub mod built_info {
    #![allow(clippy::pedantic)]
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Short git commit hash this binary was built from, or a placeholder when
/// built outside a git checkout.
pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

pub mod adjuster;
pub mod catalog;
pub mod cli;
pub mod dbclient;
pub mod emit;
pub mod exporter;
pub mod orchestrator;
pub mod probe;
pub mod projector;
pub mod query_result;
pub mod registry;
pub mod schedule;
pub mod update;

pub use schedule::Schedule;

//! # Commit Chronicle Core
//!
//! The commit ingestion, classification, and chain-reconstruction engine:
//! data models, the diff capture policy, the rule-based commit classifier,
//! the host and store abstractions, file reconstruction over the parent
//! chain, and similarity-based evolution analysis.
//!
//! This crate performs no network or database I/O of its own. Remote hosts
//! and persistent stores are reached through the [`host::CommitHost`] and
//! [`store::CommitStore`] traits; the `commit-chronicle` crate provides the
//! GitHub and SQLite implementations.

pub mod analyzer;
pub mod capture;
pub mod classify;
pub mod error;
pub mod evolution;
pub mod host;
pub mod ingest;
pub mod models;
pub mod patch;
pub mod push;
pub mod reconstruct;
pub mod similarity;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::ChronicleError;

//! # Commit Chronicle
//!
//! Webhook-driven commit history capture for GitHub repositories.
//!
//! Each pushed commit is fetched from GitHub, classified into a semantic
//! event, and stored with enough per-file data (full content, patch, or a
//! reference to an earlier commit) to reconstruct any file at any stored
//! commit later on.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  GitHub  │──▶│   Analyzer   │──▶│  SQLite  │
//! │ webhook  │   │ classify +   │   │ commits  │
//! └──────────┘   │ capture      │   └────┬─────┘
//!                └──────────────┘        │
//!                      ┌─────────────────┤
//!                      ▼                 ▼
//!                 ┌──────────┐     ┌──────────┐
//!                 │   CLI    │     │   HTTP   │
//!                 │ (chron)  │     │   API    │
//!                 └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! chron init                                       # create database
//! chron repo add https://github.com/acme/widgets   # register + webhook
//! chron serve                                      # receive pushes
//! chron events acme/widgets
//! chron file acme/widgets <sha> src/main.rs
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite commit store |
//! | [`github`] | GitHub REST client |
//! | [`webhook`] | Delivery signature verification |
//! | [`server`] | Webhook receiver and JSON API |
//! | [`repos`] | Repository registration |
//! | [`ingest`], [`events`], [`file`], [`report`] | CLI commands |
//!
//! The domain logic (classification, capture, reconstruction, evolution
//! analysis) lives in the `commit-chronicle-core` crate.

pub mod config;
pub mod db;
pub mod events;
pub mod file;
pub mod github;
pub mod ingest;
pub mod migrate;
pub mod report;
pub mod repos;
pub mod server;
pub mod sqlite_store;
pub mod webhook;

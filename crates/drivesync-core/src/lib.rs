//! drivesync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `LocalFile`, `RemoteFile`, `ChangedFile`, `SyncFiles`
//! - **State machine** - `SyncState` transitions of a single sync run
//! - **Port definitions** - Traits for adapters: `IRemoteStorage`, `ILocalFileSystem`,
//!   `ISyncReporter`
//! - **Configuration** - YAML-backed settings with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data and rules with no I/O.
//! Ports define trait interfaces that adapter crates implement; the sync
//! engine depends only on the ports.

pub mod config;
pub mod domain;
pub mod ports;

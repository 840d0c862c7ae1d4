//! # lritdams-gateway: LRIT-to-DAMS-NT relay daemon
//!
//! Watches a directory for LRIT/HRIT DCS broadcast files, re-encodes
//! every DCP message as a DAMS-NT frame, and pushes the frames to all
//! connected TCP subscribers. Sends a `NONE` heartbeat while the feed
//! is idle.
//!
//! ## Lifecycle
//!
//! - A lock file guarantees a single running instance. Removing the
//!   file from outside stops the daemon.
//! - The config file is re-read between scans when it changes. Network
//!   settings need a restart.

pub mod config;
pub mod ingest;
pub mod lock;
pub mod scan;
pub mod service;
pub mod stats;
pub mod status;

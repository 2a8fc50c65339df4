//! ERP client core.
//!
//! This crate provides the core functionality for the `erp` CLI tool.
//!
//! # Architecture
//!
//! - [`partner`] - `.partner` file codec and field reconciliation
//! - [`remote`] - HTTP client, query/mutation state for remote resources
//! - [`jobs`] - Batch import/export jobs and the status poller
//! - [`notify`] - Notification port used by the command layer
//! - [`config`] - Configuration management
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod notify;
pub mod partner;
pub mod remote;

pub use error::{Error, Result};

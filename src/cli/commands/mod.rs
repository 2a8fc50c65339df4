//! Command implementations.

pub mod completions;
pub mod config;
pub mod entity;
pub mod jobs;
pub mod partner;
pub mod version;

use std::future::Future;

use serde::Serialize;

use crate::config::{ApiOverrides, ApiSettings, resolve_settings};
use crate::error::{Error, Result};
use crate::remote::ApiClient;

/// Options shared by every command that talks to the backend.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub overrides: ApiOverrides,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    /// Resolve settings and build a client.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn client(&self) -> Result<(ApiClient, ApiSettings)> {
        let settings = resolve_settings(&self.overrides)?;
        let client = ApiClient::from_settings(&settings)?;
        Ok((client, settings))
    }
}

/// Run a future to completion on a fresh multi-threaded runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    Ok(rt.block_on(future))
}

/// Print a value as a single JSON line.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

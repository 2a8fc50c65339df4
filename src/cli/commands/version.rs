//! Version command implementation.

use crate::error::Result;
use crate::partner::FORMAT_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    partner_format: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    if json {
        let output = VersionOutput {
            version,
            build,
            partner_format: FORMAT_VERSION,
        };
        super::print_json(&output)?;
        return Ok(());
    }

    println!("erp version {version} ({build}), {FORMAT_VERSION} files");
    Ok(())
}

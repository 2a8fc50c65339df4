//! Config command implementations.

use colored::Colorize;
use serde::Serialize;

use super::{Context, print_json};
use crate::cli::ConfigCommands;
use crate::config::{
    ENV_API_TOKEN, ENV_API_URL, ErpConfig, config_path, load_config, resolve_settings, save_config,
};
use crate::error::Result;

/// Execute config commands.
pub fn execute(command: &ConfigCommands, ctx: &Context) -> Result<()> {
    match command {
        ConfigCommands::Show => show(ctx),
        ConfigCommands::Set {
            api_url,
            token,
            poll_interval_ms,
            timeout_secs,
        } => set(
            ErpConfig {
                api_url: api_url.clone(),
                api_token: token.clone(),
                poll_interval_ms: *poll_interval_ms,
                timeout_secs: *timeout_secs,
            },
            ctx,
        ),
    }
}

#[derive(Serialize)]
struct ShowOutput {
    config_file: String,
    api_url: String,
    api_url_source: &'static str,
    token_set: bool,
    poll_interval_ms: u128,
    timeout_secs: u64,
}

fn show(ctx: &Context) -> Result<()> {
    let path = config_path()?;
    let file = load_config()?;
    let settings = resolve_settings(&ctx.overrides)?;

    let api_url_source = if ctx.overrides.api_url.is_some() {
        // clap fills the flag from ERP_API_URL too
        if std::env::var(ENV_API_URL).is_ok_and(|v| Some(v) == ctx.overrides.api_url) {
            "env"
        } else {
            "flag"
        }
    } else if file.api_url.is_some() {
        "config"
    } else {
        "default"
    };

    let output = ShowOutput {
        config_file: path.display().to_string(),
        api_url: settings.api_url.clone(),
        api_url_source,
        token_set: settings.api_token.is_some(),
        poll_interval_ms: settings.poll_interval.as_millis(),
        timeout_secs: settings.timeout.as_secs(),
    };

    if ctx.json {
        return print_json(&output);
    }

    println!("{}", "Configuration".cyan().bold());
    println!("  File:           {}", output.config_file);
    println!("  API URL:        {} ({})", output.api_url, output.api_url_source.dimmed());
    println!(
        "  Token:          {}",
        if output.token_set {
            "set".green()
        } else {
            format!("not set ({ENV_API_TOKEN})").yellow()
        }
    );
    println!("  Poll interval:  {} ms", output.poll_interval_ms);
    println!("  Timeout:        {} s", output.timeout_secs);
    Ok(())
}

fn set(changes: ErpConfig, ctx: &Context) -> Result<()> {
    if changes == ErpConfig::default() {
        return Err(crate::error::Error::InvalidArgument(
            "Nothing to set. Pass --api-url, --token, --poll-interval-ms or --timeout-secs".into(),
        ));
    }

    let saved = save_config(&changes)?;

    if ctx.json {
        let mut value = serde_json::to_value(&saved)?;
        if let Some(token) = value.get_mut("api_token") {
            *token = serde_json::Value::String("***".into());
        }
        return print_json(&value);
    }

    if !ctx.quiet {
        println!("Saved {}", config_path()?.display());
    }
    Ok(())
}

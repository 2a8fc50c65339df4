//! Partner command implementations (`.partner` parse, diff, apply, export).

use std::future::Future;
use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use super::{Context, block_on, print_json};
use crate::cli::{ApplyArgs, PartnerCommands, PartnerFileArgs};
use crate::error::Result;
use crate::notify::{Notifier, TerminalNotifier};
use crate::partner::{
    self, AppliedResult, FieldStatus, LiveRecord, ParseResult, PreviewRow, ReconcileSummary,
    Schema, Selection,
};
use crate::remote::{ApiClient, Mutation, Query};

/// Execute partner commands.
pub fn execute(command: &PartnerCommands, ctx: &Context) -> Result<()> {
    match command {
        PartnerCommands::Parse { file } => parse(file, ctx.json),
        PartnerCommands::Diff(args) => block_on(diff(args, ctx))?,
        PartnerCommands::Apply(args) => block_on(apply(args, ctx))?,
        PartnerCommands::Export { id, output, stdout } => {
            block_on(export(id, output.as_deref(), *stdout, ctx))?
        }
    }
}

fn parse(file: &Path, json: bool) -> Result<()> {
    let text = partner::read_partner_file(file)?;
    let result = partner::parse(&text);

    if json {
        return print_json(&result);
    }

    println!("{}", file.display().to_string().bold());
    for field in &result.fields {
        let key = if field.recognized {
            field.raw_key.normal()
        } else {
            field.raw_key.yellow()
        };
        println!(
            "  {:>4}  {:<10} {:<28} {}",
            field.line,
            field.section.to_string().dimmed(),
            key,
            field.value
        );
    }
    print_diagnostics(&result);
    println!(
        "\n{} fields, {} errors, {} warnings",
        result.fields.len(),
        result.errors.len(),
        result.warnings.len()
    );
    Ok(())
}

fn print_diagnostics(result: &ParseResult) {
    for error in &result.errors {
        eprintln!("  {} {error}", "error".red());
    }
    for warning in &result.warnings {
        eprintln!("  {} {warning}", "warning".yellow());
    }
}

/// Everything needed to reconcile one file against one partner.
struct Loaded {
    parsed: ParseResult,
    live: LiveRecord,
}

async fn schema_for(client: &ApiClient) -> Schema {
    match client.partner_custom_fields().await {
        Ok(defs) => Schema::standard().with_custom_fields(defs),
        Err(e) => {
            warn!(error = %e, "Custom field definitions unavailable, using defaults");
            Schema::standard().clone()
        }
    }
}

async fn load<F, Fut>(
    args: &PartnerFileArgs,
    client: &ApiClient,
    live: &Query<String, LiveRecord, F>,
) -> Result<Loaded>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<LiveRecord>>,
{
    let text = partner::read_partner_file(&args.file)?;
    let schema = schema_for(client).await;
    let parsed = partner::parse_with_schema(&text, &schema);

    live.set_key(Some(args.id.clone())).await;
    let live = live.state().into_result()?;

    Ok(Loaded { parsed, live })
}

#[derive(Serialize)]
struct DiffOutput<'a> {
    partner_id: &'a str,
    file: String,
    rows: &'a [PreviewRow],
    summary: &'a ReconcileSummary,
    parse: &'a ParseResult,
}

async fn diff(args: &PartnerFileArgs, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.client()?;
    let query = Query::new(|id: String| {
        let client = &client;
        async move { client.get_partner(&id).await }
    });
    let Loaded { parsed, live } = load(args, &client, &query).await?;

    let selection = partner::default_selection(&parsed.fields, &live);
    let rows = partner::preview(&parsed.fields, &live, &selection);
    let summary = ReconcileSummary::from_rows(&rows);

    if ctx.json {
        return print_json(&DiffOutput {
            partner_id: &args.id,
            file: args.file.display().to_string(),
            rows: &rows,
            summary: &summary,
            parse: &parsed,
        });
    }

    print_rows(&rows);
    print_diagnostics(&parsed);
    print_summary(&summary);
    Ok(())
}

fn print_rows(rows: &[PreviewRow]) {
    for row in rows {
        let mark = if row.selected { "[x]" } else { "[ ]" };
        let status = match row.status {
            FieldStatus::New => "new".green(),
            FieldStatus::Modified => "modified".yellow(),
            FieldStatus::Unchanged => "unchanged".dimmed(),
            FieldStatus::Unknown => "unknown".red(),
        };
        let current = row.current.as_deref().unwrap_or("-");
        println!(
            "  {mark} {status:<10} {:<28} {} {} {}",
            row.label,
            current.dimmed(),
            "→".dimmed(),
            row.incoming
        );
    }
}

fn print_summary(summary: &ReconcileSummary) {
    println!(
        "\n{} new, {} modified, {} unchanged, {} unknown; {} selected",
        summary.new, summary.modified, summary.unchanged, summary.unknown, summary.selected
    );
}

fn selection_for(args: &ApplyArgs, loaded: &Loaded) -> Selection {
    if !args.only.is_empty() {
        return args.only.iter().cloned().collect();
    }

    let mut selection = partner::default_selection(&loaded.parsed.fields, &loaded.live);
    for key in &args.exclude {
        selection.exclude(key);
    }
    selection
}

#[derive(Serialize)]
struct ApplyOutput<'a> {
    partner_id: &'a str,
    dry_run: bool,
    applied: &'a AppliedResult,
    body: serde_json::Value,
    /// Selected fields that still differ after the update.
    pending: Vec<String>,
}

async fn apply(args: &ApplyArgs, ctx: &Context) -> Result<()> {
    let notifier = TerminalNotifier::new(ctx.quiet || ctx.json);
    let (client, _) = ctx.client()?;
    let id = args.target.id.as_str();

    let query = Query::new(|id: String| {
        let client = &client;
        async move { client.get_partner(&id).await }
    });
    let loaded = load(&args.target, &client, &query).await?;
    if !ctx.json {
        print_diagnostics(&loaded.parsed);
    }

    let selection = selection_for(args, &loaded);
    let applied = partner::apply(&loaded.parsed.fields, &selection);
    let body = applied.to_patch_body();

    if applied.is_empty() {
        notifier.success("Nothing selected, partner left unchanged");
        if ctx.json {
            return print_json(&ApplyOutput {
                partner_id: id,
                dry_run: args.dry_run,
                applied: &applied,
                body,
                pending: Vec::new(),
            });
        }
        return Ok(());
    }

    if args.dry_run {
        if ctx.json {
            return print_json(&ApplyOutput {
                partner_id: id,
                dry_run: true,
                applied: &applied,
                body,
                pending: Vec::new(),
            });
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    let update = Mutation::new(|body: serde_json::Value| {
        let client = &client;
        async move { client.update_partner(id, &body).await }
    });
    let toast = notifier.loading(&format!("Updating partner {id}"));

    match update.run(body.clone()).await {
        Ok(_) => {
            notifier.dismiss(toast);
            notifier.success(&format!("Partner {id} updated ({} fields)", applied.len()));
        }
        Err(e) => {
            notifier.dismiss(toast);
            notifier.error(&e.to_string());
            return Err(e);
        }
    }

    // Mutations never invalidate anything on their own.
    query.refetch().await;
    let pending = match query.state().into_result() {
        Ok(live) => still_pending(&loaded, &selection, &live),
        Err(e) => {
            warn!(error = %e, "Could not re-read partner after update");
            Vec::new()
        }
    };

    if ctx.json {
        return print_json(&ApplyOutput {
            partner_id: id,
            dry_run: false,
            applied: &applied,
            body,
            pending,
        });
    }

    if !pending.is_empty() {
        println!(
            "{} the server did not take: {}",
            "warning:".yellow(),
            pending.join(", ")
        );
    }
    Ok(())
}

fn still_pending(loaded: &Loaded, selection: &Selection, live: &LiveRecord) -> Vec<String> {
    partner::preview(&loaded.parsed.fields, live, selection)
        .into_iter()
        .filter(|row| {
            row.selected && matches!(row.status, FieldStatus::New | FieldStatus::Modified)
        })
        .map(|row| row.key.to_string())
        .collect()
}

async fn export(id: &str, output: Option<&Path>, stdout: bool, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.client()?;
    let schema = schema_for(&client).await;
    let record = client.get_partner(id).await?;
    let text = partner::serialize(&record, &schema);

    if stdout {
        print!("{text}");
        return Ok(());
    }

    let path = output.map_or_else(
        || PathBuf::from(format!("partner-{id}.partner")),
        Path::to_path_buf,
    );
    partner::write_partner_file(&path, &text)?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "partner_id": id,
            "path": path.display().to_string(),
            "bytes": text.len(),
        }));
    }

    if !ctx.quiet {
        println!("Exported partner {id} to {}", path.display());
    }
    Ok(())
}

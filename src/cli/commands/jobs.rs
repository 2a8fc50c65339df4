//! Export and import job commands.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use super::{Context, block_on, print_json};
use crate::cli::{ExportCommands, ImportCommands, WaitArgs};
use crate::config::ApiSettings;
use crate::error::Result;
use crate::jobs::{
    BatchJob, ExportRequest, JobKind, JobOutcome, JobPhase, PollHandle, PollState, Poller,
};
use crate::notify::{Notifier, TerminalNotifier};
use crate::partner;
use crate::remote::{ApiClient, Entity};

/// Execute export commands.
pub fn execute_export(command: &ExportCommands, ctx: &Context) -> Result<()> {
    block_on(export(command, ctx))?
}

/// Execute import commands.
pub fn execute_import(command: &ImportCommands, ctx: &Context) -> Result<()> {
    block_on(import(command, ctx))?
}

fn poller(
    client: &ApiClient,
    kind: JobKind,
    settings: &ApiSettings,
    interval_ms: Option<u64>,
) -> Poller<crate::jobs::JobEndpoint> {
    let interval = interval_ms.map_or(settings.poll_interval, Duration::from_millis);
    Poller::new(client.job_endpoint(kind)).with_interval(interval)
}

async fn export(command: &ExportCommands, ctx: &Context) -> Result<()> {
    let notifier = TerminalNotifier::new(ctx.quiet || ctx.json);
    let (client, settings) = ctx.client()?;

    match command {
        ExportCommands::Start {
            entity,
            format,
            filters,
            output,
            wait,
        } => {
            let request = filters
                .iter()
                .fold(ExportRequest::new(*entity, format), |req, (k, v)| {
                    req.filter(k, v.as_str())
                });

            if !(wait.wait || output.is_some()) {
                let job = client.start_export(&request).await?;
                return print_job(&job, ctx);
            }

            let poller = poller(&client, JobKind::Export, &settings, wait.interval_ms);
            let handle = poller.start(client.start_export(&request)).await?;
            let job = track(handle, &notifier, *entity).await?;

            if let Some(path) = output {
                download(&client, &job.id, path, ctx).await?;
            }
            print_job(&job, ctx)
        }

        ExportCommands::Status { id, wait } => {
            status(&client, JobKind::Export, id, *wait, &settings, &notifier, ctx).await
        }

        ExportCommands::Download { id, output } => download(&client, id, output, ctx).await,
    }
}

async fn import(command: &ImportCommands, ctx: &Context) -> Result<()> {
    let notifier = TerminalNotifier::new(ctx.quiet || ctx.json);
    let (client, settings) = ctx.client()?;

    match command {
        ImportCommands::Run {
            file,
            entity,
            no_wait,
            interval_ms,
        } => {
            let toast = notifier.loading(&format!("Uploading {}", file.display()));
            let file_id = match client.upload_import_file(file, *entity).await {
                Ok(id) => {
                    notifier.dismiss(toast);
                    id
                }
                Err(e) => {
                    notifier.dismiss(toast);
                    notifier.error(&format!("Upload failed: {e}"));
                    return Err(e);
                }
            };

            if *no_wait {
                let job = client.start_import(&file_id, *entity).await?;
                return print_job(&job, ctx);
            }

            let poller = poller(&client, JobKind::Import, &settings, *interval_ms);
            let handle = poller.start(client.start_import(&file_id, *entity)).await?;
            let job = track(handle, &notifier, *entity).await?;
            print_job(&job, ctx)
        }

        ImportCommands::Status { id, wait } => {
            status(&client, JobKind::Import, id, *wait, &settings, &notifier, ctx).await
        }
    }
}

async fn status(
    client: &ApiClient,
    kind: JobKind,
    id: &str,
    wait: WaitArgs,
    settings: &ApiSettings,
    notifier: &dyn Notifier,
    ctx: &Context,
) -> Result<()> {
    let poller = poller(client, kind, settings, wait.interval_ms);

    if !wait.wait {
        let job = poller.refresh(id).await?;
        return print_job(&job, ctx);
    }

    let toast = notifier.loading(&format!("Waiting for {kind} {id}"));
    let outcome = follow(poller.watch(id), notifier, toast).await;
    let job = settle(outcome, notifier, &format!("{kind} {id}"))?;
    print_job(&job, ctx)
}

/// Follow a started job to its terminal state, reporting progress.
async fn track(handle: PollHandle, notifier: &dyn Notifier, entity: Entity) -> Result<BatchJob> {
    let label = format!("{entity} job {}", handle.job_id());
    let toast = notifier.loading(&format!("{label} started"));
    let outcome = follow(handle, notifier, toast).await;
    settle(outcome, notifier, &label)
}

async fn follow(
    handle: PollHandle,
    notifier: &dyn Notifier,
    toast: crate::notify::ToastId,
) -> Result<JobOutcome> {
    let mut progress = handle.progress();
    let wait = handle.wait();
    tokio::pin!(wait);

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            changed = progress.changed() => {
                if changed.is_err() {
                    // Polling task ended; the outcome is ready or polling was stopped.
                    break (&mut wait).await;
                }
                let state = progress.borrow_and_update().clone();
                if state.phase == JobPhase::Active {
                    notifier.update(toast, &describe_progress(&state));
                }
            }
        }
    };

    notifier.dismiss(toast);
    outcome
}

fn settle(outcome: Result<JobOutcome>, notifier: &dyn Notifier, label: &str) -> Result<BatchJob> {
    match outcome {
        Ok(JobOutcome::Succeeded(job)) => {
            notifier.success(&format!("{label} completed"));
            Ok(job)
        }
        Ok(failed @ JobOutcome::Failed(_)) => {
            let summary = failed.job().error_summary.clone();
            notifier.error(&format!(
                "{label} failed{}",
                summary.map(|s| format!(": {s}")).unwrap_or_default()
            ));
            failed.into_result()
        }
        Err(e) => {
            notifier.error(&e.to_string());
            Err(e)
        }
    }
}

fn describe_progress(state: &PollState) -> String {
    let counts = state
        .job
        .as_ref()
        .and_then(|job| Some((job.processed()?, job.total()?)))
        .map(|(done, total)| format!(" ({done}/{total} rows)"))
        .unwrap_or_default();
    let status = state.job.as_ref().map_or("pending", BatchJob::display_status);
    format!("{status} {:.0}%{counts}", state.progress)
}

async fn download(client: &ApiClient, id: &str, output: &Path, ctx: &Context) -> Result<()> {
    let bytes = client.download_export_file(id).await?;
    partner::write_atomic(output, &bytes)?;

    if ctx.json {
        return print_json(&serde_json::json!({
            "job_id": id,
            "path": output.display().to_string(),
            "bytes": bytes.len(),
        }));
    }
    if !ctx.quiet {
        println!("Saved {} bytes to {}", bytes.len(), output.display());
    }
    Ok(())
}

fn print_job(job: &BatchJob, ctx: &Context) -> Result<()> {
    if ctx.json {
        return print_json(job);
    }
    if ctx.quiet {
        return Ok(());
    }

    let status = match job.phase() {
        JobPhase::Active => job.display_status().cyan(),
        JobPhase::Succeeded => job.display_status().green(),
        JobPhase::Failed => job.display_status().red(),
    };
    println!("Job {}: {status} ({:.0}%)", job.id.bold(), job.progress());

    let counters = [
        ("Total", job.total_records),
        ("Processed", job.processed()),
        ("Succeeded", job.successful_records),
        ("Failed", job.failed_records),
        ("Skipped", job.skipped_records),
    ];
    for (label, value) in counters {
        if let Some(value) = value {
            println!("  {label:<10} {value}");
        }
    }
    if let Some(summary) = &job.error_summary {
        println!("  {:<10} {summary}", "Errors");
    }
    if let Some(url) = &job.download_url {
        println!("  {:<10} {url}", "File");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::Recorder;
    use serde_json::json;

    fn job(value: serde_json::Value) -> BatchJob {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_describe_progress() {
        let mut state = PollState::default();
        assert_eq!(describe_progress(&state), "pending 0%");

        state.observe(job(json!({
            "id": 1, "status": "processing", "total_records": 200, "processed_records": 50
        })));
        assert_eq!(describe_progress(&state), "processing 25% (50/200 rows)");
    }

    #[test]
    fn test_settle_reports_once_per_outcome() {
        let recorder = Recorder::default();

        let ok = settle(
            Ok(JobOutcome::Succeeded(job(json!({"id": 4, "status": "done"})))),
            &recorder,
            "export 4",
        );
        assert!(ok.is_ok());
        assert_eq!(recorder.take(), vec!["success:export 4 completed"]);

        let failed = settle(
            Ok(JobOutcome::Failed(job(
                json!({"id": 5, "job_status": "failed", "error_summary": "Row 2: bad ICE"}),
            ))),
            &recorder,
            "import 5",
        );
        assert_eq!(failed.unwrap_err().exit_code(), 6);
        assert_eq!(recorder.take(), vec!["error:import 5 failed: Row 2: bad ICE"]);
    }
}

//! Server-side batch jobs (imports and exports).
//!
//! Start a job, then follow it with a [`Poller`] until it reaches a
//! terminal status:
//!
//! ```ignore
//! let poller = Poller::new(client.job_endpoint(JobKind::Export));
//! let handle = poller.start(client.start_export(&request)).await?;
//! let job = handle.wait().await?.into_result()?;
//! ```

mod api;
mod poller;
mod types;

pub use api::{ExportRequest, JobEndpoint, JobStatusSource};
pub use poller::{DEFAULT_POLL_INTERVAL, PollHandle, Poller};
pub use types::{BatchJob, JobKind, JobOutcome, JobPhase, JobStatus, PollState};

//! Blocking wait until a user has no jobs left in the Slurm queue.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use bstr::ByteSlice;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::common::env::current_user;
use crate::common::error::SbatchError;
use crate::common::utils::fs::flush_barrier;

/// Default time between two queue queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Directory created and removed once the queue drains.
pub const DEFAULT_FLUSH_DIR: &str = "temp";

pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = crate::Result<bool>> + 'a>>;

/// Reports whether `user` still has entries in the scheduler queue.
pub trait QueueProbe {
    fn has_jobs<'a>(&'a self, user: &'a str) -> ProbeFuture<'a>;
}

/// Queries the queue with `squeue -u <user>`.
#[derive(Default)]
pub struct SqueueProbe;

impl QueueProbe for SqueueProbe {
    fn has_jobs<'a>(&'a self, user: &'a str) -> ProbeFuture<'a> {
        Box::pin(async move {
            let arguments = ["squeue", "-u", user];
            log::debug!("Running Slurm command `{}`", arguments.join(" "));
            let output = Command::new(arguments[0])
                .args(&arguments[1..])
                .output()
                .await
                .map_err(|error| {
                    SbatchError::QueueQueryFailed(format!("squeue start failed: {error}"))
                })?;
            if !output.status.success() {
                return Err(SbatchError::QueueQueryFailed(format!(
                    "Exit code: {}\nStderr: {}",
                    output.status.code().unwrap_or(-1),
                    output.stderr.to_str_lossy().trim()
                )));
            }
            Ok(has_user_entries(&output.stdout.to_str_lossy(), user))
        })
    }
}

/// Returns true if any line of `squeue` output mentions `user`.
/// The header line never contains a user name.
pub fn has_user_entries(output: &str, user: &str) -> bool {
    output
        .lines()
        .any(|line| line.split_whitespace().any(|field| field == user))
}

#[derive(Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// No job of the user is left in the queue.
    Drained,
    Cancelled,
}

pub struct QueueWaiter<P> {
    probe: P,
    user: String,
    poll_interval: Duration,
    flush_dir: PathBuf,
}

impl<P: QueueProbe> QueueWaiter<P> {
    /// Uses `user`, or the `USER` environment variable when it is not given.
    pub fn new(probe: P, user: Option<String>) -> crate::Result<Self> {
        let user = user
            .filter(|user| !user.trim().is_empty())
            .or_else(current_user)
            .ok_or(SbatchError::MissingUser)?;
        Ok(Self {
            probe,
            user,
            poll_interval: DEFAULT_POLL_INTERVAL,
            flush_dir: PathBuf::from(DEFAULT_FLUSH_DIR),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_flush_dir(mut self, dir: PathBuf) -> Self {
        self.flush_dir = dir;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Polls the queue until it holds no job of the user or until `token` is cancelled.
    pub async fn wait(&self, token: CancellationToken) -> crate::Result<WaitOutcome> {
        loop {
            if token.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }
            if !self.probe.has_jobs(&self.user).await? {
                break;
            }
            log::debug!(
                "Jobs of {} are still queued, next check in {}",
                self.user,
                humantime::format_duration(self.poll_interval)
            );
            tokio::select! {
                _ = token.cancelled() => return Ok(WaitOutcome::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        flush_barrier(&self.flush_dir)?;
        log::info!("No queued jobs of {} remain", self.user);
        Ok(WaitOutcome::Drained)
    }
}

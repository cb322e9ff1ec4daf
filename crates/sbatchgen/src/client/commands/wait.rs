use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use crate::queue::{DEFAULT_FLUSH_DIR, QueueWaiter, SqueueProbe, WaitOutcome};

#[derive(Parser)]
pub struct WaitOpts {
    /// User whose jobs are waited for [default: value of `USER`]
    #[arg(long)]
    pub user: Option<String>,

    /// Time between two queue queries, e.g. `30m` or `1h 30m`
    #[arg(long, default_value = "30m", value_parser = humantime::parse_duration)]
    pub interval: std::time::Duration,

    /// Directory created and removed once the queue drains to flush shared filesystem caches
    #[arg(long, default_value = DEFAULT_FLUSH_DIR, value_hint = clap::ValueHint::DirPath)]
    pub flush_dir: PathBuf,
}

pub async fn command_wait(opts: WaitOpts) -> anyhow::Result<()> {
    let waiter = QueueWaiter::new(SqueueProbe, opts.user)?
        .with_poll_interval(opts.interval)
        .with_flush_dir(opts.flush_dir);

    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            guard.cancel();
        }
    });

    log::info!(
        "Waiting for jobs of {} to leave the queue (polling every {})",
        waiter.user(),
        humantime::format_duration(opts.interval)
    );
    match waiter.wait(token).await? {
        WaitOutcome::Drained => log::info!("No jobs of {} are left in the queue", waiter.user()),
        WaitOutcome::Cancelled => log::warn!("Waiting was interrupted"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;

    use super::WaitOpts;

    #[test]
    fn test_interval_parsing() {
        let opts = WaitOpts::try_parse_from(["wait", "--interval", "1h 30m"]).unwrap();
        assert_eq!(opts.interval, Duration::from_secs(90 * 60));
        assert_eq!(opts.flush_dir.to_str(), Some("temp"));
    }

    #[test]
    fn test_default_interval() {
        let opts = WaitOpts::try_parse_from(["wait", "--user", "alice"]).unwrap();
        assert_eq!(opts.interval, Duration::from_secs(30 * 60));
        assert_eq!(opts.user.as_deref(), Some("alice"));
    }
}

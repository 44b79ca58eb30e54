use crate::utils::terminal::title_sequence;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often the title is re-asserted.
pub const TITLE_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

const CONTROLLING_TERMINAL: &str = "/dev/tty";

/// Keeps the local window title fixed while a session is running.
///
/// Remote programs routinely rewrite the title; this writes it back on a
/// short period. It only writes to the terminal device and never changes its
/// mode.
#[derive(Debug, Clone)]
pub struct TitleKeeper {
    title: String,
    interval: Duration,
    device: PathBuf,
}

impl TitleKeeper {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            interval: TITLE_REFRESH_INTERVAL,
            device: PathBuf::from(CONTROLLING_TERMINAL),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Open the terminal device and keep the title until cancelled.
    /// Without a controlling terminal this returns immediately.
    pub async fn run(&self, cancel: CancellationToken) {
        let device = match tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.device)
            .await
        {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Title keeper disabled, cannot open {:?}: {}", self.device, e);
                return;
            }
        };
        // The device is dropped on the same path that observes cancellation.
        self.run_with_writer(device, cancel).await;
    }

    /// Write the title immediately and then every interval until cancelled.
    /// Returns the writer once stopped.
    pub async fn run_with_writer<W>(&self, mut writer: W, cancel: CancellationToken) -> W
    where
        W: AsyncWrite + Unpin,
    {
        let sequence = title_sequence(&self.title);
        let mut ticker = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Best effort: a failed write just waits for the next tick.
                    if writer.write_all(sequence.as_bytes()).await.is_ok() {
                        let _ = writer.flush().await;
                    }
                }
            }
        }

        tracing::debug!("Title keeper stopped");
        writer
    }
}

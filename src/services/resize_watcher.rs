use crate::utils::terminal::{self, WindowSize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where the watcher reads the current local geometry from.
pub trait SizeSource: Send + Sync + 'static {
    fn current(&self) -> Option<WindowSize>;
}

/// The process's own controlling terminal.
pub struct LocalTerminal;

impl SizeSource for LocalTerminal {
    fn current(&self) -> Option<WindowSize> {
        terminal::current_size()
    }
}

impl<F> SizeSource for F
where
    F: Fn() -> Option<WindowSize> + Send + Sync + 'static,
{
    fn current(&self) -> Option<WindowSize> {
        self()
    }
}

/// How changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// SIGWINCH where available, polling otherwise
    Signal,
    /// Always poll at the configured interval
    Poll,
}

/// Watches local terminal geometry and emits every change.
///
/// The current size is sent once on start so the remote side begins in
/// sync; afterwards only changes are sent. The watcher stops on cancellation
/// or when the receiving side is gone.
pub struct ResizeWatcher<S: SizeSource = LocalTerminal> {
    source: S,
    mode: ResizeMode,
    poll_interval: Duration,
}

impl ResizeWatcher<LocalTerminal> {
    pub fn local(poll_interval: Duration) -> Self {
        Self::new(LocalTerminal, poll_interval)
    }
}

impl<S: SizeSource> ResizeWatcher<S> {
    pub fn new(source: S, poll_interval: Duration) -> Self {
        Self {
            source,
            mode: ResizeMode::Signal,
            poll_interval,
        }
    }

    pub fn with_mode(mut self, mode: ResizeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn spawn(self, tx: mpsc::Sender<WindowSize>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(tx, cancel).await })
    }

    pub async fn run(self, tx: mpsc::Sender<WindowSize>, cancel: CancellationToken) {
        let mut last = None;
        if !self.forward_if_changed(&mut last, &tx, &cancel).await {
            return;
        }

        #[cfg(unix)]
        if self.mode == ResizeMode::Signal {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::window_change()) {
                Ok(mut winch) => {
                    loop {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return,
                            received = winch.recv() => {
                                if received.is_none() {
                                    return;
                                }
                                if !self.forward_if_changed(&mut last, &tx, &cancel).await {
                                    return;
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!("SIGWINCH unavailable ({}), polling terminal size", e);
                }
            }
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    if !self.forward_if_changed(&mut last, &tx, &cancel).await {
                        return;
                    }
                }
            }
        }
    }

    /// Send the current size if it differs from the last one sent.
    /// Returns false once the receiver has gone away or on cancellation,
    /// including while blocked on a full channel.
    async fn forward_if_changed(
        &self,
        last: &mut Option<WindowSize>,
        tx: &mpsc::Sender<WindowSize>,
        cancel: &CancellationToken,
    ) -> bool {
        let Some(size) = self.source.current() else {
            return true;
        };
        if *last == Some(size) {
            return true;
        }
        *last = Some(size);
        tracing::debug!("Local terminal size {}x{}", size.cols, size.rows);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = tx.send(size) => sent.is_ok(),
        }
    }
}

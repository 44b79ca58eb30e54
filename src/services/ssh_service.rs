use crate::models::{AuthMethod, AuthMethodSet, ConnectOptions, HostKeyPolicy, HostRecord};
use crate::services::credential_service::CredentialService;
use crate::services::resize_watcher::ResizeWatcher;
use crate::services::title_keeper::TitleKeeper;
use crate::utils::error::{LwshellError, Result};
use crate::utils::terminal::{self, RawModeGuard, WindowSize};
use indicatif::{ProgressBar, ProgressStyle};
use russh::client::{self, AuthResult, Handle, Msg};
use russh::keys::known_hosts::{check_known_hosts, check_known_hosts_path};
use russh::keys::ssh_key::HashAlg;
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, ChannelMsg, Disconnect, Pty};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Terminal type requested for the remote PTY
pub const TERMINAL_TYPE: &str = "xterm-256color";

const BAUD_RATE: u32 = 14400;

/// Minimum terminal modes sent with the PTY request
pub const PTY_MODES: [(Pty, u32); 3] = [
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, BAUD_RATE),
    (Pty::TTY_OP_OSPEED, BAUD_RATE),
];

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// SSH client session handle
pub type SshSession = Handle<SshClientHandler>;

/// How an interactive session ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOutcome {
    /// Exit status reported by the remote shell, if any
    pub exit_status: Option<u32>,
}

/// SSH service for interactive shell sessions
pub struct SshService;

impl SshService {
    /// Connect to `record` and run an interactive shell on the local
    /// terminal until the remote side closes it.
    ///
    /// Blocks (asynchronously) for the whole session. There is no timeout on
    /// the remote shell.
    pub async fn connect(record: &HostRecord, options: &ConnectOptions) -> Result<SessionOutcome> {
        let port = record.effective_port()?;
        let addr = record.address()?;
        let auth = CredentialService::resolve(record, options)?;

        tracing::info!(
            "Connecting to {} as {} ({})",
            addr,
            record.user,
            auth.names().join(", ")
        );

        let spinner = dial_spinner(&addr);
        let opened = Self::open_session(record, port, &addr, &auth, &options.host_key_policy).await;
        spinner.finish_and_clear();
        let (mut session, channel) = opened?;

        let result = Self::run_shell(channel, options).await;
        Self::disconnect(&mut session).await;
        result
    }

    /// Dial, authenticate and open exactly one session channel.
    async fn open_session(
        record: &HostRecord,
        port: u16,
        addr: &str,
        auth: &AuthMethodSet,
        policy: &HostKeyPolicy,
    ) -> Result<(SshSession, Channel<Msg>)> {
        let mut session = Self::dial(&record.host, port, addr, policy).await?;
        Self::authenticate(&mut session, &record.user, addr, auth).await?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(LwshellError::SessionOpen)?;

        Ok((session, channel))
    }

    /// Open the transport and complete the key exchange
    pub async fn dial(
        host: &str,
        port: u16,
        addr: &str,
        policy: &HostKeyPolicy,
    ) -> Result<SshSession> {
        let config = client::Config {
            inactivity_timeout: None,
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..<client::Config as Default>::default()
        };
        let handler = SshClientHandler::new(host, port, policy.clone());

        client::connect(Arc::new(config), (host, port), handler)
            .await
            .map_err(|source| LwshellError::Dial {
                addr: addr.to_string(),
                source,
            })
    }

    /// Offer each method in order until the server accepts one
    async fn authenticate(
        session: &mut SshSession,
        user: &str,
        addr: &str,
        auth: &AuthMethodSet,
    ) -> Result<()> {
        let dial_error = |source| LwshellError::Dial {
            addr: addr.to_string(),
            source,
        };

        for method in auth.iter() {
            let result = match method {
                AuthMethod::PublicKey { key, .. } => {
                    let hash_alg = session
                        .best_supported_rsa_hash()
                        .await
                        .map_err(dial_error)?
                        .flatten();
                    session
                        .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key.clone(), hash_alg))
                        .await
                }
                AuthMethod::Password(password) => {
                    session.authenticate_password(user, password.as_str()).await
                }
            }
            .map_err(dial_error)?;

            if matches!(result, AuthResult::Success) {
                tracing::info!("Authenticated to {} with {}", addr, method.name());
                return Ok(());
            }
            tracing::debug!("{} authentication rejected by {}", method.name(), addr);
        }

        Err(LwshellError::AuthRejected {
            user: user.to_string(),
            addr: addr.to_string(),
        })
    }

    async fn run_shell(mut channel: Channel<Msg>, options: &ConnectOptions) -> Result<SessionOutcome> {
        // Checked only after the dial: a doomed non-interactive invocation
        // still pays for the round trip, and its failure is audited.
        if !terminal::stdin_is_terminal() {
            return Err(LwshellError::NotATerminal);
        }
        let raw_mode = RawModeGuard::enter()?;

        let size = WindowSize::or_default(terminal::current_size());
        channel
            .request_pty(
                false,
                TERMINAL_TYPE,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &PTY_MODES,
            )
            .await
            .map_err(LwshellError::PtyRequest)?;

        // Cancelled exactly once when this function returns, on every path.
        let cancel = CancellationToken::new();
        let _stop_background = cancel.clone().drop_guard();

        let (resize_tx, mut resize_rx) = mpsc::channel(8);
        let resize_task =
            ResizeWatcher::local(options.resize_poll_interval).spawn(resize_tx, cancel.clone());
        let title_task = options
            .window_title()
            .map(|title| TitleKeeper::new(title).spawn(cancel.clone()));

        channel
            .request_shell(false)
            .await
            .map_err(LwshellError::ShellRequest)?;

        let mut input = spawn_stdin_reader()?;
        let outcome = Self::pump(&mut channel, &mut input, &mut resize_rx).await;

        cancel.cancel();
        drop(resize_rx);
        let _ = resize_task.await;
        if let Some(task) = title_task {
            let _ = task.await;
        }
        drop(raw_mode);

        if let Ok(SessionOutcome {
            exit_status: Some(code),
        }) = &outcome
        {
            tracing::debug!("Remote shell exited with status {}", code);
        }
        outcome
    }

    /// Shuttle bytes between the local terminal and the channel until the
    /// remote side closes it.
    async fn pump(
        channel: &mut Channel<Msg>,
        input: &mut mpsc::Receiver<Vec<u8>>,
        resizes: &mut mpsc::Receiver<WindowSize>,
    ) -> Result<SessionOutcome> {
        let mut stdout = tokio::io::stdout();
        let mut stderr = tokio::io::stderr();
        let mut outcome = SessionOutcome::default();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                bytes = input.recv(), if stdin_open => match bytes {
                    Some(bytes) => channel
                        .data(&bytes[..])
                        .await
                        .map_err(LwshellError::Channel)?,
                    None => {
                        stdin_open = false;
                        let _ = channel.eof().await;
                    }
                },
                Some(size) = resizes.recv() => {
                    // Best effort, the channel may already be closing.
                    let _ = channel
                        .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
                        .await;
                }
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { ref data }) => {
                        stdout.write_all(data).await.map_err(LwshellError::SessionIo)?;
                        stdout.flush().await.map_err(LwshellError::SessionIo)?;
                    }
                    Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                        stderr.write_all(data).await.map_err(LwshellError::SessionIo)?;
                        stderr.flush().await.map_err(LwshellError::SessionIo)?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        outcome.exit_status = Some(exit_status);
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        tracing::debug!("Remote shell terminated by signal {:?}", signal_name);
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                },
            }
        }

        Ok(outcome)
    }

    /// Disconnect from SSH server
    pub async fn disconnect(session: &mut SshSession) {
        if let Err(e) = session
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            tracing::debug!("Disconnect failed: {}", e);
        }
    }
}

/// Read local stdin on a dedicated thread.
///
/// Blocking reads cannot be cancelled, so the thread is detached; it ends at
/// the next read after the receiver is gone, or with the process.
fn spawn_stdin_reader() -> Result<mpsc::Receiver<Vec<u8>>> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::Builder::new()
        .name("lwshell-stdin".to_string())
        .spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 4096];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        })
        .map_err(LwshellError::SessionIo)?;
    Ok(rx)
}

fn dial_spinner(addr: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Connecting to {}", addr));
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// SSH client handler applying the configured host key policy
pub struct SshClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl SshClientHandler {
    pub fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }

    /// Decide whether to trust the server key
    pub fn verify(&self, server_public_key: &PublicKey) -> bool {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256);

        match &self.policy {
            HostKeyPolicy::AcceptAny => {
                tracing::debug!(
                    "Host key verification disabled, accepting {}:{} key {}",
                    self.host,
                    self.port,
                    fingerprint
                );
                true
            }
            HostKeyPolicy::KnownHosts { path } => {
                let checked = match path {
                    Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
                    None => check_known_hosts(&self.host, self.port, server_public_key),
                };
                match checked {
                    Ok(true) => {
                        tracing::debug!("Server key {} verified", fingerprint);
                        true
                    }
                    Ok(false) => {
                        tracing::warn!(
                            "Host key for {}:{} is not in known_hosts (fingerprint {})",
                            self.host,
                            self.port,
                            fingerprint
                        );
                        false
                    }
                    Err(e) => {
                        tracing::error!("Host key check for {}:{} failed: {}", self.host, self.port, e);
                        false
                    }
                }
            }
        }
    }
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl std::future::Future<Output = std::result::Result<bool, Self::Error>> + Send {
        let accepted = self.verify(server_public_key);
        async move { Ok(accepted) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use russh::keys::PrivateKey;

    fn test_public_key() -> PublicKey {
        let pem = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/id_ed25519_plain"
        ))
        .unwrap();
        let key: PrivateKey = russh::keys::decode_secret_key(&pem, None).unwrap();
        key.public_key().clone()
    }

    #[test]
    fn test_pty_modes() {
        assert!(PTY_MODES.contains(&(Pty::ECHO, 1)));
        assert!(PTY_MODES.contains(&(Pty::TTY_OP_ISPEED, 14400)));
        assert!(PTY_MODES.contains(&(Pty::TTY_OP_OSPEED, 14400)));
        assert_eq!(TERMINAL_TYPE, "xterm-256color");
    }

    #[test]
    fn test_accept_any_policy() {
        let handler = SshClientHandler::new("10.0.0.5", 22, HostKeyPolicy::AcceptAny);
        assert!(handler.verify(&test_public_key()));
    }

    #[test]
    fn test_known_hosts_rejects_unknown_key() {
        let temp = tempfile::TempDir::new().unwrap();
        let known_hosts = temp.path().join("known_hosts");
        std::fs::write(&known_hosts, "").unwrap();

        let handler = SshClientHandler::new(
            "10.0.0.5",
            22,
            HostKeyPolicy::KnownHosts {
                path: Some(known_hosts),
            },
        );
        assert!(!handler.verify(&test_public_key()));
    }

    #[test]
    fn test_known_hosts_accepts_listed_key() {
        let temp = tempfile::TempDir::new().unwrap();
        let known_hosts = temp.path().join("known_hosts");
        // Keys received from a server carry no comment.
        let mut key = test_public_key();
        key.set_comment("");
        std::fs::write(
            &known_hosts,
            format!("10.0.0.5 {}\n", key.to_openssh().unwrap()),
        )
        .unwrap();

        let handler = SshClientHandler::new(
            "10.0.0.5",
            22,
            HostKeyPolicy::KnownHosts {
                path: Some(known_hosts),
            },
        );
        assert!(handler.verify(&key));
    }

    #[tokio::test]
    async fn test_dial_failure_is_wrapped() {
        // Nothing listens on port 1 of the loopback interface.
        let err = SshService::dial("127.0.0.1", 1, "127.0.0.1:1", &HostKeyPolicy::AcceptAny)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LwshellError::Dial { .. }));
        assert!(err.to_string().starts_with("connection to 127.0.0.1:1 failed"));
    }
}

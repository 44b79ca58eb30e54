use crate::models::{ConnectOptions, HostRecord};
use crate::services::audit_service::AuditLog;
use crate::services::config_service::{AppSettings, ConfigService};
use crate::services::ssh_service::{SessionOutcome, SshService};
use crate::utils::error::{LwshellError, Result};
use crate::utils::terminal::title_sequence;
use console::style;
use std::io::Write;
use std::time::Duration;

/// Process exit code for a session that was established.
pub const EXIT_OK: i32 = 0;
/// Process exit code for a session that could not be established.
pub const EXIT_FAILURE: i32 = 1;

/// Runs one interactive session per invocation against the host store.
pub struct SessionRunner {
    config: ConfigService,
    settings: AppSettings,
    audit: AuditLog,
}

impl SessionRunner {
    pub fn new(config: ConfigService, settings: AppSettings) -> Self {
        let audit = config.audit_log(&settings);
        Self {
            config,
            settings,
            audit,
        }
    }

    /// Load settings from the store's directory.
    pub fn from_config(config: ConfigService) -> Result<Self> {
        let settings = config.load_settings()?;
        Ok(Self::new(config, settings))
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = audit;
        self
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Run an interactive session and map the result to a process exit code.
    ///
    /// Returns 0 once a session was established, whatever the remote shell
    /// exited with, and 1 otherwise. The error text goes to stderr.
    pub async fn run_interactive_session(&self, host_id: &str, options: ConnectOptions) -> i32 {
        match self.try_run(host_id, options).await {
            Ok(_) => EXIT_OK,
            Err(e) => {
                eprintln!("{}", e);
                EXIT_FAILURE
            }
        }
    }

    /// Like [`run_interactive_session`](Self::run_interactive_session) but
    /// returns the outcome or error instead of an exit code.
    pub async fn try_run(&self, host_id: &str, options: ConnectOptions) -> Result<SessionOutcome> {
        let record = self
            .config
            .find_host(host_id)?
            .ok_or_else(|| LwshellError::HostNotFound(host_id.to_string()))?;

        self.audit.record_start(&record);
        let result = self.connect(&record, options).await;
        self.audit.record_result(&record, result.as_ref().err());

        if let Err(e) = &result {
            tracing::debug!("Session to {} failed ({:?}): {}", record.id, e.category(), e);
        }
        result
    }

    async fn connect(&self, record: &HostRecord, mut options: ConnectOptions) -> Result<SessionOutcome> {
        if options.window_title().is_none() {
            options.window_title = Some(record.default_title()?);
        }
        options.host_key_policy = self.settings.host_key_policy();
        options.resize_poll_interval = Duration::from_millis(self.settings.resize_poll_interval_ms);

        print_banner(record, options.window_title().unwrap_or_default())?;
        SshService::connect(record, &options).await
    }
}

/// Print the host banner and set the window title once.
fn print_banner(record: &HostRecord, title: &str) -> Result<()> {
    let port = record.effective_port()?;
    let mut stdout = std::io::stdout();

    write!(stdout, "{}", title_sequence(title))?;
    writeln!(stdout, "{}", style(format!("Connecting to {}", record.name)).cyan().bold())?;
    writeln!(stdout, "  {:<6} {}", style("Host").dim(), record.host)?;
    writeln!(stdout, "  {:<6} {}", style("User").dim(), record.user)?;
    writeln!(stdout, "  {:<6} {}", style("Port").dim(), port)?;
    writeln!(
        stdout,
        "  {}",
        style(format!("{}@{}:{}", record.user, record.host, port)).green()
    )?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner(temp: &TempDir) -> SessionRunner {
        let config = ConfigService::with_dir(temp.path().to_path_buf()).unwrap();
        SessionRunner::new(config, AppSettings::default())
    }

    #[tokio::test]
    async fn test_unknown_host_exits_one_without_audit() {
        let temp = TempDir::new().unwrap();
        let runner = runner(&temp);

        let err = runner.try_run("42", ConnectOptions::new()).await.unwrap_err();
        assert!(matches!(err, LwshellError::HostNotFound(ref id) if id == "42"));
        assert_eq!(err.to_string(), "server not found: 42");

        assert_eq!(runner.run_interactive_session("42", ConnectOptions::new()).await, EXIT_FAILURE);
        assert!(!runner.audit_log().path().unwrap().exists());
    }

    #[tokio::test]
    async fn test_missing_credentials_are_audited() {
        let temp = TempDir::new().unwrap();
        let runner = runner(&temp);
        let id = runner
            .config
            .add_host(HostRecord::new("db1", "10.0.0.5", "admin"))
            .unwrap();

        let code = runner.run_interactive_session(&id, ConnectOptions::new()).await;
        assert_eq!(code, EXIT_FAILURE);

        let log = std::fs::read_to_string(runner.audit_log().path().unwrap()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("phase=started"));
        assert!(lines[1].contains("phase=failure"));
        assert!(lines[1].contains("err=no_credentials_configured"));
    }
}

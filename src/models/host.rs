use crate::utils::error::{LwshellError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port used when a record leaves it unset or non-positive.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A stored remote host.
///
/// Optional fields deserialize from either a missing key or an empty string;
/// the accessors treat both as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostRecord {
    /// Stable identifier, assigned by the config store when missing
    #[serde(default)]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Hostname or IP address
    pub host: String,

    /// SSH port; 0 or negative means 22
    #[serde(default)]
    pub port: i64,

    /// Login user
    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Private key file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,

    /// Group label used for listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl HostRecord {
    pub fn new(name: impl Into<String>, host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            user: user.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_port(mut self, port: i64) -> Self {
        self.port = port;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn password(&self) -> Option<&str> {
        non_empty(self.password.as_deref())
    }

    pub fn key_path(&self) -> Option<&str> {
        non_empty(self.key_path.as_deref())
    }

    pub fn group(&self) -> Option<&str> {
        non_empty(self.group.as_deref())
    }

    /// Port to dial: 22 when unset or non-positive.
    pub fn effective_port(&self) -> Result<u16> {
        if self.port <= 0 {
            return Ok(DEFAULT_SSH_PORT);
        }
        u16::try_from(self.port).map_err(|_| LwshellError::InvalidPort(self.port))
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> Result<String> {
        let port = self.effective_port()?;
        if self.host.contains(':') && !self.host.starts_with('[') {
            Ok(format!("[{}]:{}", self.host, port))
        } else {
            Ok(format!("{}:{}", self.host, port))
        }
    }

    /// Window title shown while connected: `SSH: name (user@host:port)`.
    pub fn default_title(&self) -> Result<String> {
        Ok(format!(
            "SSH: {} ({}@{}:{})",
            self.name,
            self.user,
            self.host,
            self.effective_port()?
        ))
    }

    /// Trim user-entered fields and replace a non-positive port with 22.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.host = self.host.trim().to_string();
        self.user = self.user.trim().to_string();
        for field in [&mut self.password, &mut self.key_path, &mut self.group] {
            if let Some(value) = field.as_mut() {
                *value = value.trim().to_string();
            }
        }
        if self.port <= 0 {
            self.port = i64::from(DEFAULT_SSH_PORT);
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Per-invocation overrides for a single connection attempt.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Supersedes the record's key path when non-empty
    pub key_path_override: Option<PathBuf>,

    /// Title re-asserted on the local terminal for the whole session
    pub window_title: Option<String>,

    pub host_key_policy: HostKeyPolicy,

    /// Resize polling period where no resize signal is available
    pub resize_poll_interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            key_path_override: None,
            window_title: None,
            host_key_policy: HostKeyPolicy::default(),
            resize_poll_interval: Duration::from_millis(250),
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path_override = Some(path.into());
        self
    }

    pub fn with_window_title(mut self, title: impl Into<String>) -> Self {
        self.window_title = Some(title.into());
        self
    }

    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    pub fn with_resize_poll_interval(mut self, interval: Duration) -> Self {
        self.resize_poll_interval = interval;
        self
    }

    pub fn key_path_override(&self) -> Option<&Path> {
        self.key_path_override
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn window_title(&self) -> Option<&str> {
        non_empty(self.window_title.as_deref())
    }
}

/// How the remote host key is checked during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key (trusted network assumption)
    #[default]
    AcceptAny,
    /// Require a matching entry in an OpenSSH known_hosts file;
    /// `None` means `~/.ssh/known_hosts`
    KnownHosts { path: Option<PathBuf> },
}

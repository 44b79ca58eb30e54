use super::HostRecord;
use crate::utils::error::LwshellError;
use chrono::{DateTime, SecondsFormat, Utc};

/// Phase of a connection attempt recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditPhase {
    Started,
    Success,
    Failure,
}

impl AuditPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// One line of the access log
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub host_id: String,
    pub name: String,
    pub host: String,
    pub port: i64,
    pub user: String,
    pub phase: AuditPhase,
    pub error: Option<String>,
}

impl AuditEvent {
    fn from_record(record: &HostRecord, phase: AuditPhase) -> Self {
        let port = if record.port <= 0 {
            i64::from(super::host::DEFAULT_SSH_PORT)
        } else {
            record.port
        };
        Self {
            timestamp: Utc::now(),
            host_id: record.id.clone(),
            name: record.name.clone(),
            host: record.host.clone(),
            port,
            user: record.user.clone(),
            phase,
            error: None,
        }
    }

    pub fn started(record: &HostRecord) -> Self {
        Self::from_record(record, AuditPhase::Started)
    }

    /// `success` when `error` is `None`, otherwise `failure` with the message.
    pub fn result(record: &HostRecord, error: Option<&LwshellError>) -> Self {
        match error {
            None => Self::from_record(record, AuditPhase::Success),
            Some(err) => Self {
                error: Some(err.to_string()),
                ..Self::from_record(record, AuditPhase::Failure)
            },
        }
    }

    /// Render as a single `key=value` line without the trailing newline.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{} connect id={} name={} host={} port={} user={} phase={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            escape_field(&self.host_id),
            escape_field(&self.name),
            escape_field(&self.host),
            self.port,
            escape_field(&self.user),
            self.phase.as_str(),
        );
        if let Some(err) = &self.error {
            line.push_str(" err=");
            line.push_str(&escape_field(err));
        }
        line
    }
}

/// Render a field value as a single token.
///
/// Spaces and tabs become underscores. Anything still unsafe (other
/// whitespace, quotes, backslashes) is emitted as a quoted, escaped string.
pub fn escape_field(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    let replaced = value.replace([' ', '\t'], "_");
    let needs_quoting = replaced
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '\\');
    if needs_quoting {
        format!("{:?}", replaced)
    } else {
        replaced
    }
}

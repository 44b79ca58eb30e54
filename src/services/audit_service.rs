use crate::models::{AuditEvent, HostRecord};
use crate::utils::error::LwshellError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only access log of connection attempts.
///
/// Every call opens the file, appends one line, syncs it to disk and closes
/// it again, so a killed process never loses an earlier record. Failures are
/// swallowed: auditing must never stop a connection.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// An audit log that records nothing, used when no location is known.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record_start(&self, record: &HostRecord) {
        self.append(&AuditEvent::started(record));
    }

    pub fn record_result(&self, record: &HostRecord, error: Option<&LwshellError>) {
        self.append(&AuditEvent::result(record, error));
    }

    fn append(&self, event: &AuditEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = write_line(path, &event.to_line()) {
            tracing::debug!("Failed to write audit log {:?}: {}", path, e);
        }
    }
}

fn write_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        create_private_dir(dir)?;
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    file.write_all(format!("{}\n", line).as_bytes())?;
    file.sync_all()
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> HostRecord {
        HostRecord::new("db1", "10.0.0.5", "admin").with_id("3")
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/lwshell/access.log");
        let audit = AuditLog::new(&path);

        audit.record_start(&record());

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with("phase=started\n"));
    }

    #[test]
    fn test_disabled_log_is_silent() {
        let audit = AuditLog::disabled();
        assert!(audit.path().is_none());
        audit.record_start(&record());
        audit.record_result(&record(), None);
    }

    #[test]
    fn test_unwritable_location_is_swallowed() {
        let temp = TempDir::new().unwrap();
        // A regular file where a directory is expected.
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let audit = AuditLog::new(blocker.join("access.log"));

        audit.record_start(&record());
        audit.record_result(&record(), Some(&LwshellError::NotATerminal));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("access.log");
        AuditLog::new(&path).record_start(&record());

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

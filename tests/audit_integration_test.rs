//! Integration tests for the connection audit log

use lwshell::models::HostRecord;
use lwshell::services::audit_service::AuditLog;
use lwshell::utils::error::LwshellError;
use tempfile::TempDir;

fn create_test_audit_log() -> (AuditLog, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let audit = AuditLog::new(temp_dir.path().join("access.log"));
    (audit, temp_dir)
}

fn read_lines(audit: &AuditLog) -> Vec<String> {
    std::fs::read_to_string(audit.path().unwrap())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_started_then_failure() {
    let (audit, _temp) = create_test_audit_log();
    let record = HostRecord::new("db1", "10.0.0.5", "admin").with_id("3");

    audit.record_start(&record);
    audit.record_result(&record, Some(&LwshellError::NoCredentials));

    let lines = read_lines(&audit);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(" connect id=3 name=db1 host=10.0.0.5 port=22 user=admin phase=started"));
    assert!(lines[1].contains("phase=failure err="));
    assert!(!lines[0].contains("err="));
}

#[test]
fn test_started_then_success() {
    let (audit, _temp) = create_test_audit_log();
    let record = HostRecord::new("web", "example.com", "deploy")
        .with_id("12")
        .with_port(2222);

    audit.record_start(&record);
    audit.record_result(&record, None);

    let lines = read_lines(&audit);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("phase=started"));
    assert!(lines[1].ends_with("port=2222 user=deploy phase=success"));
}

#[test]
fn test_each_line_starts_with_utc_timestamp() {
    let (audit, _temp) = create_test_audit_log();
    audit.record_start(&HostRecord::new("db1", "10.0.0.5", "admin").with_id("3"));

    let lines = read_lines(&audit);
    let timestamp = lines[0].split(' ').next().unwrap();
    assert!(timestamp.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_records_survive_across_instances() {
    let (audit, _temp) = create_test_audit_log();
    let record = HostRecord::new("db1", "10.0.0.5", "admin").with_id("3");

    audit.record_start(&record);
    // A later process appends to the same file instead of truncating it.
    let reopened = AuditLog::new(audit.path().unwrap());
    reopened.record_result(&record, None);
    reopened.record_start(&record);

    assert_eq!(read_lines(&audit).len(), 3);
}

// =============================================================================
// Escaping Tests
// =============================================================================

#[test]
fn test_fields_with_spaces_stay_single_tokens() {
    let (audit, _temp) = create_test_audit_log();
    let record = HostRecord::new("prod db", "10.0.0.5", "admin").with_id("3");

    audit.record_start(&record);
    audit.record_result(
        &record,
        Some(&LwshellError::AuthRejected {
            user: "admin".to_string(),
            addr: "10.0.0.5:22".to_string(),
        }),
    );

    let lines = read_lines(&audit);
    assert!(lines[0].contains("name=prod_db "));
    assert!(lines[1].ends_with("err=authentication_as_admin_on_10.0.0.5:22_was_rejected"));
}

#[test]
fn test_newline_in_field_cannot_split_record() {
    let (audit, _temp) = create_test_audit_log();
    let record = HostRecord::new("evil\nphase=success", "10.0.0.5", "admin").with_id("3");

    audit.record_start(&record);

    let lines = read_lines(&audit);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(r#"name="evil\nphase=success""#));
}

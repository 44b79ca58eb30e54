use crate::utils::error::{LwshellError, Result};
use std::path::Path;

/// Quote `value` for a POSIX shell as a single-quoted word.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Escape `value` for use inside an AppleScript string literal.
pub fn escape_applescript(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', "\\\"")
}

/// Shell command that re-runs `exe` connected to `host_id`.
pub fn connect_command(exe: &Path, host_id: &str) -> String {
    format!(
        "{} --connect-id={}",
        shell_quote(&exe.to_string_lossy()),
        shell_quote(host_id)
    )
}

/// AppleScript that opens a Terminal window running `command`.
pub fn terminal_script(command: &str) -> String {
    format!(
        "tell application \"Terminal\" to do script \"{}\"",
        escape_applescript(command)
    )
}

/// Open a new terminal window running an interactive session to `host_id`.
///
/// Only macOS Terminal is supported; elsewhere this fails with
/// `UnsupportedPlatform` so a caller can report it instead of doing nothing.
pub fn open_in_new_terminal(host_id: &str) -> Result<()> {
    let exe = std::env::current_exe()?;
    let script = terminal_script(&connect_command(&exe, host_id));
    run_terminal_script(&script)
}

#[cfg(target_os = "macos")]
fn run_terminal_script(script: &str) -> Result<()> {
    let output = std::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .map_err(LwshellError::Launch)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(LwshellError::LaunchFailed(stderr));
    }
    tracing::info!("Opened terminal window");
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn run_terminal_script(_script: &str) -> Result<()> {
    Err(LwshellError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("7"), "'7'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_connect_command() {
        let exe = PathBuf::from("/Applications/My Tools/lwshell");
        assert_eq!(
            connect_command(&exe, "12"),
            "'/Applications/My Tools/lwshell' --connect-id='12'"
        );
    }

    #[test]
    fn test_terminal_script_escaping() {
        let script = terminal_script(r#"echo "a\b""#);
        assert_eq!(
            script,
            r#"tell application "Terminal" to do script "echo \"a\\b\"""#
        );
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_unsupported_platform() {
        let err = open_in_new_terminal("1").unwrap_err();
        assert!(matches!(err, LwshellError::UnsupportedPlatform(_)));
    }
}

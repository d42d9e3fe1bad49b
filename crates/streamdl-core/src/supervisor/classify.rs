//! Classify spawn errors and tool exits into failure kinds.
//!
//! Network-class failures are told apart from a generic non-zero exit so the
//! user sees whether to retry, fix the installation, or fix permissions.

use serde::{Deserialize, Serialize};
use std::io;

/// Why a job ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "code", rename_all = "camelCase")]
pub enum FailureKind {
    #[error("cancelled by user")]
    Cancelled,
    #[error("download tool not found; check the installation")]
    ToolMissing,
    #[error("permission denied; check access to the tool and the download directory")]
    Permission,
    #[error("could not start the download tool")]
    Spawn,
    #[error("network error: could not resolve host")]
    NameResolution,
    #[error("network error: connection reset")]
    ConnectionReset,
    #[error("network error: timed out")]
    Timeout,
    #[error("server refused access (HTTP 403)")]
    HttpForbidden,
    #[error("download tool exited with code {0}")]
    ExitCode(i32),
    #[error("download tool was terminated by a signal")]
    Signal,
}

impl FailureKind {
    /// Retrying as-is has a reasonable chance of succeeding.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::NameResolution
                | FailureKind::ConnectionReset
                | FailureKind::Timeout
                | FailureKind::Signal
        )
    }

    /// Message shown to the user, with optional detail appended.
    pub fn describe(self, detail: Option<&str>) -> String {
        match detail.map(str::trim).filter(|d| !d.is_empty()) {
            Some(d) => format!("{self}: {d}"),
            None => self.to_string(),
        }
    }
}

/// Classify an OS error returned while spawning the tool.
pub fn classify_spawn_error(e: &io::Error) -> FailureKind {
    match e.kind() {
        io::ErrorKind::NotFound => FailureKind::ToolMissing,
        io::ErrorKind::PermissionDenied => FailureKind::Permission,
        _ => FailureKind::Spawn,
    }
}

/// Number of trailing stderr lines inspected for a known cause.
const STDERR_SCAN_LINES: usize = 50;

/// Classify a finished process that did not exit cleanly.
///
/// `code` is `None` when the process died from a signal.
pub fn classify_exit(code: Option<i32>, stderr: &[String]) -> FailureKind {
    let Some(code) = code else {
        return FailureKind::Signal;
    };
    let start = stderr.len().saturating_sub(STDERR_SCAN_LINES);
    for line in stderr[start..].iter().rev() {
        if let Some(kind) = classify_stderr_line(line) {
            return kind;
        }
    }
    FailureKind::ExitCode(code)
}

fn classify_stderr_line(line: &str) -> Option<FailureKind> {
    let l = line.to_ascii_lowercase();
    if l.contains("name or service not known")
        || l.contains("temporary failure in name resolution")
        || l.contains("getaddrinfo failed")
        || l.contains("nodename nor servname")
        || l.contains("failed to resolve")
    {
        return Some(FailureKind::NameResolution);
    }
    if l.contains("connection reset") || l.contains("connection aborted") {
        return Some(FailureKind::ConnectionReset);
    }
    if l.contains("timed out") || l.contains("timeout") {
        return Some(FailureKind::Timeout);
    }
    if l.contains("permission denied") || l.contains("errno 13") {
        return Some(FailureKind::Permission);
    }
    if l.contains("http error 403") {
        return Some(FailureKind::HttpForbidden);
    }
    None
}

/// Last non-empty stderr line, used as failure detail.
pub fn last_error_line(stderr: &[String]) -> Option<&str> {
    stderr
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn spawn_errors() {
        let nf = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        assert_eq!(classify_spawn_error(&nf), FailureKind::ToolMissing);
        let pd = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(classify_spawn_error(&pd), FailureKind::Permission);
        let other = io::Error::new(io::ErrorKind::Other, "boom");
        assert_eq!(classify_spawn_error(&other), FailureKind::Spawn);
    }

    #[test]
    fn network_failures_from_stderr() {
        let dns = lines(&[
            "[generic] Extracting URL",
            "ERROR: Unable to download webpage: <urlopen error [Errno -2] Name or service not known>",
        ]);
        assert_eq!(classify_exit(Some(1), &dns), FailureKind::NameResolution);

        let reset = lines(&["ERROR: [Errno 104] Connection reset by peer"]);
        assert_eq!(classify_exit(Some(1), &reset), FailureKind::ConnectionReset);

        let timeout = lines(&["ERROR: The read operation timed out"]);
        assert_eq!(classify_exit(Some(1), &timeout), FailureKind::Timeout);
        assert!(FailureKind::Timeout.is_transient());
    }

    #[test]
    fn permission_and_forbidden() {
        let perm = lines(&["ERROR: unable to open for writing: [Errno 13] Permission denied: 'x.mp4'"]);
        assert_eq!(classify_exit(Some(1), &perm), FailureKind::Permission);
        let forbidden = lines(&["ERROR: unable to download video data: HTTP Error 403: Forbidden"]);
        assert_eq!(classify_exit(Some(1), &forbidden), FailureKind::HttpForbidden);
        assert!(!FailureKind::HttpForbidden.is_transient());
    }

    #[test]
    fn generic_exit_and_signal() {
        assert_eq!(
            classify_exit(Some(2), &lines(&["ERROR: Unsupported URL"])),
            FailureKind::ExitCode(2)
        );
        assert_eq!(classify_exit(None, &[]), FailureKind::Signal);
    }

    #[test]
    fn describe_appends_detail() {
        assert_eq!(
            FailureKind::ExitCode(1).describe(Some("ERROR: Unsupported URL")),
            "download tool exited with code 1: ERROR: Unsupported URL"
        );
        assert_eq!(FailureKind::Cancelled.describe(Some("  ")), "cancelled by user");
    }

    #[test]
    fn failure_kind_serde_shape() {
        let json = serde_json::to_string(&FailureKind::ExitCode(3)).unwrap();
        assert_eq!(json, r#"{"kind":"exitCode","code":3}"#);
        let back: FailureKind = serde_json::from_str(r#"{"kind":"cancelled"}"#).unwrap();
        assert_eq!(back, FailureKind::Cancelled);
    }

    #[test]
    fn last_error_line_skips_blanks() {
        let v = lines(&["first", "ERROR: boom", "  "]);
        assert_eq!(last_error_line(&v), Some("ERROR: boom"));
        assert_eq!(last_error_line(&[]), None);
    }
}

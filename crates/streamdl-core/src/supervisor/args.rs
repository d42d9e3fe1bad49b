//! Argument vector for the external download tool.

use crate::config::ToolConfig;
use crate::job::Job;

/// Headers we set ourselves or that must not be replayed.
const SKIPPED_HEADERS: &[&str] = &[
    "referer",
    "user-agent",
    "origin",
    "cookie",
    "host",
    "content-length",
    "range",
    "connection",
];

/// Program plus fully expanded arguments for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Shell-style rendering for logs and diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=%,@+()".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Builds the invocation for `job` writing to `template`.
///
/// Reliability flags are always present; `Referer`/`Origin` are added when the
/// page URL is known and `User-Agent` falls back to `fallback_user_agent`.
pub fn build_invocation(
    job: &Job,
    template: &str,
    tool: &ToolConfig,
    fallback_user_agent: &str,
) -> ToolInvocation {
    let stream = &job.stream;
    let mut args: Vec<String> = tool.prefix_args.clone();

    args.extend(
        [
            "--newline",
            "--no-check-certificates",
            "--ignore-errors",
            "--no-part",
            "--force-overwrites",
        ]
        .map(String::from),
    );
    args.push("--retries".to_string());
    args.push(tool.retries.to_string());
    args.push("--fragment-retries".to_string());
    args.push(tool.retries.to_string());
    args.push("-f".to_string());
    args.push(tool.format.clone());
    args.push("-o".to_string());
    args.push(template.to_string());

    let mut add_header = |name: &str, value: &str| {
        args.push("--add-header".to_string());
        args.push(format!("{name}:{value}"));
    };

    if let Some(page) = stream.page_url.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        add_header("Referer", page);
    }
    if let Some(origin) = stream.page_origin() {
        add_header("Origin", &origin);
    }
    let user_agent = stream
        .user_agent
        .as_deref()
        .map(str::trim)
        .filter(|ua| !ua.is_empty())
        .unwrap_or(fallback_user_agent);
    add_header("User-Agent", user_agent);

    for (name, value) in &stream.headers {
        if SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        add_header(name, value);
    }
    if let Some(cookies) = stream.cookies.as_deref().filter(|c| !c.trim().is_empty()) {
        add_header("Cookie", cookies.trim());
    }

    args.push(stream.url.trim().to_string());

    ToolInvocation {
        program: tool.program.clone(),
        args,
    }
}

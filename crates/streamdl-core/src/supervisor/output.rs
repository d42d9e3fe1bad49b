//! Output file naming: template resolution at admission, file discovery
//! after a successful run and cleanup after a stopped one.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::job::StreamDescriptor;

/// Extension placeholder understood by the download tool.
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

/// Extension assumed when no produced file can be found.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Extensions the tool commonly picks, checked in order after completion.
pub const KNOWN_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "m4a", "mp3", "ts", "flv"];

/// Longest name stem kept before the uniqueness suffix.
const MAX_STEM_BYTES: usize = 120;

/// Sanitizes a title for use as a file name stem.
///
/// - Replaces path separators, control characters and `<>:"|?*` with `_`
/// - Treats whitespace as `_` and collapses runs of underscores
/// - Trims leading/trailing dots and underscores
/// - Limits length so the suffix and extension still fit in NAME_MAX
pub fn sanitize_stem(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let bad = c == '\0'
            || c == '/'
            || c == '\\'
            || c.is_control()
            || c.is_whitespace()
            || matches!(c, '<' | '>' | ':' | '"' | '|' | '?' | '*');
        let replacement = if bad { '_' } else { c };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    let mut take = trimmed.len().min(MAX_STEM_BYTES);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let stem = trimmed[..take].trim_end_matches(|c| c == '.' || c == '_');
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem.to_string()
    }
}

/// Output template for a stream: `<dir>/<name>_<unix millis>.%(ext)s`.
///
/// The timestamp keeps two streams with the same sanitized title apart.
pub fn output_template(dir: &Path, stream: &StreamDescriptor, now: DateTime<Utc>) -> String {
    let file = format!(
        "{}_{}.{}",
        sanitize_stem(stream.display_name()),
        now.timestamp_millis(),
        EXT_PLACEHOLDER
    );
    dir.join(file).to_string_lossy().into_owned()
}

/// Template with the placeholder replaced by `ext`.
pub fn with_extension(template: &str, ext: &str) -> PathBuf {
    PathBuf::from(template.replace(EXT_PLACEHOLDER, ext))
}

/// Finds the file the tool produced for `template`, falling back to the
/// default extension when none of the known ones exist.
pub fn locate_output(template: &str) -> PathBuf {
    KNOWN_EXTENSIONS
        .iter()
        .map(|ext| with_extension(template, ext))
        .find(|p| p.is_file())
        .unwrap_or_else(|| with_extension(template, DEFAULT_EXTENSION))
}

/// Deletes whatever a killed run left behind for `template`. Returns the
/// paths that were removed.
pub fn remove_outputs(template: &str) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for path in KNOWN_EXTENSIONS.iter().map(|ext| with_extension(template, ext)) {
        match std::fs::remove_file(&path) {
            Ok(()) => removed.push(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), "could not remove partial output: {}", e)
            }
        }
    }
    removed
}

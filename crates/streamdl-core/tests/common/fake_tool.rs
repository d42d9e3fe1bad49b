//! A `sh` script standing in for the download tool.
//!
//! Behavior depends on the URL (the last argument):
//! - contains `fail`: prints a 403 error to stderr and exits 1
//! - contains `slow`: prints one progress line and runs until terminated
//! - otherwise: prints a few progress lines and writes `<template>.webm`

use std::path::{Path, PathBuf};

use streamdl_core::config::QueueConfig;

const SCRIPT: &str = r#"
out=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    *) last="$1"; shift ;;
  esac
done
case "$last" in
  *fail*)
    echo "[download]   3.0% of ~ 1.00MiB at 1.00MiB/s ETA 00:01"
    echo "ERROR: unable to download video data: HTTP Error 403: Forbidden" >&2
    exit 1
    ;;
  *slow*)
    echo "[download]   5.0% of ~ 10.00MiB at 1.00MiB/s ETA 00:09"
    trap 'exit 143' TERM
    while :; do sleep 0.1; done
    ;;
esac
echo "[download]  10.0% of ~ 1.00MiB at 2.00MiB/s ETA 00:01"
echo "[download]  55.5% of ~ 1.00MiB at 2.00MiB/s ETA 00:01"
echo "[download] 100% of 1.00MiB in 00:00:01 at 2.00MiB/s"
file=$(printf '%s' "$out" | sed 's/%(ext)s/webm/')
printf 'data' > "$file"
"#;

/// Write the script into `dir` and return its path.
pub fn install(dir: &Path) -> PathBuf {
    let path = dir.join("fake-yt-dlp.sh");
    std::fs::write(&path, SCRIPT).unwrap();
    path
}

/// Queue config that runs the script through `sh`.
pub fn config(script: &Path, max_concurrent: usize) -> QueueConfig {
    let mut cfg = QueueConfig {
        max_concurrent,
        progress_interval_ms: 50,
        ..QueueConfig::default()
    };
    cfg.tool.program = "sh".to_string();
    cfg.tool.prefix_args = vec![script.to_string_lossy().into_owned()];
    cfg
}

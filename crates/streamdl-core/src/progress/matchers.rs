//! Built-in progress line shapes.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::{MatchKind, ProgressMatcher, ProgressObservation};

fn last_captures<'a>(re: &Regex, chunk: &'a str) -> Option<Captures<'a>> {
    re.captures_iter(chunk).last()
}

fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name).map(|m| m.as_str().trim().to_string())
}

/// `[download]  45.3% of ~  12.34MiB at  1.23MiB/s ETA 00:10`
pub struct PercentMatcher;

impl ProgressMatcher for PercentMatcher {
    fn kind(&self) -> MatchKind {
        MatchKind::Percentage
    }

    fn try_parse(&self, chunk: &str) -> Option<ProgressObservation> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(
                r"(?P<tag>\[download\]\s+)?(?P<pct>\d{1,3}(?:\.\d+)?)%(?:\s+of\s+~?\s*(?P<size>\S+))?(?:\s+in\s+\S+)?(?:\s+at\s+(?P<speed>Unknown B/s|\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
            )
            .unwrap()
        });

        let caps = re
            .captures_iter(chunk)
            .filter(|c| c.name("tag").is_some() || c.name("size").is_some())
            .last()?;
        let pct: f64 = caps.name("pct")?.as_str().parse().ok()?;
        Some(ProgressObservation {
            percentage: pct.clamp(0.0, 100.0),
            speed: text(&caps, "speed"),
            eta: text(&caps, "eta"),
            size: text(&caps, "size"),
        })
    }
}

/// `(frag 11/20)` or `Downloading fragment 11 of 20`
pub struct FragmentMatcher;

impl ProgressMatcher for FragmentMatcher {
    fn kind(&self) -> MatchKind {
        MatchKind::Fragment
    }

    fn try_parse(&self, chunk: &str) -> Option<ProgressObservation> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"(?i)frag(?:ment)?\s+(?P<done>\d+)\s*(?:/|of)\s*(?P<total>\d+)").unwrap()
        });

        let caps = last_captures(re, chunk)?;
        let done: f64 = caps.name("done")?.as_str().parse().ok()?;
        let total: f64 = caps.name("total")?.as_str().parse().ok()?;
        if total <= 0.0 {
            return None;
        }
        Some(ProgressObservation::percent(done * 100.0 / total))
    }
}

/// Legacy `5.00MiB / 10.00MiB` form.
pub struct TransferredMatcher;

impl ProgressMatcher for TransferredMatcher {
    fn kind(&self) -> MatchKind {
        MatchKind::Transferred
    }

    fn try_parse(&self, chunk: &str) -> Option<ProgressObservation> {
        static RE: OnceLock<Regex> = OnceLock::new();
        let re = RE.get_or_init(|| {
            Regex::new(
                r"(?P<done>\d+(?:\.\d+)?)\s*(?P<du>[KMGT]i?B|B|bytes)\s*/\s*(?P<total>\d+(?:\.\d+)?)\s*(?P<tu>[KMGT]i?B|B|bytes)",
            )
            .unwrap()
        });

        let caps = last_captures(re, chunk)?;
        let done = to_bytes(caps.name("done")?.as_str(), caps.name("du")?.as_str())?;
        let total = to_bytes(caps.name("total")?.as_str(), caps.name("tu")?.as_str())?;
        if total <= 0.0 {
            return None;
        }
        let mut obs = ProgressObservation::percent(done * 100.0 / total);
        obs.size = Some(format!(
            "{}{}",
            caps.name("total")?.as_str(),
            caps.name("tu")?.as_str()
        ));
        Some(obs)
    }
}

fn to_bytes(value: &str, unit: &str) -> Option<f64> {
    let v: f64 = value.parse().ok()?;
    let mult = match unit {
        "B" | "bytes" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some(v * mult)
}

/// Keyword printed when the output already exists: the transfer is complete.
pub struct MarkerMatcher;

impl ProgressMatcher for MarkerMatcher {
    fn kind(&self) -> MatchKind {
        MatchKind::Marker
    }

    fn try_parse(&self, chunk: &str) -> Option<ProgressObservation> {
        chunk
            .contains("has already been downloaded")
            .then(|| ProgressObservation::percent(100.0))
    }
}

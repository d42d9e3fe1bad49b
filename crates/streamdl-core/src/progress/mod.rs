//! Progress parsing for download tool output.
//!
//! The tool prints several incompatible progress shapes depending on version
//! and transfer path. Each shape is a `ProgressMatcher`; `ProgressParser`
//! tries them in order and combines the results. Parsing is pure: the same
//! chunk always yields the same observation and nothing else is touched.

mod matchers;

pub use matchers::{FragmentMatcher, MarkerMatcher, PercentMatcher, TransferredMatcher};

/// A single progress reading extracted from tool output.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressObservation {
    /// Percentage in [0, 100].
    pub percentage: f64,
    pub speed: Option<String>,
    pub eta: Option<String>,
    /// Total size as printed by the tool (e.g. `~ 10.00MiB` → `10.00MiB`).
    pub size: Option<String>,
}

impl ProgressObservation {
    pub fn percent(percentage: f64) -> Self {
        Self {
            percentage: percentage.clamp(0.0, 100.0),
            speed: None,
            eta: None,
            size: None,
        }
    }

    /// Keep the higher percentage; fill display fields the winner lacks.
    fn merge_max(self, other: ProgressObservation) -> ProgressObservation {
        let (mut hi, lo) = if other.percentage > self.percentage {
            (other, self)
        } else {
            (self, other)
        };
        hi.speed = hi.speed.or(lo.speed);
        hi.eta = hi.eta.or(lo.eta);
        hi.size = hi.size.or(lo.size);
        hi
    }
}

/// How a matcher's result is combined with the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Direct percentage of total.
    Percentage,
    /// Completed/total fragment count of a segmented transfer.
    Fragment,
    /// Legacy downloaded/total amount.
    Transferred,
    /// Keyword meaning the transfer is already complete.
    Marker,
}

/// One progress line shape.
pub trait ProgressMatcher: Send + Sync {
    fn kind(&self) -> MatchKind;

    /// Returns the last observation of this shape in `chunk`, if any.
    fn try_parse(&self, chunk: &str) -> Option<ProgressObservation>;
}

/// Ordered set of matchers.
///
/// Percentage and fragment readings found in the same chunk are combined by
/// taking the higher one (fragment counts are a lower bound on segmented
/// transfers). Transferred/marker shapes are only used when neither is present.
pub struct ProgressParser {
    matchers: Vec<Box<dyn ProgressMatcher>>,
}

impl ProgressParser {
    pub fn new(matchers: Vec<Box<dyn ProgressMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn parse(&self, chunk: &str) -> Option<ProgressObservation> {
        let mut primary: Option<ProgressObservation> = None;
        let mut fallback: Option<ProgressObservation> = None;

        for matcher in &self.matchers {
            let Some(obs) = matcher.try_parse(chunk) else {
                continue;
            };
            match matcher.kind() {
                MatchKind::Percentage | MatchKind::Fragment => {
                    primary = Some(match primary.take() {
                        Some(prev) => prev.merge_max(obs),
                        None => obs,
                    });
                }
                MatchKind::Transferred | MatchKind::Marker => {
                    if fallback.is_none() {
                        fallback = Some(obs);
                    }
                }
            }
        }

        primary.or(fallback)
    }
}

impl Default for ProgressParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(PercentMatcher),
            Box::new(FragmentMatcher),
            Box::new(TransferredMatcher),
            Box::new(MarkerMatcher),
        ])
    }
}

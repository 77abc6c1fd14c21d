//! Long-running program classifier.
//!
//! A program whose source mentions a GUI toolkit is unlikely to finish on
//! its own when run headless. This is a substring match and nothing more;
//! lifecycle code depends only on [`is_long_running`], so the rule can be
//! swapped without touching the launcher.

/// `true` when `source` contains any non-empty marker.
#[must_use]
pub fn is_long_running(source: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .any(|marker| source.contains(marker.as_str()))
}

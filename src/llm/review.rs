//! Rating + review extraction from free-form model output.
//!
//! The review prompt asks for
//!
//! ```text
//! RATING: <n>
//! REVIEW: <text>
//! ```
//!
//! but models drift from that format. Parsing never fails: each missing
//! piece degrades to a fallback, and the result records whether it did.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::clamp_rating;

static LABELED_RATING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)RATING:\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static LEADING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\d]*(\d+(?:\.\d+)?)").expect("valid regex"));
static LABELED_REVIEW: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)REVIEW:\s*(.+)").expect("valid regex"));
static LEADING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\d]*\d+(?:\.\d+)?[^\w]*").expect("valid regex"));
static MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[#*]+").expect("valid regex"));

/// Where the parsed rating came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingSource {
    /// A `RATING:` label.
    Labeled,
    /// The first numeral in the text.
    Leading,
    /// The property's existing rating.
    Fallback,
}

/// Outcome of parsing one review response.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewParse {
    /// Clamped to `[1, 5]`.
    pub rating: f64,
    /// `None` when nothing usable remained after stripping.
    pub review: Option<String>,
    pub rating_source: RatingSource,
    /// True when either the rating or the review was not labeled.
    pub used_fallback: bool,
}

/// Parse a model response, falling back to `fallback_rating` when no
/// numeral can be found.
pub fn parse_review(text: &str, fallback_rating: f64) -> ReviewParse {
    let (raw_rating, rating_source) = extract_rating(text)
        .unwrap_or((fallback_rating, RatingSource::Fallback));

    let (review, review_labeled) = match LABELED_REVIEW.captures(text) {
        Some(caps) => (caps[1].trim().to_string(), true),
        None => {
            let rest = LEADING_PREFIX.replace(text, "");
            (MARKERS.replace_all(&rest, "").trim().to_string(), false)
        }
    };

    ReviewParse {
        rating: clamp_rating(raw_rating),
        review: Some(review).filter(|r| !r.is_empty()),
        rating_source,
        used_fallback: rating_source != RatingSource::Labeled || !review_labeled,
    }
}

fn extract_rating(text: &str) -> Option<(f64, RatingSource)> {
    let labeled = LABELED_RATING
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok());
    if let Some(r) = labeled {
        return Some((r, RatingSource::Labeled));
    }
    LEADING_NUMBER
        .captures(text)
        .and_then(|c| c[1].parse::<f64>().ok())
        .map(|r| (r, RatingSource::Leading))
}

//! Feature scoring functions.
//!
//! Each function maps one raw bug field (or a small group of fields) to a
//! single number used as one axis of the feature vector. All of them are
//! pure and total: malformed input yields a sentinel value instead of an error.

mod severity;

pub use severity::{Severity, SEVERITY_LEVELS};

use regex::Regex;
use std::sync::OnceLock;

/// Score for a reporter without a contact address.
pub const MISSING_REPORTER_SCORE: f64 = -1.0;

/// Products that make up the core platform.
const CORE_PRODUCTS: &[&str] = &[
    "core",
    "toolkit",
    "nspr",
    "nss",
    "mozilla services",
    "firefox os",
];

/// End-user application products.
const APPLICATION_PRODUCTS: &[&str] = &["firefox", "firefox for android", "firefox for ios"];

/// Technology terms that tend to mark a specific, actionable bug.
const INTERESTING_KEYWORDS: &[&str] = &[
    "gfx", "graphics", "d3d", "css", "html", "layout", "network", "tls", "ssl", "ux",
];

fn mozilla_address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)mozilla(\.com|\.org|foundation\.org)").expect("static regex is valid")
    })
}

fn summary_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\w+\]").expect("static regex is valid"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(http|https)://[a-z]+").expect("static regex is valid"))
}

fn bug_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)bug \d{5,}").expect("static regex is valid"))
}

/// Number of words, counted the way the dataset has always counted them:
/// pieces between single spaces, so an empty string is one word.
fn word_count(text: &str) -> usize {
    text.split(' ').count()
}

/// 1.0 for Mozilla staff addresses, 0.0 for anyone else.
///
/// Returns [`MISSING_REPORTER_SCORE`] when the reporter has no address.
pub fn reporter_score(email: Option<&str>) -> f64 {
    match email {
        None | Some("") => MISSING_REPORTER_SCORE,
        Some(address) if mozilla_address_re().is_match(address) => 1.0,
        Some(_) => 0.0,
    }
}

/// Rates how specific a product/component pair is.
///
/// Core platform products start at 1.0, applications at 0.8 and everything
/// else at 0.3. A "General" component costs 0.3, so the result may reach 0.0.
pub fn component_score(product: &str, component: &str) -> f64 {
    let product = product.to_lowercase();
    let base = if CORE_PRODUCTS.contains(&product.as_str()) {
        1.0
    } else if APPLICATION_PRODUCTS.contains(&product.as_str()) {
        0.8
    } else {
        0.3
    };

    if component.eq_ignore_ascii_case("general") {
        base - 0.3
    } else {
        base
    }
}

/// Open bugs score 1.0, fixed ones 0.5 (they may still need uplift tracking),
/// and bugs closed any other way 0.0.
pub fn resolution_score(resolution: &str, is_open: bool) -> f64 {
    if resolution == "FIXED" || resolution == "VERIFIED" {
        0.5
    } else if !is_open {
        0.0
    } else {
        1.0
    }
}

/// Position of the severity on the enhancement..blocker scale, divided by 10.
pub fn severity_score(severity: &Severity) -> f64 {
    severity.score()
}

/// Word count plus bonuses for technology keywords and `[tag]` markers, over 100.
pub fn summary_score(summary: &str) -> f64 {
    let summary = summary.to_lowercase();
    let has_tag = usize::from(summary_tag_re().is_match(&summary));
    let keyword_hits = INTERESTING_KEYWORDS
        .iter()
        .filter(|keyword| summary.contains(*keyword))
        .count();

    (word_count(&summary) + 50 * keyword_hits + 100 * has_tag) as f64 / 100.0
}

/// Word count plus 50 points per link and per reference to another bug, over 1000.
pub fn comment_score(text: &str) -> f64 {
    let text = text.to_lowercase();
    let links = url_re().find_iter(&text).count();
    let bugs = bug_reference_re().find_iter(&text).count();

    (word_count(&text) + 50 * links + 50 * bugs) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_reporter_score() {
        assert_close(reporter_score(Some("ctalbert@mozilla.com")), 1.0);
        assert_close(reporter_score(Some("ctalbert@mozilla.org")), 1.0);
        assert_close(reporter_score(Some("ctalbert@mozillafoundation.org")), 1.0);
        assert_close(reporter_score(Some("Someone@MOZILLA.COM")), 1.0);
        assert_close(reporter_score(Some("foo@bar.baz")), 0.0);
        assert_close(reporter_score(None), -1.0);
        assert_close(reporter_score(Some("")), -1.0);
    }

    #[test]
    fn test_component_score() {
        assert_close(component_score("Core", "DOM"), 1.0);
        assert_close(component_score("Firefox for Android", "General"), 0.5);
        assert_close(component_score("Firefox For Android", "General"), 0.5);
        assert_close(component_score("foobar", "foo"), 0.3);
        assert_close(component_score("foobar", "general"), 0.0);
        assert_close(component_score("NSS", "Libraries"), 1.0);
        assert_close(component_score("Toolkit", "General"), 0.7);
    }

    #[test]
    fn test_resolution_score() {
        assert_close(resolution_score("FIXED", false), 0.5);
        assert_close(resolution_score("VERIFIED", false), 0.5);
        assert_close(resolution_score("DUPLICATE", false), 0.0);
        assert_close(resolution_score("INVALID", false), 0.0);
        assert_close(resolution_score("---", true), 1.0);
        assert_close(resolution_score("", true), 1.0);
    }

    #[test]
    fn test_severity_score_scale() {
        assert_close(severity_score(&Severity::parse("enhancement")), 0.0);
        assert_close(severity_score(&Severity::parse("normal")), 0.3);
        assert_close(severity_score(&Severity::parse("blocker")), 0.6);
    }

    #[test]
    fn test_summary_score() {
        let cases = [
            ("the quick brown fox jumped over the lazy dog", 9.0),
            ("the gfx d3d adapter is frigging busted on html", 159.0),
            ("the networking code does not like [e10s]", 157.0),
            ("[mynewproject] is toast", 103.0),
        ];
        for (summary, points) in cases {
            assert_close(summary_score(summary), points / 100.0);
        }
    }

    #[test]
    fn test_summary_keywords_are_case_insensitive() {
        assert_close(summary_score("Broken CSS"), (2.0 + 50.0) / 100.0);
    }

    #[test]
    fn test_comment_score_with_links_and_bug_references() {
        let text = "I wrote a Selenium script, see bug 308253, and it fails. \
                    The field value is overriden as the https:// https://google.com \
                    http://mozilla.org wrong value bug foo is selected. bug 444444 Also \
                    all QA boxes are orange.";
        let words = text.split(' ').count() as f64;
        assert_close(comment_score(text), (words + 100.0 + 100.0) / 1000.0);
    }

    #[test]
    fn test_comment_score_plain_text() {
        let text = "The quick brown fox jumped over the lazy dog. And then proceeded to \
                    drink its water all day long without bug getting in the way or https:// or anything.";
        let words = text.split(' ').count() as f64;
        assert_close(comment_score(text), words / 1000.0);
    }

    #[test]
    fn test_short_bug_numbers_are_not_references() {
        assert_close(comment_score("see bug 1234"), 3.0 / 1000.0);
    }
}

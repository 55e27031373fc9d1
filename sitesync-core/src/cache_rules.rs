//! `Cache-Control` rule matching.
//!
//! Rules are evaluated in order and the first rule whose matcher accepts the
//! key decides the header. A rule matches either with a gitignore-style glob
//! (`match`) or a regular expression searched anywhere in the key
//! (`match_regexp`).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ObjectKey;

// ---------------------------------------------------------------------------
// Rule specs (as written in the config file)
// ---------------------------------------------------------------------------

/// `maxage` accepts integer seconds or a duration string (`"1 day, 2 hours"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxAge {
    Seconds(u64),
    Duration(String),
}

impl MaxAge {
    pub fn seconds(&self) -> Result<u64, ConfigError> {
        match self {
            MaxAge::Seconds(s) => Ok(*s),
            MaxAge::Duration(d) => parse_duration(d),
        }
    }
}

/// One `cache_rules` entry from the site config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRuleSpec {
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub glob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_regexp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxage: Option<MaxAge>,
}

// ---------------------------------------------------------------------------
// Matchers
// ---------------------------------------------------------------------------

/// Anything that can decide whether a key belongs to a rule.
pub trait KeyMatcher: fmt::Debug + Send + Sync {
    fn matches(&self, key: &str) -> bool;
}

/// Glob matcher. `*` spans one or more characters within a segment, `?`
/// exactly one. A leading `/` anchors the pattern at the start of the key;
/// otherwise it may start at any segment boundary.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    re: Regex,
}

impl GlobMatcher {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidRule {
                index: 0,
                message: "empty pattern is invalid".to_string(),
            });
        }
        let source = glob_to_regex(pattern);
        let re = Regex::new(&source).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self { re })
    }
}

impl KeyMatcher for GlobMatcher {
    fn matches(&self, key: &str) -> bool {
        self.re.is_match(key)
    }
}

/// Unanchored regular expression matcher.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    re: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let re = Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source: e,
        })?;
        Ok(Self { re })
    }
}

impl KeyMatcher for RegexMatcher {
    fn matches(&self, key: &str) -> bool {
        self.re.is_match(key)
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let (mut out, body) = match pattern.strip_prefix('/') {
        Some(rest) => (String::from("^"), rest),
        None => (String::from("(?:/|^)"), pattern),
    };
    for c in body.chars() {
        match c {
            '*' => out.push_str("[^/]+"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

// ---------------------------------------------------------------------------
// Compiled rule list
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheRule {
    matcher: Box<dyn KeyMatcher>,
    header: Option<String>,
}

/// Compiled, ordered cache rules.
#[derive(Debug, Default)]
pub struct CacheRules {
    rules: Vec<CacheRule>,
}

impl CacheRules {
    /// Validate and compile rule specs. Header values are computed up front so
    /// duration errors surface at load time rather than mid-upload.
    pub fn compile(specs: &[CacheRuleSpec]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let matcher: Box<dyn KeyMatcher> = match (&spec.glob, &spec.match_regexp) {
                (Some(glob), None) => {
                    Box::new(GlobMatcher::new(glob).map_err(|e| with_index(e, index))?)
                }
                (None, Some(re)) => Box::new(RegexMatcher::new(re)?),
                _ => {
                    return Err(ConfigError::InvalidRule {
                        index,
                        message: "cache rule must have either match or match_regexp key"
                            .to_string(),
                    })
                }
            };
            let header = header_for(spec)?;
            rules.push(CacheRule { matcher, header });
        }
        Ok(Self { rules })
    }

    /// `Cache-Control` value for `key`, from the first matching rule.
    ///
    /// A matching rule without `cache_control` or `maxage` yields `None` and
    /// still stops evaluation.
    pub fn resolve(&self, key: &ObjectKey) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.matcher.matches(key.as_str()))
            .and_then(|r| r.header.as_deref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn with_index(err: ConfigError, index: usize) -> ConfigError {
    match err {
        ConfigError::InvalidRule { message, .. } => ConfigError::InvalidRule { index, message },
        other => other,
    }
}

fn header_for(spec: &CacheRuleSpec) -> Result<Option<String>, ConfigError> {
    let maxage = spec.maxage.as_ref().map(MaxAge::seconds).transpose()?;
    Ok(match (&spec.cache_control, maxage) {
        (Some(cc), Some(age)) => Some(format!("{cc}, max-age={age}")),
        (Some(cc), None) => Some(cc.clone()),
        (None, Some(age)) => Some(format!("max-age={age}")),
        (None, None) => None,
    })
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(year|month|day|hour|minute|second)s?$")
        .expect("duration pattern is a valid regex")
});

/// Parse `"3600"` or `"1 year, 2 months, 3 days"` into seconds.
///
/// A month counts as 30 days and a year as 365.
pub fn parse_duration(s: &str) -> Result<u64, ConfigError> {
    let trimmed = s.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(s.to_string()));
    }

    let mut total: u64 = 0;
    for part in trimmed.split(',') {
        let part = part.trim();
        let caps = DURATION_PART
            .captures(part)
            .ok_or_else(|| ConfigError::InvalidDuration(part.to_string()))?;
        let n: u64 = caps[1]
            .parse()
            .map_err(|_| ConfigError::InvalidDuration(part.to_string()))?;
        let unit = match &caps[2] {
            "year" => 365 * DAY,
            "month" => 30 * DAY,
            "day" => DAY,
            "hour" => HOUR,
            "minute" => MINUTE,
            _ => 1,
        };
        total = n
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))?;
    }
    Ok(total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    #[rstest]
    #[case("*.html", "index.html", true)]
    #[case("*.html", "blog/post.html", true)]
    #[case("*.html", "index.htm", false)]
    #[case("/*.html", "index.html", true)]
    #[case("/*.html", "blog/post.html", false)]
    #[case("assets/*", "assets/app.js", true)]
    #[case("assets/*", "static/assets/app.js", true)]
    #[case("assets/*", "assets/img/logo.png", false)]
    #[case("/assets/*", "static/assets/app.js", false)]
    #[case("?.js", "a.js", true)]
    #[case("?.js", "ab.js", false)]
    #[case("a+b.css", "a+b.css", true)]
    #[case("a+b.css", "aab.css", false)]
    fn glob_matching(#[case] pattern: &str, #[case] k: &str, #[case] expected: bool) {
        let m = GlobMatcher::new(pattern).expect("compile");
        assert_eq!(m.matches(k), expected, "{pattern} vs {k}");
    }

    #[test]
    fn empty_glob_is_rejected() {
        assert!(matches!(
            GlobMatcher::new(""),
            Err(ConfigError::InvalidRule { .. })
        ));
    }

    #[rstest]
    #[case("3600", 3600)]
    #[case("1 second", 1)]
    #[case("2 minutes", 120)]
    #[case("1 hour, 30 minutes", 5400)]
    #[case("1 day", 86_400)]
    #[case("2 months", 60 * 86_400)]
    #[case("1 year, 1 day", 366 * 86_400)]
    fn durations(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(parse_duration(input).expect("parse"), expected);
    }

    #[rstest]
    #[case("")]
    #[case("soon")]
    #[case("1 fortnight")]
    #[case("1 day,")]
    fn bad_durations(#[case] input: &str) {
        assert!(matches!(
            parse_duration(input),
            Err(ConfigError::InvalidDuration(_))
        ));
    }

    #[test]
    fn durations_parse_concurrently() {
        let handles: Vec<_> = (1..=8u64)
            .map(|n| std::thread::spawn(move || parse_duration(&format!("{n} hours, 1 minute"))))
            .collect();
        for (n, handle) in (1..=8u64).zip(handles) {
            let secs = handle.join().expect("thread").expect("parse");
            assert_eq!(secs, n * 3600 + 60);
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let rules = CacheRules::compile(&[
            CacheRuleSpec {
                glob: Some("*.html".into()),
                maxage: Some(MaxAge::Seconds(60)),
                ..Default::default()
            },
            CacheRuleSpec {
                glob: Some("*".into()),
                cache_control: Some("public".into()),
                maxage: Some(MaxAge::Duration("1 day".into())),
                ..Default::default()
            },
        ])
        .expect("compile");

        assert_eq!(rules.resolve(&key("blog/index.html")), Some("max-age=60"));
        assert_eq!(
            rules.resolve(&key("assets/app.js")),
            Some("public, max-age=86400")
        );
    }

    #[test]
    fn regexp_rule_searches_anywhere() {
        let rules = CacheRules::compile(&[CacheRuleSpec {
            match_regexp: Some(r"\.(png|jpg)$".into()),
            cache_control: Some("immutable".into()),
            ..Default::default()
        }])
        .expect("compile");
        assert_eq!(rules.resolve(&key("img/a.png")), Some("immutable"));
        assert_eq!(rules.resolve(&key("img/a.gif")), None);
    }

    #[test]
    fn matching_rule_without_header_stops_evaluation() {
        let rules = CacheRules::compile(&[
            CacheRuleSpec {
                glob: Some("*.txt".into()),
                ..Default::default()
            },
            CacheRuleSpec {
                glob: Some("*".into()),
                cache_control: Some("no-cache".into()),
                ..Default::default()
            },
        ])
        .expect("compile");
        assert_eq!(rules.resolve(&key("robots.txt")), None);
        assert_eq!(rules.resolve(&key("index.html")), Some("no-cache"));
    }

    #[rstest]
    #[case(CacheRuleSpec::default())]
    #[case(CacheRuleSpec { glob: Some("*".into()), match_regexp: Some(".*".into()), ..Default::default() })]
    fn rule_needs_exactly_one_matcher(#[case] spec: CacheRuleSpec) {
        let err = CacheRules::compile(&[spec]).expect_err("invalid");
        assert!(matches!(err, ConfigError::InvalidRule { index: 0, .. }));
    }

    #[test]
    fn bad_maxage_fails_compile() {
        let err = CacheRules::compile(&[CacheRuleSpec {
            glob: Some("*".into()),
            maxage: Some(MaxAge::Duration("whenever".into())),
            ..Default::default()
        }])
        .expect_err("invalid duration");
        assert!(matches!(err, ConfigError::InvalidDuration(_)));
    }
}

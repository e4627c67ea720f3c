//! Policy Store
//!
//! Holds what the filter enforces:
//!
//! - **Patterns** decide which file paths are in scope at all. A path that
//!   matches none of them is never looked at again. Matching is the C
//!   library's `fnmatch(3)` without flags: `*` also crosses `/`, `\`
//!   escapes the next character, paths are compared as raw bytes.
//! - **Forbidden attributes** decide which devices are hidden. A device is
//!   forbidden when it, or any of its ancestors, exposes one of these
//!   `name=value` pairs (name compared case-insensitively, value exactly).
//!
//! ```text
//! [patterns]                 [attributes]
//! p1 = /dev/input/*          PRODUCT = 1234
//! p2 = /dev/hidraw*          idVendor = 046d
//! ```
//!
//! A policy is only ever built with at least one of each. Anything less is a
//! [`LoadError`] and leaves the filter inactive.

pub mod ini;

use std::ffi::{CStr, CString, NulError};
use std::fmt;
use std::fs;

use tracing::{debug, warn};

use crate::config::{Settings, ENV_CONFIG};
use crate::error::LoadError;

/// Section listing path patterns (keys are ignored)
pub const SECTION_PATTERNS: &str = "patterns";

/// Section listing forbidden `name = value` pairs
pub const SECTION_ATTRIBUTES: &str = "attributes";

/// A path glob, matched with `fnmatch(3)` and no flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern(CString);

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, NulError> {
        CString::new(pattern).map(Self)
    }

    pub fn matches(&self, path: &CStr) -> bool {
        // SAFETY: both strings are NUL-terminated and outlive the call.
        unsafe { libc::fnmatch(self.0.as_ptr(), path.as_ptr(), 0) == 0 }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_string_lossy())
    }
}

/// A device attribute that marks a device, and its descendants, as denied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbiddenAttribute {
    name: String,
    value: String,
}

impl ForbiddenAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Attribute names compare ASCII case-insensitively
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// True when `name=value` is this forbidden pair
    pub fn matches(&self, name: &str, value: &str) -> bool {
        self.matches_name(name) && self.value == value
    }
}

impl fmt::Display for ForbiddenAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// The loaded, immutable policy
#[derive(Debug, Clone)]
pub struct Policy {
    patterns: Vec<PathPattern>,
    attributes: Vec<ForbiddenAttribute>,
}

impl Policy {
    /// Load the policy file named by the settings.
    pub fn load(settings: &Settings) -> Result<Self, LoadError> {
        let path = settings
            .config_path
            .as_ref()
            .ok_or(LoadError::MissingSource { var: ENV_CONFIG })?;

        let bytes = fs::read(path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;

        Self::parse(&String::from_utf8_lossy(&bytes))
    }

    /// Build a policy from the text of a policy file.
    ///
    /// Unknown sections and unusable lines are skipped with a warning. Only
    /// an empty result is an error.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let mut builder = PolicyBuilder::new();

        let outcome = ini::parse(text, |section, name, value| match section {
            SECTION_PATTERNS => match builder.pattern(value) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Ignoring invalid pattern '{}': {}", value, e);
                    false
                }
            },
            SECTION_ATTRIBUTES => {
                builder.deny(name, value);
                true
            }
            _ => {
                warn!("Ignoring '{}' in unknown section [{}]", name, section);
                false
            }
        });

        if let Err(line) = outcome {
            warn!("Config contains unusable entries, first at line {}", line);
        }

        builder.build()
    }

    /// Is `path` covered by any configured pattern?
    pub fn in_scope(&self, path: &CStr) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(path))
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn attributes(&self) -> &[ForbiddenAttribute] {
        &self.attributes
    }

    /// Dump the policy to the diagnostic log
    pub fn log_summary(&self) {
        debug!("Using file patterns:");
        for pattern in &self.patterns {
            debug!("  {}", pattern);
        }

        debug!("Denying access for udev attributes/values:");
        for attribute in &self.attributes {
            debug!("  {}", attribute);
        }
    }
}

/// Incremental construction of a [`Policy`]
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    patterns: Vec<PathPattern>,
    attributes: Vec<ForbiddenAttribute>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path pattern
    pub fn pattern(&mut self, pattern: &str) -> Result<&mut Self, NulError> {
        self.patterns.push(PathPattern::new(pattern)?);
        Ok(self)
    }

    /// Add a forbidden attribute. Repeated pairs are stored once.
    pub fn deny(&mut self, name: &str, value: &str) -> &mut Self {
        let attribute = ForbiddenAttribute::new(name, value);
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    /// Finish, requiring at least one pattern and one attribute
    pub fn build(self) -> Result<Policy, LoadError> {
        if self.patterns.is_empty() {
            return Err(LoadError::NoPatterns);
        }
        if self.attributes.is_empty() {
            return Err(LoadError::NoAttributes);
        }

        Ok(Policy {
            patterns: self.patterns,
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    const SAMPLE: &str = "\
[patterns]
p1 = /dev/input/*
p2 = /dev/hidraw*

[attributes]
PRODUCT = 1234
idVendor = 046d
";

    #[test]
    fn test_parse_sample() {
        let policy = Policy::parse(SAMPLE).unwrap();

        assert_eq!(policy.patterns().len(), 2);
        assert_eq!(policy.attributes().len(), 2);
        assert_eq!(policy.attributes()[0], ForbiddenAttribute::new("PRODUCT", "1234"));
    }

    #[test]
    fn test_in_scope_uses_fnmatch_semantics() {
        let policy = Policy::parse(SAMPLE).unwrap();

        assert!(policy.in_scope(c"/dev/input/event3"));
        assert!(policy.in_scope(c"/dev/input/by-id/usb-kbd"));
        assert!(policy.in_scope(c"/dev/hidraw0"));
        assert!(!policy.in_scope(c"/dev/sda"));
        assert!(!policy.in_scope(c"/etc/passwd"));
    }

    #[test]
    fn test_bracket_and_question_patterns() {
        let mut builder = PolicyBuilder::new();
        builder.pattern("/dev/hidraw[0-3]").unwrap();
        builder.pattern("/dev/input/event?").unwrap();
        builder.deny("PRODUCT", "1");
        let policy = builder.build().unwrap();

        assert!(policy.in_scope(c"/dev/hidraw2"));
        assert!(!policy.in_scope(c"/dev/hidraw7"));
        assert!(policy.in_scope(c"/dev/input/event5"));
        assert!(!policy.in_scope(c"/dev/input/event12"));
    }

    #[test]
    fn test_attribute_name_case_insensitive_value_exact() {
        let attribute = ForbiddenAttribute::new("Product", "abc");

        assert!(attribute.matches("PRODUCT", "abc"));
        assert!(attribute.matches("product", "abc"));
        assert!(!attribute.matches("PRODUCT", "ABC"));
        assert!(!attribute.matches("PRODUCTS", "abc"));
    }

    #[test]
    fn test_empty_attributes_is_error() {
        let err = Policy::parse("[patterns]\np = /dev/input/*\n[attributes]\n").unwrap_err();
        assert!(matches!(err, LoadError::NoAttributes));
    }

    #[test]
    fn test_empty_patterns_is_error() {
        let err = Policy::parse("[attributes]\nPRODUCT = 1234\n").unwrap_err();
        assert!(matches!(err, LoadError::NoPatterns));
    }

    #[test]
    fn test_unknown_section_is_skipped() {
        let policy = Policy::parse(
            "[extra]\nfoo = bar\n[patterns]\np = /dev/input/*\n[attributes]\nPRODUCT = 1234\n",
        )
        .unwrap();

        assert_eq!(policy.patterns().len(), 1);
        assert_eq!(policy.attributes().len(), 1);
    }

    #[test]
    fn test_double_star_pattern_is_kept() {
        let policy = Policy::parse("[patterns]\np = /dev/hidraw**\n[attributes]\nPRODUCT = 1\n")
            .unwrap();

        assert_eq!(policy.patterns().len(), 1);
        assert!(policy.in_scope(c"/dev/hidraw0"));
        assert!(policy.in_scope(c"/dev/hidraw/nested"));
        assert!(!policy.in_scope(c"/dev/input/event3"));
    }

    #[test]
    fn test_backslash_escapes_metacharacter() {
        let policy = Policy::parse(
            "[patterns]\np = /dev/input/event\\*\n[attributes]\nPRODUCT = 1\n",
        )
        .unwrap();

        assert!(policy.in_scope(c"/dev/input/event*"));
        assert!(!policy.in_scope(c"/dev/input/event3"));
    }

    #[test]
    fn test_unclosed_bracket_matches_literally() {
        let policy = Policy::parse(
            "[patterns]\nodd = /dev/[input\ngood = /dev/input/*\n[attributes]\nPRODUCT = 1\n",
        )
        .unwrap();

        assert_eq!(policy.patterns().len(), 2);
        assert_eq!(policy.patterns()[0].to_string(), "/dev/[input");
        assert!(policy.in_scope(c"/dev/[input"));
    }

    #[test]
    fn test_non_utf8_path_matched_by_bytes() {
        let policy = Policy::parse(SAMPLE).unwrap();

        assert!(policy.in_scope(c"/dev/input/ev\xffent"));
        assert!(!policy.in_scope(c"/dev/\xff/event3"));
    }

    #[test]
    fn test_duplicate_attributes_stored_once() {
        let policy = Policy::parse(
            "[patterns]\np = /dev/input/*\n[attributes]\nPRODUCT = 1\nPRODUCT = 1\nPRODUCT = 2\n",
        )
        .unwrap();

        assert_eq!(policy.attributes().len(), 2);
    }

    #[test]
    fn test_load_without_path() {
        let err = Policy::load(&Settings::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingSource { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let settings = Settings {
            debug: false,
            config_path: Some(PathBuf::from("/nonexistent/denydevice.ini")),
        };
        let err = Policy::load(&settings).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings {
            debug: false,
            config_path: Some(file.path().to_path_buf()),
        };
        let policy = Policy::load(&settings).unwrap();
        assert_eq!(policy.patterns().len(), 2);
    }

    #[test]
    fn test_load_file_with_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"; caf\xe9\n[patterns]\np = /dev/input/*\n[attributes]\nPRODUCT = 1234\n")
            .unwrap();

        let settings = Settings {
            debug: false,
            config_path: Some(file.path().to_path_buf()),
        };
        let policy = Policy::load(&settings).unwrap();
        assert!(policy.in_scope(c"/dev/input/event3"));
        assert_eq!(policy.attributes()[0], ForbiddenAttribute::new("PRODUCT", "1234"));
    }
}

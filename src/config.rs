//! Environment-level configuration
//!
//! The filter is configured entirely through the environment of the host
//! process, read once when the policy gate initializes.

use std::ffi::OsString;
use std::path::PathBuf;

/// Enables diagnostic output when set to exactly `1`
pub const ENV_DEBUG: &str = "LIBDD_DEBUG";

/// Path of the policy file
pub const ENV_CONFIG: &str = "LIBDD_CONFIG";

/// Settings taken from the process environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Write diagnostics to stderr
    pub debug: bool,
    /// Policy file, `None` when the variable is unset or empty
    pub config_path: Option<PathBuf>,
}

impl Settings {
    /// Read settings from the real process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var_os(name))
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let debug = lookup(ENV_DEBUG).is_some_and(|v| v.as_os_str() == "1");
        let config_path = lookup(ENV_CONFIG)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self { debug, config_path }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_environment() {
        let settings = Settings::from_lookup(lookup_in(&[]));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_debug_only_for_literal_one() {
        for (value, expected) in [("1", true), ("true", false), ("01", false), ("", false)] {
            let settings = Settings::from_lookup(lookup_in(&[(ENV_DEBUG, value)]));
            assert_eq!(settings.debug, expected, "LIBDD_DEBUG={value:?}");
        }
    }

    #[test]
    fn test_empty_config_path_is_unset() {
        let settings = Settings::from_lookup(lookup_in(&[(ENV_CONFIG, "")]));
        assert!(settings.config_path.is_none());

        let settings = Settings::from_lookup(lookup_in(&[(ENV_CONFIG, "/etc/dd.ini")]));
        assert_eq!(settings.config_path, Some(PathBuf::from("/etc/dd.ini")));
    }
}

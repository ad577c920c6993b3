//! Pool configuration.
//!
//! Alignment and the largest small-object size are compile-time constants.
//! The per-class block count and verbosity can be set through environment
//! variables:
//! - `BLOCKPOOL_BLOCKS_PER_CLASS`: positive integer (default 100).
//! - `BLOCKPOOL_VERBOSE`: `1`/`true`/`yes`/`on` or `0`/`false`/`no`/`off`
//!   (default off). Verbose pools log construction at `info` instead of `debug`.

use std::sync::OnceLock;

/// Byte alignment every size-class request is rounded up to.
pub const ALIGNMENT: usize = 8;

/// Largest request served by the size-class allocator (bytes).
pub const MAX_SMALL_SIZE: usize = 1024;

/// Blocks pre-allocated for every size class unless configured otherwise.
pub const DEFAULT_BLOCKS_PER_CLASS: usize = 100;

/// Smallest block a pool hands out: wide enough to hold a free-list link.
pub const MIN_BLOCK_SIZE: usize = std::mem::size_of::<usize>();

const BLOCKS_PER_CLASS_VAR: &str = "BLOCKPOOL_BLOCKS_PER_CLASS";
const VERBOSE_VAR: &str = "BLOCKPOOL_VERBOSE";

/// Runtime-tunable pool settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Blocks pre-allocated in each size class pool.
    pub blocks_per_class: usize,
    /// Log pool construction at `info` level.
    pub verbose: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            blocks_per_class: DEFAULT_BLOCKS_PER_CLASS,
            verbose: false,
        }
    }
}

impl PoolConfig {
    /// Read the configuration from the process environment.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let blocks_per_class = lookup(BLOCKS_PER_CLASS_VAR)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.blocks_per_class);
        let verbose = lookup(VERBOSE_VAR)
            .and_then(|v| parse_bool_loose(&v))
            .unwrap_or(defaults.verbose);
        Self {
            blocks_per_class,
            verbose,
        }
    }
}

/// Parse a boolean flag (case-insensitive). `None` for anything unrecognised.
#[must_use]
pub fn parse_bool_loose(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

static GLOBAL_CONFIG: OnceLock<PoolConfig> = OnceLock::new();

/// Get the environment-derived configuration (read on first call, cached thereafter).
#[must_use]
pub fn global_config() -> PoolConfig {
    *GLOBAL_CONFIG.get_or_init(PoolConfig::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = PoolConfig::from_lookup(|_| None);
        assert_eq!(cfg, PoolConfig::default());
        assert_eq!(cfg.blocks_per_class, 100);
        assert!(!cfg.verbose);
    }

    #[test]
    fn reads_both_variables() {
        let cfg = PoolConfig::from_lookup(lookup_from(&[
            ("BLOCKPOOL_BLOCKS_PER_CLASS", " 32 "),
            ("BLOCKPOOL_VERBOSE", "YES"),
        ]));
        assert_eq!(cfg.blocks_per_class, 32);
        assert!(cfg.verbose);
    }

    #[test]
    fn rejects_zero_and_garbage() {
        let cfg = PoolConfig::from_lookup(lookup_from(&[
            ("BLOCKPOOL_BLOCKS_PER_CLASS", "0"),
            ("BLOCKPOOL_VERBOSE", "maybe"),
        ]));
        assert_eq!(cfg, PoolConfig::default());

        let cfg = PoolConfig::from_lookup(lookup_from(&[("BLOCKPOOL_BLOCKS_PER_CLASS", "-4")]));
        assert_eq!(cfg.blocks_per_class, DEFAULT_BLOCKS_PER_CLASS);
    }

    #[test]
    fn loose_booleans() {
        assert_eq!(parse_bool_loose("on"), Some(true));
        assert_eq!(parse_bool_loose("1"), Some(true));
        assert_eq!(parse_bool_loose("Off"), Some(false));
        assert_eq!(parse_bool_loose("no"), Some(false));
        assert_eq!(parse_bool_loose(""), None);
    }

    #[test]
    fn constants_are_consistent() {
        assert!(ALIGNMENT.is_power_of_two());
        assert_eq!(MAX_SMALL_SIZE % ALIGNMENT, 0);
        assert!(MIN_BLOCK_SIZE <= ALIGNMENT);
    }
}

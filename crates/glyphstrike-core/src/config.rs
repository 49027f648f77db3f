//! Strike cache configuration
//!
//! Defaults suit an interactive renderer. Three environment variables
//! override them, read once per process:
//!
//! - `GLYPHSTRIKE_MIN_STRIKES` - how many recently used strikes stay alive
//!   no matter what (default 8)
//! - `GLYPHSTRIKE_REFTYPE` - `soft` keeps strikes sticky until memory is
//!   needed, `weak` lets them go as soon as callers do (default `soft`)
//! - `GLYPHSTRIKE_DISPOSAL` - `background`, `inline` or `deferred`
//!
//! # Example
//!
//! ```
//! use glyphstrike_core::config::{DisposalMode, StrikeCacheConfig};
//!
//! let config = StrikeCacheConfig {
//!     disposal: DisposalMode::Inline,
//!     ..StrikeCacheConfig::default()
//! };
//! assert_eq!(config.recent_strikes, 8);
//! ```

use std::sync::OnceLock;
use std::time::Duration;

/// How long a registry entry may keep its strike alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Retention {
    /// Kept while recently used, dropped under memory pressure or age
    #[default]
    Sticky,
    /// Kept only while callers hold it
    Evictable,
}

/// Where native resources of dead strikes get released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisposalMode {
    /// One dedicated thread drains a queue
    #[default]
    Background,
    /// On whichever thread drops the last reference
    Inline,
    /// Queued until someone calls `drain`
    Deferred,
}

/// Tunables for a strike cache
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeCacheConfig {
    /// Recently used strikes held strongly, whatever their retention
    pub recent_strikes: usize,
    /// Sticky strikes held strongly until swept
    pub sticky_strikes: usize,
    /// Sticky strikes unused for this long are dropped by a sweep
    pub sticky_max_age: Option<Duration>,
    /// Retention for ordinary strikes
    pub reference_policy: Retention,
    /// Above this many strikes per font, rotated strikes become evictable
    pub weak_strike_threshold: usize,
    pub disposal: DisposalMode,
}

impl Default for StrikeCacheConfig {
    fn default() -> Self {
        Self {
            recent_strikes: 8,
            sticky_strikes: 256,
            sticky_max_age: Some(Duration::from_secs(300)),
            reference_policy: Retention::Sticky,
            weak_strike_threshold: 10,
            disposal: DisposalMode::Background,
        }
    }
}

/// Environment overrides, read once
static ENV_CONFIG: OnceLock<StrikeCacheConfig> = OnceLock::new();

impl StrikeCacheConfig {
    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        ENV_CONFIG
            .get_or_init(|| {
                let mut config = StrikeCacheConfig::default();
                config.apply_overrides(|name| std::env::var(name).ok());
                config
            })
            .clone()
    }

    /// Apply overrides from any variable source
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("GLYPHSTRIKE_MIN_STRIKES") {
            match val.trim().parse::<usize>() {
                Ok(n) => {
                    self.recent_strikes = n;
                    log::info!("Recent strike pool set to {} via GLYPHSTRIKE_MIN_STRIKES", n);
                }
                Err(_) => log::warn!("Ignoring GLYPHSTRIKE_MIN_STRIKES={:?}", val),
            }
        }

        if let Some(val) = lookup("GLYPHSTRIKE_REFTYPE") {
            match val.trim().to_lowercase().as_str() {
                "soft" => self.reference_policy = Retention::Sticky,
                "weak" => {
                    self.reference_policy = Retention::Evictable;
                    log::info!("Strikes are evictable via GLYPHSTRIKE_REFTYPE");
                }
                _ => log::warn!("Ignoring GLYPHSTRIKE_REFTYPE={:?}", val),
            }
        }

        if let Some(val) = lookup("GLYPHSTRIKE_DISPOSAL") {
            let mode = match val.trim().to_lowercase().as_str() {
                "background" => Some(DisposalMode::Background),
                "inline" => Some(DisposalMode::Inline),
                "deferred" => Some(DisposalMode::Deferred),
                _ => None,
            };
            match mode {
                Some(mode) => {
                    self.disposal = mode;
                    log::info!("Disposal mode {:?} via GLYPHSTRIKE_DISPOSAL", mode);
                }
                None => log::warn!("Ignoring GLYPHSTRIKE_DISPOSAL={:?}", val),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn overrides_apply() {
        let mut config = StrikeCacheConfig::default();
        config.apply_overrides(lookup(&[
            ("GLYPHSTRIKE_MIN_STRIKES", "3"),
            ("GLYPHSTRIKE_REFTYPE", "WEAK"),
            ("GLYPHSTRIKE_DISPOSAL", "deferred"),
        ]));
        assert_eq!(config.recent_strikes, 3);
        assert_eq!(config.reference_policy, Retention::Evictable);
        assert_eq!(config.disposal, DisposalMode::Deferred);
    }

    #[test]
    fn garbage_is_ignored() {
        let mut config = StrikeCacheConfig::default();
        config.apply_overrides(lookup(&[
            ("GLYPHSTRIKE_MIN_STRIKES", "lots"),
            ("GLYPHSTRIKE_REFTYPE", "phantom"),
        ]));
        assert_eq!(config, StrikeCacheConfig::default());
    }
}

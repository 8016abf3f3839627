use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::blockchain::{DEFAULT_DIFFICULTY, DIFF_MAX};
use crate::node::DEFAULT_HASH_RATE;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub difficulty: u32,
    pub default_hash_rate: u64,
    pub weight_by_hash_rate: bool,
    /// Upper bound for rounds started over HTTP; `None` waits forever.
    pub round_timeout: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            difficulty: DEFAULT_DIFFICULTY,
            default_hash_rate: DEFAULT_HASH_RATE,
            weight_by_hash_rate: false,
            round_timeout: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or unparsable values fall
    /// back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let mut difficulty = parse_or(&lookup, "DIFFICULTY", defaults.difficulty);
        if difficulty > DIFF_MAX {
            warn!("DIFFICULTY={difficulty} above max, clamping to {DIFF_MAX}");
            difficulty = DIFF_MAX;
        }

        let round_timeout = lookup("ROUND_TIMEOUT_SECS")
            .and_then(|raw| match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    warn!("ignoring ROUND_TIMEOUT_SECS={raw:?}");
                    None
                }
            });

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port),
            difficulty,
            default_hash_rate: parse_or(&lookup, "DEFAULT_HASH_RATE", defaults.default_hash_rate)
                .max(1),
            weight_by_hash_rate: parse_or(
                &lookup,
                "WEIGHT_BY_HASH_RATE",
                defaults.weight_by_hash_rate,
            ),
            round_timeout,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("invalid {key}={raw:?}, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;
    use std::collections::HashMap;
    use std::time::Duration;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s, Settings::default());
        assert_eq!(s.difficulty, 1);
        assert_eq!(s.default_hash_rate, 10);
    }

    #[test]
    fn reads_values() {
        let s = settings(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("DIFFICULTY", "3"),
            ("DEFAULT_HASH_RATE", "25"),
            ("WEIGHT_BY_HASH_RATE", "true"),
            ("ROUND_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 9000);
        assert_eq!(s.difficulty, 3);
        assert_eq!(s.default_hash_rate, 25);
        assert!(s.weight_by_hash_rate);
        assert_eq!(s.round_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn bad_values_fall_back() {
        let s = settings(&[
            ("PORT", "http"),
            ("DIFFICULTY", "-1"),
            ("ROUND_TIMEOUT_SECS", "0"),
        ]);
        assert_eq!(s.port, 8080);
        assert_eq!(s.difficulty, 1);
        assert_eq!(s.round_timeout, None);
    }

    #[test]
    fn difficulty_is_clamped() {
        assert_eq!(settings(&[("DIFFICULTY", "40")]).difficulty, 6);
    }
}

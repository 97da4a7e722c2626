use std::path::PathBuf;
use std::time::Duration;

/// Process settings, read from `SLOTGRID_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub tenant: String,
    pub metrics_port: Option<u16>,
    /// WAL frames appended before the compactor rewrites the log.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            tenant: "school".into(),
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("SLOTGRID_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            tenant: lookup("SLOTGRID_TENANT").unwrap_or(defaults.tenant),
            metrics_port: lookup("SLOTGRID_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: lookup("SLOTGRID_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            compact_interval: lookup("SLOTGRID_COMPACT_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            ("SLOTGRID_DATA_DIR", "/var/lib/slotgrid"),
            ("SLOTGRID_TENANT", "north_campus"),
            ("SLOTGRID_METRICS_PORT", "9100"),
            ("SLOTGRID_COMPACT_THRESHOLD", "not-a-number"),
            ("SLOTGRID_COMPACT_INTERVAL_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/slotgrid"));
        assert_eq!(cfg.tenant, "north_campus");
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.compact_interval, Duration::from_secs(5));
    }
}

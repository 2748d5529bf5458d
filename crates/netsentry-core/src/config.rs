//! Engine configuration.

use std::path::PathBuf;

use crate::publish;
use crate::tracker;

/// Everything the pipeline needs beyond its frame source. Defaults
/// enable the full analysis chain with no exports.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Run the HTTP/DNS application decoders.
    pub decode_protocols: bool,
    /// Maintain per-flow state.
    pub track_connections: bool,
    /// Extract feature vectors (requires tracking).
    pub extract_features: bool,
    /// Evaluate the signature rule set.
    pub evaluate_rules: bool,
    /// Idle flow expiry in seconds.
    pub flow_timeout_secs: f64,
    /// Flow table capacity.
    pub max_connections: usize,
    /// Print the statistics block on this cadence (live capture).
    pub stats_interval_secs: f64,
    /// Emit periodic statistics while running.
    pub periodic_stats: bool,
    /// Feature pub/sub endpoint; `None` disables publication.
    pub publish_endpoint: Option<String>,
    /// Publisher queue high-water mark.
    pub publish_high_water_mark: usize,
    /// Feature CSV export path; `None` disables the export.
    pub features_csv: Option<PathBuf>,
    /// Alert JSONL path; `None` keeps alerts on stdout only.
    pub alert_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decode_protocols: true,
            track_connections: true,
            extract_features: true,
            evaluate_rules: true,
            flow_timeout_secs: tracker::DEFAULT_FLOW_TIMEOUT_SECS,
            max_connections: tracker::DEFAULT_MAX_CONNECTIONS,
            stats_interval_secs: 5.0,
            periodic_stats: false,
            publish_endpoint: None,
            publish_high_water_mark: publish::DEFAULT_HIGH_WATER_MARK,
            features_csv: None,
            alert_log: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn defaults_match_the_documented_limits() {
        let config = EngineConfig::default();
        assert_eq!(config.flow_timeout_secs, 120.0);
        assert_eq!(config.max_connections, 100_000);
        assert_eq!(config.publish_high_water_mark, 10_000);
        assert!(config.evaluate_rules);
        assert!(config.publish_endpoint.is_none());
    }
}

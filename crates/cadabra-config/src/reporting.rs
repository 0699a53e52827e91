use cadabra_core::SinceSelector;
use serde::Deserialize;

/// Dashboard report defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportingConfig {
    /// Join-date window used when a report request names none
    #[serde(default)]
    pub default_since: SinceSelector,
    /// IANA zone that calendar windows such as `start_of_day` are computed in
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            default_since: SinceSelector::default(),
            time_zone: default_time_zone(),
        }
    }
}

fn default_time_zone() -> String {
    "UTC".to_owned()
}

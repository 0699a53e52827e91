use std::sync::Arc;

use cadabra_core::SinceSelector;
use cadabra_experiments::Experiments;
use cadabra_store::ExperimentStore;
use jiff::Zoned;
use jiff::tz::TimeZone;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub experiments: Experiments,
    pub store: Arc<dyn ExperimentStore>,
    pub reporting: Arc<Reporting>,
}

/// Report defaults resolved from configuration
#[derive(Debug)]
pub struct Reporting {
    pub default_since: SinceSelector,
    pub time_zone: TimeZone,
}

impl Reporting {
    /// Current time in the reporting time zone
    pub fn now(&self) -> Zoned {
        Zoned::now().with_time_zone(self.time_zone.clone())
    }
}

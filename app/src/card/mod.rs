mod aggregate;
mod bridge;
mod config;
mod cop;
mod orchestrator;
mod period;
mod registry;
mod state;

#[cfg(test)]
mod test_support;

pub use aggregate::MeanWeighting;
pub use bridge::RANGE_PUBLISHER_KEY;
pub use config::{CardConfiguration, ConfigurationError, EntityRef};
pub use orchestrator::{RefreshOrchestrator, RefreshPolicy};
pub use period::PeriodGranularity;
pub use registry::{CardInfo, CardRegistry, RegistrationError};
pub use state::{AggregatedValue, CardState, Phase};

/// Displayed whenever a value can't be computed.
pub const UNAVAILABLE: &str = "-";
pub const UNKNOWN_ENTITY: &str = "Unknown entity";

pub const COP_CARD_TYPE: &str = "heatpump-cop-card";

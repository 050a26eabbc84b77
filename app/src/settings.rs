use config::{Config, ConfigError, Environment, File};
use infrastructure::{HttpServerConfig, MonitoringConfig};
use serde::Deserialize;

use crate::adapter::homeassistant::HomeAssistant;
use crate::card::{MeanWeighting, RefreshPolicy};

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    pub http_server: HttpServerConfig,
    pub homeassistant: HomeAssistant,
    /// Loosely typed, validated by `CardConfiguration::from_raw`.
    #[serde(default)]
    pub card: Option<serde_json::Value>,
    #[serde(default)]
    pub refresh: RefreshSettings,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RefreshSettings {
    #[serde(default)]
    pub policy: RefreshPolicy,
    #[serde(default)]
    pub mean_weighting: MeanWeighting,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(Environment::default().separator("_"));

        let s = builder.build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::CardConfiguration;
    use config::FileFormat;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn example_config_is_valid() {
        let settings = parse(include_str!("../../config.example.toml"));

        assert_eq!(settings.refresh.policy, RefreshPolicy::Sequential);
        assert_eq!(settings.refresh.mean_weighting, MeanWeighting::Uniform);

        let card = CardConfiguration::from_raw(settings.card.unwrap()).unwrap();
        assert_eq!(card.electrical().id(), "sensor.heatpump_electrical_energy");
        assert_eq!(card.thermal().display_name(), "Thermal energy");
        assert!(card.outdoor_temperature().is_some());
    }

    #[test]
    fn refresh_section_is_optional() {
        let settings = parse(
            r#"
            [monitoring]
            service_name = "heatpump-cop"
            app_name = "heatpump-cop"
            logs = { default_level = "info" }

            [http_server]
            port = 8080

            [homeassistant]
            url = "http://localhost:8123"
            token = "secret"

            [card]
            entities = ["sensor.a", "sensor.b"]
            "#,
        );

        assert_eq!(settings.refresh.policy, RefreshPolicy::Sequential);
        assert!(CardConfiguration::from_raw(settings.card.unwrap()).is_ok());
    }

    #[test]
    fn latest_policy_can_be_selected() {
        let settings = parse(
            r#"
            [monitoring]
            service_name = "heatpump-cop"
            app_name = "heatpump-cop"
            logs = { default_level = "info" }

            [http_server]
            port = 8080

            [homeassistant]
            url = "http://localhost:8123"
            token = "secret"

            [card]
            entities = ["sensor.a", "sensor.b"]

            [refresh]
            policy = "latest"
            mean_weighting = "duration"
            "#,
        );

        assert_eq!(settings.refresh.policy, RefreshPolicy::Latest);
        assert_eq!(settings.refresh.mean_weighting, MeanWeighting::Duration);
    }

    #[test]
    fn card_section_may_be_missing() {
        let settings = parse(
            r#"
            [monitoring]
            service_name = "heatpump-cop"
            app_name = "heatpump-cop"
            logs = { default_level = "info" }

            [http_server]
            port = 8080

            [homeassistant]
            url = "http://localhost:8123"
            token = "secret"
            "#,
        );

        assert!(settings.card.is_none());
    }
}

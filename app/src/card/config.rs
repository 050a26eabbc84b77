use derive_more::derive::{Display, Error};
use serde::{Deserialize, Serialize};

const DEFAULT_TITLE: &str = "Heat pump";
const DEFAULT_COP_LABEL: &str = "COP";
const DEFAULT_ICON: &str = "mdi:heat-pump";

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ConfigurationError {
    #[display("Card configuration requires an `entities` list")]
    MissingEntities,

    #[display("Card configuration requires exactly two entities, got {count}")]
    WrongEntityCount { count: usize },

    #[display("Entity id must not be empty")]
    EmptyEntityId,

    #[display("Invalid card configuration: {reason}")]
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityRef {
    id: String,
    display_name: String,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, display_name: Option<String>) -> Result<Self, ConfigurationError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(ConfigurationError::EmptyEntityId);
        }

        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone());

        Ok(Self { id, display_name })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Validated card configuration. The first entity is the electrical energy input, the second the
/// thermal energy output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardConfiguration {
    entities: [EntityRef; 2],
    outdoor_temperature: Option<EntityRef>,
    outdoor_humidity: Option<EntityRef>,
    title: String,
    cop_label: String,
    show_header: bool,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct RawCardConfiguration {
    #[serde(default)]
    entities: Option<Vec<RawEntity>>,
    #[serde(default)]
    outdoor_temperature: Option<RawEntity>,
    #[serde(default)]
    outdoor_humidity: Option<RawEntity>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cop_label: Option<String>,
    #[serde(default)]
    show_header: Option<bool>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntity {
    Id(String),
    Full { entity: String, name: Option<String> },
}

impl TryFrom<RawEntity> for EntityRef {
    type Error = ConfigurationError;

    fn try_from(raw: RawEntity) -> Result<Self, Self::Error> {
        match raw {
            RawEntity::Id(id) => EntityRef::new(id, None),
            RawEntity::Full { entity, name } => EntityRef::new(entity, name),
        }
    }
}

impl CardConfiguration {
    pub fn from_raw(value: serde_json::Value) -> Result<Self, ConfigurationError> {
        let raw: RawCardConfiguration =
            serde_json::from_value(value).map_err(|e| ConfigurationError::Invalid { reason: e.to_string() })?;

        let raw_entities = raw.entities.ok_or(ConfigurationError::MissingEntities)?;
        let count = raw_entities.len();

        let entities: [EntityRef; 2] = raw_entities
            .into_iter()
            .map(EntityRef::try_from)
            .collect::<Result<Vec<_>, _>>()?
            .try_into()
            .map_err(|_| ConfigurationError::WrongEntityCount { count })?;

        Ok(Self {
            entities,
            outdoor_temperature: raw.outdoor_temperature.map(EntityRef::try_from).transpose()?,
            outdoor_humidity: raw.outdoor_humidity.map(EntityRef::try_from).transpose()?,
            title: raw.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            cop_label: raw.cop_label.unwrap_or_else(|| DEFAULT_COP_LABEL.to_string()),
            show_header: raw.show_header.unwrap_or(true),
            icon: raw.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
        })
    }

    /// Example configuration for a fresh setup.
    pub fn stub() -> Self {
        let entity = |id: &str, name: &str| EntityRef {
            id: id.to_string(),
            display_name: name.to_string(),
        };

        Self {
            entities: [
                entity("sensor.heat_pump_electrical_energy", "Electrical energy"),
                entity("sensor.heat_pump_thermal_energy", "Thermal energy"),
            ],
            outdoor_temperature: None,
            outdoor_humidity: None,
            title: DEFAULT_TITLE.to_string(),
            cop_label: DEFAULT_COP_LABEL.to_string(),
            show_header: true,
            icon: DEFAULT_ICON.to_string(),
        }
    }

    pub fn entities(&self) -> &[EntityRef; 2] {
        &self.entities
    }

    pub fn electrical(&self) -> &EntityRef {
        &self.entities[0]
    }

    pub fn thermal(&self) -> &EntityRef {
        &self.entities[1]
    }

    pub fn outdoor_temperature(&self) -> Option<&EntityRef> {
        self.outdoor_temperature.as_ref()
    }

    pub fn outdoor_humidity(&self) -> Option<&EntityRef> {
        self.outdoor_humidity.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Layout footprint in rows: base row, optional header, one row per entity and per outdoor value.
    pub fn card_size(&self) -> usize {
        1 + usize::from(self.show_header)
            + self.entities.len()
            + usize::from(self.outdoor_temperature.is_some())
            + usize::from(self.outdoor_humidity.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn two_entities_keep_configured_order() {
        let config = CardConfiguration::from_raw(json!({
            "entities": ["sensor.elec", "sensor.therm"]
        }))
        .unwrap();

        assert_eq!(config.electrical().id(), "sensor.elec");
        assert_eq!(config.thermal().id(), "sensor.therm");
    }

    #[test]
    fn wrong_entity_count_is_rejected() {
        for entities in [json!([]), json!(["sensor.a"]), json!(["sensor.a", "sensor.b", "sensor.c"])] {
            let count = entities.as_array().unwrap().len();

            let result = CardConfiguration::from_raw(json!({ "entities": entities }));

            assert_eq!(result, Err(ConfigurationError::WrongEntityCount { count }));
        }
    }

    #[test]
    fn missing_entities_are_rejected() {
        let result = CardConfiguration::from_raw(json!({ "title": "Heat pump" }));

        assert_eq!(result, Err(ConfigurationError::MissingEntities));
    }

    #[test]
    fn empty_entity_id_is_rejected() {
        let result = CardConfiguration::from_raw(json!({ "entities": ["sensor.a", "  "] }));

        assert_eq!(result, Err(ConfigurationError::EmptyEntityId));
    }

    #[test]
    fn malformed_record_is_rejected() {
        let result = CardConfiguration::from_raw(json!({ "entities": "sensor.a" }));

        assert!(matches!(result, Err(ConfigurationError::Invalid { .. })));
    }

    #[test]
    fn defaults_are_applied() {
        let config = CardConfiguration::from_raw(json!({ "entities": ["sensor.a", "sensor.b"] })).unwrap();

        assert_eq!(config.title(), "Heat pump");
        assert_eq!(config.cop_label, "COP");
        assert_eq!(config.icon, "mdi:heat-pump");
        assert!(config.show_header);
        assert_eq!(config.electrical().display_name(), "sensor.a");
    }

    #[test]
    fn entity_objects_carry_display_names() {
        let config = CardConfiguration::from_raw(json!({
            "entities": [
                { "entity": "sensor.elec", "name": "Strom" },
                { "entity": "sensor.therm" }
            ],
            "outdoor_temperature": { "entity": "sensor.outside", "name": "Außen" }
        }))
        .unwrap();

        assert_eq!(config.electrical().display_name(), "Strom");
        assert_eq!(config.thermal().display_name(), "sensor.therm");
        assert_eq!(config.outdoor_temperature().map(EntityRef::display_name), Some("Außen"));
        assert_eq!(config.outdoor_humidity(), None);
    }

    #[test]
    fn card_size_counts_visible_rows() {
        let minimal = CardConfiguration::from_raw(json!({
            "entities": ["sensor.a", "sensor.b"],
            "show_header": false
        }))
        .unwrap();
        let full = CardConfiguration::from_raw(json!({
            "entities": ["sensor.a", "sensor.b"],
            "outdoor_temperature": "sensor.t",
            "outdoor_humidity": "sensor.h"
        }))
        .unwrap();

        assert_eq!(minimal.card_size(), 3);
        assert_eq!(full.card_size(), 6);
    }

    #[test]
    fn stub_is_valid() {
        let stub = CardConfiguration::stub();

        assert_eq!(stub.entities().len(), 2);
    }
}

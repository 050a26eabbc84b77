use std::collections::BTreeMap;

use serde::Serialize;

use super::{UNAVAILABLE, UNKNOWN_ENTITY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedValue {
    value: String,
    unit: String,
}

impl AggregatedValue {
    pub fn new(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: unit.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(UNAVAILABLE, UNAVAILABLE)
    }

    pub fn unknown_entity() -> Self {
        Self::new(UNKNOWN_ENTITY, UNAVAILABLE)
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Default for AggregatedValue {
    fn default() -> Self {
        Self::unavailable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    Initializing,
    Idle,
    Refreshing,
    Detached,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutdoorData {
    pub temperature: AggregatedValue,
    pub humidity: AggregatedValue,
}

/// Everything a renderer needs to draw the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardState {
    pub values: BTreeMap<String, AggregatedValue>,
    pub cop: String,
    pub outdoor: OutdoorData,
    pub phase: Phase,
}

impl Default for CardState {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
            cop: UNAVAILABLE.to_string(),
            outdoor: OutdoorData::default(),
            phase: Phase::Uninitialized,
        }
    }
}

impl CardState {
    pub fn value_of(&self, entity_id: &str) -> &str {
        self.values
            .get(entity_id)
            .map(AggregatedValue::value)
            .unwrap_or(UNAVAILABLE)
    }
}

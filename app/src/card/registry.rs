use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardInfo {
    pub card_type: String,
    pub name: String,
    pub description: String,
}

impl CardInfo {
    pub fn cop_card() -> Self {
        Self {
            card_type: super::COP_CARD_TYPE.to_string(),
            name: "Heat pump COP".to_string(),
            description: "Coefficient of performance of a heat pump for the selected date range".to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RegistrationError {
    #[display("Card type {card_type} is already registered")]
    Duplicate { card_type: String },
}

/// Card types known to the process. Each type can be registered once.
#[derive(Debug, Default)]
pub struct CardRegistry {
    cards: HashMap<String, CardInfo>,
}

impl CardRegistry {
    pub fn register(&mut self, info: CardInfo) -> Result<(), RegistrationError> {
        if self.cards.contains_key(&info.card_type) {
            return Err(RegistrationError::Duplicate {
                card_type: info.card_type,
            });
        }

        tracing::info!("Registered card type {} ({})", info.card_type, info.name);
        self.cards.insert(info.card_type.clone(), info);
        Ok(())
    }

    pub fn cards(&self) -> Vec<&CardInfo> {
        let mut cards: Vec<&CardInfo> = self.cards.values().collect();
        cards.sort_by(|a, b| a.card_type.cmp(&b.card_type));
        cards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_cop_card() {
        let mut registry = CardRegistry::default();

        registry.register(CardInfo::cop_card()).unwrap();

        assert_eq!(registry.cards(), vec![&CardInfo::cop_card()]);
    }

    #[test]
    fn second_registration_is_rejected() {
        let mut registry = CardRegistry::default();
        registry.register(CardInfo::cop_card()).unwrap();

        let result = registry.register(CardInfo::cop_card());

        assert_eq!(
            result,
            Err(RegistrationError::Duplicate {
                card_type: crate::card::COP_CARD_TYPE.to_string()
            })
        );
        assert_eq!(registry.cards().len(), 1);
    }
}

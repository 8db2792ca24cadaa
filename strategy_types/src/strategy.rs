use core::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;
use thiserror::Error;

use crate::primitives::{Epoch, Slot, ValidatorIndex};

/// A time-indexed bundle of actions submitted by a generator.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Strategy {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub slots: Vec<SlotStrategy>,
    #[serde(default, rename = "validator")]
    pub validators: Vec<ValidatorStrategy>,
}

impl Strategy {
    #[must_use]
    pub fn validator_role(&self, validator_index: ValidatorIndex, slot: Slot) -> Role {
        Role::of(&self.validators, validator_index, slot)
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct SlotStrategy {
    /// Unparsed [`SlotSelector`].
    #[serde(deserialize_with = "deserialize_slot")]
    pub slot: String,
    #[serde(default)]
    pub level: i64,
    /// Injection point name to action specification.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct ValidatorStrategy {
    pub validator_index: ValidatorIndex,
    pub attacker_start_slot: Slot,
    pub attacker_end_slot: Slot,
}

impl ValidatorStrategy {
    #[must_use]
    pub const fn covers(&self, validator_index: ValidatorIndex, slot: Slot) -> bool {
        self.validator_index == validator_index
            && self.attacker_start_slot <= slot
            && slot <= self.attacker_end_slot
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Attacker,
    Normal,
}

impl Role {
    #[must_use]
    pub fn of(
        validators: &[ValidatorStrategy],
        validator_index: ValidatorIndex,
        slot: Slot,
    ) -> Self {
        if validators
            .iter()
            .any(|validator| validator.covers(validator_index, slot))
        {
            Self::Attacker
        } else {
            Self::Normal
        }
    }
}

#[derive(PartialEq, Eq, Debug, Error)]
#[error("invalid slot selector: {0:?}")]
pub struct InvalidSlotSelector(pub String);

/// Which slots a [`SlotStrategy`] applies to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SlotSelector {
    Fixed(Slot),
    /// Matches whatever slot is current when the strategy is consulted.
    Deferred,
}

impl SlotSelector {
    #[must_use]
    pub const fn matches(self, slot: Slot) -> bool {
        match self {
            Self::Fixed(fixed) => fixed == slot,
            Self::Deferred => true,
        }
    }

    #[must_use]
    pub const fn is_deferred(self) -> bool {
        matches!(self, Self::Deferred)
    }
}

impl FromStr for SlotSelector {
    type Err = InvalidSlotSelector;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.trim() {
            "*" | "current" => Ok(Self::Deferred),
            trimmed => trimmed
                .parse()
                .map(Self::Fixed)
                .map_err(|_| InvalidSlotSelector(string.to_owned())),
        }
    }
}

impl Display for SlotSelector {
    fn fmt(&self, formatter: &mut Formatter) -> FmtResult {
        match self {
            Self::Fixed(slot) => write!(formatter, "{slot}"),
            Self::Deferred => formatter.write_str("*"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBackInfo {
    pub honest_lose_rate: f64,
    pub attacker_lose_rate: f64,
}

/// Published once the whole epoch span of a strategy is covered by confirmed rewards.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyEndEvent {
    pub uid: String,
    pub min_epoch: Epoch,
    pub max_epoch: Epoch,
}

// Hand written strategies use both `slot: 12` and `slot: "12"`.
fn deserialize_slot<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(string) => Ok(string),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(D::Error::custom(format!(
            "slot must be a string or a number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case("12" => Ok(SlotSelector::Fixed(12)))]
    #[test_case(" 7 " => Ok(SlotSelector::Fixed(7)))]
    #[test_case("*" => Ok(SlotSelector::Deferred))]
    #[test_case("current" => Ok(SlotSelector::Deferred))]
    #[test_case("-1" => Err(InvalidSlotSelector("-1".to_owned())))]
    #[test_case("next" => Err(InvalidSlotSelector("next".to_owned())))]
    fn slot_selector_parsing(string: &str) -> Result<SlotSelector, InvalidSlotSelector> {
        string.parse()
    }

    #[test]
    fn deferred_selector_matches_every_slot() {
        assert!(SlotSelector::Deferred.matches(0));
        assert!(SlotSelector::Deferred.matches(u64::MAX));
        assert!(SlotSelector::Fixed(3).matches(3));
        assert!(!SlotSelector::Fixed(3).matches(4));
    }

    #[test]
    fn strategy_uses_the_external_field_names() -> Result<(), serde_json::Error> {
        let strategy = serde_json::from_value::<Strategy>(json!({
            "uid": "a1",
            "category": "five",
            "slots": [
                {"slot": 100, "level": 1, "actions": {"BlockBeforeSign": "return"}},
                {"slot": "*", "actions": {}},
            ],
            "validator": [
                {"validator_index": 3, "attacker_start_slot": 10, "attacker_end_slot": 20},
            ],
        }))?;

        assert_eq!(strategy.slots[0].slot, "100");
        assert_eq!(strategy.slots[1].slot, "*");
        assert_eq!(strategy.slots[1].level, 0);
        assert_eq!(strategy.validator_role(3, 10), Role::Attacker);
        assert_eq!(strategy.validator_role(3, 21), Role::Normal);
        assert_eq!(strategy.validator_role(4, 15), Role::Normal);

        Ok(())
    }
}

use std::sync::{Arc, OnceLock};

use action_engine::{Action, ParseError};
use enum_map::EnumMap;
use itertools::Itertools as _;
use log::debug;
use parking_lot::RwLock;
use std_ext::ArcExt as _;
use strategy_types::{
    InjectionPoint, Role, Slot, SlotSelector, SlotStrategy, Strategy, ValidatorIndex,
    ValidatorStrategy,
};

/// Executable counterpart of [`SlotStrategy`].
#[derive(Clone, Debug)]
pub struct InternalSlotStrategy {
    pub slot: SlotSelector,
    pub level: i64,
    pub actions: EnumMap<InjectionPoint, Option<Arc<Action>>>,
}

impl InternalSlotStrategy {
    pub fn parse(slot_strategy: &SlotStrategy) -> Result<Self, ParseError> {
        let slot = slot_strategy.slot.parse()?;
        let mut actions = EnumMap::default();

        for (point, spec) in &slot_strategy.actions {
            let point = point
                .parse::<InjectionPoint>()
                .map_err(|_| ParseError::UnknownInjectionPoint(point.clone()))?;

            actions[point] = Some(Arc::new(Action::parse(spec)?));
        }

        Ok(Self {
            slot,
            level: slot_strategy.level,
            actions,
        })
    }

    #[must_use]
    pub fn action(&self, point: InjectionPoint) -> Option<&Action> {
        self.actions[point].as_deref()
    }

    /// The entry as it would be written in a strategy file.
    #[must_use]
    pub fn to_slot_strategy(&self) -> SlotStrategy {
        let actions = self
            .actions
            .iter()
            .filter_map(|(point, action)| {
                let action = action.as_ref()?;
                Some((point.to_string(), action.spec().to_owned()))
            })
            .collect();

        SlotStrategy {
            slot: self.slot.to_string(),
            level: self.level,
            actions,
        }
    }
}

/// Outcome of [`StrategyResolver::resolve`].
#[derive(Clone, Debug)]
pub enum Resolution {
    NoStrategies,
    /// No entry applies to the slot. Carries the first installed entry.
    Unmatched(Arc<InternalSlotStrategy>),
    Found(Arc<InternalSlotStrategy>),
}

impl Resolution {
    #[must_use]
    pub fn found(&self) -> Option<&InternalSlotStrategy> {
        match self {
            Self::Found(entry) => Some(entry),
            Self::NoStrategies | Self::Unmatched(_) => None,
        }
    }
}

/// A strategy whose actions have all been parsed, ready to be merged.
#[derive(Clone, Debug)]
pub struct ParsedStrategy {
    pub slots: Vec<InternalSlotStrategy>,
    pub validators: Vec<ValidatorStrategy>,
}

impl ParsedStrategy {
    pub fn parse(strategy: &Strategy) -> Result<Self, ParseError> {
        let slots = strategy
            .slots
            .iter()
            .map(InternalSlotStrategy::parse)
            .try_collect()?;

        Ok(Self {
            slots,
            validators: strategy.validators.clone(),
        })
    }

    #[must_use]
    pub fn selectors(&self) -> Vec<SlotSelector> {
        self.slots.iter().map(|entry| entry.slot).collect()
    }
}

/// The live set of slot strategies.
///
/// Entries are only ever appended or replaced in place, and a merge replaces all of its entries
/// under one write lock. Replaced entries are new [`Arc`]s, so a caller holding a resolved entry
/// keeps a consistent view of it.
#[derive(Default)]
pub struct StrategyResolver {
    entries: RwLock<Vec<Arc<InternalSlotStrategy>>>,
    validators: OnceLock<Vec<ValidatorStrategy>>,
}

impl StrategyResolver {
    /// Parses and applies `strategy`. Nothing is applied if any action fails to parse.
    pub fn merge(&self, strategy: &Strategy) -> Result<ParsedStrategy, ParseError> {
        let parsed = ParsedStrategy::parse(strategy)?;
        self.apply(&parsed);
        Ok(parsed)
    }

    /// An existing entry for the same slot selector is replaced if its level does not exceed the
    /// incoming one. The replacement takes the incoming level. Otherwise the entry is appended.
    pub fn apply(&self, parsed: &ParsedStrategy) {
        if !parsed.validators.is_empty() {
            self.validators.get_or_init(|| parsed.validators.clone());
        }

        let mut entries = self.entries.write();

        for incoming in &parsed.slots {
            let existing = entries
                .iter_mut()
                .find(|entry| entry.slot == incoming.slot && entry.level <= incoming.level);

            match existing {
                Some(entry) => {
                    debug!(
                        "replacing actions for slot {} (level {} -> {})",
                        incoming.slot, entry.level, incoming.level,
                    );

                    *entry = Arc::new(incoming.clone());
                }
                None => entries.push(Arc::new(incoming.clone())),
            }
        }
    }

    /// Highest level entry matching `slot`. The first one wins ties.
    #[must_use]
    pub fn resolve(&self, slot: Slot) -> Resolution {
        let entries = self.entries.read();

        let Some(first) = entries.first() else {
            return Resolution::NoStrategies;
        };

        let mut best = None::<&Arc<InternalSlotStrategy>>;

        for entry in entries.iter().filter(|entry| entry.slot.matches(slot)) {
            if best.is_none_or(|best| entry.level > best.level) {
                best = Some(entry);
            }
        }

        match best {
            Some(entry) => Resolution::Found(entry.clone_arc()),
            None => Resolution::Unmatched(first.clone_arc()),
        }
    }

    #[must_use]
    pub fn entries(&self) -> Vec<Arc<InternalSlotStrategy>> {
        self.entries.read().iter().map(|entry| entry.clone_arc()).collect_vec()
    }

    #[must_use]
    pub fn validator_role(&self, validator_index: ValidatorIndex, slot: Slot) -> Role {
        Role::of(
            self.validators.get().map(Vec::as_slice).unwrap_or_default(),
            validator_index,
            slot,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use action_engine::ActionKind;
    use strategy_types::InvalidSlotSelector;
    use test_case::test_case;

    use super::*;

    fn slot_strategy(slot: &str, level: i64, actions: &[(&str, &str)]) -> SlotStrategy {
        SlotStrategy {
            slot: slot.to_owned(),
            level,
            actions: actions
                .iter()
                .map(|(point, spec)| ((*point).to_owned(), (*spec).to_owned()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn strategy(slots: Vec<SlotStrategy>) -> Strategy {
        Strategy {
            slots,
            ..Strategy::default()
        }
    }

    fn resolved_kind(
        resolver: &StrategyResolver,
        slot: Slot,
        point: InjectionPoint,
    ) -> Option<ActionKind> {
        resolver
            .resolve(slot)
            .found()
            .and_then(|entry| entry.action(point))
            .map(Action::kind)
    }

    #[test]
    fn higher_level_wins_regardless_of_order() -> Result<(), ParseError> {
        for (first, second) in [(0, 1), (1, 0)] {
            let resolver = StrategyResolver::default();
            let spec = |level| if level == 1 { "null" } else { "return" };

            for level in [first, second] {
                resolver.merge(&strategy(vec![slot_strategy(
                    "100",
                    level,
                    &[("BlockBeforeSign", spec(level))],
                )]))?;
            }

            assert_eq!(
                resolved_kind(&resolver, 100, InjectionPoint::BlockBeforeSign),
                Some(ActionKind::Null),
            );
        }

        Ok(())
    }

    #[test]
    fn equal_level_resubmission_replaces_in_place() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        resolver.merge(&strategy(vec![slot_strategy("5", 2, &[("AttestBeforeSign", "skip")])]))?;
        resolver.merge(&strategy(vec![slot_strategy("5", 2, &[("AttestBeforeSign", "exit")])]))?;
        resolver.merge(&strategy(vec![slot_strategy("5", 2, &[("AttestBeforeSign", "exit")])]))?;

        assert_eq!(resolver.entries().len(), 1);
        assert_eq!(
            resolved_kind(&resolver, 5, InjectionPoint::AttestBeforeSign),
            Some(ActionKind::Exit),
        );

        Ok(())
    }

    #[test]
    fn replacement_takes_the_incoming_level() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        resolver.merge(&strategy(vec![slot_strategy("5", 0, &[("BlockBeforeSign", "skip")])]))?;
        resolver.merge(&strategy(vec![slot_strategy("5", 3, &[("BlockBeforeSign", "exit")])]))?;
        resolver.merge(&strategy(vec![slot_strategy("5", 1, &[("BlockBeforeSign", "null")])]))?;

        assert_eq!(resolver.entries().len(), 2);
        assert_eq!(
            resolved_kind(&resolver, 5, InjectionPoint::BlockBeforeSign),
            Some(ActionKind::Exit),
        );

        Ok(())
    }

    #[test]
    fn replacing_an_entry_replaces_its_whole_action_map() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        resolver.merge(&strategy(vec![slot_strategy(
            "8",
            0,
            &[("BlockBeforeSign", "skip"), ("BlockAfterSign", "skip")],
        )]))?;
        resolver.merge(&strategy(vec![slot_strategy("8", 0, &[("BlockAfterSign", "return")])]))?;

        assert_eq!(resolved_kind(&resolver, 8, InjectionPoint::BlockBeforeSign), None);
        assert_eq!(
            resolved_kind(&resolver, 8, InjectionPoint::BlockAfterSign),
            Some(ActionKind::Return),
        );

        Ok(())
    }

    #[test]
    fn empty_and_unmatched_resolutions_are_distinguished() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        assert!(matches!(resolver.resolve(3), Resolution::NoStrategies));

        resolver.merge(&strategy(vec![slot_strategy("4", 0, &[])]))?;

        assert!(matches!(resolver.resolve(3), Resolution::Unmatched(_)));
        assert!(matches!(resolver.resolve(4), Resolution::Found(_)));

        Ok(())
    }

    #[test]
    fn fixed_entries_of_higher_level_override_deferred_ones() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        resolver.merge(&strategy(vec![
            slot_strategy("*", 1, &[("AttestAfterSign", "skip")]),
            slot_strategy("9", 2, &[("AttestAfterSign", "return")]),
        ]))?;

        assert_eq!(
            resolved_kind(&resolver, 1, InjectionPoint::AttestAfterSign),
            Some(ActionKind::Skip),
        );
        assert_eq!(
            resolved_kind(&resolver, 9, InjectionPoint::AttestAfterSign),
            Some(ActionKind::Return),
        );

        Ok(())
    }

    #[test]
    fn first_entry_wins_ties() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();

        resolver.merge(&strategy(vec![
            slot_strategy("*", 1, &[("AttestAfterSign", "skip")]),
            slot_strategy("9", 1, &[("AttestAfterSign", "return")]),
        ]))?;

        assert_eq!(
            resolved_kind(&resolver, 9, InjectionPoint::AttestAfterSign),
            Some(ActionKind::Skip),
        );

        Ok(())
    }

    #[test_case(
        slot_strategy("1", 0, &[("BlockSomething", "null")])
        => matches Err(ParseError::UnknownInjectionPoint(_))
    )]
    #[test_case(
        slot_strategy("x", 0, &[])
        => matches Err(ParseError::InvalidSlot(InvalidSlotSelector(_)))
    )]
    #[test_case(
        slot_strategy("1", 0, &[("BlockBeforeSign", "modifyParentRoot")])
        => matches Err(ParseError::MissingParameter(ActionKind::ModifyParentRoot))
    )]
    fn invalid_strategies_are_rejected_whole(
        invalid: SlotStrategy,
    ) -> Result<ParsedStrategy, ParseError> {
        let resolver = StrategyResolver::default();
        let result = resolver.merge(&strategy(vec![slot_strategy("0", 0, &[]), invalid]));

        assert!(resolver.entries().is_empty());

        result
    }

    #[test]
    fn validators_are_set_once() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();
        let validators = |index| {
            vec![ValidatorStrategy {
                validator_index: index,
                attacker_start_slot: 0,
                attacker_end_slot: 100,
            }]
        };

        assert_eq!(resolver.validator_role(1, 5), Role::Normal);

        resolver.merge(&Strategy::default())?;
        resolver.merge(&Strategy {
            validators: validators(1),
            ..Strategy::default()
        })?;
        resolver.merge(&Strategy {
            validators: validators(2),
            ..Strategy::default()
        })?;

        assert_eq!(resolver.validator_role(1, 5), Role::Attacker);
        assert_eq!(resolver.validator_role(1, 101), Role::Normal);
        assert_eq!(resolver.validator_role(2, 5), Role::Normal);

        Ok(())
    }

    #[test]
    fn entries_convert_back_to_slot_strategies() -> Result<(), ParseError> {
        let resolver = StrategyResolver::default();
        let original = slot_strategy(
            "current",
            4,
            &[("AttestBeforeSign", "delayWithSecond:2"), ("BlockAfterSign", "null")],
        );

        resolver.merge(&strategy(vec![original]))?;

        let entries = resolver.entries();

        assert_eq!(
            entries[0].to_slot_strategy(),
            slot_strategy(
                "*",
                4,
                &[("AttestBeforeSign", "delayWithSecond:2"), ("BlockAfterSign", "null")],
            ),
        );

        Ok(())
    }
}

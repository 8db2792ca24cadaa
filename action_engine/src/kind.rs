use rand::Rng as _;
use strategy_types::AttackerCommand;
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    action::{AttestField, Delay, Effect},
    error::ParseError,
};

// Upper bound (exclusive) of the jitter used when a delay parameter is omitted.
const DEFAULT_JITTER: u64 = 10;
const SECONDS_PER_DURATION_UNIT: u64 = 4;

/// Every action name the language accepts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ActionKind {
    Null,
    Return,
    Continue,
    Abort,
    Skip,
    Exit,
    AddAttestToPool,
    StoreSignedAttest,
    DelayWithSecond,
    DelayWithDuration,
    DelayToNextSlot,
    DelayToAfterNextSlot,
    #[strum(serialize = "delayToNextNEpochStart")]
    DelayToNextNEpochStart,
    #[strum(serialize = "delayToNextNEpochEnd")]
    DelayToNextNEpochEnd,
    #[strum(serialize = "delayToNextNEpochHalf")]
    DelayToNextNEpochHalf,
    DelayToEpochEnd,
    DelayHalfEpoch,
    DelayToMilliTime,
    ModifyAttestSource,
    ModifyAttestTarget,
    ModifyAttestHead,
    ModifyParentRoot,
    PackPooledAttest,
}

impl ActionKind {
    /// Binds parameters, drawing jitter for omitted delay parameters.
    pub fn build(self, params: &[u64]) -> Result<Effect, ParseError> {
        let first = params.first().copied();
        let jitter = || first.unwrap_or_else(|| rand::thread_rng().gen_range(0..DEFAULT_JITTER));
        let required = || first.ok_or(ParseError::MissingParameter(self));

        let effect = match self {
            Self::Null => Effect::Signal(AttackerCommand::Null),
            Self::Return => Effect::Signal(AttackerCommand::Return),
            Self::Continue => Effect::Signal(AttackerCommand::Continue),
            Self::Abort => Effect::Signal(AttackerCommand::Abort),
            Self::Skip => Effect::Signal(AttackerCommand::Skip),
            Self::Exit => Effect::Signal(AttackerCommand::Exit),
            Self::AddAttestToPool => Effect::AddToPool,
            Self::StoreSignedAttest => Effect::StoreSigned,
            Self::DelayWithSecond => Effect::Delay(Delay::Seconds(jitter())),
            Self::DelayWithDuration => Effect::Delay(Delay::Seconds(
                jitter().saturating_mul(SECONDS_PER_DURATION_UNIT),
            )),
            Self::DelayToNextSlot => Effect::Delay(Delay::NextSlot),
            Self::DelayToAfterNextSlot => Effect::Delay(Delay::AfterNextSlot(jitter())),
            Self::DelayToNextNEpochStart => {
                Effect::Delay(Delay::NextNEpochStart(first.unwrap_or(1)))
            }
            Self::DelayToNextNEpochEnd => Effect::Delay(Delay::NextNEpochEnd(first.unwrap_or(0))),
            Self::DelayToNextNEpochHalf => {
                Effect::Delay(Delay::NextNEpochHalf(first.unwrap_or(1)))
            }
            Self::DelayToEpochEnd => Effect::Delay(Delay::EpochEnd),
            Self::DelayHalfEpoch => Effect::Delay(Delay::HalfEpoch),
            Self::DelayToMilliTime => Effect::Delay(Delay::UntilUnixMillis(first.unwrap_or(0))),
            Self::ModifyAttestSource => Effect::ModifyAttestation {
                field: AttestField::Source,
                slot: required()?,
            },
            Self::ModifyAttestTarget => Effect::ModifyAttestation {
                field: AttestField::Target,
                slot: required()?,
            },
            Self::ModifyAttestHead => Effect::ModifyAttestation {
                field: AttestField::Head,
                slot: required()?,
            },
            Self::ModifyParentRoot => Effect::ModifyParentRoot { slot: required()? },
            Self::PackPooledAttest => Effect::PackPooled,
        };

        Ok(effect)
    }
}

/// Splits one `name[:param]*` segment.
pub fn parse_segment(segment: &str) -> Result<(ActionKind, Vec<u64>), ParseError> {
    let mut parts = segment.trim().split(':');
    let name = parts.next().unwrap_or_default().trim();

    if name.is_empty() {
        return Err(ParseError::Empty);
    }

    let kind = name
        .parse::<ActionKind>()
        .map_err(|_| ParseError::UnknownAction(name.to_owned()))?;

    let params = parts
        .map(|parameter| {
            parameter
                .trim()
                .parse()
                .map_err(|_| ParseError::InvalidParameter {
                    kind,
                    parameter: parameter.to_owned(),
                })
        })
        .collect::<Result<_, _>>()?;

    Ok((kind, params))
}

use strategy_types::InvalidSlotSelector;
use thiserror::Error;

use crate::kind::ActionKind;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum ParseError {
    #[error("empty action specification")]
    Empty,
    #[error("unknown action: {0:?}")]
    UnknownAction(String),
    #[error("invalid parameter {parameter:?} for action {kind}")]
    InvalidParameter { kind: ActionKind, parameter: String },
    #[error("action {0} requires a parameter")]
    MissingParameter(ActionKind),
    #[error("unknown injection point: {0:?}")]
    UnknownInjectionPoint(String),
    #[error(transparent)]
    InvalidSlot(#[from] InvalidSlotSelector),
}

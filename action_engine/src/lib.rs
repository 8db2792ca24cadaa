//! The action language.
//!
//! An action specification has the form `name[:param]*`, optionally followed by more
//! specifications separated by `#`. Every specification in a chain is validated but only the
//! first one is executed. Parameters are non-negative decimal integers.

pub use crate::{
    action::{Action, ActionOutcome, AttestField, Delay, Effect},
    backend::{Backend, Payload},
    error::ParseError,
    kind::ActionKind,
};

mod action;
mod backend;
mod error;
mod kind;

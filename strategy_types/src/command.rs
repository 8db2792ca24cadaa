use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Instruction returned to the instrumented client at a checkpoint.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Debug,
    AsRefStr,
    Display,
    EnumString,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackerCommand {
    /// Proceed normally.
    #[default]
    Null,
    /// Stop the current lifecycle step.
    Return,
    Continue,
    Abort,
    /// Skip one sub-step such as broadcasting but continue the rest.
    Skip,
    Exit,
    /// The returned payload replaces the caller's working data.
    UpdateState,
}

impl AttackerCommand {
    /// The caller must terminate the process.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Abort | Self::Exit)
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct AttackerResponse {
    pub cmd: AttackerCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl AttackerResponse {
    #[must_use]
    pub const fn new(cmd: AttackerCommand, result: Option<String>) -> Self {
        Self { cmd, result }
    }

    /// Proceed with the caller's data unchanged.
    #[must_use]
    pub const fn pass_through(result: Option<String>) -> Self {
        Self::new(AttackerCommand::Null, result)
    }
}

use enum_iterator::Sequence;
use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Lifecycle checkpoints at which the instrumented client consults the engine.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Enum,
    Sequence,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr,
    Deserialize,
    Serialize,
)]
pub enum InjectionPoint {
    BlockDelayForReceiveBlock,
    BlockGetNewParentRoot,
    BlockBeforeSign,
    BlockAfterSign,
    BlockBeforeBroadCast,
    BlockAfterBroadCast,
    BlockBeforePropose,
    BlockAfterPropose,
    AttestBeforeSign,
    AttestAfterSign,
    AttestBeforeBroadCast,
    AttestAfterBroadCast,
    AttestBeforePropose,
    AttestAfterPropose,
}

/// Shape of the payload carried by a checkpoint call.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PayloadKind {
    /// Nothing to decode. Any payload is echoed back untouched.
    Opaque,
    /// `0x`-prefixed block root.
    Root,
    SignedBlock,
    AttestationData,
    Attestation,
}

impl InjectionPoint {
    #[must_use]
    pub const fn is_block(self) -> bool {
        matches!(
            self,
            Self::BlockDelayForReceiveBlock
                | Self::BlockGetNewParentRoot
                | Self::BlockBeforeSign
                | Self::BlockAfterSign
                | Self::BlockBeforeBroadCast
                | Self::BlockAfterBroadCast
                | Self::BlockBeforePropose
                | Self::BlockAfterPropose,
        )
    }

    #[must_use]
    pub const fn is_attest(self) -> bool {
        !self.is_block()
    }

    #[must_use]
    pub const fn payload_kind(self) -> PayloadKind {
        match self {
            Self::BlockDelayForReceiveBlock
            | Self::BlockBeforeBroadCast
            | Self::BlockAfterBroadCast
            | Self::AttestBeforeBroadCast
            | Self::AttestAfterBroadCast => PayloadKind::Opaque,
            Self::BlockGetNewParentRoot => PayloadKind::Root,
            Self::BlockBeforeSign
            | Self::BlockAfterSign
            | Self::BlockBeforePropose
            | Self::BlockAfterPropose => PayloadKind::SignedBlock,
            Self::AttestBeforeSign => PayloadKind::AttestationData,
            Self::AttestAfterSign | Self::AttestBeforePropose | Self::AttestAfterPropose => {
                PayloadKind::Attestation
            }
        }
    }

    /// Name of the JSON-RPC method serving this checkpoint, e.g. `block_beforeSign`.
    #[must_use]
    pub fn rpc_method(self) -> String {
        let name: &'static str = self.into();

        let (namespace, method) = name
            .strip_prefix("Block")
            .map(|method| ("block", method))
            .or_else(|| name.strip_prefix("Attest").map(|method| ("attest", method)))
            .unwrap_or(("", name));

        let mut characters = method.chars();

        let lower_camel = characters
            .next()
            .map(|first| first.to_ascii_lowercase().to_string() + characters.as_str())
            .unwrap_or_default();

        format!("{namespace}_{lower_camel}")
    }

    #[must_use]
    pub fn from_rpc_method(method: &str) -> Option<Self> {
        enum_iterator::all::<Self>().find(|point| point.rpc_method() == method)
    }
}

//! Entry points called by the instrumented client at every checkpoint.
//!
//! No call ever fails. A payload that cannot be decoded, or a replacement that cannot be
//! encoded, results in [`AttackerCommand::Null`] with the caller's payload echoed back.
//!
//! [`AttackerCommand::Null`]: strategy_types::AttackerCommand::Null

use std::sync::Arc;

use action_engine::{Backend, Payload};
use log::{debug, warn};
use strategy_resolver::StrategyResolver;
use strategy_types::{AttackerResponse, InjectionPoint, PayloadKind, Slot, wire};

pub struct Gateway<B: ?Sized> {
    backend: Arc<B>,
    resolver: Arc<StrategyResolver>,
}

impl<B: Backend + ?Sized> Gateway<B> {
    #[must_use]
    pub const fn new(backend: Arc<B>, resolver: Arc<StrategyResolver>) -> Self {
        Self { backend, resolver }
    }

    pub async fn block_delay_for_receive_block(&self, slot: Slot) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockDelayForReceiveBlock, slot, "", None)
            .await
    }

    pub async fn block_get_new_parent_root(
        &self,
        slot: Slot,
        pubkey: &str,
        parent_root: String,
    ) -> AttackerResponse {
        self.dispatch(
            InjectionPoint::BlockGetNewParentRoot,
            slot,
            pubkey,
            Some(parent_root),
        )
        .await
    }

    pub async fn block_before_sign(
        &self,
        slot: Slot,
        pubkey: &str,
        block: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockBeforeSign, slot, pubkey, Some(block))
            .await
    }

    pub async fn block_after_sign(
        &self,
        slot: Slot,
        pubkey: &str,
        signed_block: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockAfterSign, slot, pubkey, Some(signed_block))
            .await
    }

    pub async fn block_before_broadcast(&self, slot: Slot) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockBeforeBroadCast, slot, "", None)
            .await
    }

    pub async fn block_after_broadcast(&self, slot: Slot) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockAfterBroadCast, slot, "", None)
            .await
    }

    pub async fn block_before_propose(
        &self,
        slot: Slot,
        pubkey: &str,
        signed_block: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockBeforePropose, slot, pubkey, Some(signed_block))
            .await
    }

    pub async fn block_after_propose(
        &self,
        slot: Slot,
        pubkey: &str,
        signed_block: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::BlockAfterPropose, slot, pubkey, Some(signed_block))
            .await
    }

    pub async fn attest_before_sign(
        &self,
        slot: Slot,
        pubkey: &str,
        attestation_data: String,
    ) -> AttackerResponse {
        self.dispatch(
            InjectionPoint::AttestBeforeSign,
            slot,
            pubkey,
            Some(attestation_data),
        )
        .await
    }

    /// The attestation enters the pending pool before any action runs.
    pub async fn attest_after_sign(
        &self,
        slot: Slot,
        pubkey: &str,
        attestation: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::AttestAfterSign, slot, pubkey, Some(attestation))
            .await
    }

    pub async fn attest_before_broadcast(&self, slot: Slot) -> AttackerResponse {
        self.dispatch(InjectionPoint::AttestBeforeBroadCast, slot, "", None)
            .await
    }

    pub async fn attest_after_broadcast(&self, slot: Slot) -> AttackerResponse {
        self.dispatch(InjectionPoint::AttestAfterBroadCast, slot, "", None)
            .await
    }

    pub async fn attest_before_propose(
        &self,
        slot: Slot,
        pubkey: &str,
        attestation: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::AttestBeforePropose, slot, pubkey, Some(attestation))
            .await
    }

    pub async fn attest_after_propose(
        &self,
        slot: Slot,
        pubkey: &str,
        attestation: String,
    ) -> AttackerResponse {
        self.dispatch(InjectionPoint::AttestAfterPropose, slot, pubkey, Some(attestation))
            .await
    }

    /// Serves any checkpoint. The per-checkpoint methods above delegate here.
    pub async fn dispatch(
        &self,
        point: InjectionPoint,
        slot: Slot,
        pubkey: &str,
        raw: Option<String>,
    ) -> AttackerResponse {
        self.backend.slot_watermark().record(slot);

        let payload = match decode(point.payload_kind(), raw.as_deref()) {
            Ok(payload) => payload,
            Err(error) => {
                warn!("{point} at slot {slot}: undecodable payload: {error}");
                return AttackerResponse::pass_through(raw);
            }
        };

        if point == InjectionPoint::AttestAfterSign {
            if let Some(Payload::Attestation(attestation)) = &payload {
                self.backend
                    .attestation_pool()
                    .add(slot, pubkey, attestation.as_ref().clone());
            }
        }

        let resolution = self.resolver.resolve(slot);

        let Some(action) = resolution
            .found()
            .and_then(|entry| entry.actions[point].clone())
        else {
            debug!("{point} at slot {slot}: no action");
            return AttackerResponse::pass_through(raw);
        };

        let outcome = action.run(self.backend.as_ref(), slot, pubkey, payload).await;

        let result = match outcome.payload.as_ref().map(encode).transpose() {
            Ok(Some(encoded)) => Some(encoded),
            Ok(None) => raw,
            Err(error) => {
                warn!(
                    "{point} at slot {slot}: unable to encode result of {}: {error}",
                    action.kind(),
                );
                return AttackerResponse::pass_through(raw);
            }
        };

        debug!(
            "{point} at slot {slot}: {} returned {}",
            action.spec(),
            outcome.command,
        );

        AttackerResponse::new(outcome.command, result)
    }
}

fn decode(kind: PayloadKind, raw: Option<&str>) -> Result<Option<Payload>, wire::DecodeError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let payload = match kind {
        PayloadKind::Opaque => return Ok(None),
        PayloadKind::Root => Payload::Root(wire::decode_root(raw)?),
        PayloadKind::SignedBlock => Payload::Block(Box::new(wire::decode(raw)?)),
        PayloadKind::AttestationData => Payload::AttestationData(wire::decode(raw)?),
        PayloadKind::Attestation => Payload::Attestation(Box::new(wire::decode(raw)?)),
    };

    Ok(Some(payload))
}

fn encode(payload: &Payload) -> Result<String, serde_json::Error> {
    match payload {
        Payload::Block(block) => wire::encode(block),
        Payload::AttestationData(data) => wire::encode(data),
        Payload::Attestation(attestation) => wire::encode(attestation),
        Payload::Root(root) => Ok(wire::encode_root(*root)),
    }
}

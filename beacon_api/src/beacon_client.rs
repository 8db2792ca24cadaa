use anyhow::{Result, bail};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use strategy_types::{AttestReward, Epoch, H256, ProposerDuty, Slot};
use thiserror::Error;
use url::Url;

use crate::{
    beacon_node::{BeaconNode, ChainParameters},
    responses::{
        AttestationRewardsResponse, Data, GenesisResponse, HeaderResponse, SpecResponse,
    },
};

#[derive(Debug, Error)]
pub enum BeaconApiError {
    #[error("bad request to beacon node (response: {message})")]
    BadRequest { message: String },
    #[error("beacon node internal error (response: {message})")]
    InternalError { message: String },
}

#[derive(Clone)]
pub struct BeaconClient {
    client: Client,
    url: Url,
}

impl BeaconClient {
    #[must_use]
    pub const fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url.join(path)?;

        debug!("GET {url}");

        let response = self.client.get(url).send().await?;
        let response = handle_error(response).await?;

        Ok(response.json::<Data<T>>().await?.data)
    }

    async fn header(&self, block_id: &str) -> Result<Option<HeaderResponse>> {
        let url = self.url.join(&format!("/eth/v1/beacon/headers/{block_id}"))?;

        debug!("GET {url}");

        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = handle_error(response).await?;

        Ok(Some(response.json::<Data<HeaderResponse>>().await?.data))
    }
}

#[async_trait]
impl BeaconNode for BeaconClient {
    async fn chain_parameters(&self) -> Result<ChainParameters> {
        let spec = self.get::<SpecResponse>("/eth/v1/config/spec").await?;
        let genesis = self.get::<GenesisResponse>("/eth/v1/beacon/genesis").await?;

        Ok(ChainParameters {
            seconds_per_slot: spec.seconds_per_slot,
            slots_per_epoch: spec.slots_per_epoch,
            genesis_time: genesis.genesis_time,
        })
    }

    async fn head_slot(&self) -> Result<Slot> {
        match self.header("head").await? {
            Some(head) => Ok(head.header.message.slot),
            None => bail!("beacon node has no head block"),
        }
    }

    async fn block_root(&self, slot: Slot) -> Result<Option<H256>> {
        let header = self.header(&slot.to_string()).await?;

        Ok(header
            .filter(|header| header.header.message.slot == slot)
            .map(|header| header.root))
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>> {
        self.get(&format!("/eth/v1/validator/duties/proposer/{epoch}"))
            .await
    }

    async fn attestation_rewards(&self, epoch: Epoch) -> Result<Vec<AttestReward>> {
        let url = self
            .url
            .join(&format!("/eth/v1/beacon/rewards/attestations/{epoch}"))?;

        debug!("POST {url}");

        // An empty list of validators selects all of them.
        let response = self
            .client
            .post(url)
            .json::<[Slot; 0]>(&[])
            .send()
            .await?;

        let response = handle_error(response).await?;

        let mut rewards = response
            .json::<Data<AttestationRewardsResponse>>()
            .await?
            .data
            .total_rewards;

        for reward in &mut rewards {
            reward.epoch = epoch;
        }

        Ok(rewards)
    }
}

async fn handle_error(response: Response) -> Result<Response> {
    if response.status().is_client_error() {
        let message = response.text().await?;
        bail!(BeaconApiError::BadRequest { message });
    }

    if response.status().is_server_error() {
        let message = response.text().await?;
        bail!(BeaconApiError::InternalError { message });
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use httpmock::{Method, MockServer};
    use serde_json::json;

    use super::*;

    fn client(server: &MockServer) -> Result<BeaconClient> {
        Ok(BeaconClient::new(Client::new(), server.url("/").parse()?))
    }

    #[tokio::test]
    async fn chain_parameters_are_parsed_from_strings() -> Result<()> {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(Method::GET).path("/eth/v1/config/spec");
            then.status(200).body(
                json!({
                    "data": {
                        "CONFIG_NAME": "interop",
                        "SECONDS_PER_SLOT": "12",
                        "SLOTS_PER_EPOCH": "32",
                    },
                })
                .to_string(),
            );
        });

        server.mock(|when, then| {
            when.method(Method::GET).path("/eth/v1/beacon/genesis");
            then.status(200).body(
                json!({
                    "data": {
                        "genesis_time": "1606824023",
                        "genesis_fork_version": "0x00000000",
                    },
                })
                .to_string(),
            );
        });

        let parameters = client(&server)?.chain_parameters().await?;

        assert_eq!(
            parameters,
            ChainParameters {
                seconds_per_slot: 12,
                slots_per_epoch: 32,
                genesis_time: 1_606_824_023,
            },
        );

        Ok(())
    }

    #[tokio::test]
    async fn empty_slot_has_no_root() -> Result<()> {
        let server = MockServer::start();
        let root = H256::repeat_byte(0x11);

        server.mock(|when, then| {
            when.method(Method::GET).path("/eth/v1/beacon/headers/7");
            then.status(404)
                .body(json!({ "code": 404, "message": "not found" }).to_string());
        });

        server.mock(|when, then| {
            when.method(Method::GET).path("/eth/v1/beacon/headers/8");
            then.status(200).body(
                json!({
                    "data": {
                        "root": root,
                        "canonical": true,
                        "header": { "message": { "slot": "8" } },
                    },
                })
                .to_string(),
            );
        });

        let client = client(&server)?;

        assert_eq!(client.block_root(7).await?, None);
        assert_eq!(client.block_root(8).await?, Some(root));

        Ok(())
    }

    #[tokio::test]
    async fn rewards_are_tagged_with_epoch() -> Result<()> {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(Method::POST)
                .path("/eth/v1/beacon/rewards/attestations/5")
                .body("[]");
            then.status(200).body(
                json!({
                    "execution_optimistic": false,
                    "data": {
                        "ideal_rewards": [],
                        "total_rewards": [{
                            "validator_index": "3",
                            "head": "2000",
                            "target": "-290680",
                            "source": "4000",
                            "inclusion_delay": "0",
                            "inactivity": "0",
                        }],
                    },
                })
                .to_string(),
            );
        });

        let rewards = client(&server)?.attestation_rewards(5).await?;

        assert_eq!(
            rewards,
            [AttestReward {
                epoch: 5,
                validator_index: 3,
                head: 2000,
                target: -290_680,
                source: 4000,
            }],
        );

        Ok(())
    }

    #[tokio::test]
    async fn server_errors_are_reported() -> Result<()> {
        let server = MockServer::start();

        server.mock(|when, then| {
            when.method(Method::GET)
                .path("/eth/v1/validator/duties/proposer/2");
            then.status(503).body("syncing");
        });

        let error = client(&server)?
            .proposer_duties(2)
            .await
            .expect_err("request should fail");

        assert!(matches!(
            error.downcast_ref(),
            Some(BeaconApiError::InternalError { message }) if message == "syncing",
        ));

        Ok(())
    }
}

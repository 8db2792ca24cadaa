use std::sync::Arc;

use action_engine::Backend;
use anyhow::anyhow;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse as _, Response},
    routing::post,
};
use interception_gateway::Gateway;
use log::{debug, warn};
use serde_json::Value;
use strategy_types::{AttackerResponse, InjectionPoint, Strategy};

use crate::{
    admin::Admin,
    error::Error,
    jsonrpc::{JsonRpcRequest, JsonRpcResponse, VERSION},
    params::Params,
};

pub struct RpcState<B: ?Sized> {
    pub gateway: Arc<Gateway<B>>,
    pub admin: Arc<dyn Admin>,
}

impl<B: ?Sized> Clone for RpcState<B> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            admin: Arc::clone(&self.admin),
        }
    }
}

pub fn routes<B: Backend + ?Sized + 'static>(state: RpcState<B>) -> Router {
    Router::new()
        .route("/", post(handle::<B>))
        .with_state(state)
}

async fn handle<B: Backend + ?Sized + 'static>(
    State(state): State<RpcState<B>>,
    body: Bytes,
) -> Response {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!("rejected JSON-RPC request: {}", error.format_sources());
            return error.into_response();
        }
    };

    let JsonRpcRequest {
        method, params, id, ..
    } = request;

    let response = match state.call(&method, params).await {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(error) => {
            warn!("{method} failed: {}", error.format_sources());
            JsonRpcResponse::failure(id, &error)
        }
    };

    Json(response).into_response()
}

fn parse_request(body: &[u8]) -> Result<JsonRpcRequest, Error> {
    let value = serde_json::from_slice::<Value>(body).map_err(Error::Parse)?;

    let request = serde_json::from_value::<JsonRpcRequest>(value)
        .map_err(|error| Error::InvalidRequest(error.into()))?;

    if request.jsonrpc != VERSION {
        return Err(Error::InvalidRequest(anyhow!(
            "unsupported version {:?}",
            request.jsonrpc,
        )));
    }

    Ok(request)
}

impl<B: Backend + ?Sized> RpcState<B> {
    async fn call(&self, method: &str, params: Value) -> Result<Value, Error> {
        let mut params = Params::try_from(params).map_err(Error::InvalidParams)?;

        if let Some(point) = InjectionPoint::from_rpc_method(method) {
            let response = self.checkpoint(point, &mut params).await?;
            return serde_json::to_value(response).map_err(|error| Error::Internal(error.into()));
        }

        let result = match method {
            "admin_submitStrategy" => {
                let strategy = params
                    .value::<Strategy>("strategy")
                    .map_err(Error::InvalidParams)?;

                self.admin
                    .submit_strategy(strategy)
                    .await
                    .map_err(Error::Rejected)?;

                Value::Null
            }
            "admin_getFeedback" => {
                let uid = params.string("uid").map_err(Error::InvalidParams)?;
                let feedback = self.admin.feedback(&uid).map_err(Error::Rejected)?;

                serde_json::to_value(feedback).map_err(anyhow::Error::new)?
            }
            "admin_currentSlot" => Value::from(self.admin.current_slot()),
            "admin_slotStrategies" => {
                serde_json::to_value(self.admin.slot_strategies()).map_err(anyhow::Error::new)?
            }
            _ => return Err(Error::MethodNotFound(method.to_owned())),
        };

        Ok(result)
    }

    async fn checkpoint(
        &self,
        point: InjectionPoint,
        params: &mut Params,
    ) -> Result<AttackerResponse, Error> {
        let slot = params.slot().map_err(Error::InvalidParams)?;
        let pubkey = params
            .optional_string()
            .map_err(Error::InvalidParams)?
            .unwrap_or_default();
        let mut payload = || params.string("payload").map_err(Error::InvalidParams);

        debug!("{} at slot {slot}", point.rpc_method());

        let gateway = &self.gateway;

        let response = match point {
            InjectionPoint::BlockDelayForReceiveBlock => {
                gateway.block_delay_for_receive_block(slot).await
            }
            InjectionPoint::BlockGetNewParentRoot => {
                gateway
                    .block_get_new_parent_root(slot, &pubkey, payload()?)
                    .await
            }
            InjectionPoint::BlockBeforeSign => {
                gateway.block_before_sign(slot, &pubkey, payload()?).await
            }
            InjectionPoint::BlockAfterSign => {
                gateway.block_after_sign(slot, &pubkey, payload()?).await
            }
            InjectionPoint::BlockBeforeBroadCast => gateway.block_before_broadcast(slot).await,
            InjectionPoint::BlockAfterBroadCast => gateway.block_after_broadcast(slot).await,
            InjectionPoint::BlockBeforePropose => {
                gateway.block_before_propose(slot, &pubkey, payload()?).await
            }
            InjectionPoint::BlockAfterPropose => {
                gateway.block_after_propose(slot, &pubkey, payload()?).await
            }
            InjectionPoint::AttestBeforeSign => {
                gateway.attest_before_sign(slot, &pubkey, payload()?).await
            }
            InjectionPoint::AttestAfterSign => {
                gateway.attest_after_sign(slot, &pubkey, payload()?).await
            }
            InjectionPoint::AttestBeforeBroadCast => gateway.attest_before_broadcast(slot).await,
            InjectionPoint::AttestAfterBroadCast => gateway.attest_after_broadcast(slot).await,
            InjectionPoint::AttestBeforePropose => {
                gateway.attest_before_propose(slot, &pubkey, payload()?).await
            }
            InjectionPoint::AttestAfterPropose => {
                gateway.attest_after_propose(slot, &pubkey, payload()?).await
            }
        };

        Ok(response)
    }
}

use core::{future::IntoFuture as _, net::SocketAddr};

use action_engine::Backend;
use anyhow::Result;
use log::info;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::routing::{self, RpcState};

pub struct RpcServer<B: ?Sized> {
    pub address: SocketAddr,
    pub state: RpcState<B>,
}

impl<B: Backend + ?Sized + 'static> RpcServer<B> {
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Self { address, state } = self;

        let listener = TcpListener::bind(address).await?;

        info!("JSON-RPC server listening on {}", listener.local_addr()?);

        axum::serve(listener, routing::routes(state))
            .with_graceful_shutdown(cancel.cancelled_owned())
            .into_future()
            .await?;

        Ok(())
    }
}

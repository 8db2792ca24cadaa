//! JSON-RPC 2.0 over HTTP.
//!
//! Checkpoint methods are named after their [`InjectionPoint`] (`block_beforeSign`,
//! `attest_afterSign`, ...) and take `[slot, pubkey?, payload?]`. They respond with an
//! [`AttackerResponse`]. Methods in the `admin` namespace manage strategies.
//!
//! [`InjectionPoint`]:   strategy_types::InjectionPoint
//! [`AttackerResponse`]: strategy_types::AttackerResponse

pub use crate::{
    admin::Admin,
    error::Error,
    routing::{RpcState, routes},
    task::RpcServer,
};

mod admin;
mod error;
mod jsonrpc;
mod params;
mod routing;
mod task;

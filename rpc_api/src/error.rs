use core::fmt::Display;
use std::error::Error as StdError;

use anyhow::Error as AnyhowError;
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use itertools::Itertools as _;
use serde_json::Value;
use thiserror::Error;

use crate::jsonrpc::JsonRpcResponse;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error")]
    Parse(#[source] serde_json::Error),
    #[error("invalid request")]
    InvalidRequest(#[source] AnyhowError),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params")]
    InvalidParams(#[source] AnyhowError),
    #[error("internal error")]
    Internal(#[from] AnyhowError),
    #[error("request failed")]
    Rejected(#[source] AnyhowError),
}

// Errors without a request ID to respond to.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        Json(JsonRpcResponse::failure(Value::Null, &self)).into_response()
    }
}

impl Error {
    // `anyhow::Error` prints the chain of sources if the alternate flag is specified.
    // Impls generated by `thiserror::Error` ignore the alternate flag.
    pub fn format_sources(&self) -> impl Display + '_ {
        self.sources().format(": ")
    }

    fn sources(&self) -> impl Iterator<Item = &dyn StdError> {
        let mut error: Option<&dyn StdError> = Some(self);

        core::iter::from_fn(move || {
            let source = error?.source();
            core::mem::replace(&mut error, source)
        })
    }

    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Parse(_) => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound(_) => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Internal(_) => -32603,
            Self::Rejected(_) => -32000,
        }
    }
}

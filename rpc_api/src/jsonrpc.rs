use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

pub const VERSION: &str = "2.0";

#[derive(Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

#[derive(PartialEq, Debug, Deserialize, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorObject),
}

#[derive(PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: VERSION.to_owned(),
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn failure(id: Value, error: &Error) -> Self {
        Self {
            jsonrpc: VERSION.to_owned(),
            id,
            outcome: Outcome::Error(ErrorObject {
                code: error.code(),
                message: error.format_sources().to_string(),
            }),
        }
    }
}

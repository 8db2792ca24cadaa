//! Checkpoint payload encoding.
//!
//! Structured payloads travel as standard base64 of their JSON encoding.
//! Block roots travel as `0x`-prefixed hex.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ethereum_types::H256;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload does not match the expected type: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid block root: {0:?}")]
    Root(String),
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_vec(value).map(|json| STANDARD.encode(json))
}

pub fn decode<T: DeserializeOwned>(payload: &str) -> Result<T, DecodeError> {
    let json = STANDARD.decode(payload.trim())?;
    Ok(serde_json::from_slice(&json)?)
}

#[must_use]
pub fn encode_root(root: H256) -> String {
    format!("0x{}", hex::encode(root.as_bytes()))
}

pub fn decode_root(string: &str) -> Result<H256, DecodeError> {
    let digits = string.strip_prefix("0x").unwrap_or(string);
    let mut bytes = [0; H256::len_bytes()];

    hex::decode_to_slice(digits, &mut bytes).map_err(|_| DecodeError::Root(string.to_owned()))?;

    Ok(H256(bytes))
}

#[cfg(test)]
mod tests {
    use crate::{AttestationData, Checkpoint};

    use super::*;

    #[test]
    fn roots_are_prefixed_hex() -> Result<(), DecodeError> {
        let root = H256::repeat_byte(0xab);
        let encoded = encode_root(root);

        assert_eq!(encoded.len(), 66);
        assert!(encoded.starts_with("0xabab"));
        assert_eq!(decode_root(&encoded)?, root);

        Ok(())
    }

    #[test]
    fn short_roots_are_rejected() {
        assert!(matches!(decode_root("0x1234"), Err(DecodeError::Root(_))));
    }

    #[test]
    fn payloads_of_the_wrong_type_fail_to_decode() -> Result<(), serde_json::Error> {
        let data = AttestationData {
            slot: 9,
            index: 2,
            beacon_block_root: H256::repeat_byte(1),
            source: Checkpoint::default(),
            target: Checkpoint {
                epoch: 1,
                root: H256::repeat_byte(2),
            },
        };

        let encoded = encode(&data)?;

        assert_eq!(decode::<AttestationData>(&encoded).ok(), Some(data));
        assert!(matches!(
            decode::<Checkpoint>(&encoded),
            Err(DecodeError::Json(_)),
        ));
        assert!(matches!(
            decode::<AttestationData>("not base64!"),
            Err(DecodeError::Base64(_)),
        ));

        Ok(())
    }
}

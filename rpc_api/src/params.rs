use anyhow::{Result, anyhow, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use strategy_types::Slot;

/// Positional parameters of a call. `null` and a missing `params` member mean no parameters.
#[derive(Debug)]
pub struct Params(std::vec::IntoIter<Value>);

impl TryFrom<Value> for Params {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(values) => Ok(Self(values.into_iter())),
            Value::Null => Ok(Self(Vec::new().into_iter())),
            other => bail!("params must be an array, got {other}"),
        }
    }
}

impl Params {
    pub fn slot(&mut self) -> Result<Slot> {
        match self.0.next() {
            Some(Value::Number(number)) => number
                .as_u64()
                .ok_or_else(|| anyhow!("slot must be a non-negative integer, got {number}")),
            Some(Value::String(string)) => Ok(string.parse()?),
            Some(other) => bail!("slot must be an integer, got {other}"),
            None => bail!("slot is missing"),
        }
    }

    pub fn optional_string(&mut self) -> Result<Option<String>> {
        match self.0.next() {
            Some(Value::String(string)) => Ok(Some(string)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => bail!("expected a string, got {other}"),
        }
    }

    pub fn string(&mut self, name: &str) -> Result<String> {
        self.optional_string()?
            .ok_or_else(|| anyhow!("{name} is missing"))
    }

    pub fn value<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let value = self.0.next().ok_or_else(|| anyhow!("{name} is missing"))?;
        Ok(serde_json::from_value(value)?)
    }
}

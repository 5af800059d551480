//! Serde helpers for decimals arriving as either JSON strings or numbers.
//!
//! Numbers go through `serde_json::Number`'s shortest round-trip rendering,
//! so values beyond f64 precision should be sent as strings.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Deserializer, Serializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecimal {
    Text(String),
    Number(serde_json::Number),
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match RawDecimal::deserialize(deserializer)? {
        RawDecimal::Text(text) => text,
        RawDecimal::Number(number) => number.to_string(),
    };
    BigDecimal::from_str(text.trim()).map_err(serde::de::Error::custom)
}

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

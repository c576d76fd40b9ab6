//! Comet long-poll event decoding.
//!
//! A `comet` call returns an array of `{ "handle": ..., "message": ... }`
//! objects, one per event, each tagged with the subscription that produced
//! it.

use nso_core::{NsoError, Result, SubscriptionHandle};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::ResultMapping;

/// One event delivered on a comet channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CometEvent {
    /// Subscription that produced the event.
    pub handle: SubscriptionHandle,
    /// Event payload, shaped by the subscription type.
    #[serde(default)]
    pub message: Value,
}

/// Decode the events of a `comet` result.
///
/// An empty object or `null` is treated as "no events"; any other non-array result is
/// a decode error.
pub fn decode_comet_events(mapping: ResultMapping) -> Result<Vec<CometEvent>> {
    match mapping.into_value() {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<CometEvent>(item)
                    .map_err(|e| NsoError::decode(format!("malformed comet event: {e}")))
            })
            .collect(),
        Value::Object(map) if map.is_empty() => Ok(Vec::new()),
        Value::Null => Ok(Vec::new()),
        other => Err(NsoError::decode(format!(
            "comet result is not an event list: {other}"
        ))),
    }
}

//! Response decoding.
//!
//! [`decode_response`] turns raw response bytes into a [`ResultMapping`] or an
//! [`NsoError`]:
//!
//! - an `error` member becomes [`NsoError::Rpc`] with the server's code,
//!   message and data
//! - an id that differs from the request id becomes [`NsoError::IdMismatch`]
//! - an envelope with both or neither of `result`/`error` is a decode error
//!
//! [`RpcResult`] then tags the mapping by the method that produced it, so
//! callers match on `TransactionOpened { th }` instead of probing fields.

use nso_core::{NsoError, QueryHandle, Result, SubscriptionHandle, TransactionHandle};
use serde_json::Value;

use crate::methods;
use crate::results::{flatten_rows, rows_from_value};
use crate::types::RpcResponse;

/// Generic projection of a successful `result`.
#[derive(Clone, Debug, PartialEq)]
pub struct ResultMapping(Value);

impl ResultMapping {
    /// Wrap a `result` value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Field of an object result, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.as_object().and_then(|m| m.get(key))
    }

    /// The whole result value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the whole result value.
    pub fn into_value(self) -> Value {
        self.0
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| NsoError::decode(format!("result has no `{key}` field")))
    }

    /// Extract the transaction handle (`th`).
    pub fn transaction_handle(&self) -> Result<TransactionHandle> {
        integer_field(self.require("th")?, "th").map(TransactionHandle::new)
    }

    /// Extract the query handle (`qh`).
    pub fn query_handle(&self) -> Result<QueryHandle> {
        integer_field(self.require("qh")?, "qh").map(QueryHandle::new)
    }

    /// Extract the subscription handle (`handle`).
    pub fn subscription_handle(&self) -> Result<SubscriptionHandle> {
        match self.require("handle")? {
            Value::String(s) if !s.is_empty() => Ok(SubscriptionHandle::from(s.as_str())),
            Value::Number(n) => Ok(SubscriptionHandle::from(n.to_string())),
            other => Err(NsoError::decode(format!(
                "`handle` is not a usable token: {other}"
            ))),
        }
    }

    /// Extract `results` as rows of cells.
    pub fn query_rows(&self) -> Result<Vec<Vec<String>>> {
        let results = self.require("results")?;
        rows_from_value(results)
            .ok_or_else(|| NsoError::decode(format!("`results` has unexpected shape: {results}")))
    }

    /// Extract `results` as one flat, ordered sequence of cells.
    pub fn query_results(&self) -> Result<Vec<String>> {
        self.query_rows().map(flatten_rows)
    }
}

fn integer_field(value: &Value, name: &str) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // Some server builds send handles as floats (e.g. 3.0)
            #[allow(clippy::cast_possible_truncation)]
            n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
        }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| NsoError::decode(format!("`{name}` is not an integer handle: {value}")))
}

/// Result tagged by the method that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum RpcResult {
    /// `new_trans` succeeded.
    TransactionOpened {
        /// The new transaction handle.
        th: TransactionHandle,
    },
    /// `start_query` succeeded.
    QueryStarted {
        /// The new query handle.
        qh: QueryHandle,
    },
    /// A `subscribe_*` call succeeded.
    SubscriptionOpened {
        /// The new (not yet armed) subscription handle.
        handle: SubscriptionHandle,
    },
    /// Any other method.
    Generic(ResultMapping),
}

impl RpcResult {
    /// Tag `mapping` according to `method`.
    ///
    /// Fails with a decode error when a handle-returning method's result
    /// lacks its handle.
    pub fn for_method(method: &str, mapping: ResultMapping) -> Result<Self> {
        match method {
            methods::NEW_TRANS => Ok(Self::TransactionOpened {
                th: mapping.transaction_handle()?,
            }),
            methods::START_QUERY => Ok(Self::QueryStarted {
                qh: mapping.query_handle()?,
            }),
            m if methods::is_subscribe(m) => Ok(Self::SubscriptionOpened {
                handle: mapping.subscription_handle()?,
            }),
            _ => Ok(Self::Generic(mapping)),
        }
    }
}

/// Decode raw response bytes for the request with id `expected_id`.
pub fn decode_response(raw: &[u8], expected_id: u64) -> Result<ResultMapping> {
    let response: RpcResponse = serde_json::from_slice(raw)
        .map_err(|e| NsoError::decode(format!("response is not a JSON-RPC envelope: {e}")))?;
    decode_envelope(response, expected_id)
}

/// Decode an already-parsed envelope for the request with id `expected_id`.
pub fn decode_envelope(response: RpcResponse, expected_id: u64) -> Result<ResultMapping> {
    if let Some(actual) = response.id {
        if actual != expected_id {
            return Err(NsoError::IdMismatch {
                expected: expected_id,
                actual,
            });
        }
    }

    match (response.result, response.error) {
        (None, Some(error)) => Err(NsoError::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }),
        (Some(_), Some(_)) => Err(NsoError::decode(
            "response carries both `result` and `error`",
        )),
        (None, None) => Err(NsoError::decode(
            "response carries neither `result` nor `error`",
        )),
        (Some(result), None) => {
            if response.id.is_none() {
                return Err(NsoError::decode("successful response has no id"));
            }
            Ok(ResultMapping::new(result))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! # nso-rpc
//!
//! Wire-level pieces of the NSO JSON-RPC dialect:
//!
//! - [`types`]: request/response envelopes
//! - [`methods`]: the method-name catalogue
//! - [`decode`]: response decoding into [`ResultMapping`] and the tagged
//!   [`RpcResult`] variants
//! - [`results`]: `run_query` result decoding, including the bracketed
//!   string rendering
//! - [`comet`]: long-poll event decoding

#![deny(unsafe_code)]

pub mod comet;
pub mod decode;
pub mod methods;
pub mod results;
pub mod types;

pub use comet::{CometEvent, decode_comet_events};
pub use decode::{ResultMapping, RpcResult, decode_response};
pub use types::{JSONRPC_VERSION, RpcErrorBody, RpcRequest, RpcResponse};

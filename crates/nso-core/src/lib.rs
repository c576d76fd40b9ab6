//! # nso-core
//!
//! Foundation types shared by every NSO JSON-RPC client crate:
//!
//! - **Errors**: [`NsoError`] taxonomy (validation, transport, timeout, RPC,
//!   state, decode) via `thiserror`
//! - **Handles**: [`TransactionHandle`], [`QueryHandle`], [`SubscriptionHandle`]
//!   and [`CometId`] newtypes so one server token cannot stand in for another
//! - **Request ids**: [`RequestIdGenerator`], a per-session monotonic counter
//! - **Retry**: [`RetryConfig`] and exponential backoff with jitter
//! - **Addresses**: IPv4 validation and the [`AddressResolver`] seam
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod address;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod retry;

pub use address::{AddressResolver, SystemResolver};
pub use errors::{NsoError, Result};
pub use ids::{CometId, QueryHandle, RequestIdGenerator, SubscriptionHandle, TransactionHandle};
pub use retry::RetryConfig;

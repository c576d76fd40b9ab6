//! # nso-client
//!
//! Stateful client for the NSO JSON-RPC API.
//!
//! - [`Session`]: endpoint, credentials, request ids and authentication; the
//!   single call path for every request
//! - [`TransactionContext`]: a `th`-scoped transaction and its path
//!   operations
//! - [`QuerySession`]: `start_query` / `run_query` pagination
//! - [`CometManager`]: comet channel subscriptions and long-poll delivery,
//!   with [`PollerHandle`] for background polling
//!
//! ```no_run
//! use std::sync::Arc;
//! use nso_client::{ConfMode, OnPendingChanges, Session, TransactionContext, TransactionMode};
//!
//! # async fn demo() -> nso_core::Result<()> {
//! let settings = nso_settings::load_settings()?;
//! let session = Arc::new(Session::from_settings(&settings.connection)?);
//! session.login_with_credentials().await?;
//!
//! let mut tx = TransactionContext::new(session.clone());
//! tx.open(TransactionMode::Read, ConfMode::Private, "", OnPendingChanges::Reuse).await?;
//! let value = tx.get_value("/ncs:devices/device{ce0}/address", false).await?;
//! println!("{:?}", value.get("value"));
//! session.logout().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod comet;
pub mod endpoint;
pub mod params;
pub mod poller;
pub mod query;
pub mod session;
pub mod transaction;
pub mod transport;

#[cfg(test)]
mod testing;

pub use comet::{CometManager, Subscription};
pub use endpoint::{Endpoint, Protocol};
pub use params::{
    CommitOutput, ConfMode, DerefFormat, LoadFormat, LoadMode, OnPendingChanges,
    QueryResultFormat, ShowConfigFormat, SortOrder, SystemSettingOperation, TransactionMode,
};
pub use poller::{PollerConfig, PollerHandle, spawn_poller};
pub use query::{QueryCriteria, QuerySession};
pub use session::{Credentials, Session, SessionOptions};
pub use transaction::TransactionContext;
pub use transport::{HttpTransport, Transport};

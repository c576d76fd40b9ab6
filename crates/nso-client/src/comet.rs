//! Comet long-poll subscriptions.
//!
//! A [`CometManager`] owns one comet channel: a client-chosen comet id, a
//! read transaction tagged with that id, and the set of subscription handles
//! armed on the channel.
//!
//! ```text
//! Stopped --start--> Polling({}) --subscribe--> Polling({h1, h2, ..}) --stop--> Stopped
//! ```
//!
//! Every `subscribe_*` call returns a handle that only delivers events after
//! `start_subscription`. `poll` blocks server-side until an event arrives or
//! the long-poll times out; use [`CometManager::spawn_poller`] to run it on a
//! background task.

use std::sync::Arc;

use nso_core::{CometId, NsoError, Result, SubscriptionHandle};
use nso_rpc::{CometEvent, ResultMapping, RpcResult, decode_comet_events, methods};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::params::{ConfMode, OnPendingChanges, TransactionMode};
use crate::poller::{PollerConfig, PollerHandle, spawn_poller};
use crate::session::Session;
use crate::transaction::TransactionContext;

/// What a subscription listens to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Subscription {
    /// Configuration changes under `path`.
    Changes {
        /// Key path to watch.
        path: String,
    },
    /// Value of the leaf at `path`, sampled every `interval` seconds.
    PollLeaf {
        /// Leaf to sample.
        path: String,
        /// Sampling interval in seconds.
        interval: u32,
    },
    /// Operational data changes under `path`.
    CdbOper {
        /// Key path to watch.
        path: String,
    },
    /// Upgrade progress.
    Upgrade,
    /// JSON-RPC batch completions.
    JsonRpcBatch,
}

impl Subscription {
    /// `subscribe_*` method for this subscription.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Changes { .. } => methods::SUBSCRIBE_CHANGES,
            Self::PollLeaf { .. } => methods::SUBSCRIBE_POLL_LEAF,
            Self::CdbOper { .. } => methods::SUBSCRIBE_CDBOPER,
            Self::Upgrade => methods::SUBSCRIBE_UPGRADE,
            Self::JsonRpcBatch => methods::SUBSCRIBE_JSONRPC_BATCH,
        }
    }

    /// Parameters of the `subscribe_*` call on channel `comet_id`.
    pub fn params(&self, comet_id: &CometId) -> Value {
        match self {
            Self::Changes { path } | Self::CdbOper { path } => {
                json!({"comet_id": comet_id, "path": path})
            }
            Self::PollLeaf { path, interval } => {
                json!({"comet_id": comet_id, "path": path, "interval": interval})
            }
            Self::Upgrade | Self::JsonRpcBatch => json!({"comet_id": comet_id}),
        }
    }
}

/// Issue one `comet` long-poll on `comet_id` and decode its events.
pub(crate) async fn poll_comet(session: &Session, comet_id: &CometId) -> Result<Vec<CometEvent>> {
    let mapping = session
        .send_long_poll(methods::COMET, Some(json!({"comet_id": comet_id})))
        .await?;
    decode_comet_events(mapping)
}

/// Owner of one comet channel and its subscriptions.
#[derive(Debug)]
pub struct CometManager {
    session: Arc<Session>,
    transaction: TransactionContext,
    comet_id: CometId,
    handles: Vec<SubscriptionHandle>,
    started: bool,
}

impl CometManager {
    /// Create a stopped manager with a fresh comet id.
    ///
    /// The manager logs `session` in and out itself, so the session should
    /// be dedicated to it.
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_comet_id(session, CometId::generate())
    }

    /// Create a stopped manager on a caller-chosen comet id.
    pub fn with_comet_id(session: Arc<Session>, comet_id: CometId) -> Self {
        Self {
            transaction: TransactionContext::new(session.clone()),
            session,
            comet_id,
            handles: Vec::new(),
            started: false,
        }
    }

    /// Comet channel id.
    pub fn comet_id(&self) -> &CometId {
        &self.comet_id
    }

    /// Handles currently tracked on the channel.
    pub fn handles(&self) -> &[SubscriptionHandle] {
        &self.handles
    }

    /// Whether `start` succeeded and `stop` has not run since.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Session the manager runs on.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn require_started(&self) -> Result<()> {
        if self.started {
            Ok(())
        } else {
            Err(NsoError::state("comet is not running"))
        }
    }

    /// Log in, open the channel's read transaction and issue the first
    /// `comet` call.
    ///
    /// Fails with [`NsoError::State`] if already started. The first call
    /// returns before any subscription exists, so its result is dropped.
    #[tracing::instrument(skip_all, fields(comet_id = %self.comet_id))]
    pub async fn start(&mut self, username: &str, password: &str) -> Result<()> {
        if self.started {
            return Err(NsoError::state("comet is already running"));
        }

        self.session.login(username, password).await?;
        if !self.transaction.is_open() {
            let _ = self
                .transaction
                .open(
                    TransactionMode::Read,
                    ConfMode::Private,
                    self.comet_id.as_str(),
                    OnPendingChanges::Reuse,
                )
                .await?;
        }
        let _ = poll_comet(&self.session, &self.comet_id).await?;

        self.started = true;
        info!("comet started");
        Ok(())
    }

    /// Subscribe and arm the subscription.
    ///
    /// The handle is tracked as soon as the server issues it, so a failed
    /// `start_subscription` is still cleaned up by [`stop`](Self::stop).
    #[tracing::instrument(skip_all, fields(comet_id = %self.comet_id, method = subscription.method()))]
    pub async fn subscribe(&mut self, subscription: Subscription) -> Result<SubscriptionHandle> {
        self.require_started()?;

        let method = subscription.method();
        let RpcResult::SubscriptionOpened { handle } = self
            .session
            .call(method, Some(subscription.params(&self.comet_id)))
            .await?
        else {
            return Err(NsoError::decode(format!("{method} did not return a handle")));
        };
        self.handles.push(handle.clone());

        let _ = self
            .session
            .send(methods::START_SUBSCRIPTION, Some(json!({"handle": handle})))
            .await?;
        info!(%handle, "subscription armed");
        Ok(handle)
    }

    /// Watch configuration changes under `path`.
    pub async fn subscribe_changes(&mut self, path: &str) -> Result<SubscriptionHandle> {
        self.subscribe(Subscription::Changes { path: path.into() })
            .await
    }

    /// Sample the leaf at `path` every `interval` seconds.
    pub async fn subscribe_poll_leaf(
        &mut self,
        path: &str,
        interval: u32,
    ) -> Result<SubscriptionHandle> {
        self.subscribe(Subscription::PollLeaf {
            path: path.into(),
            interval,
        })
        .await
    }

    /// Watch operational data under `path`.
    pub async fn subscribe_cdboper(&mut self, path: &str) -> Result<SubscriptionHandle> {
        self.subscribe(Subscription::CdbOper { path: path.into() })
            .await
    }

    /// Watch upgrade progress.
    pub async fn subscribe_upgrade(&mut self) -> Result<SubscriptionHandle> {
        self.subscribe(Subscription::Upgrade).await
    }

    /// Watch JSON-RPC batch completions.
    pub async fn subscribe_jsonrpc_batch(&mut self) -> Result<SubscriptionHandle> {
        self.subscribe(Subscription::JsonRpcBatch).await
    }

    /// Subscriptions the server holds for this session.
    pub async fn get_subscriptions(&self) -> Result<ResultMapping> {
        self.require_started()?;
        self.session.send(methods::GET_SUBSCRIPTIONS, None).await
    }

    /// Wait for the next batch of events.
    pub async fn poll(&self) -> Result<Vec<CometEvent>> {
        self.require_started()?;
        poll_comet(&self.session, &self.comet_id).await
    }

    /// Run [`poll`](Self::poll) on a background task.
    ///
    /// Shut the poller down before calling [`stop`](Self::stop).
    pub fn spawn_poller(&self, config: PollerConfig) -> Result<PollerHandle> {
        self.require_started()?;
        Ok(spawn_poller(
            self.session.clone(),
            self.comet_id.clone(),
            config,
        ))
    }

    /// Unsubscribe every tracked handle, drain the channel and log out.
    ///
    /// Teardown continues past failures; the first one is returned after the
    /// manager is back in the stopped state.
    #[tracing::instrument(skip_all, fields(comet_id = %self.comet_id))]
    pub async fn stop(&mut self) -> Result<()> {
        self.require_started()?;

        let mut first_error = None;
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = self
                .session
                .send(methods::UNSUBSCRIBE, Some(json!({"handle": handle})))
                .await
            {
                warn!(%handle, error = %e, "unsubscribe failed");
                let _ = first_error.get_or_insert(e);
            }
        }

        if let Err(e) = poll_comet(&self.session, &self.comet_id).await {
            warn!(error = %e, "final comet drain failed");
            let _ = first_error.get_or_insert(e);
        }

        if let Err(e) = self.session.logout().await {
            warn!(error = %e, "comet logout failed");
            let _ = first_error.get_or_insert(e);
        }

        self.transaction.invalidate();
        self.started = false;
        info!("comet stopped");
        first_error.map_or(Ok(()), Err)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, scripted_session};
    use assert_matches::assert_matches;

    async fn started(transport: &Arc<ScriptedTransport>) -> CometManager {
        transport.reply(json!({}));
        transport.reply(json!({"th": 11}));
        transport.reply(json!([]));
        let mut comet = CometManager::with_comet_id(scripted_session(transport), "remote-comet-1".into());
        comet.start("admin", "admin").await.unwrap();
        comet
    }

    #[test]
    fn subscription_params() {
        let id = CometId::from("c");
        assert_eq!(
            Subscription::PollLeaf {
                path: "/a".into(),
                interval: 30
            }
            .params(&id),
            json!({"comet_id": "c", "path": "/a", "interval": 30})
        );
        assert_eq!(Subscription::Upgrade.params(&id), json!({"comet_id": "c"}));
        assert_eq!(Subscription::JsonRpcBatch.method(), "subscribe_jsonrpc_batch");
        assert_eq!(
            Subscription::CdbOper { path: "/x".into() }.method(),
            "subscribe_cdboper"
        );
    }

    #[test]
    fn generated_ids_are_unique() {
        let transport = ScriptedTransport::new();
        let a = CometManager::new(scripted_session(&transport));
        let b = CometManager::new(scripted_session(&transport));
        assert!(a.comet_id().as_str().starts_with(nso_core::ids::COMET_ID_PREFIX));
        assert_ne!(a.comet_id(), b.comet_id());
    }

    #[tokio::test]
    async fn start_logs_in_opens_tagged_transaction_and_polls() {
        let transport = ScriptedTransport::new();
        let comet = started(&transport).await;

        assert!(comet.is_started());
        assert!(comet.session().is_authenticated());
        assert_eq!(transport.methods(), vec!["login", "new_trans", "comet"]);

        let calls = transport.calls();
        assert_eq!(
            calls[1].params,
            json!({
                "db": "running",
                "mode": "read",
                "conf_mode": "private",
                "tag": "remote-comet-1",
                "on_pending_changes": "reuse"
            })
        );
        assert_eq!(calls[2].params, json!({"comet_id": "remote-comet-1"}));
    }

    #[tokio::test]
    async fn start_twice_is_state_error() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        assert_matches!(comet.start("admin", "admin").await, Err(NsoError::State { .. }));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn calls_before_start_fail_locally() {
        let transport = ScriptedTransport::new();
        let mut comet = CometManager::new(scripted_session(&transport));

        assert_matches!(comet.subscribe_upgrade().await, Err(NsoError::State { .. }));
        assert_matches!(comet.poll().await, Err(NsoError::State { .. }));
        assert_matches!(comet.get_subscriptions().await, Err(NsoError::State { .. }));
        assert_matches!(comet.stop().await, Err(NsoError::State { .. }));
        assert_matches!(
            comet.spawn_poller(PollerConfig::default()),
            Err(NsoError::State { .. })
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn subscribe_tracks_then_arms() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        transport.reply(json!({"handle": "h-1"}));
        transport.reply(json!({}));

        let handle = comet.subscribe_changes("/devices").await.unwrap();
        assert_eq!(handle.as_str(), "h-1");
        assert_eq!(comet.handles(), [handle]);

        let calls = transport.calls();
        assert_eq!(calls[3].method, "subscribe_changes");
        assert_eq!(calls[3].params, json!({"comet_id": "remote-comet-1", "path": "/devices"}));
        assert_eq!(calls[4].method, "start_subscription");
        assert_eq!(calls[4].params, json!({"handle": "h-1"}));
    }

    #[tokio::test]
    async fn failed_subscribe_tracks_nothing() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        transport.reply_error(-32000, "bad path");
        transport.reply(json!({"no_handle": 1}));

        assert_matches!(comet.subscribe_cdboper("/x").await, Err(NsoError::Rpc { .. }));
        assert_matches!(comet.subscribe_cdboper("/x").await, Err(NsoError::Decode { .. }));
        assert!(comet.handles().is_empty());
    }

    #[tokio::test]
    async fn failed_arm_keeps_handle_for_cleanup() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        transport.reply(json!({"handle": "h-9"}));
        transport.reply_error(-32000, "cannot start");

        assert!(comet.subscribe_poll_leaf("/a", 5).await.is_err());
        assert_eq!(comet.handles().len(), 1);
    }

    #[tokio::test]
    async fn poll_decodes_events() {
        let transport = ScriptedTransport::new();
        let comet = started(&transport).await;
        transport.reply(json!([{"handle": "h-1", "message": {"changes": []}}]));

        let events = comet.poll().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].handle.as_str(), "h-1");
    }

    #[tokio::test]
    async fn stop_unsubscribes_every_handle() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        for h in ["h-1", "h-2", "h-3"] {
            transport.reply(json!({"handle": h}));
            transport.reply(json!({}));
        }
        let _ = comet.subscribe_changes("/a").await.unwrap();
        let _ = comet.subscribe_poll_leaf("/b", 10).await.unwrap();
        let _ = comet.subscribe_jsonrpc_batch().await.unwrap();

        for _ in 0..3 {
            transport.reply(json!({}));
        }
        transport.reply(json!([]));
        transport.reply(json!({}));

        comet.stop().await.unwrap();

        let unsubscribed: Vec<Value> = transport
            .calls()
            .into_iter()
            .filter(|c| c.method == "unsubscribe")
            .map(|c| c.params)
            .collect();
        assert_eq!(
            unsubscribed,
            vec![
                json!({"handle": "h-1"}),
                json!({"handle": "h-2"}),
                json!({"handle": "h-3"})
            ]
        );
        let methods = transport.methods();
        assert_eq!(&methods[methods.len() - 2..], ["comet", "logout"]);
        assert!(comet.handles().is_empty());
        assert!(!comet.is_started());
        assert!(!comet.session().is_authenticated());
    }

    #[tokio::test]
    async fn stop_continues_past_failures() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        for h in ["h-1", "h-2"] {
            transport.reply(json!({"handle": h}));
            transport.reply(json!({}));
        }
        let _ = comet.subscribe_upgrade().await.unwrap();
        let _ = comet.subscribe_upgrade().await.unwrap();

        transport.reply_error(-32000, "unknown handle");
        transport.reply(json!({}));
        transport.reply(json!([]));
        transport.reply(json!({}));

        let err = comet.stop().await.unwrap_err();
        assert_matches!(err, NsoError::Rpc { .. });
        assert_eq!(
            transport.methods().iter().filter(|m| *m == "unsubscribe").count(),
            2
        );
        assert!(!comet.is_started());
        assert!(comet.handles().is_empty());
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let transport = ScriptedTransport::new();
        let mut comet = started(&transport).await;
        transport.reply(json!([]));
        transport.reply(json!({}));
        comet.stop().await.unwrap();

        transport.reply(json!({}));
        transport.reply(json!({"th": 12}));
        transport.reply(json!([]));
        comet.start("admin", "admin").await.unwrap();
        assert!(comet.is_started());
    }
}

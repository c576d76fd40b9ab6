//! Transaction-scoped configuration API.
//!
//! A [`TransactionContext`] is either Closed or Open with a transaction
//! handle (`th`). `open` binds the handle from `new_trans`; a successful
//! `commit` or `abort` releases it. Every path operation injects `th` and is
//! rejected locally while Closed.
//!
//! The server does not validate on commit by itself; call
//! [`TransactionContext::validate_commit`] first when that matters.

use std::sync::Arc;

use nso_core::{NsoError, Result, TransactionHandle};
use nso_rpc::{ResultMapping, RpcResult, methods};
use serde_json::{Value, json};
use tracing::info;

use crate::params::{
    CommitOutput, ConfMode, DerefFormat, LoadFormat, LoadMode, OnPendingChanges,
    QueryResultFormat, ShowConfigFormat, TransactionMode,
};
use crate::session::Session;

/// Database every transaction is opened against.
pub const RUNNING_DB: &str = "running";

#[derive(Clone, Copy, Debug)]
struct OpenTransaction {
    th: TransactionHandle,
    /// Session epoch at open time.
    epoch: u64,
}

/// Owner of at most one open transaction.
#[derive(Debug)]
pub struct TransactionContext {
    session: Arc<Session>,
    open: Option<OpenTransaction>,
}

impl TransactionContext {
    /// Create a Closed context on `session`.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            open: None,
        }
    }

    /// Session the context issues its calls on.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Whether a transaction is open and still valid for the session.
    pub fn is_open(&self) -> bool {
        self.handle().is_ok()
    }

    /// Handle of the open transaction.
    pub fn handle(&self) -> Result<TransactionHandle> {
        match self.open {
            Some(open) if open.epoch == self.session.epoch() => Ok(open.th),
            Some(_) => Err(NsoError::state(
                "transaction handle was invalidated by logout",
            )),
            None => Err(NsoError::state("no transaction is open")),
        }
    }

    /// Forget the handle without contacting the server.
    pub fn invalidate(&mut self) {
        self.open = None;
    }

    fn close(&mut self, reason: &str) {
        if let Some(open) = self.open.take() {
            info!(th = %open.th, reason, "transaction closed");
        }
    }

    /// Send `method` with `params` plus this transaction's `th`.
    async fn send_scoped(&self, method: &str, params: Value) -> Result<ResultMapping> {
        let th = self.handle()?;
        let mut params = params;
        if let Value::Object(map) = &mut params {
            let _ = map.insert("th".into(), json!(th));
        }
        self.session.send(method, Some(params)).await
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open a transaction on the running database.
    ///
    /// Fails with [`NsoError::State`] if one is already open. If the call
    /// fails or returns no handle, the context stays Closed.
    #[tracing::instrument(skip_all, fields(mode = ?mode, conf_mode = ?conf_mode))]
    pub async fn open(
        &mut self,
        mode: TransactionMode,
        conf_mode: ConfMode,
        tag: &str,
        on_pending_changes: OnPendingChanges,
    ) -> Result<TransactionHandle> {
        if self.is_open() {
            return Err(NsoError::state("transaction is already open"));
        }

        let params = json!({
            "db": RUNNING_DB,
            "mode": mode,
            "conf_mode": conf_mode,
            "tag": tag,
            "on_pending_changes": on_pending_changes,
        });
        let RpcResult::TransactionOpened { th } =
            self.session.call(methods::NEW_TRANS, Some(params)).await?
        else {
            return Err(NsoError::decode("new_trans did not return a handle"));
        };

        self.open = Some(OpenTransaction {
            th,
            epoch: self.session.epoch(),
        });
        info!(%th, "transaction opened");
        Ok(th)
    }

    /// Commit the transaction.
    ///
    /// With `dry_run`, the server reports the diff in `output` format;
    /// `reverse` asks for the reverse diff and only applies to
    /// [`CommitOutput::Native`]. On success the context is Closed.
    #[tracing::instrument(skip_all, fields(dry_run = dry_run))]
    pub async fn commit(
        &mut self,
        dry_run: bool,
        output: CommitOutput,
        reverse: bool,
    ) -> Result<ResultMapping> {
        let flags = commit_flags(dry_run, output, reverse);
        let result = self
            .send_scoped(methods::COMMIT, json!({"flags": flags}))
            .await?;
        self.close("commit");
        Ok(result)
    }

    /// Abort request `request_id` on this transaction. On success the
    /// context is Closed.
    pub async fn abort(&mut self, request_id: u64) -> Result<ResultMapping> {
        let result = self
            .send_scoped(methods::ABORT, json!({"id": request_id}))
            .await?;
        self.close("abort");
        Ok(result)
    }

    /// Ask the server to validate pending changes.
    pub async fn validate_commit(&self) -> Result<ResultMapping> {
        self.send_scoped(methods::VALIDATE_COMMIT, json!({})).await
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Render the configuration under `path`.
    ///
    /// `max_size` of 0 disables the size limit.
    pub async fn show_config(
        &self,
        path: &str,
        result_as: ShowConfigFormat,
        with_oper: bool,
        max_size: u64,
    ) -> Result<ResultMapping> {
        self.send_scoped(
            methods::SHOW_CONFIG,
            json!({
                "path": path,
                "result_as": result_as,
                "with_oper": with_oper,
                "max_size": max_size,
            }),
        )
        .await
    }

    /// Follow the leafref at `path`.
    pub async fn deref(&self, path: &str, result_as: DerefFormat) -> Result<ResultMapping> {
        self.send_scoped(methods::DEREF, json!({"path": path, "result_as": result_as}))
            .await
    }

    /// Values the leafref at `path` may take.
    pub async fn get_leafref_values(
        &self,
        path: &str,
        skip_grouping: bool,
        keys: &[&str],
    ) -> Result<ResultMapping> {
        self.send_scoped(
            methods::GET_LEAFREF_VALUES,
            json!({"path": path, "skip_grouping": skip_grouping, "keys": keys}),
        )
        .await
    }

    /// Schema of `path`.
    pub async fn get_schema(&self, path: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::GET_SCHEMA, json!({"path": path}))
            .await
    }

    /// Keys of the list at `path`.
    pub async fn get_list_keys(&self, path: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::GET_LIST_KEYS, json!({"path": path}))
            .await
    }

    /// Value of the leaf at `path`.
    pub async fn get_value(&self, path: &str, check_default: bool) -> Result<ResultMapping> {
        self.send_scoped(
            methods::GET_VALUE,
            json!({"path": path, "check_default": check_default}),
        )
        .await
    }

    /// Values of `leafs` under `path`.
    pub async fn get_values(
        &self,
        path: &str,
        leafs: &[&str],
        check_default: bool,
    ) -> Result<ResultMapping> {
        self.send_scoped(
            methods::GET_VALUES,
            json!({"path": path, "leafs": leafs, "check_default": check_default}),
        )
        .await
    }

    /// Whether `path` exists.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let result = self
            .send_scoped(methods::EXISTS, json!({"path": path}))
            .await?;
        result
            .get("exists")
            .and_then(Value::as_bool)
            .ok_or_else(|| NsoError::decode("exists result has no boolean `exists` field"))
    }

    /// Active case of `choice` at `path`.
    pub async fn get_case(&self, path: &str, choice: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::GET_CASE, json!({"path": path, "choice": choice}))
            .await
    }

    /// Service points known to the server.
    pub async fn get_service_points(&self) -> Result<ResultMapping> {
        self.send_scoped(methods::GET_SERVICE_POINTS, json!({}))
            .await
    }

    /// Variables of the device template `name`.
    pub async fn get_template_variables(&self, name: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::GET_TEMPLATE_VARIABLES, json!({"name": name}))
            .await
    }

    /// Evaluate an XPath expression.
    pub async fn eval_xpath(&self, xpath_expr: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::EVAL_XPATH, json!({"xpath_expr": xpath_expr}))
            .await
    }

    /// One-shot query. Use [`QuerySession`](crate::QuerySession) for
    /// paginated results.
    pub async fn query(
        &self,
        xpath_expr: &str,
        result_as: QueryResultFormat,
    ) -> Result<ResultMapping> {
        self.send_scoped(
            methods::QUERY,
            json!({"xpath_expr": xpath_expr, "result_as": result_as}),
        )
        .await
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Invoke the action at `path` with `params` as input.
    pub async fn run_action(&self, path: &str, params: Value) -> Result<ResultMapping> {
        self.send_scoped(methods::RUN_ACTION, json!({"path": path, "params": params}))
            .await
    }

    /// Create the list entry or presence container at `path`.
    pub async fn create(&self, path: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::CREATE, json!({"path": path}))
            .await
    }

    /// Load `data` at `path`.
    pub async fn load(
        &self,
        data: &str,
        path: &str,
        format: LoadFormat,
        mode: LoadMode,
    ) -> Result<ResultMapping> {
        self.send_scoped(
            methods::LOAD,
            json!({"data": data, "path": path, "format": format, "mode": mode}),
        )
        .await
    }

    /// Set the leaf at `path` to `value`.
    pub async fn set_value(&self, path: &str, value: Value, dry_run: bool) -> Result<ResultMapping> {
        self.send_scoped(
            methods::SET_VALUE,
            json!({"path": path, "value": value, "dryrun": dry_run}),
        )
        .await
    }

    /// Delete `path`.
    pub async fn delete(&self, path: &str) -> Result<ResultMapping> {
        self.send_scoped(methods::DELETE, json!({"path": path}))
            .await
    }
}

/// `flags` of a `commit` call.
pub fn commit_flags(dry_run: bool, output: CommitOutput, reverse: bool) -> Vec<String> {
    if !dry_run {
        return Vec::new();
    }
    let mut flags = vec![format!("dry-run={}", output.as_str())];
    if output == CommitOutput::Native && reverse {
        flags.push("dry-run-reverse".to_owned());
    }
    flags
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

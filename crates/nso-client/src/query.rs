//! Paginated queries.
//!
//! ```text
//! Idle --start--> Active(qh, offset 0) --run--> Active(offset += rows)
//!                   Active --reset--> Active(offset 0)
//!                   Active --stop--> Idle
//! ```
//!
//! A query is selected either by an XPath expression or by a key path, never
//! both. Optional parameters are only sent when set.

use std::sync::Arc;

use nso_core::{NsoError, QueryHandle, Result};
use nso_rpc::{RpcResult, methods};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::params::{QueryResultFormat, SortOrder};
use crate::session::Session;
use crate::transaction::TransactionContext;

/// What a query selects and how results are paged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryCriteria {
    xpath_expr: Option<String>,
    path: Option<String>,
    selection: Vec<String>,
    sort: Vec<String>,
    sort_order: Option<SortOrder>,
    context_node: Option<String>,
    chunk_size: u32,
    initial_offset: u32,
    include_total: bool,
    result_as: QueryResultFormat,
}

impl QueryCriteria {
    /// Select nodes by XPath expression.
    pub fn xpath(xpath_expr: impl Into<String>) -> Self {
        Self::default().with_xpath_expr(xpath_expr)
    }

    /// Select nodes by key path.
    pub fn path(path: impl Into<String>) -> Self {
        Self::default().with_path(path)
    }

    /// Set the XPath expression.
    #[must_use]
    pub fn with_xpath_expr(mut self, xpath_expr: impl Into<String>) -> Self {
        self.xpath_expr = non_empty(xpath_expr.into());
        self
    }

    /// Set the key path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = non_empty(path.into());
        self
    }

    /// Leafs to return per result, relative to each selected node.
    /// Only sent with an XPath expression.
    #[must_use]
    pub fn with_selection<I, S>(mut self, selection: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection = selection.into_iter().map(Into::into).collect();
        self
    }

    /// XPath expressions to sort by. Only sent with an XPath expression.
    #[must_use]
    pub fn with_sort<I, S>(mut self, sort: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    /// Sort direction.
    #[must_use]
    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    /// Context node for the key path. Only sent with a key path.
    #[must_use]
    pub fn with_context_node(mut self, context_node: impl Into<String>) -> Self {
        self.context_node = non_empty(context_node.into());
        self
    }

    /// Rows per `run_query`; 0 returns everything at once.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Row the server starts from.
    #[must_use]
    pub fn with_initial_offset(mut self, initial_offset: u32) -> Self {
        self.initial_offset = initial_offset;
        self
    }

    /// Ask the server to include the total number of results.
    #[must_use]
    pub fn with_include_total(mut self, include_total: bool) -> Self {
        self.include_total = include_total;
        self
    }

    /// Result rendering.
    #[must_use]
    pub fn with_result_as(mut self, result_as: QueryResultFormat) -> Self {
        self.result_as = result_as;
        self
    }

    /// Rows per `run_query`.
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// `start_query` parameters, without `th`.
    ///
    /// Fails with [`NsoError::Validation`] unless exactly one of the XPath
    /// expression and the key path is set.
    pub fn to_params(&self) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        match (&self.xpath_expr, &self.path) {
            (Some(xpath_expr), None) => {
                let _ = params.insert("xpath_expr".into(), json!(xpath_expr));
                if !self.selection.is_empty() {
                    let _ = params.insert("selection".into(), json!(self.selection));
                }
                if !self.sort.is_empty() {
                    let _ = params.insert("sort".into(), json!(self.sort));
                }
            }
            (None, Some(path)) => {
                let _ = params.insert("path".into(), json!(path));
                if let Some(context_node) = &self.context_node {
                    let _ = params.insert("context_node".into(), json!(context_node));
                }
            }
            (Some(_), Some(_)) => {
                return Err(NsoError::validation(
                    "query takes either an XPath expression or a path, not both",
                ));
            }
            (None, None) => {
                return Err(NsoError::validation(
                    "query needs an XPath expression or a path",
                ));
            }
        }

        let _ = params.insert("chunk_size".into(), json!(self.chunk_size));
        let _ = params.insert("initial_offset".into(), json!(self.initial_offset));
        if let Some(sort_order) = self.sort_order {
            let _ = params.insert("sort_order".into(), json!(sort_order));
        }
        let _ = params.insert("include_total".into(), json!(self.include_total));
        let _ = params.insert("result_as".into(), json!(self.result_as));
        Ok(params)
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

#[derive(Clone, Copy, Debug)]
struct ActiveQuery {
    qh: QueryHandle,
    chunk_size: u32,
    /// Rows returned since start or the last reset.
    offset: u64,
}

/// Owner of at most one running query.
#[derive(Debug)]
pub struct QuerySession {
    session: Arc<Session>,
    active: Option<ActiveQuery>,
}

impl QuerySession {
    /// Create an Idle query session.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            active: None,
        }
    }

    /// Whether a query is running.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Handle of the running query.
    pub fn handle(&self) -> Result<QueryHandle> {
        self.active
            .map(|a| a.qh)
            .ok_or_else(|| NsoError::state("no query is active"))
    }

    /// Rows fetched since start or the last reset; 0 while Idle.
    pub fn offset(&self) -> u64 {
        self.active.map_or(0, |a| a.offset)
    }

    /// Chunk size of the running query.
    pub fn chunk_size(&self) -> Option<u32> {
        self.active.map(|a| a.chunk_size)
    }

    /// Start a query on `transaction`.
    ///
    /// Fails with [`NsoError::State`] if a query is already active or the
    /// transaction is not open, and with [`NsoError::Validation`] if the
    /// criteria are unusable or the transaction belongs to another session.
    /// Neither case contacts the server.
    #[tracing::instrument(skip_all)]
    pub async fn start(
        &mut self,
        transaction: &TransactionContext,
        criteria: &QueryCriteria,
    ) -> Result<QueryHandle> {
        if self.active.is_some() {
            return Err(NsoError::state("query is already active"));
        }
        let th = transaction.handle()?;
        if !Arc::ptr_eq(transaction.session(), &self.session) {
            return Err(NsoError::validation(
                "transaction belongs to a different session",
            ));
        }
        let mut params = criteria.to_params()?;
        let _ = params.insert("th".into(), json!(th));

        let RpcResult::QueryStarted { qh } = self
            .session
            .call(methods::START_QUERY, Some(Value::Object(params)))
            .await?
        else {
            return Err(NsoError::decode("start_query did not return a handle"));
        };

        self.active = Some(ActiveQuery {
            qh,
            chunk_size: criteria.chunk_size(),
            offset: 0,
        });
        debug!(%qh, %th, "query started");
        Ok(qh)
    }

    /// Fetch the next chunk as rows of cells.
    pub async fn run_rows(&mut self) -> Result<Vec<Vec<String>>> {
        let qh = self.handle()?;
        let rows = self
            .session
            .send(methods::RUN_QUERY, Some(json!({"qh": qh})))
            .await?
            .query_rows()?;
        if let Some(active) = &mut self.active {
            active.offset += rows.len() as u64;
        }
        Ok(rows)
    }

    /// Fetch the next chunk as one flat sequence of cells.
    ///
    /// `"[[a b] [c d]]"` yields `["a", "b", "c", "d"]`.
    pub async fn run(&mut self) -> Result<Vec<String>> {
        self.run_rows()
            .await
            .map(|rows| rows.into_iter().flatten().collect())
    }

    /// Rewind the query to its first row.
    pub async fn reset(&mut self) -> Result<()> {
        let qh = self.handle()?;
        let _ = self
            .session
            .send(methods::RESET_QUERY, Some(json!({"qh": qh})))
            .await?;
        if let Some(active) = &mut self.active {
            active.offset = 0;
        }
        Ok(())
    }

    /// Stop the query and release its handle.
    pub async fn stop(&mut self) -> Result<()> {
        let qh = self.handle()?;
        let _ = self
            .session
            .send(methods::STOP_QUERY, Some(json!({"qh": qh})))
            .await?;
        self.active = None;
        debug!(%qh, "query stopped");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Authenticated JSON-RPC session.
//!
//! [`Session`] is the single call path to the server. It owns the endpoint,
//! credentials, request-id generator, transport (and through it the cookie
//! jar) and the authentication state. Every higher-level component issues its
//! calls through [`Session::send`] or [`Session::call`].
//!
//! A session is shared behind `Arc`. Logging out bumps an internal epoch, so
//! transactions opened before the logout can tell their handle is gone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use nso_core::{NsoError, RequestIdGenerator, Result, SystemResolver};
use nso_rpc::{ResultMapping, RpcRequest, RpcResult, decode_response, methods};
use nso_settings::ConnectionSettings;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::params::SystemSettingOperation;
use crate::transport::{HttpTransport, Transport};

/// Default timeout for ordinary calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for `comet` long-poll calls.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(120);

/// Login credentials. The password never appears in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Login user.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transport policy of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Verify the server certificate for `https`.
    pub tls_verify: bool,
    /// Timeout for ordinary calls.
    pub request_timeout: Duration,
    /// Timeout for `comet` long-poll calls.
    pub poll_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tls_verify: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

#[derive(Debug, Default)]
struct AuthState {
    authenticated: bool,
    /// Incremented on every successful logout.
    epoch: u64,
}

/// One authenticated conversation with the server.
pub struct Session {
    endpoint: Endpoint,
    credentials: Credentials,
    options: SessionOptions,
    transport: Arc<dyn Transport>,
    request_ids: RequestIdGenerator,
    auth: Mutex<AuthState>,
}

impl Session {
    /// Create a session using the default HTTP transport.
    pub fn new(endpoint: Endpoint, credentials: Credentials, options: SessionOptions) -> Result<Self> {
        let transport = HttpTransport::new(endpoint.url(), options.tls_verify)?;
        Ok(Self::with_transport(
            endpoint,
            credentials,
            options,
            Arc::new(transport),
        ))
    }

    /// Create a session over a caller-supplied transport.
    pub fn with_transport(
        endpoint: Endpoint,
        credentials: Credentials,
        options: SessionOptions,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            options,
            transport,
            request_ids: RequestIdGenerator::new(),
            auth: Mutex::new(AuthState::default()),
        }
    }

    /// Create a session from loaded connection settings.
    ///
    /// The host is resolved with [`SystemResolver`].
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        let endpoint = Endpoint::new(
            &settings.protocol,
            &settings.host,
            u32::from(settings.port),
            &SystemResolver,
        )?;
        let options = SessionOptions {
            tls_verify: settings.tls_verify,
            request_timeout: Duration::from_millis(settings.request_timeout_ms),
            poll_timeout: Duration::from_millis(settings.poll_timeout_ms),
        };
        Self::new(
            endpoint,
            Credentials::new(&settings.username, &settings.password),
            options,
        )
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Server endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// URL every request is posted to.
    pub fn url(&self) -> String {
        self.endpoint.url()
    }

    /// Transport policy.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Credentials the session was created with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Whether `login` succeeded and no `logout` followed.
    pub fn is_authenticated(&self) -> bool {
        self.auth.lock().authenticated
    }

    /// Number of completed logouts. Handles bound under an older epoch are
    /// no longer valid on the server.
    pub(crate) fn epoch(&self) -> u64 {
        self.auth.lock().epoch
    }

    /// Take the next request id of this session.
    pub fn next_request_id(&self) -> u64 {
        self.request_ids.next_id()
    }

    // ── Call path ───────────────────────────────────────────────────

    /// Send `method` with `params` and decode the result.
    ///
    /// A server `error` envelope becomes [`NsoError::Rpc`]; transport failures
    /// become [`NsoError::Transport`] or [`NsoError::Timeout`].
    pub async fn send(&self, method: &str, params: Option<Value>) -> Result<ResultMapping> {
        self.dispatch(method, params, self.options.request_timeout)
            .await
    }

    /// Like [`send`](Self::send), but with the long-poll timeout.
    pub async fn send_long_poll(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<ResultMapping> {
        self.dispatch(method, params, self.options.poll_timeout).await
    }

    /// Send `method` and tag the result by method.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<RpcResult> {
        let mapping = self.send(method, params).await?;
        RpcResult::for_method(method, mapping)
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<ResultMapping> {
        let id = self.next_request_id();
        let body = serde_json::to_vec(&RpcRequest::new(id, method, params))?;
        debug!(method, id, "sending request");

        let raw = self.transport.post(body, timeout).await.inspect_err(|e| {
            debug!(method, id, category = e.category(), error = %e, "transport failed");
        })?;

        decode_response(&raw, id)
            .inspect(|_| debug!(method, id, "received result"))
            .inspect_err(|e| {
                debug!(method, id, category = e.category(), error = %e, "request failed");
            })
    }

    // ── Session methods ─────────────────────────────────────────────

    /// Authenticate as `username`.
    #[tracing::instrument(skip_all, fields(user = username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let _ = self
            .send(
                methods::LOGIN,
                Some(json!({"user": username, "passwd": password})),
            )
            .await?;
        self.auth.lock().authenticated = true;
        info!(endpoint = %self.endpoint, "logged in");
        Ok(())
    }

    /// Authenticate with the credentials the session was created with.
    pub async fn login_with_credentials(&self) -> Result<()> {
        let Credentials { username, password } = &self.credentials;
        self.login(username, password).await
    }

    /// End the session.
    ///
    /// Fails with [`NsoError::State`], without contacting the server, when
    /// the session is not logged in. A failed call leaves the session
    /// authenticated.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self) -> Result<()> {
        if !self.is_authenticated() {
            return Err(NsoError::state("session is not logged in"));
        }
        let _ = self.send(methods::LOGOUT, None).await?;
        {
            let mut auth = self.auth.lock();
            auth.authenticated = false;
            auth.epoch += 1;
        }
        info!(endpoint = %self.endpoint, "logged out");
        Ok(())
    }

    /// List the transactions of this session.
    pub async fn get_trans(&self) -> Result<ResultMapping> {
        self.send(methods::GET_TRANS, None).await
    }

    /// Read system settings.
    pub async fn get_system_setting(
        &self,
        operation: SystemSettingOperation,
    ) -> Result<ResultMapping> {
        self.send(
            methods::GET_SYSTEM_SETTING,
            Some(json!({"operation": operation})),
        )
        .await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("options", &self.options)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Method names of the NSO JSON-RPC API used by the client.

// ── Session ─────────────────────────────────────────────────────────

/// Authenticate the session.
pub const LOGIN: &str = "login";
/// End the session.
pub const LOGOUT: &str = "logout";
/// List the session's transactions.
pub const GET_TRANS: &str = "get_trans";
/// Read a system setting.
pub const GET_SYSTEM_SETTING: &str = "get_system_setting";

// ── Transaction ─────────────────────────────────────────────────────

/// Open a transaction, yielding `th`.
pub const NEW_TRANS: &str = "new_trans";
/// Abort a request on the transaction.
pub const ABORT: &str = "abort";
/// Evaluate an XPath expression.
pub const EVAL_XPATH: &str = "eval_xpath";
/// Render configuration under a path.
pub const SHOW_CONFIG: &str = "show_config";
/// Follow a leafref.
pub const DEREF: &str = "deref";
/// Possible values of a leafref.
pub const GET_LEAFREF_VALUES: &str = "get_leafref_values";
/// Invoke an action.
pub const RUN_ACTION: &str = "run_action";
/// Schema of a path.
pub const GET_SCHEMA: &str = "get_schema";
/// Keys of a list.
pub const GET_LIST_KEYS: &str = "get_list_keys";
/// Read one leaf.
pub const GET_VALUE: &str = "get_value";
/// Read several leafs.
pub const GET_VALUES: &str = "get_values";
/// Create a list entry or presence container.
pub const CREATE: &str = "create";
/// Check whether a path exists.
pub const EXISTS: &str = "exists";
/// Selected case of a choice.
pub const GET_CASE: &str = "get_case";
/// Load JSON or XML configuration.
pub const LOAD: &str = "load";
/// Write one leaf.
pub const SET_VALUE: &str = "set_value";
/// Validate the transaction before commit.
pub const VALIDATE_COMMIT: &str = "validate_commit";
/// Commit the transaction.
pub const COMMIT: &str = "commit";
/// Delete a path.
pub const DELETE: &str = "delete";
/// List service points.
pub const GET_SERVICE_POINTS: &str = "get_service_points";
/// Variables of a device template.
pub const GET_TEMPLATE_VARIABLES: &str = "get_template_variables";
/// One-shot query.
pub const QUERY: &str = "query";

// ── Paginated query ─────────────────────────────────────────────────

/// Start a paginated query, yielding `qh`.
pub const START_QUERY: &str = "start_query";
/// Fetch the next chunk.
pub const RUN_QUERY: &str = "run_query";
/// Rewind the query.
pub const RESET_QUERY: &str = "reset_query";
/// Release the query.
pub const STOP_QUERY: &str = "stop_query";

// ── Comet ───────────────────────────────────────────────────────────

/// Subscribe to configuration changes.
pub const SUBSCRIBE_CHANGES: &str = "subscribe_changes";
/// Subscribe to a polled leaf.
pub const SUBSCRIBE_POLL_LEAF: &str = "subscribe_poll_leaf";
/// Subscribe to CDB operational data changes.
pub const SUBSCRIBE_CDBOPER: &str = "subscribe_cdboper";
/// Subscribe to upgrade events.
pub const SUBSCRIBE_UPGRADE: &str = "subscribe_upgrade";
/// Subscribe to JSON-RPC batch events.
pub const SUBSCRIBE_JSONRPC_BATCH: &str = "subscribe_jsonrpc_batch";
/// List the session's subscriptions.
pub const GET_SUBSCRIPTIONS: &str = "get_subscriptions";
/// Long-poll for comet events.
pub const COMET: &str = "comet";
/// Arm a subscription.
pub const START_SUBSCRIPTION: &str = "start_subscription";
/// Release a subscription.
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// Whether `method` returns a subscription handle.
pub fn is_subscribe(method: &str) -> bool {
    matches!(
        method,
        SUBSCRIBE_CHANGES
            | SUBSCRIBE_POLL_LEAF
            | SUBSCRIBE_CDBOPER
            | SUBSCRIBE_UPGRADE
            | SUBSCRIBE_JSONRPC_BATCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_methods() {
        assert!(is_subscribe(SUBSCRIBE_CHANGES));
        assert!(is_subscribe(SUBSCRIBE_JSONRPC_BATCH));
        assert!(!is_subscribe(START_SUBSCRIPTION));
        assert!(!is_subscribe(GET_SUBSCRIPTIONS));
    }
}

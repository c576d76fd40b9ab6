//! Typed parameter values for JSON-RPC methods.
//!
//! Each enum serializes to the exact string the server expects.

use serde::{Deserialize, Serialize};

/// `mode` of `new_trans`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    /// Read-only transaction.
    #[default]
    Read,
    /// Read-write transaction.
    ReadWrite,
}

/// `conf_mode` of `new_trans`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfMode {
    /// Changes are local to the transaction until commit.
    #[default]
    Private,
    /// Changes are visible to other shared transactions.
    Shared,
    /// The configuration is locked for other writers.
    Exclusive,
}

/// `on_pending_changes` of `new_trans`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnPendingChanges {
    /// Reuse a pending transaction of the session.
    #[default]
    Reuse,
    /// Fail if pending changes exist.
    Reject,
    /// Drop pending changes.
    Discard,
}

/// Diff format of a dry-run commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutput {
    /// CLI-style diff.
    #[default]
    Cli,
    /// Device-native diff.
    Native,
    /// XML diff.
    Xml,
}

impl CommitOutput {
    /// Wire string, as used inside the `dry-run=<output>` flag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Native => "native",
            Self::Xml => "xml",
        }
    }
}

/// `result_as` of `show_config`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowConfigFormat {
    /// Rendered text.
    #[default]
    String,
    /// JSON tree.
    Json,
}

/// `result_as` of `deref`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DerefFormat {
    /// Key paths of the targets.
    #[default]
    Paths,
    /// The single target.
    Target,
    /// Targets as list entries.
    ListTarget,
}

/// `format` of `load`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadFormat {
    /// JSON payload.
    #[default]
    Json,
    /// XML payload.
    Xml,
}

/// `mode` of `load`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Fail if data already exists.
    Create,
    /// Merge into existing data.
    #[default]
    Merge,
    /// Replace existing data.
    Replace,
}

/// `result_as` of `query` and `start_query`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResultFormat {
    /// Selected values as strings.
    #[default]
    #[serde(rename = "string")]
    String,
    /// Key path and value pairs.
    #[serde(rename = "keypath-value")]
    KeypathValue,
    /// Leaf values rendered as strings.
    #[serde(rename = "leaf_value_as_string")]
    LeafValueAsString,
}

/// `sort_order` of `start_query`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// `operation` of `get_system_setting`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemSettingOperation {
    /// Server capabilities.
    Capabilities,
    /// Web UI customizations.
    Customizations,
    /// Loaded YANG models.
    Models,
    /// Current user.
    User,
    /// Server version.
    Version,
    /// Everything above.
    #[default]
    All,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn wire<T: Serialize>(v: T) -> Value {
        serde_json::to_value(v).unwrap()
    }

    #[test]
    fn transaction_params() {
        assert_eq!(wire(TransactionMode::ReadWrite), json!("read_write"));
        assert_eq!(wire(ConfMode::Exclusive), json!("exclusive"));
        assert_eq!(wire(OnPendingChanges::Discard), json!("discard"));
    }

    #[test]
    fn mixed_case_formats() {
        assert_eq!(wire(DerefFormat::ListTarget), json!("list-target"));
        assert_eq!(wire(QueryResultFormat::KeypathValue), json!("keypath-value"));
        assert_eq!(
            wire(QueryResultFormat::LeafValueAsString),
            json!("leaf_value_as_string")
        );
    }

    #[test]
    fn commit_output_matches_serde() {
        for out in [CommitOutput::Cli, CommitOutput::Native, CommitOutput::Xml] {
            assert_eq!(wire(out), json!(out.as_str()));
        }
    }

    #[test]
    fn remaining_params() {
        assert_eq!(wire(LoadMode::Replace), json!("replace"));
        assert_eq!(wire(LoadFormat::Xml), json!("xml"));
        assert_eq!(wire(ShowConfigFormat::Json), json!("json"));
        assert_eq!(wire(SortOrder::Descending), json!("descending"));
        assert_eq!(wire(SystemSettingOperation::Version), json!("version"));
    }
}

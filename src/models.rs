//! Core data types shared across modules.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document: an ordered mapping of field name to JSON value.
///
/// `serde_json`'s `preserve_order` feature keeps field order stable across
/// read-modify-write cycles.
pub type Record = serde_json::Map<String, Value>;

/// The full decoded content of one remote file, in file order.
pub type Collection = Vec<Record>;

/// Result of pulling a file from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct PullResult {
    /// Decoded text content, absent when the platform returned no body.
    pub content: Option<String>,
    /// Content hash ("sha") identifying the pulled version. Required for
    /// subsequent writes on GitHub; GitLab pulls do not carry one.
    pub sha: Option<String>,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Path relative to the tree root.
    pub path: String,
    /// `"tree"` for directories, `"blob"` for files.
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.entry_type == "tree"
    }

    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

/// A collection file within a database directory, as reported by
/// `get_collections`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    /// File path relative to the database directory.
    pub collection: String,
    /// File size in bytes.
    pub size: u64,
}

/// Repository access information, used to confirm write access before a
/// mutation is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct AclInfo {
    pub private: bool,
    /// Whether the authenticated token may push to the repository.
    pub push_allowed: bool,
}

/// Severity attached to a [`TestReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLevel {
    Ok,
    Warning,
    Error,
}

/// Outcome of a validation probe: path validity, reachability and write
/// permission, without mutating anything.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestReport {
    pub valid: bool,
    pub code: u16,
    pub level: TestLevel,
    pub description: String,
}

//! Client options.
//!
//! [`Options`] holds the per-client configuration: default namespace, owner
//! and branch used to complete partially specified paths, commit metadata
//! for writes, CSV dialect, strict schema settings, cache TTL and the
//! access token. [`OptionsPatch`] is the partial form accepted by
//! `Gitrows::configure`; unset fields leave the current value untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::path::Namespace;

/// Commit author recorded on every write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            name: "GitRowsPack".to_string(),
            email: "s4nixd@gmail.com".to_string(),
        }
    }
}

/// CSV dialect settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    pub delimiter: char,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Per-client configuration. See module docs for field roles.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Default namespace for paths that do not carry one.
    pub ns: Namespace,
    /// Default repository owner.
    pub owner: Option<String>,
    /// Default repository name.
    pub repo: Option<String>,
    /// Default branch; `master` when unset.
    pub branch: Option<String>,
    /// Commit message prefix; a millisecond timestamp is appended per write.
    pub message: String,
    pub author: Author,
    pub csv: CsvOptions,
    /// When set together with `columns`, every written record is coerced to
    /// exactly that column list.
    pub strict: bool,
    /// Column list applied in strict mode.
    pub columns: Option<Vec<String>>,
    /// Fill value for columns missing from a record in strict mode.
    #[serde(rename = "default")]
    pub default_value: Option<Value>,
    /// Read cache time-to-live in milliseconds.
    #[serde(rename = "cacheTTL")]
    pub cache_ttl_ms: u64,
    /// Personal access token. Absent means read-only: writes fail with 401
    /// before any network call. Never serialized or logged.
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ns: Namespace::GitHub,
            owner: None,
            repo: None,
            branch: None,
            message: "GitRowsPack API Post".to_string(),
            author: Author::default(),
            csv: CsvOptions::default(),
            strict: false,
            columns: None,
            default_value: None,
            cache_ttl_ms: 5000,
            token: None,
        }
    }
}

// Token is redacted: error payloads and debug logs must never leak the
// credential.
impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("ns", &self.ns)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("message", &self.message)
            .field("author", &self.author)
            .field("csv", &self.csv)
            .field("strict", &self.strict)
            .field("columns", &self.columns)
            .field("default_value", &self.default_value)
            .field("cache_ttl_ms", &self.cache_ttl_ms)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Partial options: every field optional, unset fields keep the current
/// value when applied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OptionsPatch {
    pub ns: Option<Namespace>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub message: Option<String>,
    pub author: Option<Author>,
    pub csv: Option<CsvOptions>,
    pub strict: Option<bool>,
    pub columns: Option<Vec<String>>,
    #[serde(rename = "default")]
    pub default_value: Option<Value>,
    #[serde(rename = "cacheTTL")]
    pub cache_ttl_ms: Option<u64>,
    pub token: Option<String>,
}

impl OptionsPatch {
    /// Merge the set fields of this patch into `options`.
    pub fn apply(self, options: &mut Options) {
        if let Some(ns) = self.ns {
            options.ns = ns;
        }
        if let Some(owner) = self.owner {
            options.owner = Some(owner);
        }
        if let Some(repo) = self.repo {
            options.repo = Some(repo);
        }
        if let Some(branch) = self.branch {
            options.branch = Some(branch);
        }
        if let Some(message) = self.message {
            options.message = message;
        }
        if let Some(author) = self.author {
            options.author = author;
        }
        if let Some(csv) = self.csv {
            options.csv = csv;
        }
        if let Some(strict) = self.strict {
            options.strict = strict;
        }
        if let Some(columns) = self.columns {
            options.columns = Some(columns);
        }
        if let Some(default_value) = self.default_value {
            options.default_value = Some(default_value);
        }
        if let Some(ttl) = self.cache_ttl_ms {
            options.cache_ttl_ms = ttl;
        }
        if let Some(token) = self.token {
            options.token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = Options::default();
        assert_eq!(opts.ns, Namespace::GitHub);
        assert_eq!(opts.message, "GitRowsPack API Post");
        assert_eq!(opts.author.name, "GitRowsPack");
        assert_eq!(opts.author.email, "s4nixd@gmail.com");
        assert_eq!(opts.csv.delimiter, ',');
        assert!(!opts.strict);
        assert_eq!(opts.default_value, None);
        assert_eq!(opts.cache_ttl_ms, 5000);
        assert_eq!(opts.token, None);
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut opts = Options::default();
        let patch = OptionsPatch {
            branch: Some("main".to_string()),
            strict: Some(true),
            ..Default::default()
        };
        patch.apply(&mut opts);
        assert_eq!(opts.branch.as_deref(), Some("main"));
        assert!(opts.strict);
        assert_eq!(opts.message, "GitRowsPack API Post");
    }

    #[test]
    fn token_never_appears_in_debug_or_serialized_form() {
        let mut opts = Options::default();
        opts.token = Some("supersecret".to_string());
        let debug = format!("{:?}", opts);
        assert!(!debug.contains("supersecret"));
        let json = serde_json::to_string(&opts).unwrap();
        assert!(!json.contains("supersecret"));
    }

    #[test]
    fn patch_deserializes_from_wire_names() {
        let patch: OptionsPatch =
            serde_json::from_str(r#"{"cacheTTL": 7000, "csv": {"delimiter": ";"}}"#).unwrap();
        assert_eq!(patch.cache_ttl_ms, Some(7000));
        assert_eq!(patch.csv.unwrap().delimiter, ';');
    }
}

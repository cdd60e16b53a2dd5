//! The client facade: document-store operations over a remote file.
//!
//! [`Gitrows`] composes the path resolver, remote store, codecs and query
//! engine into the operation table callers use: `get`, `put`, `update`,
//! `replace`, `delete`, `create`, `drop`, `columns`, `types`, `test`,
//! `get_databases` and `get_collections`.
//!
//! Every operation resolves its path first and completes missing
//! descriptor fields from the client options; an invalid descriptor
//! short-circuits with a 400 envelope before any network access. Write
//! operations are single-shot optimistic transactions: the content hash
//! observed at pull time goes out with the push, and a stale hash
//! surfaces as the platform's conflict status without retry.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::codec;
use crate::config::{Options, OptionsPatch};
use crate::http::{HttpClient, ReqwestClient};
use crate::models::{Collection, CollectionInfo, Record, TestLevel, TestReport, TreeEntry};
use crate::path::{self, FileType, Namespace, PathDescriptor};
use crate::query::{self, AggregateResult};
use crate::response::{describe, ApiResponse, ApiResult};
use crate::store::{PushMethod, RemoteStore};

/// A document-store client over one hosting platform account.
pub struct Gitrows {
    options: Options,
    store: RemoteStore,
}

impl Gitrows {
    /// Create a client with the production HTTP transport.
    pub fn new(patch: OptionsPatch) -> anyhow::Result<Self> {
        let http = Arc::new(ReqwestClient::new()?);
        Ok(Self::with_client(http, patch))
    }

    /// Create a client over an injected transport. Tests pass an
    /// in-memory double here; production code uses [`Gitrows::new`].
    pub fn with_client(http: Arc<dyn HttpClient>, patch: OptionsPatch) -> Self {
        let mut options = Options::default();
        patch.apply(&mut options);
        Self {
            options,
            store: RemoteStore::new(http),
        }
    }

    // ============ Options ============

    /// Current options. The token is held but never serialized.
    pub fn options(&self) -> Options {
        self.options.clone()
    }

    /// Merge a partial options patch into the current options.
    pub fn configure(&mut self, patch: OptionsPatch) -> &mut Self {
        patch.apply(&mut self.options);
        self
    }

    /// Restore commit metadata, CSV dialect, schema settings and cache
    /// TTL to built-in defaults. Connection settings (namespace, owner,
    /// repo, branch, token) are kept.
    pub fn reset(&mut self) -> &mut Self {
        let defaults = Options::default();
        self.options.message = defaults.message;
        self.options.author = defaults.author;
        self.options.csv = defaults.csv;
        self.options.strict = defaults.strict;
        self.options.columns = defaults.columns;
        self.options.default_value = defaults.default_value;
        self.options.cache_ttl_ms = defaults.cache_ttl_ms;
        self
    }

    // ============ Operations ============

    /// Read the collection, optionally filtered. Never writes.
    ///
    /// Field entries of `filter` select records; `$`-prefixed entries
    /// (`$order`, `$limit` and the aggregate keys) shape the selected
    /// records. Unparsable file content reads as an empty collection
    /// rather than an error; upstream failures (404 and friends) pass
    /// through.
    pub async fn get(&self, path: &str, filter: Option<&Record>) -> ApiResult<Collection> {
        let desc = self.resolve(path)?;
        let pulled = self.store.pull(&self.options, &desc).await?;
        let collection = self.decode(&desc, pulled.content.as_deref());

        if let Some(filter) = filter {
            let (plain, shaping) = split_query(filter);
            let mut selected = query::apply_filters(&collection, &plain);
            if !shaping.is_empty() {
                selected = query::aggregate(&selected, &shaping).records;
            }
            return Ok(selected);
        }
        if let Some(resource) = &desc.resource {
            let filter = resource_filter(resource);
            return Ok(query::apply_filters(&collection, &filter));
        }
        Ok(collection)
    }

    /// Read the collection and compute named aggregates over the records
    /// matching the field entries of `spec`, e.g. `{"age": "gt:25",
    /// "$avg": "age", "$limit": 10}`.
    pub async fn aggregate(&self, path: &str, spec: &Record) -> ApiResult<AggregateResult> {
        let desc = self.resolve(path)?;
        let pulled = self.store.pull(&self.options, &desc).await?;
        let collection = self.decode(&desc, pulled.content.as_deref());

        let (plain, shaping) = split_query(spec);
        let selected = query::apply_filters(&collection, &plain);
        Ok(query::aggregate(&selected, &shaping))
    }

    /// Append one record or an array of records to the collection.
    ///
    /// When the file does not exist yet (pull resolves 404) the data is
    /// pushed as a brand-new collection with no content hash; no merge is
    /// attempted. In strict mode with a configured column list every
    /// record is coerced to that schema before encoding.
    pub async fn put(&self, path: &str, data: &Value) -> ApiResult<ApiResponse> {
        let desc = self.resolve(path)?;

        match self.store.pull(&self.options, &desc).await {
            Ok(pulled) => {
                let mut collection = self.decode(&desc, pulled.content.as_deref());
                collection.extend(codec::to_collection(data.clone()));
                self.apply_strict_schema(&mut collection);
                let text = self.encode(&desc, &collection_value(collection))?;
                self.store
                    .push(
                        &self.options,
                        &desc,
                        Some(&text),
                        pulled.sha.as_deref(),
                        PushMethod::Update,
                    )
                    .await
            }
            Err(err) if err.code == 404 => {
                let mut collection = codec::to_collection(data.clone());
                self.apply_strict_schema(&mut collection);
                let text = self.encode(&desc, &collection_value(collection))?;
                self.store
                    .push(&self.options, &desc, Some(&text), None, PushMethod::Create)
                    .await
            }
            Err(err) => Err(err),
        }
    }

    /// Merge `data` into every record matching `filter`.
    ///
    /// A `resource` segment on the path targets that single record by its
    /// `id` instead of `filter`. Without either, every record is updated.
    pub async fn update(
        &self,
        path: &str,
        data: &Record,
        filter: Option<&Record>,
    ) -> ApiResult<ApiResponse> {
        let desc = self.resolve(path)?;
        let pulled = self.store.pull(&self.options, &desc).await?;
        let mut collection = self.decode(&desc, pulled.content.as_deref());

        let query_map = match &desc.resource {
            Some(resource) => resource_filter(resource),
            None => filter.cloned().unwrap_or_default(),
        };
        query::values_apply(&mut collection, data, &query_map);

        let text = self.encode(&desc, &collection_value(collection))?;
        self.store
            .push(
                &self.options,
                &desc,
                Some(&text),
                pulled.sha.as_deref(),
                PushMethod::Update,
            )
            .await
    }

    /// Replace the whole collection with `data`, discarding the previous
    /// content. The pull happens only for its content hash.
    pub async fn replace(&self, path: &str, data: &Value) -> ApiResult<ApiResponse> {
        let desc = self.resolve(path)?;
        let pulled = self.store.pull(&self.options, &desc).await?;
        let text = self.encode(&desc, data)?;
        self.store
            .push(
                &self.options,
                &desc,
                Some(&text),
                pulled.sha.as_deref(),
                PushMethod::Update,
            )
            .await
    }

    /// Delete the records matching `filter` and push the remainder.
    ///
    /// With no filter at all this is a no-op returning 304 without
    /// touching the remote. An empty filter object counts as a supplied
    /// filter, matches everything, and deletes all records.
    pub async fn delete(&self, path: &str, filter: Option<&Record>) -> ApiResult<ApiResponse> {
        let filter = match filter {
            Some(filter) => filter,
            None => return Ok(ApiResponse::new(304)),
        };
        let desc = self.resolve(path)?;
        let pulled = self.store.pull(&self.options, &desc).await?;
        let mut collection = self.decode(&desc, pulled.content.as_deref());
        collection.retain(|record| !query::record_matches(record, filter));

        let text = self.encode(&desc, &collection_value(collection))?;
        self.store
            .push(
                &self.options,
                &desc,
                Some(&text),
                pulled.sha.as_deref(),
                PushMethod::Update,
            )
            .await
    }

    /// Create the collection file. Fails with the platform's status when
    /// the file already exists; no content hash is sent.
    pub async fn create(&self, path: &str, data: Option<&Value>) -> ApiResult<ApiResponse> {
        let desc = self.resolve(path)?;
        let collection = match data {
            Some(value) => codec::to_collection(value.clone()),
            None => Vec::new(),
        };
        let text = self.encode(&desc, &collection_value(collection))?;
        self.store
            .push(&self.options, &desc, Some(&text), None, PushMethod::Create)
            .await
    }

    /// Remove the collection file entirely.
    ///
    /// GitHub requires the current content hash, so the file is pulled
    /// first; GitLab deletes are keyed by branch and skip the pull.
    pub async fn drop(&self, path: &str) -> ApiResult<ApiResponse> {
        let desc = self.resolve(path)?;
        let sha = match desc.ns.unwrap_or(self.options.ns) {
            Namespace::GitHub => self.store.pull(&self.options, &desc).await?.sha,
            Namespace::GitLab => None,
        };
        self.store
            .push(&self.options, &desc, None, sha.as_deref(), PushMethod::Delete)
            .await
    }

    /// Union of field names across the collection, first-seen order.
    pub async fn columns(&self, path: &str) -> ApiResult<Vec<String>> {
        let collection = self.get(path, None).await?;
        Ok(query::columns(&collection))
    }

    /// Field-to-type mapping over the collection.
    pub async fn types(&self, path: &str) -> ApiResult<Record> {
        let collection = self.get(path, None).await?;
        Ok(query::types(&collection))
    }

    /// List the top-level directories ("databases") of a repository.
    pub async fn get_databases(&self, repo: &str) -> ApiResult<Vec<String>> {
        let entries = self.list_repo(repo, None).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_tree() && !e.path.contains('/'))
            .map(|e| e.path)
            .collect())
    }

    /// Tree entry (content hash and size) for one database directory, or
    /// `None` when the repository has no such directory.
    pub async fn get_database_entry(
        &self,
        repo: &str,
        target: &str,
    ) -> ApiResult<Option<TreeEntry>> {
        let entries = self.list_repo(repo, None).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.is_tree() && e.path == target))
    }

    /// List the collection files of one database directory with their
    /// sizes. Directories are excluded.
    pub async fn get_collections(&self, repo: &str, db: &str) -> ApiResult<Vec<CollectionInfo>> {
        let entry = self
            .get_database_entry(repo, db)
            .await?
            .ok_or_else(|| ApiResponse::new(404))?;
        let entries = self.list_repo(repo, Some(&entry.sha)).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.is_blob())
            .map(|e| CollectionInfo {
                collection: e.path,
                size: e.size.unwrap_or(0),
            })
            .collect())
    }

    /// Validate reachability and write permission for a path without
    /// mutating anything. Supplied constraints (e.g. an expected branch)
    /// must match the resolved descriptor.
    pub async fn test(&self, path: &str, constraints: Option<&Record>) -> TestReport {
        let desc = match self.resolve(path) {
            Ok(desc) => desc,
            Err(err) => {
                return TestReport {
                    valid: false,
                    code: err.code,
                    level: TestLevel::Error,
                    description: err.message.description,
                }
            }
        };

        if let Some(constraints) = constraints {
            if let Some(field) = constraint_mismatch(&desc, constraints) {
                return TestReport {
                    valid: false,
                    code: 400,
                    level: TestLevel::Error,
                    description: format!("Constraint not satisfied: {}", field),
                };
            }
        }

        let acl = match self.store.acl(&self.options, &desc).await {
            Ok(acl) => acl,
            Err(err) => {
                return TestReport {
                    valid: false,
                    code: err.code,
                    level: TestLevel::Error,
                    description: err.message.description,
                }
            }
        };
        if self.options.token.is_some() && !acl.push_allowed {
            return TestReport {
                valid: false,
                code: 403,
                level: TestLevel::Error,
                description: describe(403).to_string(),
            };
        }
        if self.options.token.is_none() {
            return TestReport {
                valid: true,
                code: 401,
                level: TestLevel::Warning,
                description: "No token configured: the path is read-only.".to_string(),
            };
        }

        // Existence is advisory: a missing file will be created by the
        // first put. Tree listing is GitHub-only, so skip it elsewhere.
        if desc.ns.unwrap_or(self.options.ns) == Namespace::GitHub {
            match self.store.is_repo_file(&self.options, &desc).await {
                Ok(false) => {
                    return TestReport {
                        valid: true,
                        code: 404,
                        level: TestLevel::Warning,
                        description: "File does not exist yet; it will be created on first put."
                            .to_string(),
                    }
                }
                Ok(true) => {}
                Err(err) => {
                    return TestReport {
                        valid: false,
                        code: err.code,
                        level: TestLevel::Error,
                        description: err.message.description,
                    }
                }
            }
        }

        TestReport {
            valid: true,
            code: 200,
            level: TestLevel::Ok,
            description: describe(200).to_string(),
        }
    }

    // ============ Internals ============

    /// Parse a path and complete missing pieces from the client options,
    /// then gate on validity: every operation fails with 400 here before
    /// any network access.
    fn resolve(&self, path: &str) -> ApiResult<PathDescriptor> {
        let mut desc = path::parse(path);
        if desc.ns.is_none() {
            desc.ns = Some(self.options.ns);
        }
        if desc.owner.is_none() {
            desc.owner = self.options.owner.clone();
        }
        if desc.repo.is_none() {
            desc.repo = self.options.repo.clone();
        }
        if desc.branch.is_none() {
            desc.branch = self.options.branch.clone();
        }
        desc.revalidate();
        if !desc.valid {
            return Err(ApiResponse::new(400));
        }
        Ok(desc)
    }

    fn file_type(&self, desc: &PathDescriptor) -> FileType {
        desc.file_type.unwrap_or(FileType::Json)
    }

    /// Decode pulled text into a collection; absent or malformed content
    /// reads as empty.
    fn decode(&self, desc: &PathDescriptor, text: Option<&str>) -> Collection {
        text.and_then(|t| codec::decode(t, self.file_type(desc), self.options.csv.delimiter))
            .map(codec::to_collection)
            .unwrap_or_default()
    }

    /// Encode a value for pushing. Collections of empty objects encode to
    /// empty file content; unencodable data fails with 422.
    fn encode(&self, desc: &PathDescriptor, data: &Value) -> ApiResult<String> {
        if query::is_empty_object_array(data) {
            return Ok(String::new());
        }
        codec::encode(data, self.file_type(desc), self.options.csv.delimiter)
            .ok_or_else(|| ApiResponse::new(422))
    }

    fn apply_strict_schema(&self, collection: &mut Collection) {
        if !self.options.strict {
            return;
        }
        if let Some(columns) = &self.options.columns {
            let default = self.options.default_value.clone().unwrap_or(Value::Null);
            query::columns_apply(collection, columns, &default);
        }
    }

    async fn list_repo(&self, repo: &str, tree_ref: Option<&str>) -> ApiResult<Vec<TreeEntry>> {
        let owner = self
            .options
            .owner
            .clone()
            .ok_or_else(|| ApiResponse::new(400))?;
        let branch = self.options.branch.clone();
        let tree_ref = tree_ref.unwrap_or_else(|| branch.as_deref().unwrap_or("master"));
        self.store
            .list(&self.options, self.options.ns, &owner, repo, tree_ref)
            .await
    }
}

fn collection_value(collection: Collection) -> Value {
    Value::Array(collection.into_iter().map(Value::Object).collect())
}

/// Split a query into plain field matchers and `$`-prefixed shaping and
/// aggregation entries.
fn split_query(filter: &Record) -> (Record, Record) {
    let mut plain = Record::new();
    let mut shaping = Record::new();
    for (key, value) in filter {
        if key.starts_with('$') {
            shaping.insert(key.clone(), value.clone());
        } else {
            plain.insert(key.clone(), value.clone());
        }
    }
    (plain, shaping)
}

/// Filter targeting the single record selected by a path resource
/// segment, matched on its `id` field.
fn resource_filter(resource: &str) -> Record {
    let mut filter = Record::new();
    filter.insert("id".to_string(), json!(resource));
    filter
}

/// First constraint field whose expected value does not match the
/// resolved descriptor, if any.
fn constraint_mismatch(desc: &PathDescriptor, constraints: &Record) -> Option<String> {
    for (field, expected) in constraints {
        let actual: Option<String> = match field.as_str() {
            "ns" => desc.ns.map(|n| n.as_str().to_string()),
            "owner" => desc.owner.clone(),
            "repo" => desc.repo.clone(),
            "branch" => desc.branch.clone(),
            "path" => desc.path.clone(),
            "type" => desc
                .file_type
                .map(|t| format!("{:?}", t).to_lowercase()),
            _ => None,
        };
        let expected = expected.as_str().map(str::to_string);
        if actual != expected {
            return Some(field.clone());
        }
    }
    None
}

//! Remote store: authenticated pull/push/list against the hosting
//! platform's content and tree APIs.
//!
//! Every write is one leg of a read-then-write optimistic concurrency
//! transaction: the content hash observed at pull time is submitted at
//! push time, and the platform rejects the write when the hash is stale.
//! A conflict surfaces to the caller as its upstream status; there is no
//! retry loop here.
//!
//! Reads go through the TTL [`Cache`]; successful writes invalidate the
//! written path's entry. Writes require a token and fail with 401 before
//! any network call when none is configured.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::Options;
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};
use crate::models::{AclInfo, PullResult, TreeEntry};
use crate::path::{self, Namespace, PathDescriptor};
use crate::query;
use crate::response::{ApiResponse, ApiResult};

/// Intent of a push, mapped to the platform's wire method per namespace.
///
/// GitHub's contents endpoint uses PUT for both create and update; GitLab
/// distinguishes POST (create) from PUT (update).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushMethod {
    Create,
    Update,
    Delete,
}

impl PushMethod {
    fn wire(&self, ns: Namespace) -> Method {
        match (self, ns) {
            (PushMethod::Delete, _) => Method::Delete,
            (PushMethod::Create, Namespace::GitLab) => Method::Post,
            _ => Method::Put,
        }
    }
}

/// Client for the platform content and tree HTTP surfaces.
pub struct RemoteStore {
    http: Arc<dyn HttpClient>,
    cache: Cache,
}

impl RemoteStore {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            cache: Cache::new(),
        }
    }

    /// Read a file's decoded content and content hash.
    ///
    /// Served from the cache when fresh; otherwise an authenticated GET
    /// against the content API, with the base64 payload unwrapped and the
    /// cache repopulated. Upstream failures pass through as their status.
    pub async fn pull(&self, opts: &Options, desc: &PathDescriptor) -> ApiResult<PullResult> {
        if !desc.valid {
            return Err(ApiResponse::new(400));
        }
        let key = desc.canonical(opts.branch.as_deref());
        if let Some((content, sha)) = self.cache.get(&key) {
            return Ok(PullResult { content, sha });
        }

        let ns = desc.ns.unwrap_or(opts.ns);
        let mut url = path::to_api(desc).ok_or_else(|| ApiResponse::new(400))?;
        let branch = desc.branch.as_deref().or(opts.branch.as_deref());
        match ns {
            // GitLab's files endpoint requires the ref parameter.
            Namespace::GitLab => {
                url.push_str(&format!("?ref={}", branch.unwrap_or("master")));
            }
            Namespace::GitHub => {
                if let Some(branch) = branch {
                    url.push_str(&format!("?ref={}", branch));
                }
            }
        }

        let mut request = HttpRequest::new(Method::Get, url);
        request = authorize(request, opts, ns);
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ApiResponse::new(response.status));
        }

        let body = response.json();
        let content = body
            .as_ref()
            .and_then(|v| v["content"].as_str())
            .and_then(query::atob);
        let sha = match ns {
            Namespace::GitHub => body
                .as_ref()
                .and_then(|v| v["sha"].as_str())
                .map(str::to_string),
            // GitLab writes are keyed by branch, not blob hash.
            Namespace::GitLab => None,
        };

        self.cache.put(
            &key,
            content.clone(),
            sha.clone(),
            Duration::from_millis(opts.cache_ttl_ms),
        );
        Ok(PullResult { content, sha })
    }

    /// Write (or delete) a file through the platform content API.
    ///
    /// `content` is the already-encoded file text; `sha` is the content
    /// hash observed at pull time, absent for a first-time create. On
    /// success the path's cache entry is invalidated and the upstream
    /// status is returned as a success envelope.
    pub async fn push(
        &self,
        opts: &Options,
        desc: &PathDescriptor,
        content: Option<&str>,
        sha: Option<&str>,
        method: PushMethod,
    ) -> ApiResult<ApiResponse> {
        if !desc.valid {
            return Err(ApiResponse::new(400));
        }
        // Authorization is checked before any network traffic.
        if opts.token.is_none() {
            return Err(ApiResponse::new(401));
        }

        let ns = desc.ns.unwrap_or(opts.ns);
        let url = path::to_api(desc).ok_or_else(|| ApiResponse::new(400))?;
        let branch = desc.branch.as_deref().or(opts.branch.as_deref());
        let message = format!("{}{}", opts.message, Utc::now().timestamp_millis());

        let body = match ns {
            Namespace::GitHub => {
                let mut body = json!({
                    "message": message,
                    "author": {
                        "name": opts.author.name,
                        "email": opts.author.email,
                    },
                });
                if method != PushMethod::Delete {
                    body["content"] = json!(query::btoa(content.unwrap_or("")));
                }
                if let Some(sha) = sha {
                    body["sha"] = json!(sha);
                }
                if let Some(branch) = branch {
                    body["branch"] = json!(branch);
                }
                body
            }
            Namespace::GitLab => {
                let mut body = json!({
                    "branch": branch.unwrap_or("master"),
                    "commit_message": message,
                    "author_name": opts.author.name,
                    "author_email": opts.author.email,
                    "encoding": "base64",
                });
                if method != PushMethod::Delete {
                    body["content"] = json!(query::btoa(content.unwrap_or("")));
                }
                body
            }
        };

        let mut request =
            HttpRequest::new(method.wire(ns), url).body(serde_json::to_string(&body).unwrap_or_default());
        request = authorize(request, opts, ns);
        let response = self.send(request).await?;

        if response.is_success() {
            self.cache.invalidate(&desc.canonical(opts.branch.as_deref()));
            Ok(ApiResponse::new(response.status))
        } else {
            Err(ApiResponse::new(response.status))
        }
    }

    /// Recursively list a repository tree.
    ///
    /// `tree_ref` is a branch name or a tree sha. Implemented for GitHub;
    /// other namespaces fail with 501 rather than behaving incorrectly.
    pub async fn list(
        &self,
        opts: &Options,
        ns: Namespace,
        owner: &str,
        repo: &str,
        tree_ref: &str,
    ) -> ApiResult<Vec<TreeEntry>> {
        if ns != Namespace::GitHub {
            return Err(ApiResponse::new(501));
        }
        let url = format!(
            "https://api.github.com/repos/{}/{}/git/trees/{}?recursive=1",
            owner, repo, tree_ref
        );
        let mut request = HttpRequest::new(Method::Get, url);
        request = authorize(request, opts, ns);
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ApiResponse::new(response.status));
        }

        let body = response.json().ok_or_else(|| ApiResponse::new(502))?;
        serde_json::from_value::<Vec<TreeEntry>>(body["tree"].clone())
            .map_err(|_| ApiResponse::new(502))
    }

    /// Repository access check, used to confirm write permission before a
    /// mutation is attempted.
    pub async fn acl(&self, opts: &Options, desc: &PathDescriptor) -> ApiResult<AclInfo> {
        let ns = desc.ns.unwrap_or(opts.ns);
        let owner = desc.owner.as_deref().ok_or_else(|| ApiResponse::new(400))?;
        let repo = desc.repo.as_deref().ok_or_else(|| ApiResponse::new(400))?;

        let url = match ns {
            Namespace::GitHub => format!("https://api.github.com/repos/{}/{}", owner, repo),
            Namespace::GitLab => format!(
                "https://gitlab.com/api/v4/projects/{}",
                path::percent_encode(&format!("{}/{}", owner, repo))
            ),
        };
        let mut request = HttpRequest::new(Method::Get, url);
        request = authorize(request, opts, ns);
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(ApiResponse::new(response.status));
        }
        let body = response.json().ok_or_else(|| ApiResponse::new(502))?;

        let info = match ns {
            Namespace::GitHub => AclInfo {
                private: body["private"].as_bool().unwrap_or(false),
                push_allowed: body["permissions"]["push"].as_bool().unwrap_or(false),
            },
            Namespace::GitLab => AclInfo {
                private: body["visibility"].as_str() == Some("private"),
                // Developer access (30) and above may push.
                push_allowed: body["permissions"]["project_access"]["access_level"]
                    .as_u64()
                    .map_or(false, |level| level >= 30),
            },
        };
        Ok(info)
    }

    /// Whether the descriptor's file exists in the repository tree.
    pub async fn is_repo_file(&self, opts: &Options, desc: &PathDescriptor) -> ApiResult<bool> {
        let ns = desc.ns.unwrap_or(opts.ns);
        let owner = desc.owner.as_deref().ok_or_else(|| ApiResponse::new(400))?;
        let repo = desc.repo.as_deref().ok_or_else(|| ApiResponse::new(400))?;
        let branch = desc
            .branch
            .as_deref()
            .or(opts.branch.as_deref())
            .unwrap_or("master");
        let entries = self.list(opts, ns, owner, repo, branch).await?;
        let file = desc.path.as_deref().unwrap_or("");
        Ok(entries.iter().any(|e| e.is_blob() && e.path == file))
    }

    async fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.http.execute(request).await.map_err(|e| {
            eprintln!("Warning: transport failure: {}", e);
            ApiResponse::new(500)
        })
    }
}

/// Attach the namespace's authentication header when a token is set.
/// The token never appears anywhere else.
fn authorize(request: HttpRequest, opts: &Options, ns: Namespace) -> HttpRequest {
    match &opts.token {
        Some(token) => match ns {
            Namespace::GitHub => request.header("Authorization", format!("token {}", token)),
            Namespace::GitLab => request.header("PRIVATE-TOKEN", token.clone()),
        },
        None => request,
    }
}

//! # GitRows
//!
//! A document-store client over files hosted on GitHub or GitLab.
//!
//! GitRows treats a JSON, YAML or CSV file in a repository as a collection
//! of records and exposes document-store operations over the platforms'
//! HTTP content and tree APIs: read with filtering and aggregation, append,
//! update, replace, delete, plus schema introspection and repository
//! browsing. No git binary and no clone; every operation is a handful of
//! HTTP calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── Gitrows (facade) ────────────────────────┐
//! │  get / put / update / replace / delete / create / drop / test    │
//! └───────┬──────────────────┬───────────────────┬───────────────────┘
//!         ▼                  ▼                   ▼
//!   ┌──────────┐       ┌──────────┐        ┌──────────┐
//!   │   path   │       │  query   │        │  codec   │
//!   │ resolver │       │  engine  │        │ json/yaml│
//!   └──────────┘       └──────────┘        │   /csv   │
//!                                          └──────────┘
//!         ┌──────────────┐   ┌───────┐
//!         │ RemoteStore  │──▶│ Cache │
//!         │ pull/push/   │   │ (TTL) │
//!         │ list/acl     │   └───────┘
//!         └──────┬───────┘
//!                ▼
//!         ┌──────────────┐
//!         │  HttpClient  │  (trait: reqwest in production,
//!         └──────────────┘   scripted double in tests)
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use gitrows::{Gitrows, OptionsPatch};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Gitrows::new(OptionsPatch {
//!     token: Some("ghp_...".to_string()),
//!     ..Default::default()
//! })?;
//!
//! let records = client
//!     .get("@github/owner/repo/data/users.json", None)
//!     .await?;
//! println!("{} records", records.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`path`] | Shorthand and URL path resolution |
//! | [`codec`] | JSON/YAML/CSV encode and decode |
//! | [`query`] | Filtering, aggregation, schema tools |
//! | [`cache`] | TTL read cache |
//! | [`http`] | Injectable HTTP transport |
//! | [`store`] | Platform content/tree API client |
//! | [`response`] | Status envelopes |
//! | [`config`] | Client options |
//! | [`models`] | Core data types |
//! | [`gitrows`] | The client facade |

pub mod cache;
pub mod codec;
pub mod config;
pub mod gitrows;
pub mod http;
pub mod models;
pub mod path;
pub mod query;
pub mod response;
pub mod store;

pub use config::{Author, CsvOptions, Options, OptionsPatch};
pub use gitrows::Gitrows;
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient};
pub use models::{Collection, CollectionInfo, Record, TestLevel, TestReport};
pub use path::{FileType, Namespace, PathDescriptor};
pub use query::AggregateResult;
pub use response::{ApiResponse, ApiResult};

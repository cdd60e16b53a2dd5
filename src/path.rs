//! Path resolution for remote collection files.
//!
//! A collection is addressed either by a shorthand token or by a full
//! platform URL:
//!
//! ```text
//! @github/owner/repo#branch/data/users.json/42
//! └─ns──┘ └owner┘└repo┘└branch┘└──path────┘└resource┘
//!
//! https://github.com/owner/repo/blob/main/data/users.json
//! https://gitlab.com/owner/repo/-/raw/main/data/users.csv
//! ```
//!
//! [`parse`] turns either form into a [`PathDescriptor`]. A descriptor is
//! valid only when namespace, owner, repo and path are all present and the
//! file extension is one of the three recognized formats. Incomplete input
//! still yields a best-effort descriptor so callers can report a precise
//! validation error instead of a generic parse failure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Hosting platform a descriptor targets. Determines URL shapes, wire
/// format and authentication headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    GitHub,
    GitLab,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::GitHub => "github",
            Namespace::GitLab => "gitlab",
        }
    }

    /// Parse a namespace token, case-insensitive. Unknown tokens map to
    /// `None`, which renders the surrounding descriptor invalid.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "github" => Some(Namespace::GitHub),
            "gitlab" => Some(Namespace::GitLab),
            _ => None,
        }
    }
}

/// Recognized collection file formats, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Json,
    Yaml,
    Csv,
}

impl FileType {
    /// Map a file extension to a format, case-insensitive. Anything other
    /// than `json`, `yaml` or `csv` is unrecognized.
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileType::Json),
            "yaml" => Some(FileType::Yaml),
            "csv" => Some(FileType::Csv),
            _ => None,
        }
    }

    /// MIME type for the format.
    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Json => "application/json",
            FileType::Yaml => "text/yaml",
            FileType::Csv => "text/csv",
        }
    }
}

/// A resolved collection file identifier.
///
/// Constructed fresh on every [`parse`] call and never mutated afterwards;
/// callers that need a variant re-resolve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathDescriptor {
    /// True iff `ns`, `owner`, `repo` and `path` are present and the
    /// extension is recognized.
    pub valid: bool,
    pub ns: Option<Namespace>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub file_type: Option<FileType>,
    /// Optional single-record selector appended after the file path,
    /// targeting one record by its `id` for scoped updates.
    pub resource: Option<String>,
}

impl PathDescriptor {
    /// Canonical string form used as the cache key. `fallback_branch` is
    /// the branch that will actually be fetched when the descriptor does
    /// not carry one, so content pulled under different effective
    /// branches never shares a key.
    pub fn canonical(&self, fallback_branch: Option<&str>) -> String {
        format!(
            "@{}/{}/{}#{}/{}",
            self.ns.map(|n| n.as_str()).unwrap_or(""),
            self.owner.as_deref().unwrap_or(""),
            self.repo.as_deref().unwrap_or(""),
            self.branch
                .as_deref()
                .or(fallback_branch)
                .unwrap_or("master"),
            self.path.as_deref().unwrap_or("")
        )
    }

    /// Recompute `valid` after fields change, e.g. when client defaults
    /// are merged into a partially specified descriptor.
    pub fn revalidate(&mut self) {
        self.valid = self.ns.is_some()
            && self.owner.is_some()
            && self.repo.is_some()
            && self.path.as_deref().map_or(false, |p| !p.is_empty())
            && self.file_type.is_some();
    }
}

// Shorthand form: @ns/owner/repo#branch/path.ext/resource, every segment
// except repo and a path-ish tail optional so incomplete input still
// yields the recoverable pieces.
static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:@(?P<ns>\w+)/)?(?P<owner>[\w-]+)?/(?P<repo>[\w.-]+)(?:#(?P<branch>[\w-]+))?/?(?P<path>[\w./-]*\.(?P<ext>\w{2,4})|[\w/]*)(?:/(?P<resource>\w+))?/?$",
    )
    .expect("shorthand path regex")
});

// Browsable and raw URL forms for both platforms, including
// raw.githubusercontent.com hosts.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://[\w.]*(?P<ns>github|gitlab)\w*\.com/(?P<owner>[\w-]+)/(?P<repo>[\w.-]+)/(?:-/)?(?:blob/|raw/)?(?P<branch>[\w.-]+)/(?P<path>[\w/.-]+\.(?P<ext>\w+))/?$",
    )
    .expect("platform url regex")
});

/// Parse a shorthand token or platform URL into a [`PathDescriptor`].
pub fn parse(input: &str) -> PathDescriptor {
    if is_url(input) {
        parse_url(input)
    } else {
        parse_path(input)
    }
}

/// Parse the shorthand `@ns/owner/repo[#branch]/path.ext[/resource]` form.
pub fn parse_path(input: &str) -> PathDescriptor {
    match PATH_RE.captures(input) {
        Some(caps) => descriptor_from_captures(&caps),
        None => PathDescriptor::default(),
    }
}

/// Parse a browsable or raw platform URL.
pub fn parse_url(input: &str) -> PathDescriptor {
    match URL_RE.captures(input) {
        Some(caps) => descriptor_from_captures(&caps),
        None => PathDescriptor::default(),
    }
}

fn descriptor_from_captures(caps: &regex::Captures<'_>) -> PathDescriptor {
    let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
    let mut desc = PathDescriptor {
        valid: false,
        ns: caps.name("ns").and_then(|m| Namespace::from_token(m.as_str())),
        owner: group("owner"),
        repo: group("repo"),
        branch: group("branch"),
        path: group("path").filter(|p| !p.is_empty()),
        file_type: caps.name("ext").and_then(|m| FileType::from_ext(m.as_str())),
        resource: group("resource"),
    };
    desc.revalidate();
    desc
}

/// Whether the input looks like a URL rather than a shorthand token.
pub fn is_url(input: &str) -> bool {
    static SCHEME_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^(?:https?|ftp)://\S+\.\S+").expect("url scheme regex"));
    SCHEME_RE.is_match(input)
}

/// Convert a platform URL back to shorthand notation.
///
/// The branch segment is rendered as `:branch` and omitted entirely when it
/// is `master`. Returns `None` when the URL does not resolve to a valid
/// descriptor.
pub fn from_url(url: &str) -> Option<String> {
    let desc = parse_url(url);
    if !desc.valid {
        return None;
    }
    let branch = match desc.branch.as_deref() {
        Some("master") | None => String::new(),
        Some(b) => format!(":{}", b),
    };
    Some(format!(
        "@{}/{}/{}{}/{}",
        desc.ns?.as_str(),
        desc.owner?,
        desc.repo?,
        branch,
        desc.path?
    ))
}

/// Render a browsable (or raw, when `raw` is set) URL for a descriptor.
///
/// Returns `None` for invalid descriptors. The branch defaults to `master`
/// when unset.
pub fn to_url(desc: &PathDescriptor, raw: bool) -> Option<String> {
    if !desc.valid {
        return None;
    }
    let owner = desc.owner.as_deref()?;
    let repo = desc.repo.as_deref()?;
    let path = desc.path.as_deref()?;
    let branch = desc.branch.as_deref().unwrap_or("master");

    match desc.ns? {
        Namespace::GitHub => {
            if raw {
                Some(format!(
                    "https://raw.githubusercontent.com/{}/{}/{}/{}",
                    owner, repo, branch, path
                ))
            } else {
                Some(format!(
                    "https://github.com/{}/{}/blob/{}/{}",
                    owner, repo, branch, path
                ))
            }
        }
        Namespace::GitLab => {
            let format = if raw { "raw" } else { "blob" };
            Some(format!(
                "https://gitlab.com/{}/{}/-/{}/{}/{}",
                owner, repo, format, branch, path
            ))
        }
    }
}

/// Render the platform's machine API endpoint for the descriptor's file.
///
/// GitHub uses the contents endpoint, GitLab the repository files endpoint
/// with percent-encoded project and file path components. Returns `None`
/// for invalid descriptors.
pub fn to_api(desc: &PathDescriptor) -> Option<String> {
    if !desc.valid {
        return None;
    }
    let owner = desc.owner.as_deref()?;
    let repo = desc.repo.as_deref()?;
    let path = desc.path.as_deref()?;

    match desc.ns? {
        Namespace::GitHub => Some(format!(
            "https://api.github.com/repos/{}/{}/contents/{}",
            owner, repo, path
        )),
        Namespace::GitLab => {
            let project = percent_encode(&format!("{}/{}", owner, repo));
            Some(format!(
                "https://gitlab.com/api/v4/projects/{}/repository/files/{}",
                project,
                percent_encode(path)
            ))
        }
    }
}

/// Percent-encode a string per RFC 3986, keeping only unreserved
/// characters. Used for GitLab project and file path components, where
/// the embedded `/` must become `%2F`.
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_path_as_invalid_best_effort() {
        let desc = parse("/path/to/file.json");
        assert!(!desc.valid);
        assert_eq!(desc.ns, None);
        assert_eq!(desc.owner, None);
        assert_eq!(desc.repo.as_deref(), Some("path"));
        assert_eq!(desc.path.as_deref(), Some("to/file.json"));
        assert_eq!(desc.file_type, Some(FileType::Json));
    }

    #[test]
    fn parses_shorthand_notation() {
        let desc = parse("@github/owner/repo/path/to/file.json");
        assert!(desc.valid);
        assert_eq!(desc.ns, Some(Namespace::GitHub));
        assert_eq!(desc.owner.as_deref(), Some("owner"));
        assert_eq!(desc.repo.as_deref(), Some("repo"));
        assert_eq!(desc.branch, None);
        assert_eq!(desc.path.as_deref(), Some("path/to/file.json"));
    }

    #[test]
    fn parses_shorthand_with_branch() {
        let desc = parse("@github/owner/repo#develop/path/to/file.json");
        assert_eq!(desc.branch.as_deref(), Some("develop"));
        assert!(desc.valid);
    }

    #[test]
    fn parses_shorthand_with_resource() {
        let desc = parse("@github/owner/repo/data/users.json/42");
        assert!(desc.valid);
        assert_eq!(desc.path.as_deref(), Some("data/users.json"));
        assert_eq!(desc.resource.as_deref(), Some("42"));
    }

    #[test]
    fn parses_github_url() {
        let desc = parse("https://github.com/owner/repo/blob/main/path/to/file.yaml");
        assert!(desc.valid);
        assert_eq!(desc.ns, Some(Namespace::GitHub));
        assert_eq!(desc.branch.as_deref(), Some("main"));
        assert_eq!(desc.path.as_deref(), Some("path/to/file.yaml"));
        assert_eq!(desc.file_type, Some(FileType::Yaml));
    }

    #[test]
    fn parses_gitlab_raw_url() {
        let desc = parse("https://gitlab.com/owner/repo/-/raw/main/path/to/file.csv");
        assert!(desc.valid);
        assert_eq!(desc.ns, Some(Namespace::GitLab));
        assert_eq!(desc.file_type, Some(FileType::Csv));
    }

    #[test]
    fn parses_raw_githubusercontent_url() {
        let desc = parse("https://raw.githubusercontent.com/owner/repo/master/data/file.json");
        assert!(desc.valid);
        assert_eq!(desc.ns, Some(Namespace::GitHub));
        assert_eq!(desc.branch.as_deref(), Some("master"));
    }

    #[test]
    fn unknown_extension_is_invalid() {
        let desc = parse("@github/owner/repo/path/to/file.txt");
        assert!(!desc.valid);
        assert_eq!(desc.file_type, None);
    }

    #[test]
    fn unknown_namespace_is_invalid() {
        let desc = parse("@bitbucket/owner/repo/file.json");
        assert!(!desc.valid);
        assert_eq!(desc.ns, None);
    }

    #[test]
    fn extension_is_case_insensitive() {
        let desc = parse("@github/owner/repo/file.JSON");
        assert!(desc.valid);
        assert_eq!(desc.file_type, Some(FileType::Json));
    }

    #[test]
    fn from_url_renders_shorthand() {
        let short = from_url("https://github.com/owner/repo/blob/main/path/to/file.json");
        assert_eq!(short.as_deref(), Some("@github/owner/repo:main/path/to/file.json"));
    }

    #[test]
    fn from_url_omits_master_branch() {
        let short = from_url("https://github.com/owner/repo/blob/master/path/to/file.json");
        assert_eq!(short.as_deref(), Some("@github/owner/repo/path/to/file.json"));
    }

    #[test]
    fn from_url_rejects_non_urls() {
        assert_eq!(from_url("not-a-url"), None);
    }

    #[test]
    fn to_url_is_none_for_invalid_descriptor() {
        let desc = parse("/path/to/file.yaml");
        assert_eq!(to_url(&desc, false), None);
    }

    #[test]
    fn to_url_defaults_branch_to_master() {
        let desc = parse("@github/owner/repo/path/to/file.yaml");
        assert_eq!(
            to_url(&desc, false).as_deref(),
            Some("https://github.com/owner/repo/blob/master/path/to/file.yaml")
        );
        let desc = parse("@gitlab/owner/repo/path/to/file.json");
        assert_eq!(
            to_url(&desc, false).as_deref(),
            Some("https://gitlab.com/owner/repo/-/blob/master/path/to/file.json")
        );
    }

    #[test]
    fn to_url_raw_variants() {
        let desc = parse("@github/owner/repo/data/file.csv");
        assert_eq!(
            to_url(&desc, true).as_deref(),
            Some("https://raw.githubusercontent.com/owner/repo/master/data/file.csv")
        );
        let desc = parse("@gitlab/owner/repo/data/file.csv");
        assert_eq!(
            to_url(&desc, true).as_deref(),
            Some("https://gitlab.com/owner/repo/-/raw/master/data/file.csv")
        );
    }

    #[test]
    fn to_api_github_contents_endpoint() {
        let desc = parse("@github/owner/repo/data/file.json");
        assert_eq!(
            to_api(&desc).as_deref(),
            Some("https://api.github.com/repos/owner/repo/contents/data/file.json")
        );
    }

    #[test]
    fn to_api_gitlab_percent_encodes_components() {
        let desc = parse("@gitlab/owner/repo/data/file.json");
        assert_eq!(
            to_api(&desc).as_deref(),
            Some("https://gitlab.com/api/v4/projects/owner%2Frepo/repository/files/data%2Ffile.json")
        );
    }

    #[test]
    fn parse_then_to_url_then_reparse_roundtrips() {
        for input in [
            "@github/owner/repo/data/file.json",
            "@github/owner/repo#dev/data/file.yaml",
            "@gitlab/owner/repo/data/file.csv",
        ] {
            let desc = parse(input);
            let url = to_url(&desc, false).unwrap();
            let redone = parse(&url);
            assert!(redone.valid);
            assert_eq!(redone.ns, desc.ns);
            assert_eq!(redone.owner, desc.owner);
            assert_eq!(redone.repo, desc.repo);
            assert_eq!(redone.path, desc.path);
            assert_eq!(redone.file_type, desc.file_type);
            assert_eq!(
                redone.branch.as_deref(),
                Some(desc.branch.as_deref().unwrap_or("master"))
            );
        }
    }
}

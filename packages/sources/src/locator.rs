//! Parsing of user-supplied repository URLs.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::validator::ValidationError;

/// GitHub-style owner: alphanumerics and hyphens, not leading with a hyphen.
static OWNER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{0,38}$").expect("owner pattern compiles")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]{1,100}$").expect("name pattern compiles"));

/// Syntactic pieces of a repository URL, before any provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    pub owner: String,
    pub name: String,
    /// Branch named in a `/tree/<branch>` path, if any.
    pub branch: Option<String>,
}

/// Parse `input` as a repository URL on `host`.
///
/// Accepts `https://host/owner/repo` with optional `http`, `www.`, missing
/// scheme, trailing slash, `.git` suffix, `/tree/<branch>` and SSH
/// `git@host:owner/repo.git` forms. Anything else is malformed.
pub fn parse_repository_url(input: &str, host: &str) -> Result<RepositoryLocator, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(malformed(input, "URL is empty"));
    }

    let normalized = if let Some(rest) = trimmed.strip_prefix("git@") {
        let (ssh_host, path) = rest
            .split_once(':')
            .ok_or_else(|| malformed(input, "SSH URL is missing ':'"))?;
        format!("https://{}/{}", ssh_host, path)
    } else if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&normalized).map_err(|e| malformed(input, &e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(malformed(input, "unsupported scheme"));
    }

    let url_host = url
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| malformed(input, "URL has no host"))?;
    let url_host = url_host.strip_prefix("www.").unwrap_or(&url_host);
    if !url_host.eq_ignore_ascii_case(host) {
        return Err(malformed(
            input,
            &format!("host '{}' is not a recognized provider", url_host),
        ));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.len() < 2 {
        return Err(malformed(input, "expected /<owner>/<repository>"));
    }

    let owner = segments[0];
    let name = segments[1].strip_suffix(".git").unwrap_or(segments[1]);

    if !OWNER_RE.is_match(owner) {
        return Err(malformed(input, &format!("invalid owner '{}'", owner)));
    }
    if !NAME_RE.is_match(name) || name == "." || name == ".." {
        return Err(malformed(input, &format!("invalid repository name '{}'", name)));
    }

    let branch = match segments.get(2) {
        Some(&"tree") if segments.len() > 3 => Some(segments[3..].join("/")),
        _ => None,
    };

    Ok(RepositoryLocator {
        owner: owner.to_string(),
        name: name.to_string(),
        branch,
    })
}

fn malformed(url: &str, reason: &str) -> ValidationError {
    ValidationError::MalformedUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

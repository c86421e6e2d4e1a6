//! GitHub repository URL parsing and output filename derivation.

use url::Url;

use crate::error::StarcapError;

/// A parsed and normalized GitHub repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRepo {
    pub owner: String,
    pub repo: String,
    /// Canonical form: `https://github.com/<owner>/<repo>`.
    pub normalized_url: String,
}

/// Parse and normalize a GitHub repository URL.
///
/// Accepts forms like:
///   https://github.com/owner/repo
///   https://github.com/owner/repo/
///   https://github.com/owner/repo?foo=bar
///   https://github.com/owner/repo/tree/main/src
///   github.com/owner/repo
pub fn parse_github_url(input: &str) -> Result<ParsedRepo, StarcapError> {
    let mut url_str = input.trim().to_string();

    // Allow bare "github.com/owner/repo" without scheme.
    if url_str.to_ascii_lowercase().starts_with("github.com/") {
        url_str = format!("https://{}", url_str);
    }

    let url = Url::parse(&url_str).map_err(|_| {
        StarcapError::InvalidUrl(format!(
            "Invalid URL: \"{}\". Expected a GitHub repository URL like https://github.com/owner/repo",
            input
        ))
    })?;

    let host = url.host_str().unwrap_or_default();
    if !host.eq_ignore_ascii_case("github.com") {
        return Err(StarcapError::InvalidUrl(format!(
            "URL host must be github.com, got \"{}\". Example: https://github.com/owner/repo",
            host
        )));
    }

    let mut segments = url.path().split('/').filter(|s| !s.is_empty());
    let (owner, repo) = match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => (owner, repo),
        _ => {
            return Err(StarcapError::InvalidUrl(format!(
                "URL must include owner and repo: https://github.com/<owner>/<repo>. Got path \"{}\"",
                url.path()
            )));
        }
    };

    if !is_valid_segment(owner) || !is_valid_segment(repo) {
        return Err(StarcapError::InvalidUrl(format!(
            "Invalid owner or repo name in URL. Owner: \"{}\", Repo: \"{}\". \
             Names must contain only alphanumerics, hyphens, underscores, or dots.",
            owner, repo
        )));
    }

    Ok(ParsedRepo {
        owner: owner.to_string(),
        repo: repo.to_string(),
        normalized_url: format!("https://github.com/{}/{}", owner, repo),
    })
}

/// A plausible GitHub owner/repo name.
fn is_valid_segment(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Sanitize a string for use as a filename: replace anything outside
/// `[a-zA-Z0-9._-]` with underscores, collapse runs, trim the ends.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    // Collapse runs that mixed literal and substituted underscores.
    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c != '_' || !collapsed.ends_with('_') {
            collapsed.push(c);
        }
    }
    collapsed.trim_matches('_').to_string()
}

/// Default output filename for a repository: `<owner>_<repo>.gif`.
pub fn default_output_filename(owner: &str, repo: &str) -> String {
    format!("{}_{}.gif", sanitize_filename(owner), sanitize_filename(repo))
}

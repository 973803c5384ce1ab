//! Pipeline version lookup.

use std::sync::LazyLock;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::Error;
use crate::Result;

/// The commits of the ChIP-seq workflow definition, newest first.
pub const DEFAULT_COMMITS_URL: &str = "https://api.github.com/repos/broadinstitute/epi-lims-workflows/commits?path=wdls/chipseq_imports.wdl";

/// The parsed [`DEFAULT_COMMITS_URL`].
static DEFAULT_COMMITS: LazyLock<Url> = LazyLock::new(|| {
    // SAFETY: this is checked statically with tests to always unwrap.
    Url::parse(DEFAULT_COMMITS_URL).unwrap()
});

/// The user agent sent to the commits API.
const USER_AGENT: &str = concat!("lims-launch/", env!("CARGO_PKG_VERSION"));

/// The version of the pipelines recorded in a request's context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineVersion {
    /// A fixed version string.
    Fixed(String),
    /// The latest commit listed by a commits API.
    Commits(Url),
}

impl Default for PipelineVersion {
    fn default() -> Self {
        Self::Commits(DEFAULT_COMMITS.clone())
    }
}

/// A commit listed by the commits API.
#[derive(Debug, Deserialize)]
struct Commit {
    /// The commit hash.
    sha: String,
}

impl PipelineVersion {
    /// Resolves the version string.
    pub async fn resolve(&self, client: &reqwest::Client) -> Result<String> {
        let url = match self {
            Self::Fixed(version) => return Ok(version.clone()),
            Self::Commits(url) => url,
        };

        let error = |reason: String| Error::VersionLookup {
            url: url.to_string(),
            reason,
        };

        let commits: Vec<Commit> = client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| error(e.to_string()))?
            .json()
            .await
            .map_err(|e| error(e.to_string()))?;

        let commit = commits
            .first()
            .ok_or_else(|| error("no commits were listed".to_string()))?;
        let version = commit_version(&commit.sha);
        debug!("resolved pipeline version `{version}` from `{url}`");
        Ok(version)
    }
}

/// Formats the version of a commit as `git-` followed by its short hash.
pub fn commit_version(sha: &str) -> String {
    format!("git-{short}", short = sha.get(..7).unwrap_or(sha))
}

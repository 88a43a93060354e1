use std::path::PathBuf;

use thiserror::Error;

/// Startup failures. Raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("synonym table not found at {0:?}")]
    SynonymsMissing(PathBuf),
    #[error("synonym table at {path:?} is not a JSON object of strings: {source}")]
    SynonymsInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid period {0:?}, expected YYYY-MM")]
    InvalidPeriod(String),
}

/// Thread/comment fetch failures. Recoverable per comment.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("item {0} not found")]
    NotFound(u64),
    #[error("timed out after {0}s")]
    Timeout(u64),
}

impl SourceError {
    /// 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            SourceError::Status(code) => *code == 429 || (500..600).contains(code),
            SourceError::Timeout(_) => true,
            SourceError::Http(e) => e.is_timeout() || e.is_connect(),
            SourceError::NotFound(_) => false,
        }
    }
}

/// Why a phrase could not be geocoded. Cached alongside successes, so it owns
/// plain data instead of wrapping the transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeocodeFailure {
    #[error("no results")]
    NoResults,
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for GeocodeFailure {
    fn from(e: reqwest::Error) -> Self {
        GeocodeFailure::Upstream(e.to_string())
    }
}

use thiserror::Error;

/// Errors surfaced by the API client.
///
/// Status-code mapping happens in one place (`GGClient::check_response`) so
/// every call site gets the same taxonomy: 401 is an authentication
/// failure, 403 is either a quota exhaustion or a scope mismatch depending
/// on the payload, anything else unexpected keeps its status and detail.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API key. Did you forget to set GITGUARDIAN_API_KEY?")]
    Auth,

    #[error("Missing permission: {0}")]
    MissingScopes(String),

    #[error("Quota limit reached: {0}")]
    QuotaLimitReached(String),

    #[error("GitGuardian server is not responding: {0}")]
    ServerUnavailable(String),

    #[error("API error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("Could not connect to GitGuardian: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected API response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// True for errors that must abort the whole invocation rather than a
    /// single chunk.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Auth | ApiError::QuotaLimitReached(_))
    }
}

use ggshield_api::ApiError;
use thiserror::Error;

/// Process exit codes shared by every reporter and hook driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// No reportable secrets (or all of them ignored).
    Success = 0,
    /// The scan found reportable secrets.
    ScanFoundProblems = 1,
    /// User input was invalid (bad ref, not a git repository, ...).
    UsageError = 2,
    /// Authentication or permission failure.
    AuthenticationError = 3,
    /// Any other failure. Pre-receive downgrades this to `Success` at its
    /// own boundary so pushes are never blocked on server overload.
    UnexpectedError = 128,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitCode::Success,
            1 => ExitCode::ScanFoundProblems,
            2 => ExitCode::UsageError,
            3 => ExitCode::AuthenticationError,
            _ => ExitCode::UnexpectedError,
        }
    }
}

/// Unified error type for the scanning pipeline.
///
/// Every variant maps to exactly one [`ExitCode`]; per-scannable problems
/// (decode failures, oversize documents) are not errors but skip reports,
/// see `ScannerUI`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("{0}")]
    Auth(String),

    #[error("Missing permission: {0}")]
    MissingScopes(String),

    #[error("Quota limit reached: {0}")]
    QuotaLimitReached(String),

    #[error("{0}")]
    ContentTooLarge(String),

    #[error("{0}")]
    Unexpected(String),
}

impl Error {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::Usage(_) => ExitCode::UsageError,
            Error::Auth(_) | Error::MissingScopes(_) => ExitCode::AuthenticationError,
            Error::QuotaLimitReached(_) | Error::ContentTooLarge(_) | Error::Unexpected(_) => {
                ExitCode::UnexpectedError
            }
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Auth => Error::Auth(err.to_string()),
            ApiError::MissingScopes(detail) => Error::MissingScopes(detail),
            ApiError::QuotaLimitReached(detail) => Error::QuotaLimitReached(detail),
            // Server and transport failures are just unexpected errors;
            // there is no dedicated exit code for them.
            other => Error::Unexpected(other.to_string()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_the_contract() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::ScanFoundProblems.code(), 1);
        assert_eq!(ExitCode::UsageError.code(), 2);
        assert_eq!(ExitCode::AuthenticationError.code(), 3);
        assert_eq!(ExitCode::UnexpectedError.code(), 128);
    }

    #[test]
    fn errors_map_to_exit_codes() {
        assert_eq!(
            Error::Usage("bad ref".into()).exit_code(),
            ExitCode::UsageError
        );
        assert_eq!(
            Error::Auth("401".into()).exit_code(),
            ExitCode::AuthenticationError
        );
        assert_eq!(
            Error::MissingScopes("scan:create-incidents".into()).exit_code(),
            ExitCode::AuthenticationError
        );
        assert_eq!(
            Error::QuotaLimitReached("0 left".into()).exit_code(),
            ExitCode::UnexpectedError
        );
    }

    #[test]
    fn api_errors_convert() {
        let err: Error = ApiError::Auth.into();
        assert_eq!(err.exit_code(), ExitCode::AuthenticationError);
        let err: Error = ApiError::QuotaLimitReached("quota".into()).into();
        assert_eq!(err.exit_code(), ExitCode::UnexpectedError);
        let err: Error = ApiError::ServerUnavailable("503".into()).into();
        assert!(matches!(err, Error::Unexpected(_)));
        assert_eq!(err.exit_code(), ExitCode::UnexpectedError);
    }

    #[test]
    fn from_code_round_trips() {
        for code in [0, 1, 2, 3, 128] {
            assert_eq!(ExitCode::from_code(code).code(), code);
        }
        assert_eq!(ExitCode::from_code(77), ExitCode::UnexpectedError);
    }
}

use rama::http::StatusCode;
use thiserror::Error;

/// Request failures that map to a specific client-facing status.
///
/// Anything else bubbling up through `anyhow` is answered with a 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid path")]
    InvalidPath,
    #[error("Invalid scope name '{0}'")]
    InvalidScope(String),
    #[error("Invalid package name '{0}'")]
    InvalidPackageName(String),
    #[error("Invalid package version '{0}'")]
    InvalidVersion(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("Source map is disabled")]
    SourceMapDisabled,
    #[error("Could not get the package version")]
    VersionNotFound,
    #[error("Not Found")]
    NotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Payload Too Large")]
    PayloadTooLarge,
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPath
            | Self::InvalidScope(_)
            | Self::InvalidPackageName(_)
            | Self::InvalidVersion(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::SourceMapDisabled | Self::VersionNotFound | Self::NotFound => {
                StatusCode::NOT_FOUND
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(RequestError::InvalidPath.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RequestError::InvalidVersion("^x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RequestError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(RequestError::VersionNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RequestError::SourceMapDisabled.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RequestError::MethodNotAllowed.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            RequestError::PayloadTooLarge.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn messages_name_the_offending_input() {
        assert_eq!(
            RequestError::InvalidPackageName("re act".into()).to_string(),
            "Invalid package name 're act'"
        );
        assert_eq!(
            RequestError::InvalidScope("@bad scope".into()).to_string(),
            "Invalid scope name '@bad scope'"
        );
    }
}

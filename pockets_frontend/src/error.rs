use thiserror::Error;

/// Failures talking to the REST backend or to object storage.
///
/// Values are `Clone` so a single in-flight token refresh can hand the same
/// outcome to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("your session has expired, please sign in again")]
    Unauthorized,
    #[error("unexpected response for {context}: {message}")]
    Decode { context: String, message: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// True when the request was dropped on purpose (superseded or aborted)
    /// rather than failing.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }

    pub(crate) fn decode(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ApiError::Decode {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ApiError::decode("response body", err);
        }
        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return ApiError::Unauthorized;
            }
            return ApiError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            };
        }
        ApiError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("file name may not be empty")]
    EmptyFileName,
    #[error("could not get an upload destination: {0}")]
    Destination(ApiError),
    #[error("upload failed: {0}")]
    Transfer(ApiError),
    #[error("could not read file: {0}")]
    Io(String),
}

impl UploadError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            UploadError::Destination(err) | UploadError::Transfer(err) => err.is_cancelled(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("select at least one photo")]
    NothingSelected,
    #[error("Please wait for all uploads to finish ({pending} remaining)")]
    UploadsPending { pending: usize },
    #[error("an upload is already being submitted")]
    AlreadySubmitting,
    #[error("could not add photos: {0}")]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("nothing was recorded")]
    EmptyRecording,
    #[error("{0} recordings cannot be played back")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Turns any displayable failure into the text shown in an inline banner.
pub fn user_message(err: &impl std::fmt::Display) -> String {
    let text = err.to_string();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Something went wrong".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_distinguished() {
        assert!(ApiError::Cancelled.is_cancelled());
        assert!(!ApiError::Unauthorized.is_cancelled());
        assert!(UploadError::Transfer(ApiError::Cancelled).is_cancelled());
        assert!(!UploadError::EmptyFileName.is_cancelled());
    }

    #[test]
    fn pending_claim_message_asks_to_wait() {
        let msg = user_message(&ClaimError::UploadsPending { pending: 2 });
        assert!(msg.starts_with("Please wait for all uploads"));
    }

    #[test]
    fn user_message_capitalises() {
        let msg = user_message(&ApiError::Transport("connection refused".into()));
        assert_eq!(msg, "Could not reach the server: connection refused");
    }
}

use std::fmt;

use http::StatusCode;
use serde::de::DeserializeOwned;

/// Why a vendor call failed for a reason other than a rejected token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No token in the store and none could be minted.
    TokenUnavailable,
    Timeout,
    Transport(String),
    Status(u16),
    Decode(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TokenUnavailable => write!(f, "token unavailable"),
            FailureReason::Timeout => write!(f, "vendor call timed out"),
            FailureReason::Transport(e) => write!(f, "vendor unreachable: {}", e),
            FailureReason::Status(code) => write!(f, "vendor responded with HTTP {}", code),
            FailureReason::Decode(e) => write!(f, "vendor response unreadable: {}", e),
        }
    }
}

/// Result of a single vendor API invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    /// 401/403: the presented token was rejected.
    AuthFailure,
    OtherFailure(FailureReason),
}

impl<T> CallOutcome<T> {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, CallOutcome::AuthFailure)
    }

    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            CallOutcome::Success(_) => "success",
            CallOutcome::AuthFailure => "auth_failure",
            CallOutcome::OtherFailure(FailureReason::Timeout) => "timeout",
            CallOutcome::OtherFailure(_) => "other_failure",
        }
    }
}

impl<T: DeserializeOwned> CallOutcome<T> {
    /// 401/403 → `AuthFailure`, any other non-2xx → `OtherFailure`,
    /// 2xx → body decoded as `T`.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return CallOutcome::AuthFailure;
        }
        if !status.is_success() {
            return CallOutcome::OtherFailure(FailureReason::Status(status.as_u16()));
        }
        match response.json::<T>().await {
            Ok(body) => CallOutcome::Success(body),
            Err(e) => CallOutcome::OtherFailure(FailureReason::Decode(e.to_string())),
        }
    }

    pub fn from_transport_error(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            CallOutcome::OtherFailure(FailureReason::Timeout)
        } else {
            CallOutcome::OtherFailure(FailureReason::Transport(error.to_string()))
        }
    }
}

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("{provider} is not configured: {message}")]
    NotConfigured { provider: String, message: String },

    #[error("{provider} transport error: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} request failed ({status}): {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unreadable payload: {message}")]
    InvalidPayload { provider: String, message: String },

    #[error("{provider} returned no usable text: {reason}")]
    NoText { provider: String, reason: String },
}

/// Terminal failure of one submission cycle.
///
/// The user turn of the failed cycle stays in the store; no assistant turn
/// is appended.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("remote call failed: {0}")]
    RemoteCallFailed(ServiceError),

    #[error("malformed response from {provider}: {reason}")]
    MalformedResponse { provider: String, reason: String },
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::RemoteCallFailed(_) => "remote_call_failed",
            DispatchError::MalformedResponse { .. } => "malformed_response",
        }
    }

    /// Short notice suitable for showing to the student.
    pub fn user_notice(&self) -> String {
        match self {
            DispatchError::RemoteCallFailed(ServiceError::Status { status: 429, .. }) => {
                "The tutor is over its usage quota right now. Please resubmit your question in a moment."
                    .to_string()
            }
            DispatchError::RemoteCallFailed(ServiceError::NotConfigured { message, .. }) => {
                format!("The tutor is not configured: {message}")
            }
            DispatchError::RemoteCallFailed(_) => {
                "The tutor could not be reached. Your question was kept; please resubmit it."
                    .to_string()
            }
            DispatchError::MalformedResponse { .. } => {
                "The tutor replied without any usable text. Please resubmit your question."
                    .to_string()
            }
        }
    }
}

impl From<ServiceError> for DispatchError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidPayload { provider, message } => {
                DispatchError::MalformedResponse {
                    provider,
                    reason: message,
                }
            }
            ServiceError::NoText { provider, reason } => {
                DispatchError::MalformedResponse { provider, reason }
            }
            other => DispatchError::RemoteCallFailed(other),
        }
    }
}

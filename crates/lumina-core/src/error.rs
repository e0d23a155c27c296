// ── Core error types ──
//
// User-facing errors from lumina-core. These are NOT transport-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<lumina_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to backend: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- login again to resume live updates")]
    SessionExpired,

    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lumina_api::Error> for CoreError {
    fn from(err: lumina_api::Error) -> Self {
        match err {
            lumina_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            lumina_api::Error::NotAuthenticated | lumina_api::Error::SessionExpired => {
                CoreError::SessionExpired
            }
            lumina_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                reason: e.to_string(),
            },
            lumina_api::Error::InvalidUrl(e) => CoreError::Internal(format!("invalid URL: {e}")),
            lumina_api::Error::Tls(reason) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {reason}"),
            },
            lumina_api::Error::Api { message, status } => CoreError::Api {
                message,
                status: Some(status),
            },
            lumina_api::Error::StreamRejected { status } => CoreError::ConnectionFailed {
                reason: format!("event stream rejected (HTTP {status})"),
            },
            lumina_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("deserialization error: {message}"))
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

use thiserror::Error;

/// Top-level error type for the `lumina-api` crate.
///
/// Covers every failure mode of the transport layer: authentication,
/// HTTP, the REST API surface, and the SSE event stream.
/// `lumina-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A call that requires a bearer token was made with no session.
    #[error("Not authenticated -- login required")]
    NotAuthenticated,

    /// The backend rejected the bearer token (401). The session has
    /// already been cleared by the time this surfaces.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST API ────────────────────────────────────────────────────
    /// Structured error from the backend (non-2xx with a JSON body).
    #[error("API error (HTTP {status}): {message}")]
    Api { message: String, status: u16 },

    // ── Event stream ────────────────────────────────────────────────
    /// The SSE endpoint refused the connection (non-2xx response).
    #[error("Event stream rejected (HTTP {status})")]
    StreamRejected { status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired | Self::NotAuthenticated | Self::StreamRejected { status: 401 }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } | Self::StreamRejected { status } => *status >= 500,
            _ => false,
        }
    }
}

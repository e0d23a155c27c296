// Shared transport configuration for building reqwest::Client instances.
//
// The REST wrappers and the SSE stream share TLS and timeout settings
// through this module; the SSE request itself overrides the timeout,
// since an event stream is unbounded by design.

use std::path::PathBuf;
use std::time::Duration;

/// TLS verification mode.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (for self-signed development backends).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` for request/response calls.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        self.build(true)
    }

    /// Build a `reqwest::Client` for the SSE stream.
    ///
    /// The configured timeout applies to connection establishment only;
    /// a total-request timeout would kill the stream mid-flight.
    pub fn build_stream_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        self.build(false)
    }

    fn build(&self, total_timeout: bool) -> Result<reqwest::Client, crate::error::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .user_agent(concat!("lumina-api/", env!("CARGO_PKG_VERSION")));

        if total_timeout {
            builder = builder.timeout(self.timeout);
        }

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path).map_err(|e| {
                    crate::error::Error::Tls(format!("failed to read CA cert: {e}"))
                })?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| crate::error::Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| crate::error::Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

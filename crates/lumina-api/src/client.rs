// Hand-crafted async HTTP client for the Lumina backend REST API.
//
// Base path: /api/
// Auth: `Authorization: Bearer <token>` on every call except login/health.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::auth::{Account, LoginRequest, LoginResponse, Session};
use crate::error::Error;
use crate::model::{
    Environment, EnvironmentWrite, HealthStatus, Luminaire, LuminaireId, LuminaireWrite,
};
use crate::transport::TransportConfig;

// ── Error response shape from the backend ────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the Lumina REST API.
///
/// Owns the shared [`Session`] credential slot; the SSE connection
/// manager reads the same slot, so a 401 anywhere revokes the
/// credential everywhere.
pub struct ApiClient {
    pub(crate) http: reqwest::Client,
    /// Separate client for the SSE stream: no total-request timeout.
    pub(crate) stream_http: reqwest::Client,
    pub(crate) base_url: Url,
    pub(crate) session: Arc<Session>,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a base URL (e.g. `http://host:8080/api`) and transport
    /// config. Starts with an empty session; call
    /// [`login()`](Self::login) before authenticated calls.
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_stream_client()?,
            base_url: Self::normalize_base_url(base_url)?,
            session: Arc::new(Session::new()),
        })
    }

    /// Wrap an existing `reqwest::Client` (used for both REST and SSE).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            stream_http: http.clone(),
            http,
            base_url: Self::normalize_base_url(base_url)?,
            session: Arc::new(Session::new()),
        })
    }

    /// Ensure the base URL ends with `/` so relative joins work.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    /// The shared credential slot.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Join a relative path (e.g. `"luminaires/3"`) onto the base URL.
    pub(crate) fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    /// The bearer header value for the current session.
    pub(crate) fn bearer(&self) -> Result<String, Error> {
        let token = self.session.token().ok_or(Error::NotAuthenticated)?;
        Ok(format!("Bearer {}", token.expose_secret()))
    }

    // ── Auth ─────────────────────────────────────────────────────────

    /// Authenticate and install the issued token into the session.
    pub async fn login(&self, username: &str, password: &str) -> Result<Account, Error> {
        let url = self.url("auth/login")?;
        debug!(%url, username, "POST login");

        let resp = self
            .http
            .post(url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("login rejected (HTTP {status})"));
            return Err(Error::Authentication { message });
        }

        let body: LoginResponse = resp.json().await?;
        let account = Account {
            username: username.to_owned(),
            role: body.role.unwrap_or_else(|| "USER".into()),
        };
        self.session
            .open(body.token.into(), account.clone());
        Ok(account)
    }

    /// Drop the local credential. The backend keeps no server-side
    /// session to invalidate.
    pub fn logout(&self) {
        self.session.clear();
    }

    // ── Health ───────────────────────────────────────────────────────

    /// Backend liveness probe (unauthenticated).
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let url = self.url("health")?;
        debug!(%url, "GET health");
        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    // ── Environments ─────────────────────────────────────────────────

    pub async fn list_environments(&self) -> Result<Vec<Environment>, Error> {
        self.get("environments").await
    }

    pub async fn create_environment(&self, env: &EnvironmentWrite) -> Result<Environment, Error> {
        self.post("environments", env).await
    }

    pub async fn update_environment(
        &self,
        id: i64,
        env: &EnvironmentWrite,
    ) -> Result<Environment, Error> {
        self.put(&format!("environments/{id}"), env).await
    }

    pub async fn delete_environment(&self, id: i64) -> Result<(), Error> {
        self.delete(&format!("environments/{id}")).await
    }

    // ── Luminaires ───────────────────────────────────────────────────

    pub async fn list_luminaires(&self) -> Result<Vec<Luminaire>, Error> {
        self.get("luminaires").await
    }

    pub async fn create_luminaire(&self, lum: &LuminaireWrite) -> Result<Luminaire, Error> {
        self.post("luminaires", lum).await
    }

    pub async fn update_luminaire(
        &self,
        id: &LuminaireId,
        lum: &LuminaireWrite,
    ) -> Result<Luminaire, Error> {
        self.put(&format!("luminaires/{id}"), lum).await
    }

    pub async fn delete_luminaire(&self, id: &LuminaireId) -> Result<(), Error> {
        self.delete(&format!("luminaires/{id}")).await
    }

    /// Flip a luminaire's on/off state via a full-record PUT.
    pub async fn toggle_luminaire(&self, lum: &Luminaire) -> Result<Luminaire, Error> {
        self.update_luminaire(&lum.id, &lum.toggled()).await
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("PUT {url}");

        let resp = self
            .http
            .put(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn delete(&self, path: &str) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("DELETE {url}");

        let resp = self
            .http
            .delete(url)
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;
        self.handle_empty(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    /// A 401 revokes the session: the old token must never be retried.
    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.session.clear();
            return Err(Error::SessionExpired);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.message)
                .unwrap_or_else(|| "request failed".into());
            return Err(Error::Api { message, status });
        }
        Ok(resp)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let resp = self.check_status(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    async fn handle_empty(&self, resp: reqwest::Response) -> Result<(), Error> {
        self.check_status(resp).await?;
        Ok(())
    }
}

// ── Bearer-token session handling ──
//
// The backend issues an opaque bearer token on login. The token and the
// logged-in account live together in a lock-free `Session` slot shared
// between the REST wrappers and the SSE connection manager; a 401 from
// any call clears the whole slot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// The account a session was opened for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub role: String,
}

/// Wire request for `POST /auth/login`.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Wire response from `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Shared credential slot.
///
/// A session is *active* only when both a token and an account are
/// present. Revocation (logout or a 401) clears both atomically enough
/// for our purposes: readers see either a usable credential or none.
#[derive(Default)]
pub struct Session {
    token: ArcSwapOption<SecretString>,
    account: ArcSwapOption<Account>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly issued credential.
    pub fn open(&self, token: SecretString, account: Account) {
        self.token.store(Some(Arc::new(token)));
        self.account.store(Some(Arc::new(account)));
    }

    /// The current bearer token, if any.
    pub fn token(&self) -> Option<Arc<SecretString>> {
        self.token.load_full()
    }

    /// The account this session belongs to, if any.
    pub fn account(&self) -> Option<Arc<Account>> {
        self.account.load_full()
    }

    /// Whether the session is usable for authenticated calls.
    pub fn is_active(&self) -> bool {
        self.token.load().is_some() && self.account.load().is_some()
    }

    /// Drop the credential. Called on logout and on any 401.
    pub fn clear(&self) {
        self.token.store(None);
        self.account.store(None);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("account", &self.account.load().as_deref().map(|a| &a.username))
            .finish()
    }
}

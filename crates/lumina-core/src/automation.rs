//! Automation event-stream supervisor with auto-reconnect.
//!
//! Owns the single permitted live connection to the SSE endpoint:
//! opens it, feeds decoded frames through the interpreter into the
//! [`StateStore`], and recovers from disconnects without operator
//! intervention. Losing the live channel degrades to staleness, never
//! to a crash -- while a credential exists the loop always works its
//! way back to `Connected`.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumina_core::{AutomationClient, StateStore};
//!
//! let store = Arc::new(StateStore::new());
//! let client = AutomationClient::new(api, Arc::clone(&store));
//!
//! let mut state = client.connection_state();
//! client.connect().await;
//!
//! state.wait_for(|s| *s == ConnectionState::Connected).await?;
//! println!("{} luminaires known", store.snapshot().len());
//!
//! client.shutdown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::event::{self, AutomationEvent};
use crate::store::StateStore;
use lumina_api::{Account, ApiClient, Error as ApiError};

const NOTICE_CHANNEL_CAPACITY: usize = 64;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers (drives the status badge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying (no credential, or torn down).
    Idle,
    Connecting,
    Connected,
    /// Connection lost; a reconnect is scheduled.
    Disconnected,
}

// ── Notices ──────────────────────────────────────────────────────────

/// Severity of a user-facing status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A human-readable status message for the notification sink.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

fn notify(tx: &broadcast::Sender<Notice>, severity: Severity, message: impl Into<String>) {
    // Send errors just mean no subscriber is listening right now.
    let _ = tx.send(Notice {
        message: message.into(),
        severity,
    });
}

// ── ReconnectPolicy ──────────────────────────────────────────────────

/// Fixed reconnect delays.
///
/// A clean server-side close is routine (load balancer rotation, idle
/// trim) and retries quickly; a transport error backs off longer.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Delay after the server closes the stream cleanly. Default: 2s.
    pub after_close: Duration,
    /// Delay after a connection or mid-stream failure. Default: 5s.
    pub after_error: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            after_close: Duration::from_secs(2),
            after_error: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// The delay before the next attempt, or `None` when no reconnect
    /// may be scheduled (deliberate cancellation, revoked credential).
    fn delay_for(&self, end: &StreamEnd) -> Option<Duration> {
        match end {
            StreamEnd::Closed => Some(self.after_close),
            StreamEnd::Failed(_) => Some(self.after_error),
            StreamEnd::Cancelled | StreamEnd::Revoked => None,
        }
    }
}

/// How one connection attempt ended.
#[derive(Debug)]
enum StreamEnd {
    /// The server closed the stream without an error.
    Closed,
    /// Establishment or mid-stream transport failure.
    Failed(ApiError),
    /// Deliberate local cancellation (logout or a superseding connect).
    Cancelled,
    /// The backend rejected the credential; the session is already cleared.
    Revoked,
}

// ── AutomationClient ─────────────────────────────────────────────────

/// Handle to the real-time state synchronization pipeline.
///
/// Constructed once per authenticated session and torn down on logout.
/// Guarantees at most one live stream at any time: a new
/// [`connect()`](Self::connect) first cancels and awaits the previous
/// attempt's task, so events are never processed twice.
pub struct AutomationClient {
    api: Arc<ApiClient>,
    store: Arc<StateStore>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: broadcast::Sender<Notice>,
    active: Mutex<Option<Attempt>>,
}

struct Attempt {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AutomationClient {
    pub fn new(api: Arc<ApiClient>, store: Arc<StateStore>) -> Self {
        Self::with_policy(api, store, ReconnectPolicy::default())
    }

    pub fn with_policy(
        api: Arc<ApiClient>,
        store: Arc<StateStore>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            api,
            store,
            policy,
            state_tx,
            notice_tx,
            active: Mutex::new(None),
        }
    }

    /// The store this client reconciles into.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Observe connection state transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to user-facing status messages.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Start (or restart) the event stream.
    ///
    /// Single-flight: any prior attempt is cancelled and awaited before
    /// the new reader task spawns. With no active session this is a
    /// silent no-op -- the state stays [`Idle`](ConnectionState::Idle)
    /// until a credential exists and `connect()` is called again.
    pub async fn connect(&self) {
        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            debug!("superseding previous stream attempt");
            prev.cancel.cancel();
            let _ = prev.task.await;
        }

        if !self.api.session().is_active() {
            debug!("no credential available -- not connecting");
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.api),
            Arc::clone(&self.store),
            self.policy.clone(),
            self.state_tx.clone(),
            self.notice_tx.clone(),
            cancel.clone(),
        ));
        *active = Some(Attempt { cancel, task });
    }

    /// Tear the connection down without scheduling a reconnect.
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            prev.cancel.cancel();
            let _ = prev.task.await;
        }
        let _ = self.state_tx.send(ConnectionState::Idle);
    }

    /// Authenticate and start live updates in one step.
    ///
    /// Transport-layer failures surface as [`CoreError`] -- consumers
    /// never see HTTP status codes or wire formats from here.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Account, CoreError> {
        let account = self.api.login(username, password).await?;
        self.connect().await;
        Ok(account)
    }

    /// Drop the credential and tear the stream down, with no reconnect.
    pub async fn sign_out(&self) {
        self.api.logout();
        self.shutdown().await;
    }
}

// ── Supervision loop ─────────────────────────────────────────────────

/// Main loop: connect → read → decide → (delay →) reconnect.
async fn run_loop(
    api: Arc<ApiClient>,
    store: Arc<StateStore>,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: broadcast::Sender<Notice>,
    cancel: CancellationToken,
) {
    loop {
        // Checked on every attempt, including at reconnect fire time:
        // a credential revoked while we slept must not be retried.
        if !api.session().is_active() {
            debug!("credential gone -- stopping event stream");
            break;
        }

        let _ = state_tx.send(ConnectionState::Connecting);
        let end = stream_once(&api, &store, &state_tx, &notice_tx, &cancel).await;

        match &end {
            StreamEnd::Closed => {
                info!("event stream closed by server, will reconnect");
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
            StreamEnd::Failed(e) => {
                warn!(error = %e, "event stream failed, will reconnect");
                let _ = state_tx.send(ConnectionState::Disconnected);
                notify(
                    &notice_tx,
                    Severity::Warning,
                    "Connection to server lost. Reconnecting...",
                );
            }
            StreamEnd::Cancelled => {
                debug!("event stream cancelled");
                break;
            }
            StreamEnd::Revoked => {
                warn!("session revoked -- live updates stopped");
                notify(
                    &notice_tx,
                    Severity::Error,
                    "Session expired. Log in again to resume live updates.",
                );
                break;
            }
        }

        let Some(delay) = policy.delay_for(&end) else {
            break;
        };
        debug!(?delay, "waiting before reconnect");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    let _ = state_tx.send(ConnectionState::Idle);
    debug!("event stream loop exiting");
}

/// One connection attempt: open the stream, then pump frames through
/// the interpreter into the store until it ends.
async fn stream_once(
    api: &ApiClient,
    store: &StateStore,
    state_tx: &watch::Sender<ConnectionState>,
    notice_tx: &broadcast::Sender<Notice>,
    cancel: &CancellationToken,
) -> StreamEnd {
    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return StreamEnd::Cancelled,
        result = api.automation_events() => match result {
            Ok(stream) => stream,
            Err(e) if e.is_auth_expired() => return StreamEnd::Revoked,
            Err(e) => return StreamEnd::Failed(e),
        }
    };

    let _ = state_tx.send(ConnectionState::Connected);
    info!("automation event stream connected");
    notify(
        notice_tx,
        Severity::Success,
        "Automation connected. Live state updates active.",
    );

    let mut stream = std::pin::pin!(stream);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            frame = stream.next() => match frame {
                Some(Ok(frame)) => {
                    let Some(ev) = event::interpret(&frame) else {
                        // Malformed frame: dropped by the interpreter,
                        // the stream itself keeps going.
                        continue;
                    };
                    if let AutomationEvent::Delta { id, is_on } = &ev {
                        notify(
                            notice_tx,
                            Severity::Info,
                            format!(
                                "Luminaire {id} turned {}",
                                if *is_on { "on" } else { "off" }
                            ),
                        );
                    }
                    store.apply(ev);
                }
                Some(Err(e)) => return StreamEnd::Failed(e),
                None => return StreamEnd::Closed,
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lumina_api::auth::Account;
    use secrecy::SecretString;

    fn fake_login(api: &ApiClient) {
        api.session().open(
            SecretString::from("tok-test".to_string()),
            Account {
                username: "admin".into(),
                role: "ADMIN".into(),
            },
        );
    }

    fn client_against(url: &str) -> AutomationClient {
        let api =
            Arc::new(ApiClient::from_reqwest(url, reqwest::Client::new()).expect("api client"));
        fake_login(&api);
        AutomationClient::new(api, Arc::new(StateStore::new()))
    }

    #[test]
    fn clean_close_reconnects_sooner_than_error() {
        let policy = ReconnectPolicy::default();

        let closed = policy.delay_for(&StreamEnd::Closed).expect("delay");
        let failed = policy
            .delay_for(&StreamEnd::Failed(ApiError::StreamRejected { status: 502 }))
            .expect("delay");

        assert_eq!(closed, Duration::from_secs(2));
        assert_eq!(failed, Duration::from_secs(5));
        assert!(closed < failed);
    }

    #[test]
    fn cancellation_and_revocation_schedule_nothing() {
        let policy = ReconnectPolicy::default();
        assert!(policy.delay_for(&StreamEnd::Cancelled).is_none());
        assert!(policy.delay_for(&StreamEnd::Revoked).is_none());
    }

    #[tokio::test]
    async fn second_connect_cancels_the_first() {
        // Nothing listens on this port; every attempt fails and the
        // loop parks in its 5s retry sleep, keeping the task alive.
        let client = client_against("http://127.0.0.1:9");

        client.connect().await;
        let first_cancel = {
            let active = client.active.lock().await;
            active.as_ref().expect("first attempt").cancel.clone()
        };
        assert!(!first_cancel.is_cancelled());

        client.connect().await;
        assert!(first_cancel.is_cancelled());

        let active = client.active.lock().await;
        assert!(active.as_ref().is_some_and(|a| !a.cancel.is_cancelled()));
        drop(active);

        client.shutdown().await;
    }

    #[tokio::test]
    async fn connect_without_credential_is_a_no_op() {
        let api = Arc::new(
            ApiClient::from_reqwest("http://127.0.0.1:9", reqwest::Client::new())
                .expect("api client"),
        );
        let client = AutomationClient::new(api, Arc::new(StateStore::new()));

        client.connect().await;

        assert!(client.active.lock().await.is_none());
        assert_eq!(*client.connection_state().borrow(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn shutdown_returns_to_idle() {
        let client = client_against("http://127.0.0.1:9");
        client.connect().await;
        client.shutdown().await;

        assert!(client.active.lock().await.is_none());
        assert_eq!(*client.connection_state().borrow(), ConnectionState::Idle);
    }
}

// ── Luminaire state store ──
//
// The local authoritative cache of luminaire on/off state. Reads are
// lock-free snapshots via arc-swap; every mutation is pushed to UI
// subscribers through a broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::AutomationEvent;
use lumina_api::LuminaireId;

const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// A state change pushed to UI subscribers.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// The whole map was replaced; re-render everything.
    Full(Arc<HashMap<LuminaireId, bool>>),
    /// One luminaire changed; refresh just that card.
    One { id: LuminaireId, is_on: bool },
}

/// The authoritative luminaire on/off cache.
///
/// Lives for the whole authenticated session. Mutated only on the
/// stream-reader task's call path; read by anyone. After any prefix of
/// the event sequence the map equals the most recent snapshot overlaid
/// with every delta applied after it, in arrival order -- nothing is
/// ever rolled back.
pub struct StateStore {
    states: ArcSwap<HashMap<LuminaireId, bool>>,
    update_tx: broadcast::Sender<StateUpdate>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            states: ArcSwap::from_pointee(HashMap::new()),
            update_tx,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Point-in-time snapshot of every known state.
    pub fn snapshot(&self) -> Arc<HashMap<LuminaireId, bool>> {
        self.states.load_full()
    }

    /// The on/off state of one luminaire, if known.
    pub fn is_on(&self, id: &LuminaireId) -> Option<bool> {
        self.states.load().get(id).copied()
    }

    /// Subscribe to state changes.
    ///
    /// Slow consumers observe [`broadcast::error::RecvError::Lagged`]
    /// and should re-read [`snapshot()`](Self::snapshot).
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.update_tx.subscribe()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Replace the entire map. Always succeeds; notifies a full refresh.
    pub fn apply_snapshot(&self, states: HashMap<LuminaireId, bool>) {
        debug!(count = states.len(), "applying full state snapshot");
        let states = Arc::new(states);
        self.states.store(Arc::clone(&states));
        // Send errors just mean nobody is listening right now.
        let _ = self.update_tx.send(StateUpdate::Full(states));
    }

    /// Upsert one entry (created if unseen). Always succeeds; notifies
    /// a single-entity refresh.
    pub fn apply_delta(&self, id: LuminaireId, is_on: bool) {
        debug!(%id, is_on, "applying state delta");
        let mut next: HashMap<_, _> = (**self.states.load()).clone();
        next.insert(id.clone(), is_on);
        self.states.store(Arc::new(next));
        let _ = self.update_tx.send(StateUpdate::One { id, is_on });
    }

    /// Apply one interpreted event.
    pub fn apply(&self, event: AutomationEvent) {
        match event {
            AutomationEvent::Snapshot(states) => self.apply_snapshot(states),
            AutomationEvent::Delta { id, is_on } => self.apply_delta(id, is_on),
        }
    }
}

// lumina-core: Real-time state layer between lumina-api and consumers (UI).

pub mod automation;
pub mod error;
pub mod event;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use automation::{AutomationClient, ConnectionState, Notice, ReconnectPolicy, Severity};
pub use error::CoreError;
pub use event::AutomationEvent;
pub use store::{StateStore, StateUpdate};

// Re-export the api types that appear in this crate's signatures.
pub use lumina_api::{Account, LuminaireId};

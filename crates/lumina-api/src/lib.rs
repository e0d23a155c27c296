// lumina-api: Async Rust client for the Lumina backend (REST CRUD + SSE events)

pub mod auth;
pub mod client;
pub mod error;
pub mod model;
pub mod sse;
pub mod transport;

pub use auth::{Account, Session};
pub use client::ApiClient;
pub use error::Error;
pub use model::{
    Environment, EnvironmentWrite, HealthStatus, Luminaire, LuminaireId, LuminaireWrite,
};
pub use sse::{FrameDecoder, SseFrame};
pub use transport::{TlsMode, TransportConfig};

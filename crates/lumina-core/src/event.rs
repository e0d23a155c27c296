// ── Event interpretation ──
//
// Maps decoded SSE frames into domain operations. Classification is by
// payload shape, not the `event:` field: the backend has been observed
// to omit the type annotation on some frames, so the shape is the only
// reliable signal.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use lumina_api::{LuminaireId, SseFrame};

/// A domain operation decoded from one stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationEvent {
    /// Replace the entire known on/off state.
    Snapshot(HashMap<LuminaireId, bool>),
    /// Update exactly one luminaire.
    Delta { id: LuminaireId, is_on: bool },
}

/// Full-state payload: `{"allStates": {"<id>": bool, ...}}`.
///
/// JSON object keys are always strings; numeric ids are promoted back
/// to [`LuminaireId::Numeric`] during conversion.
#[derive(Deserialize)]
struct SnapshotPayload {
    #[serde(rename = "allStates")]
    all_states: HashMap<String, bool>,
}

/// Single-transition payload: `{"luminariaId": ..., "isOn": bool}`.
#[derive(Deserialize)]
struct DeltaPayload {
    #[serde(rename = "luminariaId")]
    luminaire_id: LuminaireId,
    #[serde(rename = "isOn")]
    is_on: bool,
}

/// Interpret one frame.
///
/// Returns `None` for anything that is not a recognized state payload:
/// invalid JSON, a JSON value that is not an object, or an object of an
/// unknown shape. A discarded frame never interrupts the stream.
pub fn interpret(frame: &SseFrame) -> Option<AutomationEvent> {
    let value: serde_json::Value = match serde_json::from_str(&frame.data) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, event = ?frame.event, "discarding unparseable frame");
            return None;
        }
    };

    if value.get("allStates").is_some() {
        return match serde_json::from_value::<SnapshotPayload>(value) {
            Ok(payload) => {
                let states = payload
                    .all_states
                    .into_iter()
                    .map(|(id, on)| (LuminaireId::from(id), on))
                    .collect();
                Some(AutomationEvent::Snapshot(states))
            }
            Err(e) => {
                debug!(error = %e, "discarding malformed snapshot frame");
                None
            }
        };
    }

    if value.get("luminariaId").is_some() && value.get("isOn").is_some() {
        return match serde_json::from_value::<DeltaPayload>(value) {
            Ok(payload) => Some(AutomationEvent::Delta {
                id: payload.luminaire_id,
                is_on: payload.is_on,
            }),
            Err(e) => {
                debug!(error = %e, "discarding malformed delta frame");
                None
            }
        };
    }

    debug!(event = ?frame.event, "discarding frame of unrecognized shape");
    None
}

// ── Wire types for the Lumina REST API ──
//
// Field names follow the backend's camelCase JSON; everything here is a
// direct serde mapping with no behavior of its own, except LuminaireId
// which unifies the numeric ids of the REST surface with the
// number-or-string ids observed on the event stream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── LuminaireId ─────────────────────────────────────────────────────

/// Canonical identifier for a luminaire.
///
/// The REST API uses numeric ids; the event stream has been observed to
/// carry them as either JSON numbers or strings. Consumers never care
/// which. String forms that parse as integers are promoted to
/// [`Numeric`](Self::Numeric) so the two spellings compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum LuminaireId {
    Numeric(i64),
    Named(String),
}

impl<'de> Deserialize<'de> for LuminaireId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = LuminaireId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or string luminaire id")
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<LuminaireId, E> {
                Ok(LuminaireId::Numeric(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<LuminaireId, E> {
                i64::try_from(v)
                    .map(LuminaireId::Numeric)
                    .map_err(|_| E::custom("luminaire id out of range"))
            }

            // Promotes numeric strings, same as `From<&str>`.
            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<LuminaireId, E> {
                Ok(LuminaireId::from(v))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl fmt::Display for LuminaireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Named(s) => write!(f, "{s}"),
        }
    }
}

impl FromStr for LuminaireId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<i64> for LuminaireId {
    fn from(n: i64) -> Self {
        Self::Numeric(n)
    }
}

impl From<&str> for LuminaireId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => Self::Numeric(n),
            Err(_) => Self::Named(s.to_owned()),
        }
    }
}

impl From<String> for LuminaireId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

// ── Environment ─────────────────────────────────────────────────────

/// A physical environment (room/area) that luminaires belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Create/update payload for an environment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentWrite {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ── Luminaire ───────────────────────────────────────────────────────

/// A lighting fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Luminaire {
    pub id: LuminaireId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Brightness percentage, 0-100.
    pub brightness: u8,
    /// Hex color, e.g. `"#ffcc00"`.
    pub color: String,
    /// On/off state.
    pub status: bool,
    pub position_x: f64,
    pub position_y: f64,
    pub environment_id: i64,
}

impl Luminaire {
    /// The full-record PUT body with `status` flipped.
    ///
    /// The backend has no partial-update endpoint; toggling is a PUT of
    /// the whole record.
    pub fn toggled(&self) -> LuminaireWrite {
        LuminaireWrite {
            name: self.name.clone(),
            kind: self.kind.clone(),
            brightness: self.brightness,
            color: self.color.clone(),
            status: !self.status,
            position_x: self.position_x,
            position_y: self.position_y,
            environment_id: self.environment_id,
        }
    }
}

/// Create/update payload for a luminaire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LuminaireWrite {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub brightness: u8,
    pub color: String,
    pub status: bool,
    pub position_x: f64,
    pub position_y: f64,
    pub environment_id: i64,
}

// ── Health ──────────────────────────────────────────────────────────

/// Response from `GET /health`. `"UP"` means healthy.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
}

impl HealthStatus {
    pub fn is_up(&self) -> bool {
        self.status == "UP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn luminaire_id_promotes_numeric_strings() {
        assert_eq!(LuminaireId::from("42"), LuminaireId::Numeric(42));
        assert_eq!(LuminaireId::from(42), LuminaireId::Numeric(42));
        assert_eq!(
            LuminaireId::from("hall-east"),
            LuminaireId::Named("hall-east".into())
        );
    }

    #[test]
    fn luminaire_id_deserializes_number_or_string() {
        let n: LuminaireId = serde_json::from_str("7").expect("number id");
        assert_eq!(n, LuminaireId::Numeric(7));

        let s: LuminaireId = serde_json::from_str("\"lobby\"").expect("string id");
        assert_eq!(s, LuminaireId::Named("lobby".into()));
    }

    #[test]
    fn luminaire_wire_roundtrip() {
        let json = serde_json::json!({
            "id": 3,
            "name": "Mesa",
            "type": "LED",
            "brightness": 80,
            "color": "#ffffff",
            "status": false,
            "positionX": 1.5,
            "positionY": 2.0,
            "environmentId": 1
        });

        let lum: Luminaire = serde_json::from_value(json).expect("luminaire");
        assert_eq!(lum.id, LuminaireId::Numeric(3));
        assert_eq!(lum.kind, "LED");
        assert!(!lum.status);

        let toggled = serde_json::to_value(lum.toggled()).expect("write body");
        assert_eq!(toggled["status"], true);
        assert_eq!(toggled["positionX"], 1.5);
        assert_eq!(toggled["environmentId"], 1);
    }

    #[test]
    fn health_up() {
        let h: HealthStatus =
            serde_json::from_str(r#"{"status":"UP","database":"UP"}"#).expect("health");
        assert!(h.is_up());
    }
}

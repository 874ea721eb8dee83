use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Familles d'appareils connues du tableau de bord. Une famille inconnue est
/// conservée telle quelle plutôt que rejetée : le dashboard l'affiche brute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    TempSensor,
    Gps,
    #[serde(untagged)]
    Other(String),
}

impl Default for DeviceKind {
    fn default() -> Self {
        DeviceKind::Other(String::new())
    }
}

/// Sévérité d'une alerte, conservée telle que reçue du fil.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    #[serde(untagged)]
    Other(String),
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Warning
    }
}

impl Severity {
    /// Niveau effectif côté affichage : tout ce qui n'est pas `critical`
    /// retombe sur `warning`.
    pub fn normalized(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            _ => "warning",
        }
    }
}

/// Horodatage tel que reçu : epoch numérique ou texte RFC3339 selon
/// l'équipement. Le noyau ne s'en sert jamais pour ordonner, il le restitue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(f64),
    Text(String),
}

/// Relevé d'un capteur de température.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempReading {
    pub temperature: f64,
    #[serde(default)]
    pub humidity: Option<f64>,
}

/// Relevé d'un traceur GPS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsReading {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub speed: Option<f64>,
}

/// Contenu d'un relevé, typé selon la famille annoncée par la trame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingPayload {
    Temp(TempReading),
    Gps(GpsReading),
    Other(Value),
}

impl ReadingPayload {
    /// Type un payload brut selon la famille de son appareil. Un payload qui
    /// ne colle pas à sa famille est conservé brut, jamais jeté : on préfère
    /// une donnée moche à un trou dans l'historique.
    pub fn from_wire(kind: &DeviceKind, raw: Value) -> Self {
        match kind {
            DeviceKind::TempSensor => match serde_json::from_value::<TempReading>(raw.clone()) {
                Ok(reading) => ReadingPayload::Temp(reading),
                Err(_) => ReadingPayload::Other(raw),
            },
            DeviceKind::Gps => match serde_json::from_value::<GpsReading>(raw.clone()) {
                Ok(reading) => ReadingPayload::Gps(reading),
                Err(_) => ReadingPayload::Other(raw),
            },
            DeviceKind::Other(_) => ReadingPayload::Other(raw),
        }
    }
}

/// État courant d'un appareil dans le registre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub meta: HashMap<String, Value>,
    pub last: Option<ReadingPayload>,
}

/// Entrée d'historique : horodatage du fil + payload typé. Immuable une fois
/// ajoutée à une série.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub ts: Option<Timestamp>,
    pub payload: ReadingPayload,
}

/// Alerte active sur le tableau de bord.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: String,
    pub device_id: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: Option<Timestamp>,
    pub raised_at: time::OffsetDateTime,
}

/// Entrée du snapshot `device_list` publiée par la flotte.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: DeviceKind,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

/// Trame `reading` telle que reçue. Tout champ absent a une valeur par
/// défaut : une trame partielle reste exploitable.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadingFrame {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub device_type: DeviceKind,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub payload: Value,
}

/// Trame `alert` telle que reçue.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertFrame {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

/// Trames télémétrie acceptées sur le topic de flotte.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Snapshot complet. Le champ `devices` est obligatoire : un vidage
    /// total doit être explicite (`[]`), jamais déduit d'un champ absent.
    DeviceList { devices: Vec<DeviceEntry> },
    Reading(ReadingFrame),
    Alert(AlertFrame),
}

/// Échec de décodage d'une trame brute.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("JSON invalide: {0}")]
    Json(#[from] serde_json::Error),
    #[error("discriminant `type` non textuel: {found}")]
    Discriminant { found: String },
    #[error("trame '{kind}' malformée: {source}")]
    Fields {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Résultat du tri d'une trame : reconnue, ou d'un type étranger. Le topic
/// est partagé, une trame étrangère n'est pas une erreur.
#[derive(Debug)]
pub enum Inbound {
    Frame(Frame),
    Foreign(Option<String>),
}

/// Décode une trame en deux temps : le JSON d'abord, le discriminant `type`
/// ensuite. Un discriminant inconnu ou absent est ignoré sans bruit ; des
/// champs incompatibles avec un discriminant connu, ou un champ requis
/// manquant, sont une vraie erreur.
pub fn decode_frame(raw: &str) -> Result<Inbound, FrameError> {
    let value: Value = serde_json::from_str(raw)?;
    let discriminant = match value.get("type") {
        None => return Ok(Inbound::Foreign(None)),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(FrameError::Discriminant {
                found: other.to_string(),
            })
        }
    };
    match discriminant.as_str() {
        "device_list" | "reading" | "alert" => match serde_json::from_value::<Frame>(value) {
            Ok(frame) => Ok(Inbound::Frame(frame)),
            Err(source) => Err(FrameError::Fields {
                kind: discriminant,
                source,
            }),
        },
        _ => Ok(Inbound::Foreign(Some(discriminant))),
    }
}

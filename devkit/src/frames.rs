/*!
Builders de trames télémétrie

Construit des trames conformes au fil Vigie (device_list / reading / alert)
pour les tests et les démos, sans dépendre du noyau. Chaque builder renvoie
un `serde_json::Value` : `.to_string()` donne le JSON compact du fil.
*/

use serde_json::{json, Value};

/// Topic télémétrie partagé par la flotte et le noyau.
pub const TELEMETRY_TOPIC: &str = "vigie/fleet/telemetry@v1";

/// Fabrique de trames prêtes à publier.
pub struct FrameBuilder;

impl FrameBuilder {
    /// Entrée de snapshot pour un appareil nommé, sans métadonnées.
    pub fn device_entry(id: &str, kind: &str, name: &str) -> Value {
        json!({ "id": id, "type": kind, "name": name })
    }

    /// Entrée de snapshot complète, métadonnées comprises.
    pub fn device_entry_with_meta(id: &str, kind: &str, name: &str, meta: Value) -> Value {
        json!({ "id": id, "type": kind, "name": name, "meta": meta })
    }

    /// Trame `device_list` : snapshot complet de la flotte.
    pub fn device_list(devices: &[Value]) -> Value {
        json!({ "type": "device_list", "devices": devices })
    }

    /// Trame `reading` horodatée maintenant (texte RFC3339, comme la flotte).
    pub fn reading(device_id: &str, device_type: &str, payload: Value) -> Value {
        json!({
            "type": "reading",
            "device_id": device_id,
            "device_type": device_type,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "payload": payload,
        })
    }

    /// Trame `reading` à horodatage epoch contrôlé, pour les scénarios qui
    /// vérifient l'éviction par ancienneté d'arrivée.
    pub fn reading_at(device_id: &str, device_type: &str, ts: f64, payload: Value) -> Value {
        json!({
            "type": "reading",
            "device_id": device_id,
            "device_type": device_type,
            "timestamp": ts,
            "payload": payload,
        })
    }

    /// Relevé d'un capteur de température.
    pub fn temp_reading(device_id: &str, temperature: f64, humidity: f64) -> Value {
        Self::reading(
            device_id,
            "temp_sensor",
            json!({ "temperature": temperature, "humidity": humidity }),
        )
    }

    /// Relevé d'un traceur GPS.
    pub fn gps_reading(device_id: &str, lat: f64, lon: f64, speed: f64) -> Value {
        Self::reading(device_id, "gps", json!({ "lat": lat, "lon": lon, "speed": speed }))
    }

    /// Trame `alert` horodatée maintenant.
    pub fn alert(device_id: &str, severity: &str, message: &str) -> Value {
        json!({
            "type": "alert",
            "device_id": device_id,
            "severity": severity,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })
    }
}

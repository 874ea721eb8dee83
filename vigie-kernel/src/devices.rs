use crate::models::{Device, DeviceEntry, DeviceKind, ReadingPayload};
use std::collections::HashMap;

/// Registre des appareils connus, seule source de vérité sur leur existence.
/// L'historique et le curseur de sélection ne font que référencer ses
/// identifiants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
}

impl DeviceRegistry {
    /// Remplace l'intégralité du registre par un snapshot. Destructif et
    /// total : un appareil absent du snapshot disparaît. En cas d'identifiant
    /// dupliqué dans le snapshot, la dernière occurrence gagne.
    pub fn replace_all(&mut self, entries: Vec<DeviceEntry>) {
        self.devices = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    Device {
                        id: entry.id,
                        name: entry.name,
                        kind: entry.kind,
                        meta: entry.meta,
                        last: None,
                    },
                )
            })
            .collect();
    }

    /// Crée ou met à jour l'appareil visé par un relevé. Fusion
    /// superficielle : `kind` et `last` sont rafraîchis, `name` et `meta`
    /// restent acquis. Ne refuse rien, pas même l'identifiant vide.
    pub fn upsert(&mut self, id: &str, kind: DeviceKind, payload: ReadingPayload) -> &Device {
        let device = self.devices.entry(id.to_owned()).or_insert_with(|| Device {
            id: id.to_owned(),
            name: None,
            kind: DeviceKind::default(),
            meta: HashMap::new(),
            last: None,
        });
        device.kind = kind;
        device.last = Some(payload);
        device
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Itère sur les appareils, sans ordre garanti.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Identifiants connus (pour réaligner les historiques sur un snapshot).
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.devices.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TempReading;
    use serde_json::json;

    fn entry(id: &str, kind: DeviceKind, name: &str) -> DeviceEntry {
        DeviceEntry {
            id: id.into(),
            name: Some(name.into()),
            kind,
            meta: HashMap::from([("plant".to_string(), json!("Plant 1"))]),
        }
    }

    fn temp_payload(temperature: f64) -> ReadingPayload {
        ReadingPayload::Temp(TempReading {
            temperature,
            humidity: None,
        })
    }

    #[test]
    fn replace_all_is_total() {
        let mut registry = DeviceRegistry::default();
        registry.upsert("ghost", DeviceKind::Gps, temp_payload(1.0));

        registry.replace_all(vec![entry("temp-1", DeviceKind::TempSensor, "PlantSensor-1")]);

        assert_eq!(registry.len(), 1);
        assert!(!registry.contains("ghost"));
        let device = registry.get("temp-1").unwrap();
        assert_eq!(device.name.as_deref(), Some("PlantSensor-1"));
        assert_eq!(device.last, None);
    }

    #[test]
    fn replace_all_duplicate_ids_last_wins() {
        let mut registry = DeviceRegistry::default();
        registry.replace_all(vec![
            entry("temp-1", DeviceKind::TempSensor, "Old"),
            entry("temp-1", DeviceKind::TempSensor, "New"),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("temp-1").unwrap().name.as_deref(), Some("New"));
    }

    #[test]
    fn upsert_creates_placeholder() {
        let mut registry = DeviceRegistry::default();
        let device = registry.upsert("temp-9", DeviceKind::TempSensor, temp_payload(70.0));

        assert_eq!(device.id, "temp-9");
        assert_eq!(device.name, None);
        assert!(device.meta.is_empty());
        assert_eq!(device.last, Some(temp_payload(70.0)));
    }

    #[test]
    fn upsert_merges_without_clobbering_identity() {
        let mut registry = DeviceRegistry::default();
        registry.replace_all(vec![entry("temp-1", DeviceKind::TempSensor, "PlantSensor-1")]);

        registry.upsert("temp-1", DeviceKind::TempSensor, temp_payload(71.5));

        let device = registry.get("temp-1").unwrap();
        assert_eq!(device.name.as_deref(), Some("PlantSensor-1"));
        assert_eq!(device.meta.get("plant"), Some(&json!("Plant 1")));
        assert_eq!(device.last, Some(temp_payload(71.5)));
    }

    #[test]
    fn empty_id_is_a_valid_key() {
        let mut registry = DeviceRegistry::default();
        registry.upsert("", DeviceKind::default(), temp_payload(0.0));
        assert!(registry.contains(""));
        assert_eq!(registry.get("").unwrap().kind, DeviceKind::Other(String::new()));
    }
}

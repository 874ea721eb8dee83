/**
 * DISPATCH - Routage des trames télémétrie vers l'état du tableau de bord
 *
 * RÔLE :
 * - Décoder chaque trame brute reçue du bus (JSON, discriminant `type`)
 * - Router : device_list → remplacement du registre, reading → fusion +
 *   historique + sélection, alert → levée d'alerte auto-expirante
 * - Tenir le curseur de sélection (jamais pendant vers un appareil disparu)
 *
 * FONCTIONNEMENT :
 * - dispatch() est synchrone et infaillible : une trame malformée est
 *   comptée puis journalisée, jamais propagée ; l'état reste intact
 * - Chaque trame est appliquée sous un seul verrou : les lecteurs HTTP ne
 *   voient jamais un snapshot à moitié appliqué
 * - Le listener MQTT appelle dispatch trame par trame : l'ordre d'arrivée
 *   fait loi, deux trames ne s'entrelacent jamais
 *
 * UTILITÉ DANS VIGIE :
 * 🎯 Point d'entrée unique des mutations d'état
 * 🎯 Résilience : le flot continue quoi qu'une trame contienne
 */
use crate::alerts;
use crate::health::HealthTracker;
use crate::models::{decode_frame, Frame, Inbound, Reading, ReadingPayload};
use crate::state::{DashboardState, Shared};

/// Routeur des trames télémétrie. Chaque clone partage le même état et les
/// mêmes compteurs.
#[derive(Clone)]
pub struct Dispatcher {
    state: Shared<DashboardState>,
    health: HealthTracker,
}

impl Dispatcher {
    pub fn new(state: Shared<DashboardState>, health: HealthTracker) -> Self {
        Self { state, health }
    }

    /// Applique une trame brute à l'état du tableau de bord. Ne renvoie
    /// jamais d'erreur : une trame illisible est comptée et jetée.
    pub fn dispatch(&self, raw: &str) {
        self.health.mark_frame();
        match decode_frame(raw) {
            Ok(Inbound::Frame(frame)) => self.route(frame),
            Ok(Inbound::Foreign(kind)) => {
                self.health.mark_ignored();
                log::debug!(
                    "[dispatch] trame étrangère ignorée (type: {})",
                    kind.as_deref().unwrap_or("<absent>")
                );
            }
            Err(err) => {
                self.health.mark_invalid();
                log::warn!("[dispatch] trame invalide jetée: {err}");
            }
        }
    }

    fn route(&self, frame: Frame) {
        match frame {
            Frame::DeviceList { devices } => {
                log::info!("[dispatch] 📋 snapshot flotte: {} appareil(s)", devices.len());
                let mut guard = self.state.lock();
                let st = &mut *guard;
                st.devices.replace_all(devices);
                let ids: Vec<String> = st.devices.ids().cloned().collect();
                st.history.reset(ids);
                st.repair_selection();
            }
            Frame::Reading(frame) => {
                let payload = ReadingPayload::from_wire(&frame.device_type, frame.payload);
                let reading = Reading {
                    ts: frame.timestamp,
                    payload: payload.clone(),
                };
                let mut guard = self.state.lock();
                guard.devices.upsert(&frame.device_id, frame.device_type, payload);
                guard.history.append(&frame.device_id, reading);
                if guard.selection.is_none() {
                    guard.selection = Some(frame.device_id.clone());
                    log::info!("[dispatch] 🎯 sélection initiale: {}", frame.device_id);
                }
            }
            Frame::Alert(frame) => {
                let device = frame.device_id.clone();
                let level = frame.severity.normalized();
                let id = alerts::raise(&self.state, &self.health, frame);
                log::info!("[dispatch] 🚨 alerte {level} {id} (appareil {device})");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HISTORY_CAP;
    use crate::models::{DeviceKind, GpsReading, Severity, TempReading, Timestamp};
    use crate::state::new_state;
    use serde_json::json;
    use std::time::Duration;
    use tokio::task::yield_now;
    use tokio::time::advance;
    use vigie_devkit::FrameBuilder;

    fn setup() -> (Dispatcher, Shared<DashboardState>, HealthTracker) {
        let state = new_state(DashboardState::default());
        let health = HealthTracker::new();
        let dispatcher = Dispatcher::new(state.clone(), health.clone());
        (dispatcher, state, health)
    }

    fn fleet_snapshot() -> String {
        FrameBuilder::device_list(&[
            FrameBuilder::device_entry("temp-1", "temp_sensor", "PlantSensor-1"),
            FrameBuilder::device_entry("gps-1", "gps", "Truck-1"),
        ])
        .to_string()
    }

    #[test]
    fn snapshot_replaces_registry_and_resets_history() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&FrameBuilder::temp_reading("orphan", 70.0, 40.0).to_string());
        assert_eq!(state.lock().history.series_len("orphan"), 1);

        dispatcher.dispatch(&fleet_snapshot());

        let guard = state.lock();
        assert_eq!(guard.devices.len(), 2);
        assert!(guard.devices.contains("temp-1"));
        assert!(guard.devices.contains("gps-1"));
        assert!(!guard.devices.contains("orphan"));
        assert_eq!(guard.history.series_len("orphan"), 0);
        assert_eq!(guard.history.series_len("temp-1"), 0);
    }

    #[test]
    fn reading_creates_device_appends_and_selects() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&FrameBuilder::gps_reading("gps-7", 37.77, -122.42, 55.0).to_string());

        let guard = state.lock();
        let device = guard.devices.get("gps-7").expect("appareil créé");
        assert_eq!(device.kind, DeviceKind::Gps);
        assert_eq!(device.name, None);
        assert!(device.meta.is_empty());
        assert_eq!(
            device.last,
            Some(ReadingPayload::Gps(GpsReading {
                lat: 37.77,
                lon: -122.42,
                speed: Some(55.0)
            }))
        );
        assert_eq!(guard.history.series_len("gps-7"), 1);
        assert_eq!(guard.selection.as_deref(), Some("gps-7"));
    }

    #[test]
    fn reading_merges_into_snapshotted_device() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&fleet_snapshot());
        dispatcher.dispatch(&FrameBuilder::temp_reading("temp-1", 71.5, 41.0).to_string());

        let guard = state.lock();
        let device = guard.devices.get("temp-1").unwrap();
        assert_eq!(device.name.as_deref(), Some("PlantSensor-1"));
        assert_eq!(
            device.last,
            Some(ReadingPayload::Temp(TempReading {
                temperature: 71.5,
                humidity: Some(41.0)
            }))
        );
    }

    #[test]
    fn selection_is_stable_until_its_device_vanishes() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&FrameBuilder::temp_reading("temp-1", 70.0, 40.0).to_string());
        dispatcher.dispatch(&FrameBuilder::gps_reading("gps-1", 37.0, -122.0, 30.0).to_string());
        // le premier relevé garde la main
        assert_eq!(state.lock().selection.as_deref(), Some("temp-1"));

        // snapshot qui conserve temp-1 : la sélection tient
        dispatcher.dispatch(&fleet_snapshot());
        assert_eq!(state.lock().selection.as_deref(), Some("temp-1"));

        // snapshot sans temp-1 : la sélection est vidée, pas pendante
        dispatcher.dispatch(
            &FrameBuilder::device_list(&[FrameBuilder::device_entry("gps-1", "gps", "Truck-1")])
                .to_string(),
        );
        assert_eq!(state.lock().selection, None);

        // le relevé suivant resélectionne
        dispatcher.dispatch(&FrameBuilder::gps_reading("gps-1", 37.0, -122.0, 31.0).to_string());
        assert_eq!(state.lock().selection.as_deref(), Some("gps-1"));
    }

    #[test]
    fn malformed_frames_leave_state_untouched() {
        let (dispatcher, state, health) = setup();
        dispatcher.dispatch(&fleet_snapshot());
        dispatcher.dispatch(&FrameBuilder::temp_reading("temp-1", 70.0, 40.0).to_string());

        let devices_before = state.lock().devices.clone();
        let history_before = state.lock().history.clone();
        let selection_before = state.lock().selection.clone();

        dispatcher.dispatch("{ pas du json du tout");
        dispatcher.dispatch(r#"{"type": 42}"#);
        dispatcher.dispatch(&json!({ "type": "reading", "device_id": 42 }).to_string());

        let guard = state.lock();
        assert_eq!(guard.devices, devices_before);
        assert_eq!(guard.history, history_before);
        assert_eq!(guard.selection, selection_before);
        assert!(guard.alerts.is_empty());
        drop(guard);

        assert_eq!(health.get_health(&state).frames_invalid, 3);
    }

    #[test]
    fn snapshot_missing_its_devices_field_is_dropped() {
        let (dispatcher, state, health) = setup();
        dispatcher.dispatch(&fleet_snapshot());
        dispatcher.dispatch(&FrameBuilder::temp_reading("temp-1", 70.0, 40.0).to_string());

        // snapshot sans champ `devices` : trame malformée, pas un vidage total
        dispatcher.dispatch(r#"{"type":"device_list"}"#);

        let guard = state.lock();
        assert_eq!(guard.devices.len(), 2);
        assert_eq!(guard.history.series_len("temp-1"), 1);
        assert_eq!(guard.selection.as_deref(), Some("temp-1"));
        drop(guard);

        assert_eq!(health.get_health(&state).frames_invalid, 1);
    }

    #[test]
    fn foreign_frames_are_counted_not_logged_as_errors() {
        let (dispatcher, state, health) = setup();
        dispatcher.dispatch(r#"{"type":"firmware_update","blob":"aaaa"}"#);
        dispatcher.dispatch(r#"{"hello":"world"}"#);

        assert!(state.lock().devices.is_empty());
        let snapshot = health.get_health(&state);
        assert_eq!(snapshot.frames_ignored, 2);
        assert_eq!(snapshot.frames_received, 2);
        assert_eq!(snapshot.frames_invalid, 0);
    }

    #[test]
    fn partial_reading_lands_under_degenerate_key() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&json!({ "type": "reading" }).to_string());

        let guard = state.lock();
        assert!(guard.devices.contains(""));
        assert_eq!(guard.devices.get("").unwrap().kind, DeviceKind::Other(String::new()));
        assert_eq!(guard.history.series_len(""), 1);
        assert_eq!(guard.selection.as_deref(), Some(""));
    }

    #[test]
    fn unknown_device_kind_keeps_payload_raw() {
        let (dispatcher, state, _) = setup();
        let frame = json!({
            "type": "reading",
            "device_id": "exp-1",
            "device_type": "plasma",
            "payload": { "flux": 8.5 }
        });
        dispatcher.dispatch(&frame.to_string());

        let guard = state.lock();
        let device = guard.devices.get("exp-1").unwrap();
        assert_eq!(device.kind, DeviceKind::Other("plasma".into()));
        assert_eq!(device.last, Some(ReadingPayload::Other(json!({ "flux": 8.5 }))));
    }

    #[tokio::test(start_paused = true)]
    async fn alert_routing_stores_severity_verbatim() {
        let (dispatcher, state, _) = setup();
        dispatcher.dispatch(&FrameBuilder::alert("temp-1", "info", "niveau inconnu").to_string());

        let guard = state.lock();
        assert_eq!(guard.alerts.len(), 1);
        let alert = &guard.alerts.active()[0];
        assert_eq!(alert.severity, Severity::Other("info".into()));
        assert_eq!(alert.severity.normalized(), "warning");
        assert_eq!(alert.message, "niveau inconnu");
    }

    // Scénario complet : snapshot, rafale de relevés, alerte, expiration.
    #[tokio::test(start_paused = true)]
    async fn full_scenario_snapshot_burst_alert_expiry() {
        let (dispatcher, state, health) = setup();

        dispatcher.dispatch(&fleet_snapshot());

        for i in 0..=HISTORY_CAP as i64 {
            let frame = FrameBuilder::reading_at(
                "temp-1",
                "temp_sensor",
                1000.0 + i as f64,
                json!({ "temperature": 70.0 }),
            );
            dispatcher.dispatch(&frame.to_string());
        }

        {
            let guard = state.lock();
            // 201 relevés → 200 conservés, le ts 1000 évincé
            assert_eq!(guard.history.series_len("temp-1"), HISTORY_CAP);
            let first = guard.history.series("temp-1").next().unwrap();
            assert_eq!(first.ts, Some(Timestamp::Number(1001.0)));
            assert_eq!(guard.selection.as_deref(), Some("temp-1"));
            assert_eq!(guard.devices.len(), 2);
        }

        dispatcher.dispatch(&FrameBuilder::alert("temp-1", "critical", "surchauffe").to_string());
        assert_eq!(state.lock().alerts.len(), 1);

        advance(Duration::from_millis(14_001)).await;
        yield_now().await;
        yield_now().await;
        assert!(state.lock().alerts.is_empty());

        let snapshot = health.get_health(&state);
        assert_eq!(snapshot.frames_received, 1 + (HISTORY_CAP as u64 + 1) + 1);
        assert_eq!(snapshot.alerts_raised, 1);
        assert_eq!(snapshot.frames_invalid, 0);
    }

    // Câblage complet stub devkit → dispatcher, comme un listener le ferait.
    #[tokio::test]
    async fn frames_flow_from_stub_to_dispatcher() {
        use vigie_devkit::MockMqttClient;

        let (dispatcher, state, _) = setup();
        let stub = MockMqttClient::new();
        let mut inbox = stub.setup_receiver();

        stub.simulate_incoming("vigie/fleet/telemetry@v1", fleet_snapshot().into_bytes())
            .await
            .unwrap();
        stub.simulate_incoming(
            "vigie/fleet/telemetry@v1",
            FrameBuilder::temp_reading("temp-1", 72.0, 39.0)
                .to_string()
                .into_bytes(),
        )
        .await
        .unwrap();

        while let Ok(message) = inbox.try_recv() {
            let raw = String::from_utf8(message.payload).unwrap();
            dispatcher.dispatch(&raw);
        }

        let guard = state.lock();
        assert_eq!(guard.devices.len(), 2);
        assert_eq!(guard.history.series_len("temp-1"), 1);
        assert_eq!(guard.selection.as_deref(), Some("temp-1"));
    }
}

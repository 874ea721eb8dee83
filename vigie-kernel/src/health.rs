use crate::config::KernelConfig;
use crate::state::{DashboardState, Shared};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub devices_tracked: u32,
    pub alerts_active: u32,
    pub frames_received: u64,
    pub frames_invalid: u64,
    pub frames_ignored: u64,
    pub alerts_raised: u64,
    pub expiry_failures: u64,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

/// Compteurs de santé du noyau, partagés entre le listener MQTT, le
/// dispatcher et l'API. Clonage superficiel : tous les clones pointent sur
/// les mêmes compteurs.
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    frames_received: std::sync::Arc<AtomicU64>,
    frames_invalid: std::sync::Arc<AtomicU64>,
    frames_ignored: std::sync::Arc<AtomicU64>,
    alerts_raised: std::sync::Arc<AtomicU64>,
    expiry_failures: std::sync::Arc<AtomicU64>,
    mqtt_reconnects: std::sync::Arc<AtomicU32>,
    mqtt_status: std::sync::Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_received: std::sync::Arc::new(AtomicU64::new(0)),
            frames_invalid: std::sync::Arc::new(AtomicU64::new(0)),
            frames_ignored: std::sync::Arc::new(AtomicU64::new(0)),
            alerts_raised: std::sync::Arc::new(AtomicU64::new(0)),
            expiry_failures: std::sync::Arc::new(AtomicU64::new(0)),
            mqtt_reconnects: std::sync::Arc::new(AtomicU32::new(0)),
            mqtt_status: std::sync::Arc::new(parking_lot::Mutex::new("connecting".to_string())),
        }
    }

    pub fn mark_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_invalid(&self) {
        self.frames_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_ignored(&self) {
        self.frames_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_alert_raised(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_expiry_failure(&self) {
        self.expiry_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn mark_mqtt_disconnected(&self) {
        *self.mqtt_status.lock() = "disconnected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, state: &Shared<DashboardState>) -> KernelHealth {
        let uptime = self.start_time.elapsed().as_secs();
        let (devices_tracked, alerts_active) = {
            let st = state.lock();
            (st.devices.len() as u32, st.alerts.len() as u32)
        };

        KernelHealth {
            uptime_seconds: uptime,
            devices_tracked,
            alerts_active,
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_invalid: self.frames_invalid.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            expiry_failures: self.expiry_failures.load(Ordering::Relaxed),
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }

    /// Démarre la publication auto de la santé du noyau sur le bus. Client
    /// MQTT dédié : la santé doit sortir même si le listener télémétrie rame.
    pub fn spawn_health_publisher(&self, cfg: KernelConfig, state: Shared<DashboardState>) {
        let health_tracker = self.clone();

        task::spawn(async move {
            let mqtt_cfg = cfg.mqtt.clone().unwrap_or_default();
            let topic = cfg.topics.clone().unwrap_or_default().health;

            let mut opts = MqttOptions::new("vigie-kernel-health", &mqtt_cfg.host, mqtt_cfg.port);
            opts.set_keep_alive(Duration::from_secs(15));

            let (client, mut eventloop) = AsyncClient::new(opts, 10);

            // Boucle principale : publish health toutes les 30s
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let health = health_tracker.get_health(&state);
                        if let Ok(payload) = serde_json::to_string(&health) {
                            if let Err(e) = client.publish(&topic, QoS::AtLeastOnce, false, payload).await {
                                log::warn!("[health] publication échouée: {e:?}");
                            } else {
                                log::debug!("[health] published kernel health (uptime: {}s, devices: {})",
                                        health.uptime_seconds, health.devices_tracked);
                            }
                        }
                    },
                    event = eventloop.poll() => {
                        if let Err(e) = event {
                            log::warn!("[health] erreur MQTT: {e:?}");
                            tokio::time::sleep(Duration::from_secs(2)).await;
                        }
                    }
                }
            }
        });
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<u64>() {
                            return (kb as f32) / 1024.0; // KB -> MB
                        }
                    }
                }
            }
        }
    }

    // Fallback approximatif
    12.0
}

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct KernelConfig {
    pub mqtt: Option<MqttConf>,
    pub http: Option<HttpConf>,
    pub topics: Option<TopicsConf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub bind: String,
}

impl Default for HttpConf {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TopicsConf {
    pub telemetry: String,
    pub health: String,
}

impl Default for TopicsConf {
    fn default() -> Self {
        Self {
            telemetry: "vigie/fleet/telemetry@v1".into(),
            health: "vigie/kernel/health@v1".into(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("VIGIE_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return KernelConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            log::warn!("[config] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        log::info!("[config] pas de kernel.yaml, usage config par défaut");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_yaml_parses() {
        let yaml = r#"
mqtt:
  host: broker.local
  port: 1884
http:
  bind: 127.0.0.1:9090
topics:
  telemetry: vigie/fleet/telemetry@v1
  health: vigie/kernel/health@v1
"#;
        let cfg: KernelConfig = serde_yaml::from_str(yaml).unwrap();
        let mqtt = cfg.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(cfg.http.unwrap().bind, "127.0.0.1:9090");
    }

    #[test]
    fn empty_sections_fall_back_to_defaults() {
        let cfg: KernelConfig = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.mqtt.is_none());

        let mqtt = cfg.mqtt.unwrap_or_default();
        assert_eq!(mqtt.host, "localhost");
        assert_eq!(mqtt.port, 1883);

        let topics = cfg.topics.unwrap_or_default();
        assert_eq!(topics.telemetry, "vigie/fleet/telemetry@v1");
        assert_eq!(topics.health, "vigie/kernel/health@v1");
        assert_eq!(cfg.http.unwrap_or_default().bind, "0.0.0.0:8080");
    }
}

/*!
Test Harness pour les composants Vigie

Facilite l'écriture de tests avec:
- Setup automatique du stub MQTT
- Injection de trames télémétrie prêtes à l'emploi (snapshot, relevés, alertes)
- Assertions sur les messages échangés
*/

use crate::frames::{FrameBuilder, TELEMETRY_TOPIC};
use crate::mqtt_stub::MockMqttClient;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Harness de test complet pour les scénarios flotte → noyau
pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    /// Crée un nouveau harness de test
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        Self {
            mqtt_client: MockMqttClient::new(),
            expectations: Vec::new(),
        }
    }

    /// Ajoute une expectation: on s'attend à N messages publiés sur un topic
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    /// Simule l'arrivée d'un snapshot de flotte sur le topic télémétrie
    pub async fn send_snapshot(&self, entries: &[Value]) -> Result<()> {
        let frame = FrameBuilder::device_list(entries);
        self.mqtt_client
            .simulate_incoming(TELEMETRY_TOPIC, frame.to_string().into_bytes())
            .await?;
        log::info!("📋 Sent fleet snapshot ({} devices)", entries.len());
        Ok(())
    }

    /// Simule un relevé de capteur de température
    pub async fn send_temp_reading(&self, device_id: &str, temperature: f64, humidity: f64) -> Result<()> {
        let frame = FrameBuilder::temp_reading(device_id, temperature, humidity);
        self.mqtt_client
            .simulate_incoming(TELEMETRY_TOPIC, frame.to_string().into_bytes())
            .await?;
        log::info!("🌡️ Sent temp reading for device: {}", device_id);
        Ok(())
    }

    /// Simule un relevé de traceur GPS
    pub async fn send_gps_reading(&self, device_id: &str, lat: f64, lon: f64, speed: f64) -> Result<()> {
        let frame = FrameBuilder::gps_reading(device_id, lat, lon, speed);
        self.mqtt_client
            .simulate_incoming(TELEMETRY_TOPIC, frame.to_string().into_bytes())
            .await?;
        log::info!("🚚 Sent gps reading for device: {}", device_id);
        Ok(())
    }

    /// Simule une alerte levée par la flotte
    pub async fn send_alert(&self, device_id: &str, severity: &str, message: &str) -> Result<()> {
        let frame = FrameBuilder::alert(device_id, severity, message);
        self.mqtt_client
            .simulate_incoming(TELEMETRY_TOPIC, frame.to_string().into_bytes())
            .await?;
        log::info!("🚨 Sent {} alert for device: {}", severity, device_id);
        Ok(())
    }

    /// Attend et vérifie qu'un message a été publié sur un topic
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Result<Option<Value>> {
        let start = std::time::Instant::now();

        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
                log::info!("✅ Received expected message on {}", topic);
                return Ok(Some(msg));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        log::warn!("⏰ Timeout waiting for message on {}", topic);
        Ok(None)
    }

    /// Vérifie toutes les expectations configurées
    pub fn verify_expectations(&self) -> Result<()> {
        log::info!("🔍 Verifying {} expectations...", self.expectations.len());

        for expectation in &self.expectations {
            let messages = self.mqtt_client.find_messages_by_topic(&expectation.topic);
            let actual_count = messages.len();

            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "Expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic, expectation.expected_count, actual_count
                );
            }

            log::info!("✅ Topic '{}': {} messages as expected",
                      expectation.topic, actual_count);
        }

        log::info!("🎉 All expectations verified successfully");
        Ok(())
    }

    /// Assert qu'un message spécifique a été publié
    pub fn assert_message_sent(&self, topic: &str, expected_payload: &Value) -> Result<()> {
        let messages = self.mqtt_client.find_messages_by_topic(topic);

        for msg in messages {
            let payload: Value = serde_json::from_slice(&msg.payload)?;
            if payload == *expected_payload {
                log::info!("✅ Found expected message on {}", topic);
                return Ok(());
            }
        }

        anyhow::bail!("Expected message not found on topic: {}", topic);
    }

    /// Assert qu'un champ spécifique existe dans le dernier message
    pub fn assert_field_exists(&self, topic: &str, field_path: &str) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if self.get_nested_field(&msg, field_path).is_some() {
                log::info!("✅ Field '{}' exists in {}", field_path, topic);
                return Ok(());
            }
        }

        anyhow::bail!("Field '{}' not found in latest message on {}", field_path, topic);
    }

    /// Assert qu'un champ a une valeur spécifique
    pub fn assert_field_equals(&self, topic: &str, field_path: &str, expected: &Value) -> Result<()> {
        if let Some(msg) = self.mqtt_client.get_last_json_message::<Value>(topic)? {
            if let Some(actual) = self.get_nested_field(&msg, field_path) {
                if actual == expected {
                    log::info!("✅ Field '{}' = {:?} in {}", field_path, expected, topic);
                    return Ok(());
                } else {
                    anyhow::bail!("Field '{}' mismatch: expected {:?}, got {:?}",
                                 field_path, expected, actual);
                }
            }
        }

        anyhow::bail!("Field '{}' not found for comparison in {}", field_path, topic);
    }

    fn get_nested_field<'a>(&self, value: &'a Value, path: &str) -> Option<&'a Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let mut current = value;

        for part in parts {
            match current {
                Value::Object(obj) => {
                    current = obj.get(part)?;
                }
                _ => return None,
            }
        }

        Some(current)
    }

    /// Stats sur les messages collectés
    pub fn get_stats(&self) -> TestStats {
        let messages = self.mqtt_client.get_published_messages();
        let mut topic_counts = HashMap::new();

        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }

        TestStats {
            total_messages: messages.len(),
            topic_counts,
            subscriptions: self.mqtt_client.get_subscriptions(),
        }
    }

    /// Reset le harness pour un nouveau test
    pub fn reset(&mut self) {
        self.mqtt_client.clear();
        self.expectations.clear();
        log::info!("🧹 Test harness reset");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub subscriptions: Vec<String>,
}

impl TestStats {
    pub fn print(&self) {
        println!("📊 Test Statistics:");
        println!("  Total messages: {}", self.total_messages);
        println!("  Topics with messages:");
        for (topic, count) in &self.topic_counts {
            println!("    {}: {} messages", topic, count);
        }
        println!("  Subscriptions: {:?}", self.subscriptions);
    }
}

/// Macro pour écrire un test avec un harness déjà prêt
#[macro_export]
macro_rules! vigie_test {
    ($name:ident, $harness:ident, $body:block) => {
        #[tokio::test]
        async fn $name() {
            let mut $harness = $crate::test_utils::TestHarness::new();
            let result: anyhow::Result<()> = async { $body }.await;

            match result {
                Ok(()) => {
                    $harness.get_stats().print();
                    println!("✅ Test '{}' passed", stringify!($name));
                }
                Err(e) => {
                    eprintln!("❌ Test '{}' failed: {}", stringify!($name), e);
                    panic!("Test failed: {}", e);
                }
            }
        }
    };
}

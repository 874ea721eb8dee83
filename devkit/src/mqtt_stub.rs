/*!
Mock MQTT Client pour développement sans broker

Permet de développer et tester les composants Vigie sans démarrer un broker
MQTT réel. Enregistre tous les messages publiés et permet de simuler la
réception de trames télémétrie côté noyau.
*/

use anyhow::Result;
use rumqttc::QoS;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// Mock MQTT Client qui simule rumqttc::AsyncClient
#[derive(Clone)]
pub struct MockMqttClient {
    published_messages: Arc<Mutex<Vec<MockMessage>>>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self {
            published_messages: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            message_sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration d'un channel pour recevoir les trames simulées
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    /// Simule la publication d'un message (compatible avec AsyncClient)
    pub async fn publish<S, V>(&self, topic: S, qos: QoS, retain: bool, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        };

        // Enregistrer le message
        self.published_messages.lock().unwrap().push(message.clone());

        log::info!("📤 [MOCK] Published to {}: {} bytes", message.topic, message.payload.len());
        Ok(())
    }

    /// Simule l'abonnement à un topic (compatible avec AsyncClient)
    pub async fn subscribe<S: Into<String>>(&self, topic: S, _qos: QoS) -> Result<()> {
        let topic = topic.into();
        self.subscriptions.lock().unwrap().push(topic.clone());
        log::info!("📥 [MOCK] Subscribed to {}", topic);
        Ok(())
    }

    /// Simule l'arrivée d'une trame depuis la flotte (pour tests)
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<()>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
            retain: false,
        };

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender.send(message.clone()).map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }

        log::info!("📨 [MOCK] Simulated incoming: {}", message.topic);
        Ok(())
    }

    /// Récupère tous les messages publiés (pour assertions de tests)
    pub fn get_published_messages(&self) -> Vec<MockMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Récupère les abonnements (pour assertions de tests)
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Trouve les messages publiés sur un topic donné
    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<MockMessage> {
        self.published_messages
            .lock()
            .unwrap()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Parse le dernier message d'un topic en JSON
    pub fn get_last_json_message<T>(&self, topic: &str) -> Result<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        let messages = self.find_messages_by_topic(topic);
        if let Some(last_msg) = messages.last() {
            let parsed: T = serde_json::from_slice(&last_msg.payload)?;
            Ok(Some(parsed))
        } else {
            Ok(None)
        }
    }

    /// Reset tous les messages enregistrés
    pub fn clear(&self) {
        self.published_messages.lock().unwrap().clear();
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockMqttClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::{FrameBuilder, TELEMETRY_TOPIC};

    #[tokio::test]
    async fn stub_records_publishes_and_subscriptions() {
        let client = MockMqttClient::new();

        client.subscribe(TELEMETRY_TOPIC, QoS::AtLeastOnce).await.unwrap();
        assert_eq!(client.get_subscriptions(), vec![TELEMETRY_TOPIC.to_string()]);

        let frame = FrameBuilder::temp_reading("temp-1", 70.5, 41.0).to_string();
        client
            .publish(TELEMETRY_TOPIC, QoS::AtLeastOnce, false, frame.clone().into_bytes())
            .await
            .unwrap();

        let messages = client.get_published_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, TELEMETRY_TOPIC);
        assert_eq!(messages[0].payload, frame.into_bytes());
    }

    #[tokio::test]
    async fn incoming_frames_reach_the_receiver() {
        let client = MockMqttClient::new();
        let mut inbox = client.setup_receiver();

        let frame = FrameBuilder::alert("gps-1", "warning", "High speed detected: 72.0 mph");
        client
            .simulate_incoming(TELEMETRY_TOPIC, frame.to_string().into_bytes())
            .await
            .unwrap();

        let message = inbox.try_recv().expect("trame simulée reçue");
        assert_eq!(message.topic, TELEMETRY_TOPIC);
        let parsed: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(parsed["type"], "alert");
        assert_eq!(parsed["device_id"], "gps-1");
    }

    #[tokio::test]
    async fn last_json_message_parses() {
        let client = MockMqttClient::new();

        let first = FrameBuilder::gps_reading("gps-2", 37.77, -122.42, 31.0);
        let second = FrameBuilder::gps_reading("gps-2", 37.78, -122.41, 33.5);
        for frame in [&first, &second] {
            client
                .publish(TELEMETRY_TOPIC, QoS::AtLeastOnce, false, frame.to_string().into_bytes())
                .await
                .unwrap();
        }

        let parsed: Option<serde_json::Value> =
            client.get_last_json_message(TELEMETRY_TOPIC).unwrap();
        let parsed = parsed.expect("au moins un message");
        assert_eq!(parsed["payload"]["speed"], 33.5);

        client.clear();
        let empty: Option<serde_json::Value> =
            client.get_last_json_message(TELEMETRY_TOPIC).unwrap();
        assert!(empty.is_none());
    }
}

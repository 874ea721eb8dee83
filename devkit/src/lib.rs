/*!
# Vigie DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement des composants Vigie avec:
- Stub MQTT pour tester sans broker
- Builders de trames télémétrie conformes au fil
- Harnais de test pour les scénarios flotte → noyau
*/

pub mod mqtt_stub;
pub mod frames;
pub mod test_utils;

pub use mqtt_stub::MockMqttClient;
pub use frames::{FrameBuilder, TELEMETRY_TOPIC};
pub use test_utils::TestHarness;

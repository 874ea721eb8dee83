use crate::config::KernelConfig;
use crate::dispatch::Dispatcher;
use crate::health::HealthTracker;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, QoS};
use tokio::task;
use uuid::Uuid;

/// Construit le client MQTT du noyau. Identifiant unique par processus :
/// deux noyaux sur le même broker ne doivent pas se voler la session.
pub fn create_mqtt_client(cfg: &KernelConfig) -> (AsyncClient, EventLoop) {
    let conf = cfg.mqtt.clone().unwrap_or_default();
    let client_id = format!("vigie-kernel-{}", Uuid::new_v4());
    let mut opts = MqttOptions::new(client_id, &conf.host, conf.port);
    opts.set_keep_alive(std::time::Duration::from_secs(15));
    AsyncClient::new(opts, 64)
}

/// Écoute la télémétrie de la flotte et pousse chaque trame au dispatcher,
/// dans l'ordre d'arrivée. La boucle survit aux coupures : retry toutes les
/// 2 s et réabonnement à chaque reconnexion.
pub fn spawn_telemetry_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    topic: String,
    dispatcher: Dispatcher,
    health: HealthTracker,
) -> task::JoinHandle<()> {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(rumqttc::Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    log::info!("[mqtt] connecté, abonnement à {topic}");
                    if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                        log::error!("[mqtt] abonnement échoué: {e:?}");
                    }
                }
                Ok(Event::Incoming(rumqttc::Incoming::Publish(p))) if p.topic == topic => {
                    match String::from_utf8(p.payload.to_vec()) {
                        Ok(raw) => dispatcher.dispatch(&raw),
                        Err(_) => {
                            // trame non UTF-8 : même politique qu'un JSON illisible
                            health.mark_frame();
                            health.mark_invalid();
                            log::warn!("[mqtt] payload non UTF-8 sur {}, trame jetée", p.topic);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    health.increment_reconnects();
                    log::warn!("[mqtt] erreur MQTT: {e:?}, retry dans 2s");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    })
}

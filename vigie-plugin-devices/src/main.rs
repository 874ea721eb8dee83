/**
 * VIGIE PLUGIN DEVICES - Flotte simulée de capteurs et de traceurs
 *
 * RÔLE :
 * Binaire autonome qui publie la télémétrie d'une petite flotte sur le bus
 * MQTT : trois capteurs de température en usine et trois camions géolocalisés.
 * C'est lui qui alimente le noyau pendant le développement du dashboard.
 *
 * FONCTIONNEMENT :
 * - Au démarrage : publie le snapshot device_list en retained, pour qu'un
 *   noyau qui arrive après la flotte le reçoive quand même
 * - Par appareil, toutes les 2 s : un relevé, plus une alerte quand le seuil
 *   est franchi (température > 75 °F → critical, vitesse > 70 mph → warning)
 * - Broker configurable via VIGIE_MQTT_HOST / VIGIE_MQTT_PORT
 *
 * UTILITÉ DANS VIGIE :
 * 🎯 Développement sans matériel : la flotte tourne sur la machine
 * 🎯 Démo : le dashboard s'anime tout seul
 */

use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::SystemTime;
use tokio::time::{sleep, Duration};

const TELEMETRY_TOPIC: &str = "vigie/fleet/telemetry@v1";
const NUM_TEMP: usize = 3;
const NUM_GPS: usize = 3;
const TEMP_THRESHOLD_F: f64 = 75.0;
const SPEED_LIMIT_MPH: f64 = 70.0;
const TICK: Duration = Duration::from_secs(2);

/// Entrée de snapshot publiée dans `device_list`.
#[derive(Serialize, Debug, Clone)]
struct DeviceEntry {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: &'static str,
    meta: Value,
}

/// Trames publiées par la flotte, discriminées par le champ `type` : le
/// miroir exact de ce que le noyau décode.
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FleetFrame {
    DeviceList {
        devices: Vec<DeviceEntry>,
    },
    Reading {
        device_id: String,
        device_type: &'static str,
        timestamp: String,
        payload: Value,
    },
    Alert {
        device_id: String,
        severity: &'static str,
        message: String,
        timestamp: String,
    },
}

fn now_rfc3339() -> String {
    humantime::format_rfc3339(SystemTime::now()).to_string()
}

/// Arrondit à `decimals` décimales, la précision publiée sur le fil.
fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// La flotte simulée : trois capteurs d'usine, trois camions.
fn fleet() -> Vec<DeviceEntry> {
    let mut devices = Vec::with_capacity(NUM_TEMP + NUM_GPS);
    for i in 1..=NUM_TEMP {
        devices.push(DeviceEntry {
            id: format!("temp-{i}"),
            name: format!("PlantSensor-{i}"),
            kind: "temp_sensor",
            meta: json!({ "plant": format!("Plant {i}") }),
        });
    }
    for i in 1..=NUM_GPS {
        devices.push(DeviceEntry {
            id: format!("gps-{i}"),
            name: format!("Truck-{i}"),
            kind: "gps",
            meta: json!({ "route": format!("Route {i}") }),
        });
    }
    devices
}

async fn publish_frame(client: &AsyncClient, frame: &FleetFrame, retain: bool) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(frame)?;
    client.publish(TELEMETRY_TOPIC, QoS::AtLeastOnce, retain, payload).await?;
    Ok(())
}

/// Capteur de température : base propre à l'appareil, bruit autour, alerte
/// critical au-dessus du seuil usine.
async fn run_temp_sensor(client: AsyncClient, device_id: String) {
    let base = 68.0 + rand::random_range(0.0..8.0);
    loop {
        let temperature = round_to(base + rand::random_range(-3.0..3.0), 2);
        let humidity = round_to(40.0 + rand::random_range(-5.0..5.0), 1);
        let ts = now_rfc3339();

        let reading = FleetFrame::Reading {
            device_id: device_id.clone(),
            device_type: "temp_sensor",
            timestamp: ts.clone(),
            payload: json!({ "temperature": temperature, "humidity": humidity }),
        };
        if let Err(e) = publish_frame(&client, &reading, false).await {
            log::warn!("[devices] publish relevé {device_id} échoué: {e:?}");
        }

        if temperature > TEMP_THRESHOLD_F {
            let alert = FleetFrame::Alert {
                device_id: device_id.clone(),
                severity: "critical",
                message: format!(
                    "Temperature {temperature:.1}F above threshold {TEMP_THRESHOLD_F:.1}F"
                ),
                timestamp: ts,
            };
            if let Err(e) = publish_frame(&client, &alert, false).await {
                log::warn!("[devices] publish alerte {device_id} échoué: {e:?}");
            }
        }

        sleep(TICK).await;
    }
}

/// Camion : marche aléatoire depuis le dépôt, la vitesse dérive doucement et
/// reste bornée à 0..80 mph ; alerte warning au-delà de la limite.
async fn run_gps_tracker(client: AsyncClient, device_id: String) {
    let mut lat = 37.77 + rand::random_range(-0.02..0.02);
    let mut lon = -122.42 + rand::random_range(-0.02..0.02);
    let mut speed: f64 = rand::random_range(20.0..40.0);
    loop {
        lat += rand::random_range(-0.0008..0.0008) + speed / 10_000.0;
        lon += rand::random_range(-0.0008..0.0008);
        let ts = now_rfc3339();

        let reading = FleetFrame::Reading {
            device_id: device_id.clone(),
            device_type: "gps",
            timestamp: ts.clone(),
            payload: json!({
                "lat": round_to(lat, 6),
                "lon": round_to(lon, 6),
                "speed": round_to(speed, 1),
            }),
        };
        if let Err(e) = publish_frame(&client, &reading, false).await {
            log::warn!("[devices] publish relevé {device_id} échoué: {e:?}");
        }

        if speed > SPEED_LIMIT_MPH {
            let alert = FleetFrame::Alert {
                device_id: device_id.clone(),
                severity: "warning",
                message: format!("High speed detected: {speed:.1} mph"),
                timestamp: ts,
            };
            if let Err(e) = publish_frame(&client, &alert, false).await {
                log::warn!("[devices] publish alerte {device_id} échoué: {e:?}");
            }
        }

        speed = (speed + rand::random_range(-3.0..3.0)).clamp(0.0, 80.0);
        sleep(TICK).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas
    env_logger::init();

    let host = std::env::var("VIGIE_MQTT_HOST").unwrap_or_else(|_| "localhost".into());
    let port: u16 = std::env::var("VIGIE_MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);
    log::info!("[devices] flotte simulée démarre (broker {host}:{port})");

    let mut opts = MqttOptions::new("vigie-plugin-devices", &host, port);
    opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(opts, 10);

    // Boucle d'événements MQTT : entretient la connexion, survit aux coupures
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    log::info!("[devices] connecté au broker");
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("[devices] MQTT loop erreur: {e:?}, retry dans 2s");
                    sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });

    // Snapshot retained : le broker le rejouera à tout noyau abonné plus tard
    let devices = fleet();
    let snapshot = FleetFrame::DeviceList { devices: devices.clone() };
    publish_frame(&client, &snapshot, true).await?;
    log::info!("[devices] snapshot publié ({} appareils)", devices.len());

    // Une tâche par appareil, chacune avec sa propre marche aléatoire
    for device in devices {
        let client = client.clone();
        match device.kind {
            "temp_sensor" => {
                tokio::spawn(run_temp_sensor(client, device.id));
            }
            "gps" => {
                tokio::spawn(run_gps_tracker(client, device.id));
            }
            _ => {}
        }
    }

    tokio::signal::ctrl_c().await?;
    log::info!("[devices] arrêt demandé, déconnexion du broker");
    client.disconnect().await?;
    Ok(())
}

/**
 * VIGIE KERNEL - Point d'entrée du noyau de supervision
 *
 * RÔLE : Orchestration de tous les modules : config, MQTT, dispatch, HTTP,
 * health. Bootstrap complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : la flotte publie sur le bus MQTT, un listener unique route
 * chaque trame vers l'état partagé, le dashboard lit cet état via l'API REST.
 * UTILITÉ : cerveau central de Vigie, point d'observation unique de la flotte.
 */

mod alerts;
mod config;
mod devices;
mod dispatch;
mod health;
mod history;
mod http;
mod models;
mod mqtt;
mod state;

use crate::config::load_config;
use crate::dispatch::Dispatcher;
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::state::{new_state, DashboardState};

use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas
    env_logger::init();

    log::info!("[kernel] vigie kernel démarre");

    // état partagé et conf
    let state = new_state(DashboardState::default());
    let cfg = load_config().await;

    // health tracker
    let health_tracker = HealthTracker::new();

    // dispatcher : seule porte d'entrée des mutations d'état
    let dispatcher = Dispatcher::new(state.clone(), health_tracker.clone());

    // MQTT : un client partagé, un listener télémétrie
    let topics = cfg.topics.clone().unwrap_or_default();
    let (mqtt_client, eventloop) = mqtt::create_mqtt_client(&cfg);
    let listener_task = mqtt::spawn_telemetry_listener(
        mqtt_client.clone(),
        eventloop,
        topics.telemetry.clone(),
        dispatcher,
        health_tracker.clone(),
    );

    // démarre la publication auto du health
    health_tracker.spawn_health_publisher(cfg.clone(), state.clone());

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        state,
        health_tracker: health_tracker.clone(),
    };

    // HTTP
    let app = http::build_router(app_state);
    let bind = cfg.http.clone().unwrap_or_default().bind;
    let addr: SocketAddr = bind.parse()?;
    log::info!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // teardown : on rend la connexion au broker avant de sortir
    log::info!("[kernel] arrêt demandé, fermeture de la connexion MQTT");
    health_tracker.mark_mqtt_disconnected();
    let _ = mqtt_client.disconnect().await;
    listener_task.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[kernel] écoute de ctrl-c impossible: {e}");
    }
}

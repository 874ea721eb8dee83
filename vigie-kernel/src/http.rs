/**
 * API REST VIGIE - Surface de lecture du tableau de bord
 *
 * RÔLE :
 * Ce module expose l'état du noyau au dashboard : appareils, historiques,
 * alertes actives et curseur de sélection.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes plates : /health, /system, /devices, /history,
 *   /alerts, /selection
 * - Vues dédiées (DeviceView, AlertView) avec champs dérivés, jamais l'état
 *   interne brut
 * - Seules écritures admises : retirer une alerte, déplacer la sélection
 *
 * UTILITÉ DANS VIGIE :
 * 🎯 Interface du dashboard web : polling léger en lecture seule
 * 🎯 Debug : inspection de l'état du noyau en temps réel
 */
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{Alert, Device, DeviceKind, Reading, ReadingPayload, Severity, Timestamp};
use crate::state::{DashboardState, Shared};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde_json::Value;
use std::collections::HashMap;
use time::format_description::well_known::Rfc3339;

#[derive(serde::Serialize)]
pub struct DeviceView {
    id: String,
    name: Option<String>,
    #[serde(rename = "type")]
    kind: DeviceKind,
    meta: HashMap<String, Value>,
    last: Option<ReadingPayload>,
    history_len: usize,
    selected: bool,
}

#[derive(serde::Serialize)]
pub struct AlertView {
    id: String,
    device_id: String,
    severity: Severity,    // telle que reçue
    level: String,         // normalisée pour l'affichage
    message: String,
    timestamp: Option<Timestamp>,
    raised_at: String,     // format RFC3339 pour l'API
}

fn to_device_view(device: &Device, st: &DashboardState) -> DeviceView {
    DeviceView {
        id: device.id.clone(),
        name: device.name.clone(),
        kind: device.kind.clone(),
        meta: device.meta.clone(),
        last: device.last.clone(),
        history_len: st.history.series_len(&device.id),
        selected: st.selection.as_deref() == Some(device.id.as_str()),
    }
}

fn to_alert_view(alert: &Alert) -> AlertView {
    AlertView {
        id: alert.id.clone(),
        device_id: alert.device_id.clone(),
        severity: alert.severity.clone(),
        level: alert.severity.normalized().to_string(),
        message: alert.message.clone(),
        timestamp: alert.timestamp.clone(),
        raised_at: alert
            .raised_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub state: Shared<DashboardState>,
    pub health_tracker: HealthTracker,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/devices", get(get_devices))
        .route("/devices/{id}", get(get_device))
        .route("/history/{id}", get(get_history))
        .route("/alerts", get(get_alerts))
        .route("/alerts/{id}", delete(dismiss_alert))
        .route("/selection", get(get_selection))
        .route("/selection/{id}", put(set_selection))
        .with_state(app_state)
}

// GET /devices (liste triée par identifiant)
async fn get_devices(State(app): State<AppState>) -> Json<Vec<DeviceView>> {
    let st = app.state.lock();
    let mut list: Vec<DeviceView> = st.devices.iter().map(|d| to_device_view(d, &st)).collect();
    list.sort_by(|a, b| a.id.cmp(&b.id));
    Json(list)
}

// GET /devices/:id (détail)
async fn get_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, StatusCode> {
    let st = app.state.lock();
    let Some(device) = st.devices.get(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(to_device_view(device, &st)))
}

// GET /history/:id (série complète ; vide pour un appareil inconnu)
async fn get_history(State(app): State<AppState>, Path(id): Path<String>) -> Json<Vec<Reading>> {
    let st = app.state.lock();
    Json(st.history.series(&id).cloned().collect())
}

// GET /alerts (actives, la plus récente en tête)
async fn get_alerts(State(app): State<AppState>) -> Json<Vec<AlertView>> {
    let st = app.state.lock();
    Json(st.alerts.active().iter().map(to_alert_view).collect())
}

// DELETE /alerts/:id (retrait explicite)
async fn dismiss_alert(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    if app.state.lock().alerts.dismiss(&id) {
        log::info!("[http] alerte {id} retirée");
        Ok(Json(serde_json::json!({ "status": "dismissed" })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

// GET /selection (curseur courant, null si rien)
async fn get_selection(State(app): State<AppState>) -> Json<Value> {
    let selected = app.state.lock().selection.clone();
    Json(serde_json::json!({ "selected": selected }))
}

// PUT /selection/:id (déplace le curseur ; refuse un appareil inconnu)
async fn set_selection(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let mut st = app.state.lock();
    if !st.devices.contains(&id) {
        return Err(StatusCode::NOT_FOUND);
    }
    st.selection = Some(id.clone());
    Ok(Json(serde_json::json!({ "selected": id })))
}

// GET /system/health (état infrastructure)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.state))
}

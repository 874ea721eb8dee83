/**
 * ALERTS - Cycle de vie des alertes du tableau de bord
 *
 * RÔLE :
 * - Tenir la liste des alertes actives, la plus récente en tête
 * - Programmer l'effacement automatique de chaque alerte 14 s après sa levée
 * - Servir le retrait explicite demandé par le dashboard
 *
 * FONCTIONNEMENT :
 * - Une tâche tokio par alerte : sleep(TTL) puis retrait. Le retrait est
 *   idempotent, une alerte déjà partie ne produit ni erreur ni effet
 * - Le retrait explicite aborte la tâche d'expiration en attente ; un timer
 *   qui se réveillerait quand même ne trouve plus rien à retirer
 * - Sans runtime tokio joignable, l'alerte reste affichée jusqu'à retrait
 *   manuel : compté et journalisé, jamais fatal
 *
 * UTILITÉ DANS VIGIE :
 * 🎯 Les alertes sont transitoires : le tableau reste lisible tout seul
 * 🎯 Exactement une expiration par levée, jamais de renouvellement
 */
use crate::health::HealthTracker;
use crate::models::{Alert, AlertFrame};
use crate::state::{DashboardState, Shared};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Durée de vie d'une alerte avant effacement automatique.
pub const ALERT_TTL: Duration = Duration::from_millis(14_000);

/// Expiration programmée d'une alerte. Le handle sert de jeton
/// d'annulation : il est aborté quand l'alerte part avant son heure.
#[derive(Debug)]
pub struct AlertExpiry {
    pub alert_id: String,
    handle: JoinHandle<()>,
}

impl AlertExpiry {
    pub fn new(alert_id: String, handle: JoinHandle<()>) -> Self {
        Self { alert_id, handle }
    }

    fn abort(&self) {
        self.handle.abort();
    }
}

/// Alertes actives et leurs expirations en attente. Le tableau possède la
/// logique de retrait, la tâche programmée ne fait que l'invoquer.
#[derive(Debug, Default)]
pub struct AlertBoard {
    active: Vec<Alert>,
    expiries: HashMap<String, AlertExpiry>,
    next_seq: u64,
}

impl AlertBoard {
    /// Forge l'identifiant d'une alerte : appareil + instant + compteur. Le
    /// compteur monotone évite toute collision quand plusieurs alertes du
    /// même appareil tombent dans la même milliseconde.
    fn mint_id(&mut self, device_id: &str, raised_at: OffsetDateTime) -> String {
        let seq = self.next_seq;
        self.next_seq += 1;
        let epoch_ms = raised_at.unix_timestamp_nanos() / 1_000_000;
        format!("{device_id}-{epoch_ms}-{seq}")
    }

    fn insert(&mut self, alert: Alert) {
        self.active.insert(0, alert);
    }

    fn attach_expiry(&mut self, expiry: AlertExpiry) {
        self.expiries.insert(expiry.alert_id.clone(), expiry);
    }

    /// Retire une alerte arrivée en fin de vie. Idempotent : un identifiant
    /// déjà retiré (ou inconnu) ne produit ni erreur ni effet.
    pub fn expire(&mut self, id: &str) {
        self.active.retain(|alert| alert.id != id);
        self.expiries.remove(id);
    }

    /// Retire une alerte sur demande explicite et annule son expiration en
    /// attente. Renvoie false si l'alerte n'était plus là.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let was_active = self.active.iter().any(|alert| alert.id == id);
        self.active.retain(|alert| alert.id != id);
        if let Some(expiry) = self.expiries.remove(id) {
            expiry.abort();
        }
        was_active
    }

    /// Alertes actives, la plus récente en premier.
    pub fn active(&self) -> &[Alert] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Lève une alerte : insertion en tête de tableau + expiration programmée
/// dans ALERT_TTL. Renvoie l'identifiant forgé.
pub fn raise(state: &Shared<DashboardState>, health: &HealthTracker, frame: AlertFrame) -> String {
    let raised_at = OffsetDateTime::now_utc();
    let mut guard = state.lock();
    let id = guard.alerts.mint_id(&frame.device_id, raised_at);

    guard.alerts.insert(Alert {
        id: id.clone(),
        device_id: frame.device_id,
        severity: frame.severity,
        message: frame.message,
        timestamp: frame.timestamp,
        raised_at,
    });

    match schedule_expiry(state.clone(), id.clone()) {
        Some(expiry) => guard.alerts.attach_expiry(expiry),
        None => {
            health.mark_expiry_failure();
            log::error!("[alerts] pas de runtime joignable, l'alerte {id} ne s'effacera pas seule");
        }
    }

    health.mark_alert_raised();
    id
}

/// Programme le retrait d'une alerte dans ALERT_TTL. Renvoie None quand
/// aucun runtime tokio n'est joignable.
fn schedule_expiry(state: Shared<DashboardState>, alert_id: String) -> Option<AlertExpiry> {
    let runtime = tokio::runtime::Handle::try_current().ok()?;
    // L'échéance est figée ici, à la levée, pas au premier poll de la tâche.
    let ttl = tokio::time::sleep(ALERT_TTL);
    let id = alert_id.clone();
    let handle = runtime.spawn(async move {
        ttl.await;
        state.lock().alerts.expire(&id);
    });
    Some(AlertExpiry::new(alert_id, handle))
}

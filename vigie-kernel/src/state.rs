use crate::alerts::AlertBoard;
use crate::devices::DeviceRegistry;
use crate::history::HistoryBuffer;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// État complet du tableau de bord. Un seul verrou pour l'ensemble : chaque
/// trame est appliquée atomiquement vis-à-vis des lecteurs HTTP.
#[derive(Debug, Default)]
pub struct DashboardState {
    pub devices: DeviceRegistry,
    pub history: HistoryBuffer,
    pub alerts: AlertBoard,
    pub selection: Option<String>,
}

impl DashboardState {
    /// Vide le curseur de sélection s'il ne pointe plus sur un appareil du
    /// registre (après un remplacement par snapshot, typiquement).
    pub fn repair_selection(&mut self) {
        if let Some(id) = &self.selection {
            if !self.devices.contains(id) {
                self.selection = None;
            }
        }
    }
}

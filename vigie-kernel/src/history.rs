use crate::models::Reading;
use std::collections::{HashMap, VecDeque};

/// Nombre maximal de relevés conservés par appareil.
pub const HISTORY_CAP: usize = 200;

/// Historiques récents par appareil : séries FIFO bornées, dans l'ordre
/// d'arrivée des relevés (jamais trié par horodatage).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryBuffer {
    series: HashMap<String, VecDeque<Reading>>,
}

impl HistoryBuffer {
    /// Réaligne les séries sur un snapshot : chaque identifiant listé repart
    /// sur une série vide, les séries des appareils disparus sont jetées.
    pub fn reset<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.series = ids.into_iter().map(|id| (id, VecDeque::new())).collect();
    }

    /// Ajoute un relevé en fin de série et évince le plus ancien dès que la
    /// série déborde. La série est créée au besoin.
    pub fn append(&mut self, id: &str, reading: Reading) {
        let series = self.series.entry(id.to_owned()).or_default();
        series.push_back(reading);
        if series.len() > HISTORY_CAP {
            series.pop_front();
        }
    }

    /// Relevés d'un appareil, du plus ancien au plus récent. Une série
    /// inconnue est simplement vide, jamais une erreur.
    pub fn series(&self, id: &str) -> impl Iterator<Item = &Reading> {
        self.series.get(id).into_iter().flatten()
    }

    pub fn series_len(&self, id: &str) -> usize {
        self.series.get(id).map_or(0, VecDeque::len)
    }
}

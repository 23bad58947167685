//! Situation des départements: gravité maximale en vigueur

use serde::Serialize;

use crate::format::ZoneRecord;
use crate::types::{Severity, WaterType};
use crate::Snapshot;

/// Gravité maximale d'un département, globale et par type de ressource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartementSituation {
    pub code: String,
    pub niveau_gravite_max: Option<Severity>,
    pub niveau_gravite_sup_max: Option<Severity>,
    pub niveau_gravite_sou_max: Option<Severity>,
    pub niveau_gravite_aep_max: Option<Severity>,
}

fn max_severity<'a>(
    zones: impl Iterator<Item = &'a ZoneRecord>,
    zone_type: Option<WaterType>,
) -> Option<Severity> {
    zones
        .filter(|z| zone_type.map_or(true, |t| z.zone_type == t))
        .filter_map(|z| z.niveau_gravite)
        .max()
}

impl Snapshot {
    /// Situation d'un département présent dans l'instantané
    pub fn departement_situation(&self, code: &str) -> Option<DepartementSituation> {
        let zones = self.zones();
        zones.departement_zones(code).next()?;
        let max = |t| max_severity(zones.departement_zones(code), t);
        Some(DepartementSituation {
            code: code.to_string(),
            niveau_gravite_max: max(None),
            niveau_gravite_sup_max: max(Some(WaterType::Sup)),
            niveau_gravite_sou_max: max(Some(WaterType::Sou)),
            niveau_gravite_aep_max: max(Some(WaterType::Aep)),
        })
    }

    /// Situation de tous les départements, triés par code
    pub fn departement_situations(&self) -> Vec<DepartementSituation> {
        self.zones()
            .departements()
            .filter_map(|code| self.departement_situation(code))
            .collect()
    }
}

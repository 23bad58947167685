//! Types d'erreurs pour le crate zones-alerte

use thiserror::Error;

use crate::types::{WaterType, ZoneId};

/// Erreurs pouvant survenir lors de la résolution des zones d'alerte
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ZoneError {
    /// Coordonnées hors bornes ou non numériques
    #[error("lon/lat are not valid: ({lon}, {lat})")]
    InvalidCoordinate { lon: f64, lat: f64 },

    /// Ni point ni commune fournis
    #[error("lon/lat or commune parameters are required")]
    MissingLocator,

    /// Aucune zone active pour cette recherche
    #[error("no active restriction zone for this lookup")]
    ZoneNotFound,

    /// Aucune zone active sur la commune
    #[error("no active restriction zone for commune {0}")]
    NoZoneForMunicipality(String),

    /// Aucune zone active sur le département
    #[error("no active restriction zone for departement {0}")]
    NoZoneForDepartement(String),

    /// Plusieurs zones actives de même type au même endroit
    #[error("{} active {zone_type} zones at {location}: {zone_ids:?}", zone_ids.len())]
    AmbiguousZoneConflict {
        zone_type: WaterType,
        zone_ids: Vec<ZoneId>,
        location: String,
    },

    /// Construction de l'index spatial impossible
    #[error("spatial index build failed: {0}")]
    IndexBuild(String),
}

impl ZoneError {
    /// Erreur imputable à la requête de l'appelant
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. }
                | Self::MissingLocator
                | Self::ZoneNotFound
                | Self::NoZoneForMunicipality(_)
                | Self::NoZoneForDepartement(_)
        )
    }

    /// Code HTTP correspondant, pour la couche API
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidCoordinate { .. } | Self::MissingLocator => 400,
            Self::ZoneNotFound | Self::NoZoneForMunicipality(_) | Self::NoZoneForDepartement(_) => {
                404
            }
            Self::AmbiguousZoneConflict { .. } | Self::IndexBuild(_) => 500,
        }
    }
}

/// Valeur inconnue pour un vocabulaire fixe (type de zone, gravité, profil...)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownValue {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

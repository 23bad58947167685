//! Façade asynchrone pour la couche HTTP
//!
//! Chaque appel attend le premier instantané, puis répond de façon
//! synchrone à partir de l'instantané courant. Aucun appel n'attend un
//! rafraîchissement en cours.

use std::sync::Arc;

use thiserror::Error;
use zones_alerte::{DepartementSituation, ResolveQuery, Snapshot, ZoneError, ZoneId, ZoneView};

use crate::refresh::SnapshotHandle;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error("no snapshot can be published anymore")]
    Closed,
}

impl ServiceError {
    /// Code HTTP correspondant
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::Zone(e) => e.http_status(),
            ServiceError::Closed => 503,
        }
    }
}

/// Service de consultation des zones d'alerte
#[derive(Debug, Clone)]
pub struct ZonesService {
    snapshots: SnapshotHandle,
}

impl ZonesService {
    pub fn new(snapshots: SnapshotHandle) -> Self {
        Self { snapshots }
    }

    /// Instantané courant, après le chargement initial
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, ServiceError> {
        if let Some(snapshot) = self.snapshots.current() {
            return Ok(snapshot);
        }
        let mut waiting = self.snapshots.clone();
        waiting.ready().await.ok_or(ServiceError::Closed)
    }

    pub async fn resolve(&self, query: &ResolveQuery) -> Result<Vec<ZoneView>, ServiceError> {
        Ok(self.snapshot().await?.resolve(query)?)
    }

    pub async fn zone_by_id(&self, id: ZoneId) -> Result<ZoneView, ServiceError> {
        Ok(self.snapshot().await?.zone_by_id(id)?)
    }

    pub async fn zones_by_departement(&self, code: &str) -> Result<Vec<ZoneView>, ServiceError> {
        Ok(self.snapshot().await?.zones_by_departement(code)?)
    }

    pub async fn situations(&self) -> Result<Vec<DepartementSituation>, ServiceError> {
        Ok(self.snapshot().await?.departement_situations())
    }
}

//! Chargement des zones et de leurs relations, par lots
//!
//! Les zones et leurs géométries sont lues en une requête. Les
//! restrictions (arrêté, usages) et les communes sont ensuite jointes par
//! lots de `batch_size` zones, au plus `workers` lots à la fois. L'échec
//! d'un lot fait échouer tout le chargement.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::{stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info};
use zones_alerte::{MunicipalDecree, RestrictionRaw, ZoneError, ZoneId, ZoneRaw};

use crate::config::EngineConfig;
use crate::store::{StoreError, ZoneStore};

/// Échec d'un cycle de chargement; l'instantané publié reste inchangé
#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: StoreError,
    },

    #[error("snapshot build failed: {0}")]
    Build(#[from] ZoneError),

    #[error("snapshot fingerprint failed: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("snapshot build task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

type BatchResult = (HashMap<ZoneId, RestrictionRaw>, HashMap<ZoneId, Vec<String>>);

/// Chargeur de zones complètes
#[derive(Debug)]
pub struct GeometryLoader<S> {
    store: Arc<S>,
    batch_size: usize,
    workers: usize,
}

impl<S: ZoneStore> GeometryLoader<S> {
    pub fn new(store: Arc<S>, config: &EngineConfig) -> Self {
        Self {
            store,
            batch_size: config.batch_size.max(1),
            workers: config.workers.max(1),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Zones avec restriction publiée et communes rattachées
    pub async fn load(&self) -> Result<Vec<ZoneRaw>, LoadFailure> {
        let start = Instant::now();
        let mut zones = self.store.fetch_zones().await?;
        info!(zones = zones.len(), "Zones loaded");

        let ids: Vec<ZoneId> = zones.iter().map(|z| z.id).collect();
        let batches: Vec<(usize, Vec<ZoneId>)> = ids
            .chunks(self.batch_size)
            .map(<[ZoneId]>::to_vec)
            .enumerate()
            .collect();
        let batch_count = batches.len();

        let (mut restrictions, mut communes) = stream::iter(batches)
            .map(|(batch, chunk)| {
                let store = Arc::clone(&self.store);
                async move {
                    let loaded = futures::try_join!(
                        store.fetch_restrictions(&chunk),
                        store.fetch_communes(&chunk)
                    );
                    match loaded {
                        Ok(result) => {
                            debug!(batch, zones = chunk.len(), "Batch loaded");
                            Ok(result)
                        }
                        Err(source) => Err(LoadFailure::Batch { batch, source }),
                    }
                }
            })
            .buffer_unordered(self.workers)
            .try_fold(
                (HashMap::new(), HashMap::new()),
                |(mut restrictions, mut communes), (r, c): BatchResult| async move {
                    restrictions.extend(r);
                    communes.extend(c);
                    Ok((restrictions, communes))
                },
            )
            .await?;

        for zone in &mut zones {
            zone.restriction = restrictions.remove(&zone.id);
            zone.communes = communes.remove(&zone.id).unwrap_or_default();
        }

        info!(
            zones = zones.len(),
            batches = batch_count,
            restrictions = zones.iter().filter(|z| z.restriction.is_some()).count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Zone relations loaded"
        );
        Ok(zones)
    }

    /// Arrêtés municipaux publiés
    pub async fn load_decrees(&self) -> Result<Vec<MunicipalDecree>, LoadFailure> {
        let decrees = self.store.fetch_municipal_decrees().await?;
        info!(decrees = decrees.len(), "Municipal decrees loaded");
        Ok(decrees)
    }
}

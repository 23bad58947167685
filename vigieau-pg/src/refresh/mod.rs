//! Rafraîchissement et publication des instantanés
//!
//! Un seul cycle de chargement des zones peut tourner à la fois:
//! `Idle -> Loading -> Publishing | FailedLoad -> Idle`. Un déclenchement
//! pendant `Loading` est ignoré. L'instantané n'est remplacé qu'après un
//! chargement complet; en cas d'échec, l'instantané précédent reste publié.
//!
//! La publication passe par un canal `watch`: les lecteurs clonent l'`Arc`
//! courant et travaillent sur un instantané immuable, sans jamais voir un
//! index à moitié construit.

pub mod scheduler;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use zones_alerte::Snapshot;

use crate::config::EngineConfig;
use crate::loader::{GeometryLoader, LoadFailure};
use crate::store::ZoneStore;

pub use scheduler::Scheduler;

/// État du cycle de chargement des zones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RefreshState {
    Idle = 0,
    Loading = 1,
    Publishing = 2,
    FailedLoad = 3,
}

impl RefreshState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RefreshState::Loading,
            2 => RefreshState::Publishing,
            3 => RefreshState::FailedLoad,
            _ => RefreshState::Idle,
        }
    }
}

/// Résultat d'un déclenchement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nouvel instantané publié
    Published { version: u64 },
    /// Données inchangées depuis le dernier chargement
    Unchanged,
    /// Un chargement était déjà en cours
    Skipped,
}

/// Réserve le cycle de chargement; revient à `Idle` en sortie de portée
struct CycleGuard<'a> {
    state: &'a AtomicU8,
}

impl<'a> CycleGuard<'a> {
    fn acquire(state: &'a AtomicU8) -> Option<Self> {
        state
            .compare_exchange(
                RefreshState::Idle as u8,
                RefreshState::Loading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| Self { state })
    }

    fn set(&self, next: RefreshState) {
        self.state.store(next as u8, Ordering::Release);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.set(RefreshState::Idle);
    }
}

/// Accès en lecture à l'instantané publié
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    receiver: watch::Receiver<Option<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    /// Instantané courant, s'il existe déjà
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.receiver.borrow().clone()
    }

    /// Attend le premier instantané; `None` si le contrôleur a disparu
    pub async fn ready(&mut self) -> Option<Arc<Snapshot>> {
        let published = self.receiver.wait_for(Option::is_some).await.ok()?;
        (*published).clone()
    }
}

/// Contrôleur de rafraîchissement, partagé derrière un `Arc`
#[derive(Debug)]
pub struct RefreshController<S> {
    loader: GeometryLoader<S>,
    config: EngineConfig,
    state: AtomicU8,
    last_version: AtomicU64,
    decrees: Mutex<()>,
    publisher: watch::Sender<Option<Arc<Snapshot>>>,
}

impl<S: ZoneStore> RefreshController<S> {
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        let (publisher, _) = watch::channel(None);
        Self {
            loader: GeometryLoader::new(store, &config),
            config,
            state: AtomicU8::new(RefreshState::Idle as u8),
            last_version: AtomicU64::new(0),
            decrees: Mutex::new(()),
            publisher,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.publisher.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotHandle {
        SnapshotHandle {
            receiver: self.publisher.subscribe(),
        }
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Recharge toutes les zones et publie un nouvel instantané
    pub async fn refresh_zones(&self) -> Result<RefreshOutcome, LoadFailure> {
        let Some(cycle) = CycleGuard::acquire(&self.state) else {
            debug!("Zone load already running, trigger ignored");
            return Ok(RefreshOutcome::Skipped);
        };

        let start = Instant::now();
        match self.build_snapshot().await {
            Ok((snapshot, fingerprint, _decrees_held)) => {
                cycle.set(RefreshState::Publishing);
                let version = snapshot.version();
                info!(
                    version,
                    zones = snapshot.zones().len(),
                    decrees = snapshot.decrees().len(),
                    fingerprint = %fingerprint,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Snapshot published"
                );
                self.publisher.send_replace(Some(Arc::new(snapshot)));
                Ok(RefreshOutcome::Published { version })
            }
            Err(failure) => {
                cycle.set(RefreshState::FailedLoad);
                error!(
                    error = %failure,
                    serving = ?self.current().map(|s| s.version()),
                    "Zone load failed, keeping previous snapshot"
                );
                Err(failure)
            }
        }
    }

    /// Construit l'instantané; le verrou des arrêtés rendu doit être tenu jusqu'à la publication
    async fn build_snapshot(
        &self,
    ) -> Result<(Snapshot, String, MutexGuard<'_, ()>), LoadFailure> {
        let started_at = SystemTime::now();
        info!("Loading zones");
        let zones = self.loader.load().await?;

        // Aucune publication d'arrêtés entre cette lecture et la publication des zones
        let decrees_held = self.decrees.lock().await;
        let decrees = self.loader.load_decrees().await?;

        let version = self.next_version();
        let (snapshot, fingerprint) = tokio::task::spawn_blocking(move || {
            let snapshot = Snapshot::build(version, zones, decrees, started_at)?;
            let fingerprint = snapshot.fingerprint()?;
            Ok::<_, LoadFailure>((snapshot, fingerprint))
        })
        .await??;
        Ok((snapshot, fingerprint, decrees_held))
    }

    /// Recharge uniquement les arrêtés municipaux, en gardant les zones publiées
    pub async fn refresh_decrees(&self) -> Result<RefreshOutcome, LoadFailure> {
        let Ok(_running) = self.decrees.try_lock() else {
            debug!("Municipal decree load already running, trigger ignored");
            return Ok(RefreshOutcome::Skipped);
        };

        let started_at = SystemTime::now();
        let decrees = match self.loader.load_decrees().await {
            Ok(decrees) => decrees,
            Err(failure) => {
                error!(error = %failure, "Municipal decree load failed, keeping previous index");
                return Err(failure);
            }
        };
        let count = decrees.len();
        let version = self.next_version();

        // Appliqué sur l'instantané courant au moment de la publication
        let published = self.publisher.send_if_modified(|current| {
            let Some(snapshot) = current.as_ref() else {
                return false;
            };
            let next = snapshot.with_decrees(version, decrees, started_at);
            *current = Some(Arc::new(next));
            true
        });

        if published {
            info!(version, decrees = count, "Municipal decrees published");
            Ok(RefreshOutcome::Published { version })
        } else {
            Ok(RefreshOutcome::Skipped)
        }
    }

    /// Recharge les zones si leur date de calcul est postérieure à l'instantané
    pub async fn poll_zones(&self) -> Result<RefreshOutcome, LoadFailure> {
        let Some(current) = self.current() else {
            return self.refresh_zones().await;
        };
        if self.state() != RefreshState::Idle {
            return Ok(RefreshOutcome::Skipped);
        }

        let computed_at = match self.loader.store().zones_computed_at().await {
            Ok(at) => at,
            Err(e) => {
                warn!(error = %e, "Failed to read zone compute date");
                return Err(e.into());
            }
        };
        match computed_at {
            Some(at) if at > current.zones_loaded_at() => {
                info!(serving = current.version(), "Zones recomputed, reloading");
                self.refresh_zones().await
            }
            _ => Ok(RefreshOutcome::Unchanged),
        }
    }

    /// Recharge les arrêtés municipaux s'ils ont été modifiés depuis l'instantané
    pub async fn poll_decrees(&self) -> Result<RefreshOutcome, LoadFailure> {
        let Some(current) = self.current() else {
            return Ok(RefreshOutcome::Unchanged);
        };

        let updated_at = match self.loader.store().decrees_updated_at().await {
            Ok(at) => at,
            Err(e) => {
                warn!(error = %e, "Failed to read municipal decree update date");
                return Err(e.into());
            }
        };
        match updated_at {
            Some(at) if at > current.decrees_loaded_at() => self.refresh_decrees().await,
            _ => Ok(RefreshOutcome::Unchanged),
        }
    }

    /// Chargement initial, répété jusqu'au premier instantané
    pub async fn initial_load(&self) -> Arc<Snapshot> {
        let retry = self.config.initial_retry();
        let mut handle = self.subscribe();
        loop {
            if let Some(snapshot) = self.current() {
                return snapshot;
            }
            match self.refresh_zones().await {
                Ok(RefreshOutcome::Skipped) => {
                    // Chargement lancé ailleurs: attendre sa publication
                    let _ = tokio::time::timeout(retry, handle.ready()).await;
                }
                Ok(_) => {}
                Err(_) => {
                    warn!(retry_ms = retry.as_millis() as u64, "Initial load failed, retrying");
                    tokio::time::sleep(retry).await;
                }
            }
        }
    }
}

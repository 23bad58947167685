//! Minuteries de vérification des zones et des arrêtés municipaux

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use super::{RefreshController, RefreshOutcome};
use crate::loader::LoadFailure;
use crate::store::ZoneStore;

/// Deux tâches indépendantes; arrêtées à la destruction
#[derive(Debug)]
pub struct Scheduler {
    tasks: Vec<JoinHandle<()>>,
}

fn every<F, Fut>(name: &'static str, period: Duration, mut poll: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<RefreshOutcome, LoadFailure>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Le premier tick est immédiat
        ticker.tick().await;
        loop {
            ticker.tick().await;
            // Les échecs sont journalisés par le contrôleur
            if let Ok(outcome) = poll().await {
                debug!(timer = name, ?outcome, "Poll done");
            }
        }
    })
}

impl Scheduler {
    pub fn start<S: ZoneStore>(controller: Arc<RefreshController<S>>) -> Self {
        let zones_every = controller.config().zones_poll();
        let decrees_every = controller.config().decrees_poll();
        info!(
            zones_secs = zones_every.as_secs(),
            decrees_secs = decrees_every.as_secs(),
            "Refresh timers started"
        );

        let zones = {
            let controller = Arc::clone(&controller);
            every("zones", zones_every, move || {
                let controller = Arc::clone(&controller);
                async move { controller.poll_zones().await }
            })
        };
        let decrees = every("decrees", decrees_every, move || {
            let controller = Arc::clone(&controller);
            async move { controller.poll_decrees().await }
        });

        Self {
            tasks: vec![zones, decrees],
        }
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

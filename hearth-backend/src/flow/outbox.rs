//! Side-effect outbox.
//!
//! `submit_answer` commits the note, then enqueues zero or more of these
//! tasks. They run independently and can never affect the flow's advancement
//! or retry semantics; failures are logged and dropped. On session end the
//! outbox is cancelled and pending tasks are abandoned without retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::Address;
use crate::resolvers::WeatherCapability;
use crate::store::NotesStore;

#[derive(Debug, Clone)]
pub enum SideEffect {
    /// Persist the confirmed address, then kick a weather refresh for it
    AddressConfirmed { address: Address },
    /// Persist the chosen house name
    HouseNamed { name: String },
}

pub struct SideEffectOutbox {
    store: Arc<NotesStore>,
    weather: Arc<dyn WeatherCapability>,
    tasks: DashMap<u64, JoinHandle<()>>,
    next_task_id: AtomicU64,
    cancel: CancellationToken,
}

impl SideEffectOutbox {
    pub fn new(store: Arc<NotesStore>, weather: Arc<dyn WeatherCapability>) -> Self {
        SideEffectOutbox {
            store,
            weather,
            tasks: DashMap::new(),
            next_task_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    /// Spawn a task for the effect. Returns immediately; the caller never
    /// waits on the outcome.
    pub fn enqueue(&self, effect: SideEffect) {
        if self.cancel.is_cancelled() {
            log::debug!("[OUTBOX] session ended, dropping {:?}", effect);
            return;
        }

        let task_id = self.next_task_id.fetch_add(1, Ordering::SeqCst);
        let store = self.store.clone();
        let weather = self.weather.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("[OUTBOX] task {} abandoned on session end", task_id);
                }
                _ = Self::run(effect, store, weather) => {}
            }
        });
        self.tasks.insert(task_id, handle);

        // opportunistic cleanup of finished handles
        self.tasks.retain(|_, handle| !handle.is_finished());
    }

    async fn run(effect: SideEffect, store: Arc<NotesStore>, weather: Arc<dyn WeatherCapability>) {
        match effect {
            SideEffect::AddressConfirmed { address } => {
                if let Err(e) = store.set_confirmed_address(address.clone()).await {
                    log::warn!("[OUTBOX] failed to persist confirmed address: {}", e);
                }
                match weather.refresh(&address).await {
                    Ok(()) => log::info!("[OUTBOX] weather refreshed for '{}'", address.formatted()),
                    Err(e) => log::warn!("[OUTBOX] weather refresh failed: {}", e),
                }
            }
            SideEffect::HouseNamed { name } => {
                if let Err(e) = store.set_house_name(&name).await {
                    log::warn!("[OUTBOX] failed to persist house name: {}", e);
                }
            }
        }
    }

    /// Abandon pending tasks. In-flight store commits still complete (the
    /// store serializes them); weather refreshes are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait for every currently queued task to finish. Test and shutdown
    /// aid; new enqueues during the wait are not covered.
    pub async fn wait_idle(&self) {
        let ids: Vec<u64> = self.tasks.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, handle)) = self.tasks.remove(&id) {
                let _ = handle.await;
            }
        }
    }
}

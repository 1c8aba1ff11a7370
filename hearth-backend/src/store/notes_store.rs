//! Concurrency-safe note store.
//!
//! The single persisted source of truth for all question/answer pairs.
//! Every mutation runs as one serialized read-modify-persist-swap step behind
//! an async mutex, so two racing saves can never interleave and overwrite each
//! other. Reads clone the current snapshot out of a cache cell and are never
//! blocked by an in-flight mutation (last-committed-wins visibility).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use super::catalog;
use super::storage::Storage;
use crate::errors::StoreError;
use crate::models::{Address, Note, NotesSnapshot, Question};

struct CachedSnapshot {
    snapshot: Arc<NotesSnapshot>,
    loaded_at: Instant,
}

pub struct NotesStore {
    storage: Arc<dyn Storage>,
    cache: RwLock<Option<CachedSnapshot>>,
    /// Serializes all mutations. Tokio's mutex wakes waiters in FIFO order,
    /// so queued mutations commit in arrival order.
    write_lock: AsyncMutex<()>,
    staleness: Duration,
    retry_delay: Duration,
    recovered: AtomicBool,
}

impl NotesStore {
    pub fn new(storage: Arc<dyn Storage>, staleness: Duration, retry_delay: Duration) -> Self {
        NotesStore {
            storage,
            cache: RwLock::new(None),
            write_lock: AsyncMutex::new(()),
            staleness,
            retry_delay,
            recovered: AtomicBool::new(false),
        }
    }

    /// Current snapshot, served from cache while it is fresh, re-read from
    /// durable storage otherwise. Never fails: a corrupt document recovers to
    /// the built-in catalog (see [`NotesStore::take_recovery_notice`]), and a
    /// transient read error falls back to the last cached snapshot.
    pub async fn load(&self) -> Arc<NotesSnapshot> {
        if let Some(snapshot) = self.cached(Some(self.staleness)) {
            return snapshot;
        }

        match self.storage.read().await {
            Ok(bytes) => {
                let snapshot = Arc::new(self.parse_document(bytes));
                self.install(snapshot)
            }
            Err(e) => match self.cached(None) {
                Some(stale) => {
                    log::warn!("[STORE] refresh failed, serving cached snapshot: {}", e);
                    stale
                }
                None => {
                    log::warn!("[STORE] failed to read notes document, starting empty: {}", e);
                    self.install(Arc::new(catalog::default_snapshot()))
                }
            },
        }
    }

    /// Save or replace the answer for a question. Fails with
    /// [`StoreError::QuestionNotFound`] when the id is not in the catalog.
    pub async fn save_or_update(
        &self,
        question_id: &str,
        answer: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> Result<Note, StoreError> {
        let note = Note::new(question_id, answer, metadata.unwrap_or_default());
        let stored = note.clone();
        let qid = question_id.to_string();

        self.commit(move |next| {
            if next.question(&qid).is_none() {
                return Err(StoreError::QuestionNotFound(qid.clone()));
            }
            next.notes.insert(qid.clone(), stored);
            Ok(())
        })
        .await?;

        log::debug!("[STORE] saved answer for '{}'", question_id);
        Ok(note)
    }

    /// Insert a new question (ad hoc room/device notes created mid-conversation).
    pub async fn add_question(&self, question: Question) -> Result<(), StoreError> {
        let id = question.id.clone();

        self.commit(move |next| {
            if next.question(&question.id).is_some() {
                return Err(StoreError::DuplicateQuestion(question.id.clone()));
            }
            next.questions.push(question);
            Ok(())
        })
        .await?;

        log::info!("[STORE] added question '{}'", id);
        Ok(())
    }

    /// Reset notes and questions back to the built-in catalog ("start over").
    pub async fn clear_all(&self) -> Result<(), StoreError> {
        self.commit(|next| {
            *next = catalog::default_snapshot();
            Ok(())
        })
        .await?;

        log::info!("[STORE] cleared all notes and questions");
        Ok(())
    }

    /// Record the house name derived from a committed answer.
    pub async fn set_house_name(&self, name: &str) -> Result<(), StoreError> {
        let name = name.to_string();
        self.commit(move |next| {
            next.profile.house_name = Some(name);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Record the confirmed address derived from a committed answer.
    pub async fn set_confirmed_address(&self, address: Address) -> Result<(), StoreError> {
        self.commit(move |next| {
            next.profile.confirmed_address = Some(address);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Unanswered questions in presentation order: required first, then
    /// optional, ascending display_order within each, insertion order on ties.
    pub async fn questions_needing_review(&self) -> Vec<Question> {
        self.load().await.questions_needing_review()
    }

    /// Sequence number of the last committed mutation.
    pub async fn commit_seq(&self) -> u64 {
        self.load().await.commit_seq
    }

    /// True once if the store had to discard a corrupt document and start
    /// from the built-in catalog since the last check.
    pub fn take_recovery_notice(&self) -> bool {
        self.recovered.swap(false, Ordering::SeqCst)
    }

    /// Run one serialized read-modify-persist-swap step. The write lock is
    /// held across the whole step; the cache is only swapped after the
    /// document has been durably persisted, so a failed persist leaves the
    /// previous snapshot visible.
    async fn commit<F>(&self, mutate: F) -> Result<Arc<NotesSnapshot>, StoreError>
    where
        F: FnOnce(&mut NotesSnapshot) -> Result<(), StoreError>,
    {
        let _guard = self.write_lock.lock().await;

        let current = self.authoritative().await?;
        let mut next = (*current).clone();
        mutate(&mut next)?;
        next.commit_seq = current.commit_seq + 1;

        let bytes = serde_json::to_vec_pretty(&next)
            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
        self.persist_with_retry(&bytes).await?;

        Ok(self.install(Arc::new(next)))
    }

    /// The snapshot mutations build on. Once the cache is primed it is
    /// authoritative regardless of age - every commit updates it - so only a
    /// cold store touches durable storage here.
    async fn authoritative(&self) -> Result<Arc<NotesSnapshot>, StoreError> {
        if let Some(snapshot) = self.cached(None) {
            return Ok(snapshot);
        }

        let bytes = match self.storage.read().await {
            Ok(bytes) => bytes,
            Err(first) => {
                log::warn!("[STORE] read failed, retrying once: {}", first);
                tokio::time::sleep(self.retry_delay).await;
                self.storage
                    .read()
                    .await
                    .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?
            }
        };

        Ok(self.install(Arc::new(self.parse_document(bytes))))
    }

    fn parse_document(&self, bytes: Option<Vec<u8>>) -> NotesSnapshot {
        match bytes {
            Some(bytes) => match serde_json::from_slice::<NotesSnapshot>(&bytes) {
                Ok(mut document) => {
                    document.questions = catalog::merge_with_builtin(document.questions);
                    document
                }
                Err(e) => {
                    log::warn!(
                        "[STORE] notes document is corrupt, starting from defaults: {}",
                        e
                    );
                    self.recovered.store(true, Ordering::SeqCst);
                    catalog::default_snapshot()
                }
            },
            None => catalog::default_snapshot(),
        }
    }

    async fn persist_with_retry(&self, bytes: &[u8]) -> Result<(), StoreError> {
        match self.storage.write(bytes).await {
            Ok(()) => Ok(()),
            Err(first) => {
                log::warn!("[STORE] persist failed, retrying once: {}", first);
                tokio::time::sleep(self.retry_delay).await;
                self.storage
                    .write(bytes)
                    .await
                    .map_err(|e| StoreError::StorageUnavailable(e.to_string()))
            }
        }
    }

    fn cached(&self, max_age: Option<Duration>) -> Option<Arc<NotesSnapshot>> {
        let guard = self.cache.read();
        let cached = guard.as_ref()?;
        if let Some(max_age) = max_age {
            if cached.loaded_at.elapsed() > max_age {
                return None;
            }
        }
        Some(cached.snapshot.clone())
    }

    /// Swap the cache to a new snapshot. A refresh that raced a commit must
    /// not regress the cell, so older commit sequences are discarded.
    fn install(&self, snapshot: Arc<NotesSnapshot>) -> Arc<NotesSnapshot> {
        let mut guard = self.cache.write();
        if let Some(current) = guard.as_ref() {
            if current.snapshot.commit_seq > snapshot.commit_seq {
                return current.snapshot.clone();
            }
        }
        *guard = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            loaded_at: Instant::now(),
        });
        snapshot
    }
}

//! The prioritized anchor preloader.
//!
//! A run first hydrates whatever the durable tier already holds, then
//! queues the remaining scenes by priority tier and drains the queue with a
//! fixed number of workers. Each scene is attempted sequentially up to
//! `max_retries` times with exponential backoff between attempts. A scene
//! that runs out of attempts is skipped; the run always finishes.
//!
//! At most one run is active per preloader. A caller that arrives while a
//! run is in flight follows that run's progress instead of queueing the
//! same scenes again.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use odyssey_core::asset::Asset;
use odyssey_core::clock::Sleeper;
use odyssey_core::generator::Generator;
use odyssey_core::id::SceneId;
use odyssey_core::storage::KeyValueStore;
use odyssey_narrative::application::prompts::image_prompt;
use odyssey_narrative::domain::registry::SceneRegistry;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

use crate::cache::TwoTierCache;
use crate::config::PreloadConfig;
use crate::progress::Progress;

/// Callback invoked with the latest progress.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// A scene whose anchor image should be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadTarget {
    /// The scene.
    pub id: SceneId,
    /// Prompt the anchor is generated from.
    pub prompt: String,
}

struct Inner {
    targets: Vec<PreloadTarget>,
    generator: Arc<dyn Generator>,
    sleeper: Arc<dyn Sleeper>,
    cache: TwoTierCache,
    config: PreloadConfig,
    progress: Mutex<Progress>,
    active: Mutex<Option<watch::Sender<Progress>>>,
}

impl Inner {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn active(&self) -> MutexGuard<'_, Option<watch::Sender<Progress>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recounts `loaded` from the fast tier.
    fn refresh_progress(&self) -> Progress {
        let loaded = self
            .targets
            .iter()
            .filter(|t| self.cache.get_fast(t.id).is_some())
            .count();
        let mut progress = self.progress();
        *progress = Progress::new(loaded, self.targets.len());
        *progress
    }
}

/// Clears the active-run slot when the leading run ends, even by panic or
/// cancellation, so followers see the channel close.
struct ActiveRun {
    inner: Arc<Inner>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.inner.active().take();
    }
}

enum Role {
    Lead(ActiveRun, watch::Sender<Progress>),
    Follow(watch::Receiver<Progress>),
}

/// Fills the anchor cache in the background. Cheap to clone; clones share
/// the cache and progress.
#[derive(Clone)]
pub struct Preloader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("targets", &self.inner.targets.len())
            .field("config", &self.inner.config)
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

impl Preloader {
    /// Creates a preloader for `targets`. Duplicate ids keep their first
    /// entry.
    #[must_use]
    pub fn new(
        targets: Vec<PreloadTarget>,
        generator: Arc<dyn Generator>,
        storage: Arc<dyn KeyValueStore>,
        sleeper: Arc<dyn Sleeper>,
        config: PreloadConfig,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let targets: Vec<PreloadTarget> = targets
            .into_iter()
            .filter(|t| seen.insert(t.id))
            .collect();
        let cache = TwoTierCache::new(storage, config.key_prefix.clone());
        let progress = Progress::new(0, targets.len());

        Self {
            inner: Arc::new(Inner {
                targets,
                generator,
                sleeper,
                cache,
                config,
                progress: Mutex::new(progress),
                active: Mutex::new(None),
            }),
        }
    }

    /// Creates a preloader for every scene in `registry`.
    #[must_use]
    pub fn for_registry(
        registry: &SceneRegistry,
        generator: Arc<dyn Generator>,
        storage: Arc<dyn KeyValueStore>,
        sleeper: Arc<dyn Sleeper>,
        config: PreloadConfig,
    ) -> Self {
        let targets = registry
            .scenes()
            .map(|scene| PreloadTarget {
                id: scene.id,
                prompt: image_prompt(scene),
            })
            .collect();
        Self::new(targets, generator, storage, sleeper, config)
    }

    /// The latest progress.
    #[must_use]
    pub fn progress(&self) -> Progress {
        *self.inner.progress()
    }

    /// Returns the cached anchor for `id`, consulting durable storage on a
    /// fast-tier miss.
    #[must_use]
    pub fn get_asset(&self, id: SceneId) -> Option<Arc<Asset>> {
        self.inner.cache.get(id)
    }

    /// Whether an anchor for `id` is cached.
    #[must_use]
    pub fn is_ready(&self, id: SceneId) -> bool {
        self.get_asset(id).is_some()
    }

    /// Drops every target's anchor from both tiers and resets progress.
    pub fn clear_cache(&self) {
        self.inner
            .cache
            .clear(self.inner.targets.iter().map(|t| t.id));
        let total = self.inner.targets.len();
        *self.inner.progress() = Progress::new(0, total);
        info!(total, "anchor cache cleared");
    }

    /// Runs a full preload pass and returns the final progress.
    ///
    /// `on_progress` fires once after the durable tier has been consulted and
    /// again after every scene that succeeds or runs out of attempts. If a
    /// run is already in flight, this call generates nothing itself: it
    /// reports that run's progress (intermediate reports may coalesce) and
    /// returns when it finishes.
    #[instrument(skip_all, fields(total = self.inner.targets.len()))]
    pub async fn preload_all<F>(&self, on_progress: F) -> Progress
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        let on_progress: ProgressCallback = Arc::new(on_progress);

        let (guard, sender) = match self.claim() {
            Role::Lead(guard, sender) => (guard, sender),
            Role::Follow(receiver) => {
                debug!("preload already running, following it");
                return follow(receiver, &on_progress).await;
            }
        };

        let report: ProgressCallback = {
            let sender = sender.clone();
            Arc::new(move |progress: Progress| {
                sender.send_replace(progress);
                on_progress(progress);
            })
        };
        let done = self.lead(&report).await;
        sender.send_replace(done);
        drop(guard);
        done
    }

    fn claim(&self) -> Role {
        let mut active = self.inner.active();
        if let Some(running) = active.as_ref() {
            return Role::Follow(running.subscribe());
        }
        let (sender, _) = watch::channel(self.progress());
        *active = Some(sender.clone());
        let guard = ActiveRun {
            inner: Arc::clone(&self.inner),
        };
        Role::Lead(guard, sender)
    }

    async fn lead(&self, report: &ProgressCallback) -> Progress {
        let inner = &self.inner;

        let pending: BTreeSet<SceneId> = inner
            .targets
            .iter()
            .filter(|t| inner.cache.get(t.id).is_none())
            .map(|t| t.id)
            .collect();
        let snapshot = inner.refresh_progress();
        report(snapshot);

        if pending.is_empty() {
            info!(loaded = snapshot.loaded, "all anchors already cached");
            return snapshot;
        }

        let queue: VecDeque<PreloadTarget> = inner
            .config
            .queue_order(&pending)
            .into_iter()
            .filter_map(|id| inner.targets.iter().find(|t| t.id == id).cloned())
            .collect();
        let workers = inner.config.max_concurrency.max(1).min(queue.len());
        info!(
            cached = snapshot.loaded,
            queued = queue.len(),
            workers,
            "starting anchor preload"
        );

        let queue = Arc::new(Mutex::new(queue));
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let inner = Arc::clone(inner);
            let queue = Arc::clone(&queue);
            let report = Arc::clone(report);
            pool.spawn(async move { run_worker(worker, &inner, &queue, &report).await });
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "preload worker aborted");
            }
        }

        let done = self.progress();
        info!(loaded = done.loaded, total = done.total, "anchor preload finished");
        done
    }

    /// Runs [`preload_all`](Self::preload_all) on a background task.
    #[must_use]
    pub fn spawn<F>(&self, on_progress: F) -> PreloadTask
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        let detached = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&detached);
        let preloader = self.clone();
        let handle = tokio::spawn(async move {
            preloader
                .preload_all(move |progress| {
                    if !gate.load(Ordering::Acquire) {
                        on_progress(progress);
                    }
                })
                .await
        });
        PreloadTask { handle, detached }
    }
}

async fn follow(mut receiver: watch::Receiver<Progress>, on_progress: &ProgressCallback) -> Progress {
    let mut last = *receiver.borrow_and_update();
    on_progress(last);
    while receiver.changed().await.is_ok() {
        last = *receiver.borrow_and_update();
        on_progress(last);
    }
    let done = *receiver.borrow();
    if done != last {
        on_progress(done);
    }
    done
}

fn next_target(queue: &Mutex<VecDeque<PreloadTarget>>) -> Option<PreloadTarget> {
    queue
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

async fn run_worker(
    worker: usize,
    inner: &Inner,
    queue: &Mutex<VecDeque<PreloadTarget>>,
    on_progress: &ProgressCallback,
) {
    while let Some(target) = next_target(queue) {
        let loaded = fetch_with_retry(inner, &target).await;
        let snapshot = inner.refresh_progress();
        debug!(worker, scene_id = %target.id, loaded, "preload slot finished");
        on_progress(snapshot);
    }
}

async fn fetch_with_retry(inner: &Inner, target: &PreloadTarget) -> bool {
    let attempts = inner.config.max_retries.max(1);
    for attempt in 0..attempts {
        match inner.generator.generate_image(&target.prompt).await {
            Ok(asset) => {
                inner.cache.insert(target.id, asset);
                debug!(scene_id = %target.id, attempt, "anchor cached");
                return true;
            }
            Err(e) if attempt + 1 < attempts => {
                let wait = inner.config.backoff(attempt);
                debug!(
                    scene_id = %target.id,
                    attempt,
                    error = %e,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    "anchor generation failed, backing off"
                );
                inner.sleeper.sleep(wait).await;
            }
            Err(e) => {
                warn!(
                    scene_id = %target.id,
                    attempts,
                    error = %e,
                    "anchor generation exhausted its attempts"
                );
            }
        }
    }
    false
}

/// A preload running on a background task.
#[derive(Debug)]
pub struct PreloadTask {
    handle: JoinHandle<Progress>,
    detached: Arc<AtomicBool>,
}

impl PreloadTask {
    /// Waits for the run to finish. `None` if the task panicked.
    pub async fn join(self) -> Option<Progress> {
        match self.handle.await {
            Ok(progress) => Some(progress),
            Err(e) => {
                error!(error = %e, "preload task failed");
                None
            }
        }
    }

    /// Stops delivering progress and stops awaiting the result. The run
    /// itself continues and keeps filling the cache.
    pub fn detach(self) {
        self.detached.store(true, Ordering::Release);
        debug!("preload task detached");
    }

    /// Whether the run has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

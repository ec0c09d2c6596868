//! The deduplicating work queue and the controller loop around it.
//!
//! Work items are keyed by `(namespace, name)` and deduplicated: a service
//! already waiting is not queued twice, and a service being reconciled is
//! never reconciled concurrently (it re-queues behind itself instead).
//! Failed items retry with exponential backoff up to an attempt cap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use threadpool::ThreadPool;

use crate::config::ControllerConfig;
use crate::events::EventRecorder;
use crate::reconcile::Reconciler;
use crate::store::{Kind, MemStore, Store, WatchEvent};
use crate::Result;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct WorkKey {
    pub namespace: String,
    pub name: String,
}

impl WorkKey {
    pub fn new(namespace: &str, name: &str) -> WorkKey {
        WorkKey { namespace: namespace.to_string(), name: name.to_string() }
    }
}

#[derive(Default)]
struct QueueInner {
    pending: VecDeque<WorkKey>,
    queued: HashSet<WorkKey>,
    active: HashSet<WorkKey>,
    failures: HashMap<WorkKey, u32>,
    /// Items parked in a backoff sleep; still count against idleness.
    delayed: usize,
}

pub struct WorkQueue {
    inner: Mutex<QueueInner>,
    signal: Condvar,
}

impl WorkQueue {
    pub fn new() -> WorkQueue {
        WorkQueue { inner: Mutex::new(QueueInner::default()), signal: Condvar::new() }
    }

    /// Enqueue a key unless it is already waiting.
    pub fn add(&self, key: WorkKey) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.queued.insert(key.clone()) {
                inner.pending.push_back(key);
                self.signal.notify_all();
            }
        }
    }

    fn add_after_delay(&self, key: WorkKey) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.delayed -= 1;
            if inner.queued.insert(key.clone()) {
                inner.pending.push_back(key);
            }
            self.signal.notify_all();
        }
    }

    /// Pop the first pending key not currently being worked on.
    fn next_ready(&self) -> Option<WorkKey> {
        let mut inner = self.inner.lock().ok()?;
        let position = inner
            .pending
            .iter()
            .position(|k| !inner.active.contains(k))?;
        let key = inner.pending.remove(position)?;
        inner.queued.remove(&key);
        inner.active.insert(key.clone());
        Some(key)
    }

    /// Mark a key finished; returns the failure count so far when it failed.
    fn done(&self, key: &WorkKey, failed: bool) -> u32 {
        let mut count = 0;
        if let Ok(mut inner) = self.inner.lock() {
            inner.active.remove(key);
            if failed {
                count = inner.failures.get(key).cloned().unwrap_or(0) + 1;
                inner.failures.insert(key.clone(), count);
            } else {
                inner.failures.remove(key);
            }
            self.signal.notify_all();
        }
        count
    }

    /// Mark a key failed and, when retryable, park it in one atomic step so
    /// idleness never observes the gap between finishing and re-queueing.
    fn fail(&self, key: &WorkKey, max_attempts: u32) -> (u32, bool) {
        let mut count = 0;
        let mut parked = false;
        if let Ok(mut inner) = self.inner.lock() {
            inner.active.remove(key);
            count = inner.failures.get(key).cloned().unwrap_or(0) + 1;
            inner.failures.insert(key.clone(), count);
            if count < max_attempts {
                inner.delayed += 1;
                parked = true;
            }
            self.signal.notify_all();
        }
        (count, parked)
    }

    fn is_idle(&self) -> bool {
        match self.inner.lock() {
            Ok(inner) => inner.pending.is_empty() && inner.active.is_empty() && inner.delayed == 0,
            Err(_) => true,
        }
    }
}

impl Default for WorkQueue {
    fn default() -> WorkQueue {
        WorkQueue::new()
    }
}

/// Tunables for the controller loop.
#[derive(Clone)]
pub struct ControllerOptions {
    pub workers: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for ControllerOptions {
    fn default() -> ControllerOptions {
        ControllerOptions {
            workers: 4,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// The watch-driven controller around the reconciler.
pub struct Controller {
    pub store: Arc<MemStore>,
    pub config: Arc<ControllerConfig>,
    pub events: Arc<EventRecorder>,
    queue: Arc<WorkQueue>,
    options: ControllerOptions,
    pool: ThreadPool,
}

impl Controller {
    pub fn new(store: Arc<MemStore>, config: Arc<ControllerConfig>, options: ControllerOptions) -> Controller {
        Controller {
            store,
            config,
            events: Arc::new(EventRecorder::new()),
            queue: Arc::new(WorkQueue::new()),
            options: options.clone(),
            pool: ThreadPool::new(options.workers),
        }
    }

    /// Queue every stored InferenceService.
    pub fn enqueue_all(&self) -> Result<()> {
        for meta in self.store.list_meta(Kind::InferenceService, "")? {
            self.queue.add(WorkKey::new(&meta.namespace, &meta.name));
        }
        Ok(())
    }

    pub fn enqueue(&self, namespace: &str, name: &str) {
        self.queue.add(WorkKey::new(namespace, name));
    }

    /// Map watch events onto service keys in a background thread.
    ///
    /// Events for child kinds trace back through the owner reference; a
    /// deleted child whose metadata is gone cannot be traced and is dropped
    /// (its owner's own events cover the interesting cases).
    pub fn spawn_watcher(&self, receiver: Receiver<WatchEvent>) {
        let queue = Arc::clone(&self.queue);
        let store = Arc::clone(&self.store);
        thread::spawn(move || {
            for event in receiver {
                if event.kind == Kind::InferenceService {
                    queue.add(WorkKey::new(&event.namespace, &event.name));
                    continue;
                }
                let metas = match store.list_meta(event.kind, &event.namespace) {
                    Ok(metas) => metas,
                    Err(_) => continue,
                };
                for meta in metas {
                    if meta.name != event.name {
                        continue;
                    }
                    for owner in &meta.ownerReferences {
                        if owner.kind == "InferenceService" {
                            queue.add(WorkKey::new(&event.namespace, &owner.name));
                        }
                    }
                }
            }
        });
    }

    /// Dispatch work until every queued item settled (or exhausted its
    /// attempts). The convergence entry point for the CLI.
    pub fn run_until_idle(&self) {
        loop {
            match self.queue.next_ready() {
                Some(key) => self.dispatch(key),
                None => {
                    if self.queue.is_idle() && self.pool.active_count() == 0 {
                        break;
                    }
                    // parked or in-flight work will signal; poll coarsely
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        self.pool.join();
    }

    fn dispatch(&self, key: WorkKey) {
        let store = Arc::clone(&self.store);
        let config = Arc::clone(&self.config);
        let events = Arc::clone(&self.events);
        let queue = Arc::clone(&self.queue);
        let options = self.options.clone();
        self.pool.execute(move || {
            let object = format!("{}/{}", key.namespace, key.name);
            let result = Reconciler::new(&*store, &config, &events)
                .reconcile(&key.namespace, &key.name);
            match result {
                Ok(outcome) => {
                    debug!("reconciled {} with {} writes", object, outcome.writes());
                    queue.done(&key, false);
                }
                Err(e) => {
                    let (attempts, parked) = queue.fail(&key, options.max_attempts);
                    if !parked {
                        events.event(&object, "GaveUp", &format!("after {} attempts: {}", attempts, e));
                        return;
                    }
                    let exp = options
                        .base_backoff
                        .checked_mul(1u32 << attempts.min(16))
                        .unwrap_or(options.max_backoff);
                    let delay = exp.min(options.max_backoff);
                    warn!("reconcile of {} failed (attempt {}): {}; retrying in {:?}", object, attempts, e, delay);
                    let queue = Arc::clone(&queue);
                    thread::spawn(move || {
                        thread::sleep(delay);
                        queue.add_after_delay(key);
                    });
                }
            }
        });
    }
}

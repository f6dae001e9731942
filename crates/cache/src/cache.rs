//! Fingerprint-keyed result cache with single-flight computation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use gwo_core::{EngineError, EngineResult, Fingerprint};

/// Cache tuning, as read from the `[cache]` configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
    /// How long a caller waits on another caller's in-flight computation.
    pub wait_timeout_ms: u64,
    /// Background sweep period; no sweeper runs when unset.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            max_entries: 1000,
            wait_timeout_ms: 30_000,
            sweep_interval_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.max_entries == 0 {
            return Err(EngineError::config("cache.max_entries must be >= 1"));
        }
        if self.wait_timeout_ms == 0 {
            return Err(EngineError::config("cache.wait_timeout_ms must be >= 1"));
        }
        if self.sweep_interval_secs == Some(0) {
            return Err(EngineError::config("cache.sweep_interval_secs must be >= 1"));
        }
        Ok(())
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub failures: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: usize,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

enum SlotState<V> {
    Pending,
    Ready { value: V, created_at: Instant, expires_at: Instant },
    Failed(EngineError),
}

/// One fingerprint's entry. Ready values are never mutated; expiry replaces
/// the whole slot.
struct Slot<V> {
    state: Mutex<SlotState<V>>,
    settled: Condvar,
}

impl<V> Slot<V> {
    fn pending() -> Self {
        Self {
            state: Mutex::new(SlotState::Pending),
            settled: Condvar::new(),
        }
    }

    fn lock(&self) -> EngineResult<MutexGuard<'_, SlotState<V>>> {
        self.state
            .lock()
            .map_err(|_| EngineError::computation("cache slot lock poisoned"))
    }

    fn settle(&self, state: SlotState<V>) -> EngineResult<()> {
        *self.lock()? = state;
        self.settled.notify_all();
        Ok(())
    }

    fn ready_since(&self) -> Option<Instant> {
        match &*self.state.lock().ok()? {
            SlotState::Ready { created_at, .. } => Some(*created_at),
            _ => None,
        }
    }

    fn is_pending(&self) -> bool {
        self.state
            .lock()
            .is_ok_and(|state| matches!(&*state, SlotState::Pending))
    }

    fn is_expired(&self, now: Instant) -> bool {
        match self.state.lock() {
            Ok(state) => matches!(&*state, SlotState::Ready { expires_at, .. } if *expires_at <= now),
            Err(_) => true,
        }
    }
}

/// Memoizes computations by [`Fingerprint`].
///
/// At most one computation runs per fingerprint at a time; other callers for
/// that fingerprint wait on the slot (up to `wait_timeout`) and receive the
/// same value or the same error. Different fingerprints never share a lock.
pub struct ResultCache<V> {
    entries: DashMap<Fingerprint, Arc<Slot<V>>>,
    config: CacheConfig,
    counters: Counters,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `fingerprint`, or run `compute` to fill it.
    ///
    /// A failed (or panicking) computation caches nothing.
    pub fn get_or_compute<F>(&self, fingerprint: &Fingerprint, compute: F) -> EngineResult<V>
    where
        F: FnOnce() -> EngineResult<V>,
    {
        loop {
            let (slot, leader) = match self.entries.entry(fingerprint.clone()) {
                Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
                Entry::Vacant(vacant) => {
                    let slot = Arc::new(Slot::pending());
                    vacant.insert(Arc::clone(&slot));
                    (slot, true)
                }
            };

            if leader {
                return self.lead(fingerprint, &slot, compute);
            }

            let state = slot.lock()?;
            let expired = match &*state {
                SlotState::Ready { value, expires_at, .. } if *expires_at > Instant::now() => {
                    Counters::bump(&self.counters.hits);
                    debug!(fingerprint = %fingerprint.short(), "cache hit");
                    return Ok(value.clone());
                }
                SlotState::Ready { .. } => true,
                SlotState::Failed(e) => return Err(e.clone()),
                SlotState::Pending => false,
            };
            if !expired {
                return self.wait(fingerprint, &slot, state);
            }

            drop(state);
            if self.remove_slot(fingerprint, &slot) {
                Counters::bump(&self.counters.expirations);
                debug!(fingerprint = %fingerprint.short(), "cache entry expired");
            }
        }
    }

    fn lead<F>(&self, fingerprint: &Fingerprint, slot: &Arc<Slot<V>>, compute: F) -> EngineResult<V>
    where
        F: FnOnce() -> EngineResult<V>,
    {
        Counters::bump(&self.counters.misses);
        Counters::bump(&self.counters.computations);
        debug!(fingerprint = %fingerprint.short(), "cache miss, computing");

        let outcome = panic::catch_unwind(AssertUnwindSafe(compute))
            .unwrap_or_else(|payload| Err(EngineError::computation(panic_message(payload))));

        match outcome {
            Ok(value) => {
                let created_at = Instant::now();
                let settled = slot.settle(SlotState::Ready {
                    value: value.clone(),
                    created_at,
                    expires_at: created_at + self.config.ttl(),
                });
                if settled.is_err() {
                    self.remove_slot(fingerprint, slot);
                }
                settled?;
                self.enforce_capacity(fingerprint);
                Ok(value)
            }
            Err(e) => {
                Counters::bump(&self.counters.failures);
                warn!(fingerprint = %fingerprint.short(), error = %e, "cached computation failed");
                let settled = slot.settle(SlotState::Failed(e.clone()));
                self.remove_slot(fingerprint, slot);
                settled?;
                Err(e)
            }
        }
    }

    fn wait(
        &self,
        fingerprint: &Fingerprint,
        slot: &Slot<V>,
        mut state: MutexGuard<'_, SlotState<V>>,
    ) -> EngineResult<V> {
        let budget = self.config.wait_timeout();
        let deadline = Instant::now() + budget;

        while matches!(&*state, SlotState::Pending) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(fingerprint = %fingerprint.short(), "gave up waiting on in-flight computation");
                return Err(EngineError::Timeout {
                    operation: format!("cache fill for {}", fingerprint.short()),
                    waited_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                });
            }
            state = slot
                .settled
                .wait_timeout(state, remaining)
                .map_err(|_| EngineError::computation("cache slot lock poisoned"))?
                .0;
        }

        match &*state {
            SlotState::Ready { value, .. } => {
                Counters::bump(&self.counters.hits);
                Ok(value.clone())
            }
            SlotState::Failed(e) => Err(e.clone()),
            SlotState::Pending => Err(EngineError::computation("cache slot left pending")),
        }
    }

    /// Remove `slot` only if it is still the entry for `fingerprint`.
    fn remove_slot(&self, fingerprint: &Fingerprint, slot: &Arc<Slot<V>>) -> bool {
        self.entries
            .remove_if(fingerprint, |_, current| Arc::ptr_eq(current, slot))
            .is_some()
    }

    /// Evict the oldest ready entries until the table fits `max_entries`.
    fn enforce_capacity(&self, keep: &Fingerprint) {
        while self.entries.len() > self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .filter_map(|entry| {
                    let since = entry.value().ready_since()?;
                    Some((since, entry.key().clone(), Arc::clone(entry.value())))
                })
                .min_by_key(|(since, _, _)| *since);

            let Some((_, fingerprint, slot)) = oldest else {
                break;
            };
            if self.remove_slot(&fingerprint, &slot) {
                Counters::bump(&self.counters.evictions);
                debug!(fingerprint = %fingerprint.short(), "cache entry evicted");
            }
        }
    }

    /// Drop the settled entry for `fingerprint`. A computation in flight is
    /// left in place, so new callers join it rather than start another.
    pub fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        self.entries
            .remove_if(fingerprint, |_, slot| !slot.is_pending())
            .is_some()
    }

    /// Drop every settled entry; in-flight computations stay joinable.
    pub fn clear(&self) {
        self.entries.retain(|_, slot| slot.is_pending());
    }

    /// Remove every ready entry past its TTL. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.entries.retain(|_, slot| {
            let expired = slot.is_expired(now);
            removed += usize::from(expired);
            !expired
        });
        self.counters
            .expirations
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let hits = load(&self.counters.hits);
        let misses = load(&self.counters.misses);
        let lookups = hits + misses;
        CacheStats {
            hits,
            misses,
            computations: load(&self.counters.computations),
            failures: load(&self.counters.failures),
            evictions: load(&self.counters.evictions),
            expirations: load(&self.counters.expirations),
            entries: self.entries.len(),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
        }
    }
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    /// Start a background thread calling [`ResultCache::sweep_expired`]
    /// every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> EngineResult<SweeperHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let cache = Arc::clone(self);

        let join = thread::Builder::new()
            .name("gwo-cache-sweeper".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "cache sweeper started");
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            cache.sweep_expired();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("cache sweeper stopped");
            })
            .map_err(|e| EngineError::computation(format!("failed to spawn cache sweeper: {e}")))?;

        Ok(SweeperHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

/// Handle to a running sweeper thread. Dropping it stops the sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("computation panicked: {detail}")
}

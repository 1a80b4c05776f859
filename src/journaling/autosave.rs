use std::time::{Duration, Instant};

use crate::cache::{
    now_millis, CacheSlot, EntryFields, EntrySnapshot, LocalCacheStore, PutOutcome, StateDigest,
};
use crate::config::AutoSaveConfig;
use crate::storage::KeyValueStore;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Fixed-period timer. A poll after several missed periods fires once.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    next_due: Instant,
}

impl IntervalTimer {
    pub fn start(period: Duration, now: Instant) -> Self {
        let period = period.max(MIN_PERIOD);
        Self {
            period,
            next_due: now + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_due(&self) -> Instant {
        self.next_due
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now < self.next_due {
            return false;
        }
        let behind = now.duration_since(self.next_due).as_nanos();
        let missed = behind / self.period.as_nanos();
        let advance = self.period.as_nanos() * (missed + 1);
        self.next_due += Duration::from_nanos(u64::try_from(advance).unwrap_or(u64::MAX));
        true
    }
}

#[derive(Debug, Clone)]
pub enum DriverState {
    Inactive,
    Active {
        timer: IntervalTimer,
    },
    /// Writes are suppressed until the restored content has been injected.
    Restoring {
        timer: IntervalTimer,
        due_at: Instant,
        snapshot: Box<EntrySnapshot>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AutosaveTick {
    /// No timer period elapsed, or the driver is not mounted.
    Idle,
    Suppressed,
    Unchanged,
    /// State changed but has no notebook yet, so it could not be loaded back.
    Skipped,
    Wrote(PutOutcome),
    /// The pending restore is due; the host injects this snapshot's content.
    RestoreDue(Box<EntrySnapshot>),
}

/// Periodic change-detecting writer for one editor slot.
#[derive(Debug)]
pub struct AutosaveDriver {
    slot: CacheSlot,
    enabled: bool,
    interval: Duration,
    restore_delay: Duration,
    original_created_at: Option<String>,
    state: DriverState,
    baseline: Option<StateDigest>,
    last_written: Option<StateDigest>,
    last_cached_at: Option<i64>,
}

impl AutosaveDriver {
    pub fn new(slot: CacheSlot, config: &AutoSaveConfig) -> Self {
        Self {
            slot,
            enabled: config.enabled,
            interval: config.interval(),
            restore_delay: config.restore_delay(),
            original_created_at: None,
            state: DriverState::Inactive,
            baseline: None,
            last_written: None,
            last_cached_at: None,
        }
    }

    pub fn with_original_created_at(mut self, created_at: Option<String>) -> Self {
        self.original_created_at = created_at;
        self
    }

    pub fn slot(&self) -> CacheSlot {
        self.slot
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DriverState::Active { .. })
    }

    pub fn is_restoring(&self) -> bool {
        matches!(self.state, DriverState::Restoring { .. })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_cached_at(&self) -> Option<i64> {
        self.last_cached_at
    }

    /// Starts the timer and takes `current` as both baseline and last-written state.
    pub fn mount(&mut self, now: Instant, current: &EntryFields) {
        let digest = current.digest();
        self.baseline = Some(digest.clone());
        self.last_written = Some(digest);
        self.state = DriverState::Active {
            timer: IntervalTimer::start(self.interval, now),
        };
        tracing::debug!(slot = %self.slot, "autosave mounted");
    }

    /// Starts the timer with writes held back until `snapshot` is injected.
    pub fn mount_restoring(&mut self, now: Instant, snapshot: EntrySnapshot) {
        let digest = snapshot.fields().digest();
        self.baseline = Some(digest.clone());
        self.last_written = Some(digest);
        self.last_cached_at = Some(snapshot.cached_at);
        self.state = DriverState::Restoring {
            timer: IntervalTimer::start(self.interval, now),
            due_at: now + self.restore_delay,
            snapshot: Box::new(snapshot),
        };
        tracing::debug!(slot = %self.slot, "autosave mounted with pending restore");
    }

    pub fn tick<S: KeyValueStore>(
        &mut self,
        cache: &LocalCacheStore<S>,
        now: Instant,
        current: &EntryFields,
    ) -> AutosaveTick {
        match &mut self.state {
            DriverState::Inactive => AutosaveTick::Idle,
            DriverState::Restoring { timer, due_at, .. } => {
                if now < *due_at {
                    return if timer.poll(now) {
                        AutosaveTick::Suppressed
                    } else {
                        AutosaveTick::Idle
                    };
                }
                let timer = timer.clone();
                match std::mem::replace(&mut self.state, DriverState::Active { timer }) {
                    DriverState::Restoring { snapshot, .. } => AutosaveTick::RestoreDue(snapshot),
                    _ => AutosaveTick::Idle,
                }
            }
            DriverState::Active { timer } => {
                if !timer.poll(now) || !self.enabled {
                    return AutosaveTick::Idle;
                }
                let digest = current.digest();
                if self.last_written.as_ref() == Some(&digest) {
                    return AutosaveTick::Unchanged;
                }
                self.write_through(cache, current, digest)
            }
        }
    }

    /// Re-baselines on the editor state produced by injecting the restored snapshot.
    pub fn finish_restore(&mut self, current: &EntryFields) {
        let digest = current.digest();
        self.baseline = Some(digest.clone());
        self.last_written = Some(digest);
    }

    pub fn snapshot(&self, current: &EntryFields) -> Option<EntrySnapshot> {
        EntrySnapshot::capture(
            self.slot,
            current,
            now_millis(),
            self.original_created_at.clone(),
        )
    }

    /// Always false while a restore is pending: the editor does not hold the
    /// restored content yet.
    pub fn has_unsaved_changes(&self, current: &EntryFields) -> bool {
        if self.is_restoring() {
            return false;
        }
        match &self.baseline {
            Some(baseline) => *baseline != current.digest(),
            None => false,
        }
    }

    /// Removes this slot's snapshot and marks `current` as written so the next
    /// tick does not put it back.
    pub fn clear_cache<S: KeyValueStore>(&mut self, cache: &LocalCacheStore<S>, current: &EntryFields) {
        cache.remove(self.slot);
        self.last_written = Some(current.digest());
        self.last_cached_at = None;
    }

    /// Immediate write, bypassing the timer and change detection.
    pub fn force_save<S: KeyValueStore>(
        &mut self,
        cache: &LocalCacheStore<S>,
        current: &EntryFields,
    ) -> AutosaveTick {
        match self.state {
            DriverState::Inactive => AutosaveTick::Idle,
            DriverState::Restoring { .. } => AutosaveTick::Suppressed,
            DriverState::Active { .. } => {
                let digest = current.digest();
                self.write_through(cache, current, digest)
            }
        }
    }

    pub fn unmount(&mut self) {
        if !matches!(self.state, DriverState::Inactive) {
            tracing::debug!(slot = %self.slot, "autosave stopped");
        }
        self.state = DriverState::Inactive;
    }

    fn write_through<S: KeyValueStore>(
        &mut self,
        cache: &LocalCacheStore<S>,
        current: &EntryFields,
        digest: StateDigest,
    ) -> AutosaveTick {
        let Some(snapshot) = self.snapshot(current) else {
            return AutosaveTick::Skipped;
        };
        let outcome = cache.put(&snapshot);
        tracing::trace!(slot = %self.slot, outcome = outcome.as_str(), "autosave tick");
        if outcome.is_written() {
            self.last_cached_at = Some(snapshot.cached_at);
        }
        // A dropped write is not retried until the state changes again.
        self.last_written = Some(digest);
        AutosaveTick::Wrote(outcome)
    }
}

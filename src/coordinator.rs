// THEORY:
// The `Coordinator` is the stateful half of the engine. The `ResolutionPipeline` knows
// how to turn a snapshot into a palette; the coordinator decides when that is allowed
// to happen and whether the result may be kept.
//
// Per content key it tracks one `KeySlot`:
// - `entry`: the last derived palette. Only derived palettes are cached; the default
//   palette from a failed resolution never is.
// - `timer`: the armed debounce task, if any. Every notification aborts the previous
//   task and arms a new one (trailing edge).
// - `gate`: an async mutex held for the whole duration of a resolution. It serializes
//   resolutions per key. A debounce task waits on it before its quiet window starts,
//   so a notification that lands mid-resolution never overlaps with it.
// - `epoch` and `cycle`: every resolution takes a ticket with both. `cycle` grows with
//   each started resolution, `epoch` changes on invalidation. A result is committed
//   only if its ticket still matches, so a late result is dropped instead of
//   overwriting newer state.
//
// A slot lives only while it has something to track. Invalidation, `clear` and the
// end of a resolution drop every slot with no entry, no timer, no resolution in
// flight and no task waiting on its gate. Epochs come from one registry-wide counter,
// so a slot recreated for the same key never matches a ticket from its predecessor.
//
// Book-keeping lives behind a `parking_lot::Mutex` that is never held across an
// `.await`. The coordinator is cheap to clone; clones share the same state.

use crate::config::Settings;
use crate::core_modules::adjuster::Palette;
use crate::core_modules::snapshot::{ContentKey, ContentSnapshot, SnapshotSource};
use crate::core_modules::source_probe::Provenance;
use crate::error::{ConfigError, ProbeError};
use crate::pipeline::{Resolution, ResolutionPipeline};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Color scheme the host is currently displaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Light,
    Dark,
}

/// Externally visible lifecycle of one content key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// No entry and no timer.
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// A resolution is in flight.
    Resolving,
    /// A palette is cached and nothing is scheduled.
    Resolved,
}

/// A cached palette. Callers only ever get copies.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: ContentKey,
    pub palette: Palette,
    pub resolved_at: Instant,
}

/// Published whenever a resolution finishes and is still current.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteUpdate {
    pub key: ContentKey,
    pub palette: Palette,
    /// `None` when the palette is the default one.
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    cycle: u64,
    epoch: u64,
}

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

struct KeySlot {
    entry: Option<CacheEntry>,
    stale: bool,
    epoch: u64,
    cycle: u64,
    resolving: bool,
    timer: Option<Timer>,
    gate: Arc<AsyncMutex<()>>,
}

impl KeySlot {
    fn new(epoch: u64) -> Self {
        Self {
            entry: None,
            stale: false,
            epoch,
            cycle: 0,
            resolving: false,
            timer: None,
            gate: Arc::new(AsyncMutex::new(())),
        }
    }

    fn state(&self) -> KeyState {
        if self.resolving {
            KeyState::Resolving
        } else if self.timer.is_some() {
            KeyState::Pending
        } else if self.entry.is_some() {
            KeyState::Resolved
        } else {
            KeyState::Idle
        }
    }

    /// The cached palette, unless a change was signalled since it was resolved.
    fn fresh(&self) -> Option<Palette> {
        if self.stale {
            return None;
        }
        self.entry.as_ref().map(|entry| entry.palette)
    }

    fn start(&mut self) -> Ticket {
        self.cycle += 1;
        self.resolving = true;
        Ticket {
            cycle: self.cycle,
            epoch: self.epoch,
        }
    }

    fn expire(&mut self, epoch: u64) {
        self.entry = None;
        self.stale = false;
        self.epoch = epoch;
    }

    /// Nothing cached, scheduled, running or waiting. Safe to forget.
    fn is_idle(&self) -> bool {
        self.entry.is_none()
            && self.timer.is_none()
            && !self.resolving
            && Arc::strong_count(&self.gate) == 1
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

#[derive(Default)]
struct Registry {
    slots: HashMap<ContentKey, KeySlot>,
    next_epoch: u64,
    next_timer: u64,
}

impl Registry {
    fn slot(&mut self, key: &ContentKey) -> &mut KeySlot {
        let next_epoch = &mut self.next_epoch;
        self.slots.entry(key.clone()).or_insert_with(|| {
            *next_epoch += 1;
            KeySlot::new(*next_epoch)
        })
    }

    fn bump_epoch(&mut self) -> u64 {
        self.next_epoch += 1;
        self.next_epoch
    }

    fn expire_all(&mut self, cancel_timers: bool) {
        let Registry {
            slots, next_epoch, ..
        } = self;
        for slot in slots.values_mut() {
            *next_epoch += 1;
            slot.expire(*next_epoch);
            if cancel_timers {
                slot.cancel_timer();
            }
        }
        slots.retain(|_, slot| !slot.is_idle());
    }

    fn prune(&mut self, key: &ContentKey) {
        if self.slots.get(key).is_some_and(KeySlot::is_idle) {
            self.slots.remove(key);
        }
    }
}

struct Shared {
    pipeline: ResolutionPipeline,
    source: Arc<dyn SnapshotSource>,
    settings: RwLock<Arc<Settings>>,
    scheme: RwLock<Option<ColorScheme>>,
    registry: Mutex<Registry>,
    updates: broadcast::Sender<PaletteUpdate>,
}

impl Shared {
    fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read())
    }

    fn is_active(&self, key: &ContentKey, settings: &Settings) -> bool {
        if !settings.enabled {
            debug!(%key, "coloring disabled");
            return false;
        }
        if settings.is_excluded(key) {
            debug!(%key, "key excluded");
            return false;
        }
        if settings.dark_mode_only && *self.scheme.read() == Some(ColorScheme::Light) {
            debug!(%key, "light scheme active, dark mode only");
            return false;
        }
        true
    }

    fn fresh(&self, key: &ContentKey) -> Option<Palette> {
        self.registry.lock().slots.get(key).and_then(KeySlot::fresh)
    }

    fn gate(&self, key: &ContentKey) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.registry.lock().slot(key).gate)
    }

    /// Starts a caller-driven resolution. It supersedes a still-pending debounce cycle.
    fn begin(&self, key: &ContentKey) -> Ticket {
        let mut registry = self.registry.lock();
        let slot = registry.slot(key);
        if slot.timer.is_some() {
            debug!(%key, "direct resolve supersedes pending cycle");
            slot.cancel_timer();
        }
        slot.start()
    }

    /// Turns an expired timer into a resolution, unless it was re-armed meanwhile.
    fn claim_timer(&self, key: &ContentKey, timer_id: u64) -> Option<Ticket> {
        let mut registry = self.registry.lock();
        let slot = registry.slots.get_mut(key)?;
        match &slot.timer {
            Some(timer) if timer.id == timer_id => {}
            _ => return None,
        }
        // Dropping the handle detaches the task: from here on it cannot be aborted.
        slot.timer = None;
        Some(slot.start())
    }

    fn commit(&self, key: &ContentKey, ticket: Ticket, resolution: &Resolution) -> bool {
        {
            let mut registry = self.registry.lock();
            let Some(slot) = registry.slots.get_mut(key) else {
                return false;
            };
            if slot.epoch != ticket.epoch || slot.cycle != ticket.cycle {
                debug!(%key, "discarding result of a superseded resolution");
                return false;
            }
            if let Resolution::Derived { palette, .. } = resolution {
                slot.entry = Some(CacheEntry {
                    key: key.clone(),
                    palette: *palette,
                    resolved_at: Instant::now(),
                });
                slot.stale = false;
            }
        }

        // No subscribers is fine.
        let _ = self.updates.send(PaletteUpdate {
            key: key.clone(),
            palette: resolution.palette(),
            provenance: resolution.provenance(),
        });
        true
    }

    fn prune(&self, key: &ContentKey) {
        self.registry.lock().prune(key);
    }

    fn settle(&self, key: &ContentKey, ticket: Ticket) {
        let mut registry = self.registry.lock();
        if let Some(slot) = registry.slots.get_mut(key) {
            if slot.cycle == ticket.cycle {
                slot.resolving = false;
            }
        }
    }
}

/// Marks a resolution finished when dropped, including when its future is cancelled.
struct InFlight<'a> {
    shared: &'a Shared,
    key: &'a ContentKey,
    ticket: Ticket,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.shared.settle(self.key, self.ticket);
    }
}

/// Memoizes palettes per content key and debounces change notifications.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        Self::with_pipeline(source, ResolutionPipeline::default())
    }

    pub fn with_pipeline(source: Arc<dyn SnapshotSource>, pipeline: ResolutionPipeline) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                pipeline,
                source,
                settings: RwLock::new(Arc::new(Settings::default())),
                scheme: RwLock::new(None),
                registry: Mutex::new(Registry::default()),
                updates,
            }),
        }
    }

    /// Replaces the active settings wholesale.
    ///
    /// Cached palettes are dropped when the saturation or lightness targets or the
    /// remap mode change, since they were derived under the old values.
    pub fn configure(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        let settings = Arc::new(settings);
        let previous = std::mem::replace(&mut *self.shared.settings.write(), Arc::clone(&settings));

        if previous.saturation_target != settings.saturation_target
            || previous.lightness_target != settings.lightness_target
            || previous.remap_mode != settings.remap_mode
        {
            info!("palette targets changed, dropping cached palettes");
            self.shared.registry.lock().expire_all(false);
        }
        Ok(())
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.shared.settings()
    }

    pub fn set_color_scheme(&self, scheme: ColorScheme) {
        *self.shared.scheme.write() = Some(scheme);
    }

    /// Receives every palette produced by a current resolution, debounced or direct.
    pub fn subscribe(&self) -> broadcast::Receiver<PaletteUpdate> {
        self.shared.updates.subscribe()
    }

    /// Signals that the content behind `key` may have changed.
    ///
    /// Never blocks. Arms (or re-arms) the key's debounce timer; when it fires, a fresh
    /// snapshot is fetched from the `SnapshotSource` and the result is published to
    /// subscribers.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn notify_changed(&self, key: &ContentKey) {
        let settings = self.shared.settings();
        if !self.shared.is_active(key, &settings) {
            return;
        }

        let mut registry = self.shared.registry.lock();
        registry.next_timer += 1;
        let timer_id = registry.next_timer;
        let slot = registry.slot(key);
        if slot.entry.is_some() {
            slot.stale = true;
        }
        slot.cancel_timer();

        // Spawned under the registry lock, so the task cannot claim before it is armed.
        let handle = tokio::spawn(debounce_cycle(
            Arc::clone(&self.shared),
            key.clone(),
            timer_id,
            Arc::clone(&slot.gate),
            settings.debounce(),
        ));
        slot.timer = Some(Timer {
            id: timer_id,
            handle,
        });
        debug!(%key, timer_id, "debounce armed");
    }

    /// Resolves a palette for `key` from a snapshot the caller already holds.
    ///
    /// Returns `None` only when the key is excluded or coloring is disabled. Every
    /// content failure yields the default palette instead.
    pub async fn resolve(
        &self,
        key: &ContentKey,
        snapshot: &dyn ContentSnapshot,
    ) -> Option<Palette> {
        let shared = self.shared.as_ref();
        if !shared.is_active(key, &shared.settings()) {
            return None;
        }
        if let Some(palette) = shared.fresh(key) {
            debug!(%key, "cache hit");
            return Some(palette);
        }

        let resolution = {
            let gate = shared.gate(key);
            let _permit = gate.lock().await;
            // A resolution that held the gate may have just filled the cache.
            if let Some(palette) = shared.fresh(key) {
                debug!(%key, "cache hit after wait");
                return Some(palette);
            }

            let settings = shared.settings();
            let in_flight = InFlight {
                shared,
                key,
                ticket: shared.begin(key),
            };
            let resolution = shared.pipeline.run(snapshot, &settings).await;
            shared.commit(key, in_flight.ticket, &resolution);
            resolution
        };
        // Gate released: a default palette or a discarded result leaves nothing to keep.
        shared.prune(key);
        Some(resolution.palette())
    }

    /// Drops the cached palette for `key`. An in-flight resolution finishes, but its
    /// result is discarded.
    pub fn invalidate(&self, key: &ContentKey) {
        let mut registry = self.shared.registry.lock();
        let epoch = registry.bump_epoch();
        if let Some(slot) = registry.slots.get_mut(key) {
            slot.expire(epoch);
            debug!(%key, "invalidated");
        }
        registry.prune(key);
    }

    /// Drops every cached palette and cancels every armed timer.
    pub fn clear(&self) {
        self.shared.registry.lock().expire_all(true);
        info!("palette cache cleared");
    }

    pub fn state(&self, key: &ContentKey) -> KeyState {
        self.shared
            .registry
            .lock()
            .slots
            .get(key)
            .map_or(KeyState::Idle, KeySlot::state)
    }

    pub fn cached(&self, key: &ContentKey) -> Option<CacheEntry> {
        self.shared
            .registry
            .lock()
            .slots
            .get(key)
            .and_then(|slot| slot.entry.clone())
    }
}

async fn debounce_cycle(
    shared: Arc<Shared>,
    key: ContentKey,
    timer_id: u64,
    gate: Arc<AsyncMutex<()>>,
    quiet: Duration,
) {
    fire_after_quiet(&shared, &key, timer_id, gate, quiet).await;
    shared.prune(&key);
}

async fn fire_after_quiet(
    shared: &Shared,
    key: &ContentKey,
    timer_id: u64,
    gate: Arc<AsyncMutex<()>>,
    quiet: Duration,
) {
    // The quiet window opens once any in-flight resolution for the key has settled.
    drop(gate.lock().await);
    tokio::time::sleep(quiet).await;
    let _permit = gate.lock().await;

    let settings = shared.settings();
    let Some(ticket) = shared.claim_timer(key, timer_id) else {
        return;
    };
    let in_flight = InFlight {
        shared,
        key,
        ticket,
    };
    if !shared.is_active(key, &settings) {
        return;
    }

    let limit = shared.pipeline.step_timeout();
    let resolution = match tokio::time::timeout(limit, shared.source.snapshot(key)).await {
        Ok(Ok(snapshot)) => shared.pipeline.run(&*snapshot, &settings).await,
        Ok(Err(error)) => {
            warn!(%key, %error, "using default palette");
            Resolution::Fallback(Palette::default())
        }
        Err(_) => {
            let error = ProbeError::ExtractionTimeout {
                step: "snapshot",
                limit,
            };
            warn!(%key, %error, "using default palette");
            Resolution::Fallback(Palette::default())
        }
    };
    shared.commit(key, in_flight.ticket, &resolution);
}

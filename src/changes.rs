/// Change notification and batching
///
/// Every series, table and view owns a [`ChangeNotifier`]. Mutators open a
/// [`ChangeBatch`], record what kind of change happened, and close the batch.
/// Notifications are held back while any batch is open on the entity; when
/// the outermost batch closes, listeners receive exactly one [`ChangeEvent`]
/// carrying the union of everything recorded.
///
/// # State machine
///
/// ```text
/// Idle --begin--> Batching(1) --begin--> Batching(N) --finish x N--> Idle (+ one event)
/// ```
///
/// # Locking
///
/// Each notifier has one reentrant critical section. A batch holds it from
/// begin to finish, and consumers hold it (via [`ChangeNotifier::lock`]) for
/// traversals that need a consistent snapshot. Listeners run synchronously on
/// the thread that closes the outermost batch, inside the critical section,
/// so a listener may mutate the same entity again without deadlocking: that
/// mutation opens its own nested batch and produces its own event.
///
/// Events forwarded upward (a member series to its table) never wait for the
/// upper section. They join the batch open there, or are dispatched by the
/// thread holding that section when it leaves, so the lock order stays
/// upper before lower.
///
/// # Examples
///
/// ```
/// use liveseries::{Series, ValueKind, Value};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let series = Series::new(ValueKind::Int32);
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = calls.clone();
/// let _sub = series.subscribe(move |_event| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// let batch = series.begin_changes("load");
/// for i in 0..5 {
///     series.append(Value::Int32(i)).unwrap();
/// }
/// batch.finish();
///
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```

use bitflags::bitflags;
use log::{debug, trace, warn};
use parking_lot::{ArcReentrantMutexGuard, Mutex, RawMutex, RawThreadId, ReentrantMutex};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

bitflags! {
    /// Set of change kinds carried by an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChangeKinds: u8 {
        const VALUES_CHANGED = 1 << 0;
        /// Structural addition (a table series, a group key)
        const ADDED = 1 << 1;
        /// Structural removal (a table series, a group key)
        const REMOVED = 1 << 2;
        const REORDERED = 1 << 3;
        /// Length changed
        const RESIZED = 1 << 4;
    }
}

/// Reference identity of a series, table or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EntityId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Notification payload
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    source: EntityId,
    kinds: ChangeKinds,
    cause: Option<Arc<ChangeEvent>>,
}

impl ChangeEvent {
    pub fn new(source: EntityId, kinds: ChangeKinds, cause: Option<Arc<ChangeEvent>>) -> Self {
        ChangeEvent { source, kinds, cause }
    }

    /// Entity whose listeners received this event
    pub fn source(&self) -> EntityId {
        self.source
    }

    pub fn kinds(&self) -> ChangeKinds {
        self.kinds
    }

    pub fn contains(&self, kinds: ChangeKinds) -> bool {
        self.kinds.contains(kinds)
    }

    /// Upstream event that triggered this one, if any
    pub fn cause(&self) -> Option<&ChangeEvent> {
        self.cause.as_deref()
    }

    /// The first event in the chain
    pub fn root_cause(&self) -> &ChangeEvent {
        let mut event = self;
        while let Some(cause) = event.cause() {
            event = cause;
        }
        event
    }

    /// Sources along the chain, starting with this event
    pub fn chain(&self) -> Vec<EntityId> {
        let mut ids = vec![self.source];
        let mut event = self;
        while let Some(cause) = event.cause() {
            ids.push(cause.source);
            event = cause;
        }
        ids
    }
}

type Callback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    entries: Vec<Arc<ListenerEntry>>,
}

impl ListenerRegistry {
    fn remove(&mut self, id: u64) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                let entry = self.entries.remove(pos);
                entry.active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: ChangeKinds,
    cause: Option<Arc<ChangeEvent>>,
}

impl BatchState {
    fn record(&mut self, kinds: ChangeKinds, cause: Option<&ChangeEvent>) {
        self.pending |= kinds;
        if let Some(cause) = cause {
            self.cause = Some(Arc::new(cause.clone()));
        }
    }

    fn take_event(&mut self, id: EntityId) -> Option<ChangeEvent> {
        if self.depth > 0 || self.pending.is_empty() {
            return None;
        }
        let kinds = std::mem::take(&mut self.pending);
        Some(ChangeEvent::new(id, kinds, self.cause.take()))
    }
}

/// The cell counts nested holds by the owning thread
type Section = ReentrantMutex<Cell<usize>>;
type SectionLock = ArcReentrantMutexGuard<RawMutex, RawThreadId, Cell<usize>>;

struct NotifierCore {
    id: EntityId,
    section: Arc<Section>,
    batch: Mutex<BatchState>,
    listeners: Arc<Mutex<ListenerRegistry>>,
}

impl NotifierCore {
    fn enter(self: &Arc<Self>) -> SectionGuard {
        let lock = self.section.lock_arc();
        lock.set(lock.get() + 1);
        SectionGuard {
            core: self.clone(),
            lock: Some(lock),
            flush_on_exit: true,
        }
    }

    fn try_enter(self: &Arc<Self>) -> Option<SectionGuard> {
        let lock = self.section.try_lock_arc()?;
        lock.set(lock.get() + 1);
        Some(SectionGuard {
            core: self.clone(),
            lock: Some(lock),
            flush_on_exit: false,
        })
    }

    fn begin(self: &Arc<Self>, token: &str) -> ChangeBatch {
        let section = self.enter();
        let depth = {
            let mut state = self.batch.lock();
            state.depth += 1;
            state.depth
        };
        trace!("{} begin_changes({}) depth={}", self.id, token, depth);
        ChangeBatch {
            core: self.clone(),
            token: token.to_string(),
            held: Vec::new(),
            _section: section,
        }
    }

    fn depth(&self) -> usize {
        self.batch.lock().depth
    }

    fn finish(&self, token: &str) {
        let event = {
            let mut state = self.batch.lock();
            if state.depth == 0 {
                warn!("{} finish_changes({}) without matching begin", self.id, token);
                return;
            }
            state.depth -= 1;
            trace!("{} finish_changes({}) depth={}", self.id, token, state.depth);
            state.take_event(self.id)
        };

        if let Some(event) = event {
            self.dispatch(&event);
        }
    }

    fn has_deferred(&self) -> bool {
        let state = self.batch.lock();
        state.depth == 0 && !state.pending.is_empty()
    }

    /// Dispatch kinds recorded outside any batch. Never waits for the
    /// section: if another thread holds it, that thread flushes on exit.
    fn flush(self: &Arc<Self>) {
        while self.has_deferred() {
            let Some(section) = self.try_enter() else {
                return;
            };
            let event = self.batch.lock().take_event(self.id);
            if let Some(event) = event {
                trace!("{} flushing deferred {:?}", self.id, event.kinds());
                self.dispatch(&event);
            }
            drop(section);
        }
    }

    fn dispatch(&self, event: &ChangeEvent) {
        // Snapshot so listeners added during dispatch wait for the next event
        let entries: Vec<Arc<ListenerEntry>> = self.listeners.lock().entries.clone();
        debug!(
            "{} dispatching {:?} to {} listeners",
            self.id,
            event.kinds(),
            entries.len()
        );
        for entry in entries {
            if entry.active.load(Ordering::SeqCst) {
                (entry.callback)(event);
            }
        }
    }
}

/// Listener registry, batch counter and critical section of one entity.
pub struct ChangeNotifier {
    core: Arc<NotifierCore>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        ChangeNotifier {
            core: Arc::new(NotifierCore {
                id: EntityId::next(),
                section: Arc::new(ReentrantMutex::new(Cell::new(0))),
                batch: Mutex::new(BatchState::default()),
                listeners: Arc::new(Mutex::new(ListenerRegistry::default())),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.core.id
    }

    /// Register a listener. Notifications stop when the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let mut registry = self.core.listeners.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.entries.push(Arc::new(ListenerEntry {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(listener),
        }));
        Subscription {
            source: self.core.id,
            registry: Arc::downgrade(&self.core.listeners),
            id,
            detached: false,
        }
    }

    /// Remove a subscription made on this entity.
    ///
    /// Returns false if the subscription belongs to another entity. The
    /// handle is consumed either way, which detaches it from its own entity.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        if subscription.source != self.core.id {
            return false;
        }
        subscription.unsubscribe();
        true
    }

    pub fn listener_count(&self) -> usize {
        self.core.listeners.lock().entries.len()
    }

    /// Enter the critical section without opening a batch. Hold the guard
    /// across a traversal that must see one consistent state.
    pub fn lock(&self) -> SectionGuard {
        self.core.enter()
    }

    /// Open a (possibly nested) batch. `token` names the caller in logs.
    pub fn begin_changes(&self, token: &str) -> ChangeBatch {
        self.core.begin(token)
    }

    /// Current batch nesting depth
    pub fn depth(&self) -> usize {
        self.core.depth()
    }

    pub fn is_batching(&self) -> bool {
        self.depth() > 0
    }

    /// Record kinds into the open batch. Only valid while a batch is open on
    /// this entity; mutators always open one first.
    pub(crate) fn record(&self, kinds: ChangeKinds, cause: Option<&ChangeEvent>) {
        let mut state = self.core.batch.lock();
        debug_assert!(state.depth > 0, "record outside of a batch");
        state.record(kinds, cause);
    }

    /// Open a batch, record, and close it.
    pub(crate) fn notify(&self, kinds: ChangeKinds, cause: Option<&ChangeEvent>) {
        let batch = self.begin_changes("notify");
        self.record(kinds, cause);
        batch.finish();
    }

    /// Record kinds without waiting for the critical section.
    ///
    /// Inside an open batch they join that batch. Otherwise they are
    /// dispatched right away, or by the thread holding the section once it
    /// leaves.
    pub(crate) fn defer(&self, kinds: ChangeKinds, cause: Option<&ChangeEvent>) {
        self.core.batch.lock().record(kinds, cause);
        self.core.flush();
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("id", &self.id())
            .field("depth", &self.depth())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Scope of an open batch. Closing it (via [`ChangeBatch::finish`] or drop)
/// decrements the depth and, at depth zero, dispatches the coalesced event.
///
/// Holding the batch keeps the entity's critical section locked, so other
/// threads cannot observe the entity half-updated.
#[must_use = "dropping the batch immediately closes it"]
pub struct ChangeBatch {
    core: Arc<NotifierCore>,
    token: String,
    held: Vec<ChangeBatch>,
    // Released after `Drop::drop` has dispatched
    _section: SectionGuard,
}

impl ChangeBatch {
    pub fn finish(self) {}

    pub fn depth(&self) -> usize {
        self.core.depth()
    }

    /// Keep `other` open until this batch closes. Held batches close first,
    /// in the order they were added.
    pub(crate) fn hold(&mut self, other: ChangeBatch) {
        self.held.push(other);
    }
}

impl Drop for ChangeBatch {
    fn drop(&mut self) {
        for held in self.held.drain(..) {
            held.finish();
        }
        self.core.finish(&self.token);
    }
}

/// Guard for an entity's critical section. Leaving the outermost hold
/// dispatches anything other threads recorded while it was held.
pub struct SectionGuard {
    core: Arc<NotifierCore>,
    lock: Option<SectionLock>,
    flush_on_exit: bool,
}

impl Drop for SectionGuard {
    fn drop(&mut self) {
        let Some(lock) = self.lock.take() else {
            return;
        };
        let holds = lock.get() - 1;
        lock.set(holds);
        drop(lock);
        if holds == 0 && self.flush_on_exit {
            self.core.flush();
        }
    }
}

/// Handle to a registered listener.
///
/// Dropping the handle unsubscribes. The handle does not keep the entity
/// alive.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    source: EntityId,
    registry: Weak<Mutex<ListenerRegistry>>,
    id: u64,
    detached: bool,
}

impl Subscription {
    /// Entity this subscription listens to
    pub fn source(&self) -> EntityId {
        self.source
    }

    /// False once unsubscribed or once the entity is gone
    pub fn is_active(&self) -> bool {
        if self.detached {
            return false;
        }
        match self.registry.upgrade() {
            Some(registry) => registry.lock().entries.iter().any(|e| e.id == self.id),
            None => false,
        }
    }

    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("source", &self.source)
            .field("id", &self.id)
            .finish()
    }
}

/// Entities that emit [`ChangeEvent`]s
pub trait Observable {
    fn notifier(&self) -> &ChangeNotifier;

    fn entity_id(&self) -> EntityId {
        self.notifier().id()
    }
}

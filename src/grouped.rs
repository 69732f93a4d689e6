/// LiveSeries GroupedView
///
/// Partitions the values of a source series by a key function. Each distinct
/// key maps to a read-only sub-series holding the member values in source
/// order. Keys with no members disappear; new keys appear as the source
/// changes.
///
/// The view has its own notifier: it emits ADDED when keys appear, REMOVED
/// when keys vanish, and VALUES_CHANGED on every recompute. Sub-series of keys
/// that persist across a recompute keep their identity and emit their own
/// events when their members change.

use crate::changes::{
    ChangeBatch, ChangeEvent, ChangeKinds, ChangeNotifier, EntityId, Observable, SectionGuard,
    Subscription,
};
use crate::series::Series;
use crate::value::{Value, ValueKind};
use crate::view::{bind_series, Binding};
use log::debug;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct GroupedInner {
    notifier: ChangeNotifier,
    kind: ValueKind,
    groups: RwLock<Vec<(Value, Series)>>,
}

impl GroupedInner {
    fn recompute<K>(&self, source: &Series, key_fn: &K, cause: Option<&ChangeEvent>)
    where
        K: Fn(&Value) -> Value,
    {
        let mut discovered: Vec<Value> = Vec::new();
        let mut members: HashMap<Value, Vec<Value>> = HashMap::new();
        for value in source.snapshot() {
            match members.entry(key_fn(&value)) {
                Entry::Occupied(mut group) => group.get_mut().push(value),
                Entry::Vacant(slot) => {
                    discovered.push(slot.key().clone());
                    slot.insert(vec![value]);
                }
            }
        }

        let batch = self.notifier.begin_changes("recompute");
        let mut kinds = ChangeKinds::VALUES_CHANGED;
        let updates = {
            let mut groups = self.groups.write();
            let mut previous: HashMap<Value, Series> = groups.drain(..).collect();
            let mut updates = Vec::with_capacity(discovered.len());
            for key in discovered {
                let values = members.remove(&key).unwrap_or_default();
                let series = match previous.remove(&key) {
                    Some(series) => series,
                    None => {
                        kinds |= ChangeKinds::ADDED;
                        Series::derived(self.kind)
                    }
                };
                updates.push((series.clone(), values));
                groups.push((key, series));
            }
            if !previous.is_empty() {
                kinds |= ChangeKinds::REMOVED;
            }
            debug!(
                "grouped view {} has {} keys ({} removed)",
                self.notifier.id(),
                groups.len(),
                previous.len()
            );
            updates
        };

        for (series, values) in updates {
            if series.snapshot() != values {
                series.replace_values(values, cause);
            }
        }
        self.notifier.record(kinds, cause);
        batch.finish();
    }
}

/// # Examples
///
/// ```
/// use liveseries::{Series, Value, ValueKind};
///
/// let series = Series::from_values(ValueKind::Int32, [3, 44, 21, 10, 3]).unwrap();
/// let by_parity = series.grouped_by(|v| Value::Bool(v.as_i32().map_or(false, |n| n % 2 == 0)));
///
/// assert_eq!(by_parity.group_count(), 2);
/// let odd = by_parity.group(&Value::Bool(false)).unwrap();
/// assert_eq!(odd.values(), [3, 21, 3].map(Value::Int32).to_vec());
/// ```
pub struct GroupedView {
    inner: Arc<GroupedInner>,
    binding: Binding,
}

impl GroupedView {
    /// Group by value identity
    pub fn new(source: &Series) -> Self {
        Self::with_key(source, |v: &Value| v.clone())
    }

    /// Group by `key_fn(value)`
    pub fn with_key<K>(source: &Series, key_fn: K) -> Self
    where
        K: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let inner = Arc::new(GroupedInner {
            notifier: ChangeNotifier::new(),
            kind: source.kind(),
            groups: RwLock::new(Vec::new()),
        });
        let binding = {
            let inner = inner.clone();
            bind_series(&[source], move |sources, cause| {
                inner.recompute(&sources[0], &key_fn, cause);
            })
        };
        GroupedView { inner, binding }
    }

    pub fn id(&self) -> EntityId {
        self.inner.notifier.id()
    }

    /// Keys in discovery order
    pub fn keys(&self) -> Vec<Value> {
        self.inner.groups.read().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Sub-series of `key`
    pub fn group(&self, key: &Value) -> Option<Series> {
        self.inner
            .groups
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, s)| s.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.inner.groups.read().iter().any(|(k, _)| k == key)
    }

    pub fn group_count(&self) -> usize {
        self.inner.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_count() == 0
    }

    /// Consistent snapshot of (key, sub-series) pairs
    pub fn iter(&self) -> std::vec::IntoIter<(Value, Series)> {
        let _section = self.lock();
        self.inner.groups.read().clone().into_iter()
    }

    pub fn lock(&self) -> SectionGuard {
        self.inner.notifier.lock()
    }

    pub fn begin_changes(&self, token: &str) -> ChangeBatch {
        self.inner.notifier.begin_changes(token)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.inner.notifier.unsubscribe(subscription)
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    pub fn dispose(mut self) {
        self.binding.detach();
    }
}

impl Observable for GroupedView {
    fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for GroupedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedView")
            .field("id", &self.id())
            .field("keys", &self.keys())
            .finish()
    }
}

impl Series {
    /// Group this series by value
    pub fn grouped(&self) -> GroupedView {
        GroupedView::new(self)
    }

    /// Group this series by `key_fn(value)`
    pub fn grouped_by<K>(&self, key_fn: K) -> GroupedView
    where
        K: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        GroupedView::with_key(self, key_fn)
    }
}

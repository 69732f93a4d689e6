/// LiveSeries Series Implementation
///
/// A Series is a typed, ordered, resizable sequence of values indexed by
/// integer. Every value stored has the series' `ValueKind` (generic series
/// accept anything). Missing data is stored as the kind's empty value.
///
/// `Series` is a cheap handle: clones share the same storage, and identity
/// (not content) decides equality between series. Every mutator emits a
/// [`ChangeEvent`](crate::ChangeEvent) through the series' notifier, coalesced
/// by any open batch.
///
/// # Examples
///
/// ```
/// use liveseries::{Series, Value, ValueKind};
///
/// let prices = Series::new(ValueKind::Float64);
/// prices.append(Value::Float64(9.5)).unwrap();
/// prices.append(Value::Null).unwrap(); // stored as the empty value (NaN)
///
/// assert_eq!(prices.len(), 2);
/// assert!(prices.is_empty_at(1).unwrap());
/// assert_eq!(prices.get_double(0).unwrap(), 9.5);
/// ```

use crate::changes::{
    ChangeBatch, ChangeEvent, ChangeKinds, ChangeNotifier, EntityId, Observable, SectionGuard,
    Subscription,
};
use crate::error::{Error, Result};
use crate::sequence::{Sequence, StorageHint};
use crate::value::{Value, ValueKind};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};

struct SeriesInner {
    notifier: ChangeNotifier,
    kind: ValueKind,
    read_only: bool,
    data: RwLock<Box<dyn Sequence<Value> + Send + Sync>>,
}

#[derive(Clone)]
pub struct Series {
    inner: Arc<SeriesInner>,
}

/// Non-owning reference to a series
#[derive(Clone)]
pub struct WeakSeries {
    inner: Weak<SeriesInner>,
}

impl WeakSeries {
    pub fn upgrade(&self) -> Option<Series> {
        self.inner.upgrade().map(|inner| Series { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl Series {
    pub fn new(kind: ValueKind) -> Self {
        Self::with_hint(kind, StorageHint::default())
    }

    /// Create a series with a storage layout hint.
    pub fn with_hint(kind: ValueKind, hint: StorageHint) -> Self {
        Self::build(kind, hint, false)
    }

    /// Create a series holding `values`. Fails with `TypeMismatch` on the
    /// first value the kind does not accept.
    pub fn from_values<I>(kind: ValueKind, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let series = Self::new(kind);
        {
            let mut data = series.inner.data.write();
            for value in values {
                let value = series.validate(value.into())?;
                data.append(value);
            }
        }
        Ok(series)
    }

    /// Read-only output series of a view
    pub(crate) fn derived(kind: ValueKind) -> Self {
        Self::build(kind, StorageHint::FastReads, true)
    }

    fn build(kind: ValueKind, hint: StorageHint, read_only: bool) -> Self {
        Series {
            inner: Arc::new(SeriesInner {
                notifier: ChangeNotifier::new(),
                kind,
                read_only,
                data: RwLock::new(hint.new_sequence()),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.notifier.id()
    }

    pub fn kind(&self) -> ValueKind {
        self.inner.kind
    }

    pub fn is_numeric(&self) -> bool {
        self.inner.kind.is_numeric()
    }

    /// True for the output series of a view
    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical placeholder for missing values of this series' kind
    pub fn empty_value(&self) -> Value {
        self.inner.kind.empty_value()
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        self.inner.data.read().get(index)
    }

    pub fn is_empty_at(&self, index: usize) -> Result<bool> {
        Ok(self.get(index)?.is_empty_value())
    }

    /// Value at `index` as f64. Empty values read as NaN.
    pub fn get_double(&self, index: usize) -> Result<f64> {
        self.require_numeric()?;
        let value = self.get(index)?;
        Ok(value.to_f64().unwrap_or(f64::NAN))
    }

    /// Value at `index` as f32. Empty values read as NaN.
    pub fn get_float(&self, index: usize) -> Result<f32> {
        Ok(self.coerced(index, ValueKind::Float32)?.as_f32().unwrap_or(f32::NAN))
    }

    /// Value at `index` truncated to i32. Empty values read as `i32::MIN`.
    pub fn get_int(&self, index: usize) -> Result<i32> {
        Ok(self.coerced(index, ValueKind::Int32)?.as_i32().unwrap_or(i32::MIN))
    }

    /// Value at `index` truncated to i64. Empty values read as `i64::MIN`.
    pub fn get_long(&self, index: usize) -> Result<i64> {
        Ok(self.coerced(index, ValueKind::Int64)?.as_i64().unwrap_or(i64::MIN))
    }

    fn coerced(&self, index: usize, kind: ValueKind) -> Result<Value> {
        self.require_numeric()?;
        let value = self.get(index)?;
        value
            .coerce(kind)
            .ok_or_else(|| Error::kind_mismatch(kind, &value))
    }

    pub(crate) fn require_numeric(&self) -> Result<()> {
        if self.is_numeric() {
            Ok(())
        } else {
            Err(Error::not_numeric(self.kind()))
        }
    }

    /// Validate and normalise a value for this series
    fn validate(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(self.empty_value());
        }
        if self.inner.kind.accepts(&value) {
            Ok(value)
        } else {
            Err(Error::kind_mismatch(self.inner.kind, value))
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.inner.read_only {
            Err(Error::ReadOnly(self.id()))
        } else {
            Ok(())
        }
    }

    pub fn set(&self, index: usize, value: Value) -> Result<()> {
        self.check_writable()?;
        let value = self.validate(value)?;
        let batch = self.begin_changes("set");
        self.inner.data.write().set(index, value)?;
        self.inner.notifier.record(ChangeKinds::VALUES_CHANGED, None);
        batch.finish();
        Ok(())
    }

    pub fn append(&self, value: Value) -> Result<()> {
        self.check_writable()?;
        let value = self.validate(value)?;
        let batch = self.begin_changes("append");
        self.inner.data.write().append(value);
        self.inner.notifier.record(ChangeKinds::VALUES_CHANGED | ChangeKinds::RESIZED, None);
        batch.finish();
        Ok(())
    }

    /// Parse `text` and append it, substituting the empty value for text that
    /// does not parse. Returns whether the text parsed.
    pub fn append_text(&self, text: &str) -> Result<bool> {
        match self.inner.kind.parse(text) {
            Some(value) => self.append(value).map(|_| true),
            None => self.append(self.empty_value()).map(|_| false),
        }
    }

    /// Insert at `index` in `0..=len`
    pub fn insert(&self, index: usize, value: Value) -> Result<()> {
        self.check_writable()?;
        let value = self.validate(value)?;
        let batch = self.begin_changes("insert");
        self.inner.data.write().insert(index, value)?;
        self.inner.notifier.record(ChangeKinds::VALUES_CHANGED | ChangeKinds::RESIZED, None);
        batch.finish();
        Ok(())
    }

    /// Append several values as one change
    pub fn extend<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = Value>,
    {
        self.check_writable()?;
        let values = values
            .into_iter()
            .map(|v| self.validate(v))
            .collect::<Result<Vec<_>>>()?;
        if values.is_empty() {
            return Ok(());
        }
        let batch = self.begin_changes("extend");
        {
            let mut data = self.inner.data.write();
            for value in values {
                data.append(value);
            }
        }
        self.inner.notifier.record(ChangeKinds::VALUES_CHANGED | ChangeKinds::RESIZED, None);
        batch.finish();
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<Value> {
        self.check_writable()?;
        let batch = self.begin_changes("remove");
        let removed = self.inner.data.write().delete(index)?;
        self.inner.notifier.record(ChangeKinds::VALUES_CHANGED | ChangeKinds::RESIZED, None);
        batch.finish();
        Ok(removed)
    }

    /// Pad with the empty value or truncate to `len`
    pub fn resize(&self, len: usize) -> Result<()> {
        self.check_writable()?;
        let batch = self.begin_changes("resize");
        let changed = {
            let mut data = self.inner.data.write();
            let current = data.len();
            if len < current {
                data.truncate(len);
            } else {
                for _ in current..len {
                    data.append(self.empty_value());
                }
            }
            current != len
        };
        if changed {
            self.inner.notifier.record(ChangeKinds::VALUES_CHANGED | ChangeKinds::RESIZED, None);
        }
        batch.finish();
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.resize(0)
    }

    /// Replace the whole content on behalf of a view. Emits nothing when the
    /// content is unchanged.
    pub(crate) fn replace_values(&self, values: Vec<Value>, cause: Option<&ChangeEvent>) {
        let batch = self.begin_changes("recompute");
        let resized = {
            let mut data = self.inner.data.write();
            let unchanged = data.len() == values.len()
                && data.iter().zip(&values).all(|(old, new)| old == *new);
            if unchanged {
                return;
            }
            let resized = data.len() != values.len();
            data.replace(values);
            resized
        };
        let mut kinds = ChangeKinds::VALUES_CHANGED;
        if resized {
            kinds |= ChangeKinds::RESIZED;
        }
        self.inner.notifier.record(kinds, cause);
        batch.finish();
    }

    /// Consistent copy of all values
    pub fn values(&self) -> Vec<Value> {
        let _section = self.lock();
        self.inner.data.read().to_vec()
    }

    /// Copy of the storage without entering the critical section. Views use
    /// this to read inputs they are not being notified by.
    pub(crate) fn snapshot(&self) -> Vec<Value> {
        self.inner.data.read().to_vec()
    }

    /// Consistent copy of all values as f64 (empty values become NaN).
    /// Fails with `TypeMismatch` on non-numeric series.
    pub fn doubles(&self) -> Result<Vec<f64>> {
        self.require_numeric()?;
        let _section = self.lock();
        let data = self.inner.data.read();
        Ok(data
            .iter()
            .map(|v| v.to_f64().unwrap_or(f64::NAN))
            .collect())
    }

    /// (min, max) over non-empty values, computed on the current content.
    /// None if there is no non-empty value or the series is not numeric.
    pub fn extent(&self) -> Option<(f64, f64)> {
        let values = self.doubles().ok()?;
        extent_of(&values)
    }

    /// Hold the series' critical section for a multi-step read.
    pub fn lock(&self) -> SectionGuard {
        self.inner.notifier.lock()
    }

    /// Open a batch; events are coalesced until it closes.
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

    pub fn downgrade(&self) -> WeakSeries {
        WeakSeries {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Reference identity
    pub fn ptr_eq(&self, other: &Series) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

pub(crate) fn extent_of(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

impl Observable for Series {
    fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Series {{ id: {}, kind: {:?}, read_only: {}, len: {} }}",
            self.id(),
            self.kind(),
            self.is_read_only(),
            self.len()
        )
    }
}

/// LiveSeries Table Implementation
///
/// A Table is an ordered mapping from unique labels to series that share one
/// row index. The table forwards every change of a member series to its own
/// listeners (with the series event as cause), so a consumer watching the
/// table sees both structural changes (series added, removed, reordered) and
/// value changes.
///
/// Multi-series operations (`reload`, `append_row`, `clear_rows`) run inside
/// one table batch, so observers receive a single event and never see series
/// of different lengths.
///
/// # Examples
///
/// ```
/// use liveseries::{Series, Table, Value, ValueKind};
///
/// let table = Table::new("quotes");
/// table.add_series("symbol", Series::new(ValueKind::Generic)).unwrap();
/// table.add_series("price", Series::new(ValueKind::Float64)).unwrap();
///
/// table.append_row(vec![Value::from("ACME"), Value::Float64(12.5)]).unwrap();
///
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.series_label(1).unwrap(), "price");
/// assert_eq!(table.get_series("price").unwrap().get_double(0).unwrap(), 12.5);
/// ```

use crate::changes::{
    ChangeBatch, ChangeEvent, ChangeKinds, ChangeNotifier, EntityId, Observable, SectionGuard,
    Subscription,
};
use crate::error::{Error, Result};
use crate::series::Series;
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

struct TableEntry {
    label: String,
    series: Series,
    /// Forwards the member's events to the table
    _forward: Subscription,
}

struct TableInner {
    name: String,
    notifier: ChangeNotifier,
    read_only: bool,
    entries: RwLock<Vec<TableEntry>>,
}

#[derive(Clone)]
pub struct Table {
    inner: Arc<TableInner>,
}

/// Non-owning reference to a table
#[derive(Clone)]
pub struct WeakTable {
    inner: Weak<TableInner>,
}

impl WeakTable {
    pub fn upgrade(&self) -> Option<Table> {
        self.inner.upgrade().map(|inner| Table { inner })
    }
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), false)
    }

    /// Read-only output table of a view
    pub(crate) fn derived(name: String) -> Self {
        Self::build(name, true)
    }

    fn build(name: String, read_only: bool) -> Self {
        Table {
            inner: Arc::new(TableInner {
                name,
                notifier: ChangeNotifier::new(),
                read_only,
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> EntityId {
        self.inner.notifier.id()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    fn check_writable(&self) -> Result<()> {
        if self.inner.read_only {
            Err(Error::ReadOnly(self.id()))
        } else {
            Ok(())
        }
    }

    /// Member events reach the table without waiting for its section, so a
    /// member mutation never blocks on a reader holding the table.
    fn forward(&self, series: &Series) -> Subscription {
        let table = Arc::downgrade(&self.inner);
        series.subscribe(move |event| {
            if let Some(table) = table.upgrade() {
                table.notifier.defer(event.kinds(), Some(event));
            }
        })
    }

    fn entry(&self, label: String, series: Series) -> TableEntry {
        let forward = self.forward(&series);
        TableEntry {
            label,
            series,
            _forward: forward,
        }
    }

    /// Append a series under a new label
    pub fn add_series(&self, label: impl Into<String>, series: Series) -> Result<()> {
        let index = self.series_count();
        self.insert_series(index, label, series)
    }

    /// Insert a series at position `index` in `0..=series_count`
    pub fn insert_series(
        &self,
        index: usize,
        label: impl Into<String>,
        series: Series,
    ) -> Result<()> {
        self.check_writable()?;
        let label = label.into();
        let batch = self.begin_changes("add_series");
        {
            let mut entries = self.inner.entries.write();
            if entries.iter().any(|e| e.label == label) {
                return Err(Error::DuplicateLabel(label));
            }
            if index > entries.len() {
                return Err(Error::out_of_range(index, entries.len() + 1));
            }
            let entry = self.entry(label, series);
            entries.insert(index, entry);
        }
        self.inner.notifier.record(ChangeKinds::ADDED, None);
        batch.finish();
        Ok(())
    }

    /// Remove and return the series under `label`
    pub fn remove_series(&self, label: &str) -> Result<Series> {
        self.check_writable()?;
        let batch = self.begin_changes("remove_series");
        let removed = {
            let mut entries = self.inner.entries.write();
            let pos = entries
                .iter()
                .position(|e| e.label == label)
                .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
            entries.remove(pos).series
        };
        self.inner.notifier.record(ChangeKinds::REMOVED, None);
        batch.finish();
        Ok(removed)
    }

    pub fn get_series(&self, label: &str) -> Result<Series> {
        self.inner
            .entries
            .read()
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.series.clone())
            .ok_or_else(|| Error::UnknownLabel(label.to_string()))
    }

    pub fn get_series_at(&self, index: usize) -> Result<Series> {
        let entries = self.inner.entries.read();
        entries
            .get(index)
            .map(|e| e.series.clone())
            .ok_or_else(|| Error::out_of_range(index, entries.len()))
    }

    pub fn series_label(&self, index: usize) -> Result<String> {
        let entries = self.inner.entries.read();
        entries
            .get(index)
            .map(|e| e.label.clone())
            .ok_or_else(|| Error::out_of_range(index, entries.len()))
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.inner.entries.read().iter().position(|e| e.label == label)
    }

    pub fn has_series(&self, label: &str) -> bool {
        self.index_of(label).is_some()
    }

    pub fn series_count(&self) -> usize {
        self.inner.entries.read().len()
    }

    /// Row count: the length of the longest member series
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .iter()
            .map(|e| e.series.len())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels in table order
    pub fn labels(&self) -> Vec<String> {
        self.inner.entries.read().iter().map(|e| e.label.clone()).collect()
    }

    /// Snapshot of (label, series) pairs in table order
    pub fn iter(&self) -> std::vec::IntoIter<(String, Series)> {
        self.inner
            .entries
            .read()
            .iter()
            .map(|e| (e.label.clone(), e.series.clone()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Move the series at `from` to position `to`
    pub fn move_series(&self, from: usize, to: usize) -> Result<()> {
        self.check_writable()?;
        let batch = self.begin_changes("move_series");
        {
            let mut entries = self.inner.entries.write();
            let len = entries.len();
            if from >= len {
                return Err(Error::out_of_range(from, len));
            }
            if to >= len {
                return Err(Error::out_of_range(to, len));
            }
            if from == to {
                return Ok(());
            }
            let entry = entries.remove(from);
            entries.insert(to, entry);
        }
        self.inner.notifier.record(ChangeKinds::REORDERED, None);
        batch.finish();
        Ok(())
    }

    /// Reorder series to follow `labels`, which must name every series once.
    pub fn reorder(&self, labels: &[&str]) -> Result<()> {
        self.check_writable()?;
        let batch = self.begin_changes("reorder");
        {
            let mut entries = self.inner.entries.write();
            if labels.len() != entries.len() {
                return Err(Error::ArityMismatch {
                    expected: entries.len(),
                    found: labels.len(),
                });
            }
            let mut order = Vec::with_capacity(labels.len());
            for label in labels {
                let pos = entries
                    .iter()
                    .position(|e| e.label == *label)
                    .ok_or_else(|| Error::UnknownLabel(label.to_string()))?;
                if order.contains(&pos) {
                    return Err(Error::DuplicateLabel(label.to_string()));
                }
                order.push(pos);
            }
            let mut slots: Vec<Option<TableEntry>> = entries.drain(..).map(Some).collect();
            *entries = order.into_iter().filter_map(|pos| slots[pos].take()).collect();
        }
        self.inner.notifier.record(ChangeKinds::REORDERED, None);
        batch.finish();
        Ok(())
    }

    /// Replace every series in one batch (bulk reload).
    pub fn reload(&self, series: Vec<(String, Series)>) -> Result<()> {
        self.check_writable()?;
        let mut seen = HashSet::new();
        for (label, _) in &series {
            if !seen.insert(label.as_str()) {
                return Err(Error::DuplicateLabel(label.clone()));
            }
        }

        let batch = self.begin_changes("reload");
        let had_entries = {
            let new_entries: Vec<TableEntry> = series
                .into_iter()
                .map(|(label, s)| self.entry(label, s))
                .collect();
            let mut entries = self.inner.entries.write();
            let had_entries = !entries.is_empty();
            let has_entries = !new_entries.is_empty();
            *entries = new_entries;
            if has_entries {
                self.inner.notifier.record(ChangeKinds::ADDED, None);
            }
            had_entries
        };
        if had_entries {
            self.inner.notifier.record(ChangeKinds::REMOVED, None);
        }
        batch.finish();
        Ok(())
    }

    /// Append one value to every series, in table order, as a single change.
    ///
    /// All values are validated before anything is written.
    pub fn append_row(&self, values: Vec<Value>) -> Result<()> {
        self.check_writable()?;
        let batch = self.begin_changes("append_row");
        let members: Vec<Series> = self.iter().map(|(_, s)| s).collect();
        if values.len() != members.len() {
            return Err(Error::ArityMismatch {
                expected: members.len(),
                found: values.len(),
            });
        }
        for (series, value) in members.iter().zip(&values) {
            if series.is_read_only() {
                return Err(Error::ReadOnly(series.id()));
            }
            if !value.is_null() && !series.kind().accepts(value) {
                return Err(Error::kind_mismatch(series.kind(), value));
            }
        }
        for (series, value) in members.iter().zip(values) {
            series.append(value)?;
        }
        batch.finish();
        Ok(())
    }

    /// Truncate every series to zero rows as a single change
    pub fn clear_rows(&self) -> Result<()> {
        self.check_writable()?;
        let batch = self.begin_changes("clear_rows");
        for (_, series) in self.iter() {
            series.clear()?;
        }
        batch.finish();
        Ok(())
    }

    /// Row `index` across all series; series shorter than the table read as
    /// their empty value.
    pub fn row(&self, index: usize) -> Result<Vec<Value>> {
        let _section = self.lock();
        let len = self.len();
        if index >= len {
            return Err(Error::out_of_range(index, len));
        }
        Ok(self
            .iter()
            .map(|(_, s)| s.get(index).unwrap_or_else(|_| s.empty_value()))
            .collect())
    }

    pub fn get_value(&self, row: usize, label: &str) -> Result<Value> {
        self.get_series(label)?.get(row)
    }

    /// Swap in the content of a derived table. Returns whether membership or
    /// order changed.
    pub(crate) fn set_entries(
        &self,
        series: Vec<(String, Series)>,
        cause: Option<&ChangeEvent>,
    ) -> bool {
        let batch = self.inner.notifier.begin_changes("recompute");
        let kinds = {
            let mut entries = self.inner.entries.write();
            let unchanged = entries.len() == series.len()
                && entries
                    .iter()
                    .zip(&series)
                    .all(|(e, (label, s))| e.label == *label && e.series.ptr_eq(s));
            if unchanged {
                return false;
            }

            let old: HashSet<String> = entries.iter().map(|e| e.label.clone()).collect();
            let new: HashSet<String> = series.iter().map(|(l, _)| l.clone()).collect();
            let mut kinds = ChangeKinds::VALUES_CHANGED;
            if new.difference(&old).next().is_some() {
                kinds |= ChangeKinds::ADDED;
            }
            if old.difference(&new).next().is_some() {
                kinds |= ChangeKinds::REMOVED;
            }
            if old == new {
                kinds |= ChangeKinds::REORDERED;
            }
            *entries = series
                .into_iter()
                .map(|(label, s)| self.entry(label, s))
                .collect();
            kinds
        };
        self.inner.notifier.record(kinds, cause);
        batch.finish();
        true
    }

    /// Hold the table's critical section for a multi-step read.
    pub fn lock(&self) -> SectionGuard {
        self.inner.notifier.lock()
    }

    /// Open a batch; events are coalesced until it closes.
    ///
    /// The outermost table batch also opens a batch on every member series,
    /// so views over members recompute once, after the whole update, and
    /// before the table's own listeners run.
    pub fn begin_changes(&self, token: &str) -> ChangeBatch {
        let mut batch = self.inner.notifier.begin_changes(token);
        if batch.depth() == 1 {
            for (_, series) in self.iter() {
                batch.hold(series.begin_changes(token));
            }
        }
        batch
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

    pub fn downgrade(&self) -> WeakTable {
        WeakTable {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Observable for Table {
    fn notifier(&self) -> &ChangeNotifier {
        &self.inner.notifier
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("labels", &self.labels())
            .field("rows", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn sample() -> Table {
        let table = Table::new("test");
        table
            .add_series("id", Series::from_values(ValueKind::Int32, [1, 2, 3]).unwrap())
            .unwrap();
        table
            .add_series("score", Series::from_values(ValueKind::Float64, [9.5, 7.0, 8.25]).unwrap())
            .unwrap();
        table
    }

    fn record_events(table: &Table) -> (Subscription, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = table.subscribe(move |e| sink.lock().push(e.clone()));
        (sub, seen)
    }

    #[test]
    fn test_table_basic() {
        let table = sample();
        assert_eq!(table.series_count(), 2);
        assert_eq!(table.len(), 3);
        assert_eq!(table.labels(), vec!["id", "score"]);
        assert!(table.has_series("score"));
        assert!(!table.has_series("name"));
        assert_eq!(table.series_label(0).unwrap(), "id");
        assert_eq!(table.get_value(1, "score").unwrap(), Value::Float64(7.0));
        assert_eq!(table.row(2).unwrap(), vec![Value::Int32(3), Value::Float64(8.25)]);
    }

    #[test]
    fn test_table_label_errors() {
        let table = sample();
        assert_eq!(
            table.add_series("id", Series::new(ValueKind::Int32)),
            Err(Error::DuplicateLabel("id".to_string()))
        );
        assert!(matches!(table.remove_series("nope"), Err(Error::UnknownLabel(_))));
        assert!(matches!(table.get_series("nope"), Err(Error::UnknownLabel(_))));
        assert!(matches!(table.get_series_at(2), Err(Error::IndexOutOfRange { .. })));
        assert!(matches!(table.series_label(9), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_table_structure_events() {
        let table = Table::new("t");
        let (_sub, seen) = record_events(&table);

        table.add_series("a", Series::new(ValueKind::Int32)).unwrap();
        table.add_series("b", Series::new(ValueKind::Int32)).unwrap();
        table.move_series(1, 0).unwrap();
        let removed = table.remove_series("a").unwrap();
        assert_eq!(removed.kind(), ValueKind::Int32);

        let kinds: Vec<ChangeKinds> = seen.lock().iter().map(|e| e.kinds()).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKinds::ADDED,
                ChangeKinds::ADDED,
                ChangeKinds::REORDERED,
                ChangeKinds::REMOVED
            ]
        );
        assert_eq!(table.labels(), vec!["b"]);
    }

    #[test]
    fn test_member_changes_forwarded() {
        let table = sample();
        let (_sub, seen) = record_events(&table);
        let score = table.get_series("score").unwrap();

        score.set(0, Value::Float64(1.0)).unwrap();

        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kinds(), ChangeKinds::VALUES_CHANGED);
        assert_eq!(events[0].source(), table.id());
        assert_eq!(events[0].cause().map(|c| c.source()), Some(score.id()));
    }

    #[test]
    fn test_removed_series_no_longer_forwarded() {
        let table = sample();
        let score = table.remove_series("score").unwrap();
        let (_sub, seen) = record_events(&table);
        score.append(Value::Float64(1.0)).unwrap();
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_append_row_single_event() {
        let table = sample();
        let (_sub, seen) = record_events(&table);

        table.append_row(vec![Value::Int32(4), Value::Float64(6.0)]).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains(ChangeKinds::RESIZED));

        assert!(matches!(
            table.append_row(vec![Value::Int32(5)]),
            Err(Error::ArityMismatch { expected: 2, found: 1 })
        ));
        // Validation happens before any write
        assert!(table
            .append_row(vec![Value::Int32(5), Value::Text("x".to_string())])
            .is_err());
        assert_eq!(table.get_series("id").unwrap().len(), 4);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_table_batch_hides_transient_state() {
        let table = sample();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let weak = table.downgrade();
        let sink = observed.clone();
        let _sub = table.subscribe(move |_| {
            if let Some(t) = weak.upgrade() {
                let lens: Vec<usize> = t.iter().map(|(_, s)| s.len()).collect();
                sink.lock().push(lens);
            }
        });

        let batch = table.begin_changes("bulk");
        table.get_series("id").unwrap().append(Value::Int32(4)).unwrap();
        table.get_series("score").unwrap().append(Value::Float64(1.0)).unwrap();
        batch.finish();

        assert_eq!(*observed.lock(), vec![vec![4, 4]]);
    }

    #[test]
    fn test_member_listener_sees_complete_rows() {
        let table = sample();
        let observed = Arc::new(Mutex::new(Vec::new()));
        let weak = table.downgrade();
        let sink = observed.clone();
        let id = table.get_series("id").unwrap();
        let _sub = id.subscribe(move |_| {
            if let Some(t) = weak.upgrade() {
                let lens: Vec<usize> = t.iter().map(|(_, s)| s.len()).collect();
                sink.lock().push(lens);
            }
        });

        table.append_row(vec![Value::Int32(4), Value::Float64(6.0)]).unwrap();
        assert_eq!(*observed.lock(), vec![vec![4, 4]]);
    }

    #[test]
    fn test_member_event_waits_for_table_reader() {
        let table = sample();
        let (_sub, seen) = record_events(&table);
        let score = table.get_series("score").unwrap();

        let section = table.lock();
        // The writer does not block on the held table
        std::thread::spawn(move || score.append(Value::Float64(1.0)).unwrap())
            .join()
            .unwrap();
        assert!(seen.lock().is_empty());

        drop(section);
        let events = seen.lock();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains(ChangeKinds::RESIZED));
    }

    #[test]
    fn test_member_writer_and_table_reader_do_not_deadlock() {
        let table = Table::new("t");
        table.add_series("a", Series::new(ValueKind::Int32)).unwrap();
        table.add_series("b", Series::new(ValueKind::Int32)).unwrap();
        let events = Arc::new(AtomicUsize::new(0));
        let counter = events.clone();
        let _sub = table.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let (done_tx, done_rx) = mpsc::channel();
        let reader_table = table.clone();
        let reader_done = done_tx.clone();
        thread::spawn(move || {
            for _ in 0..2000 {
                let _section = reader_table.lock();
                for (_, series) in reader_table.iter() {
                    let _values = series.values();
                }
            }
            let _ = reader_done.send(());
        });

        let a = table.get_series("a").unwrap();
        let writer = a.clone();
        thread::spawn(move || {
            for i in 0..2000 {
                writer.append(Value::Int32(i)).unwrap();
                if i % 100 == 0 {
                    let batch = writer.begin_changes("burst");
                    writer.append(Value::Int32(-1)).unwrap();
                    writer.append(Value::Int32(-2)).unwrap();
                    batch.finish();
                }
            }
            let _ = done_tx.send(());
        });

        for _ in 0..2 {
            assert!(done_rx.recv_timeout(Duration::from_secs(20)).is_ok());
        }
        assert_eq!(a.len(), 2040);
        assert!(events.load(Ordering::SeqCst) > 0);

        // Nothing is left pending on the table
        let before = events.load(Ordering::SeqCst);
        a.append(Value::Int32(0)).unwrap();
        assert_eq!(events.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_reload() {
        let table = sample();
        let (_sub, seen) = record_events(&table);

        table
            .reload(vec![
                ("x".to_string(), Series::from_values(ValueKind::Int64, [1i64, 2]).unwrap()),
                ("y".to_string(), Series::from_values(ValueKind::Int64, [3i64, 4]).unwrap()),
            ])
            .unwrap();

        assert_eq!(table.labels(), vec!["x", "y"]);
        assert_eq!(table.len(), 2);
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].kinds(), ChangeKinds::ADDED | ChangeKinds::REMOVED);

        let dup = table.reload(vec![
            ("z".to_string(), Series::new(ValueKind::Int32)),
            ("z".to_string(), Series::new(ValueKind::Int32)),
        ]);
        assert_eq!(dup, Err(Error::DuplicateLabel("z".to_string())));
        assert_eq!(table.labels(), vec!["x", "y"]);
    }

    #[test]
    fn test_reorder() {
        let table = sample();
        table.add_series("name", Series::new(ValueKind::Generic)).unwrap();
        table.reorder(&["name", "score", "id"]).unwrap();
        assert_eq!(table.labels(), vec!["name", "score", "id"]);

        assert!(matches!(table.reorder(&["name"]), Err(Error::ArityMismatch { .. })));
        assert!(matches!(
            table.reorder(&["name", "name", "id"]),
            Err(Error::DuplicateLabel(_))
        ));
        assert!(matches!(
            table.reorder(&["name", "zzz", "id"]),
            Err(Error::UnknownLabel(_))
        ));
        assert_eq!(table.labels(), vec!["name", "score", "id"]);
    }

    #[test]
    fn test_clear_rows() {
        let table = sample();
        let (_sub, seen) = record_events(&table);
        table.clear_rows().unwrap();
        assert!(table.is_empty());
        assert_eq!(table.series_count(), 2);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_ragged_row_reads_empty_value() {
        let table = sample();
        table.get_series("id").unwrap().append(Value::Int32(4)).unwrap();
        let row = table.row(3).unwrap();
        assert_eq!(row[0], Value::Int32(4));
        assert!(row[1].is_empty_value());
        assert!(table.row(4).is_err());
    }

    #[test]
    fn test_read_only_table() {
        let table = Table::derived("view".to_string());
        assert_eq!(
            table.add_series("a", Series::new(ValueKind::Int32)),
            Err(Error::ReadOnly(table.id()))
        );
    }

    #[test]
    fn test_concurrent_reader_sees_whole_batches() {
        let table = Table::new("feed");
        table.add_series("a", Series::new(ValueKind::Int32)).unwrap();
        table.add_series("b", Series::new(ValueKind::Int32)).unwrap();

        let reader_table = table.clone();
        let reader = std::thread::spawn(move || {
            for _ in 0..200 {
                let _section = reader_table.lock();
                let lens: Vec<usize> = reader_table.iter().map(|(_, s)| s.len()).collect();
                assert_eq!(lens[0], lens[1]);
            }
        });

        for i in 0..200 {
            table.append_row(vec![Value::Int32(i), Value::Int32(-i)]).unwrap();
        }
        reader.join().unwrap();
        assert_eq!(table.len(), 200);
    }
}

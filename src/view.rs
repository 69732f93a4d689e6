/// LiveSeries View Implementation
///
/// Views are read-only derived series or tables that stay consistent with
/// their sources. A view subscribes to its sources through a [`Binding`] and
/// recomputes its whole content inside the source's dispatch, so reading a
/// view never touches the source and always reflects the source's last
/// closed batch.
///
/// Views hold their sources weakly. A view whose source is gone keeps its last
/// content. Dropping or disposing a view detaches it.

use crate::changes::{ChangeEvent, ChangeNotifier, Observable, SectionGuard, Subscription};
use crate::error::Result;
use crate::series::{Series, WeakSeries};
use crate::table::{Table, WeakTable};
use crate::value::Value;
use log::debug;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;

/// Subscriptions that keep a view attached to its sources
pub struct Binding {
    subscriptions: Vec<Subscription>,
}

impl Binding {
    /// Subscribe `on_change` to every source.
    pub fn attach<F>(sources: &[&dyn Observable], on_change: F) -> Self
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let on_change = Arc::new(on_change);
        let subscriptions = sources
            .iter()
            .map(|source| {
                let on_change = on_change.clone();
                source.notifier().subscribe(move |event| on_change(event))
            })
            .collect();
        Binding { subscriptions }
    }

    pub fn detach(&mut self) {
        self.subscriptions.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.subscriptions.iter().any(Subscription::is_active)
    }
}

/// Bind a recompute function to series sources.
///
/// The function runs once immediately (cause `None`) and again on every
/// source event. Runs are serialized per view; a run is skipped if any source
/// has been dropped.
pub(crate) fn bind_series<F>(sources: &[&Series], recompute: F) -> Binding
where
    F: Fn(&[Series], Option<&ChangeEvent>) + Send + Sync + 'static,
{
    let weak: Vec<WeakSeries> = sources.iter().map(|s| s.downgrade()).collect();
    let gate = ReentrantMutex::new(());
    let run = move |cause: Option<&ChangeEvent>| {
        let live: Option<Vec<Series>> = weak.iter().map(WeakSeries::upgrade).collect();
        match live {
            Some(live) => {
                let _gate = gate.lock();
                recompute(&live, cause);
            }
            None => debug!("view source dropped, keeping last content"),
        }
    };

    // No source event may slip between the first run and the subscription
    let _sections: Vec<SectionGuard> = sources.iter().map(|s| s.lock()).collect();
    run(None);
    let observed: Vec<&dyn Observable> = sources.iter().map(|s| *s as &dyn Observable).collect();
    Binding::attach(&observed, move |event| run(Some(event)))
}

/// Rows of a source series that satisfy a predicate, in source order.
///
/// # Examples
///
/// ```
/// use liveseries::{Series, Value, ValueKind};
///
/// let series = Series::from_values(ValueKind::Int32, [5, 12, 7, 30]).unwrap();
/// let big = series.filter(|v| v.as_i32().map_or(false, |n| n > 6));
/// assert_eq!(big.len(), 3);
///
/// series.set(0, Value::Int32(100)).unwrap();
/// assert_eq!(big.get(0).unwrap(), Value::Int32(100));
/// assert_eq!(big.source_index(3), Some(3));
/// ```
pub struct FilterView {
    output: Series,
    rows: Arc<Mutex<Vec<usize>>>,
    binding: Binding,
}

impl FilterView {
    pub fn new<F>(source: &Series, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let output = Series::derived(source.kind());
        let rows = Arc::new(Mutex::new(Vec::new()));
        let binding = {
            let output = output.clone();
            let rows = rows.clone();
            bind_series(&[source], move |sources, cause| {
                let mut kept = Vec::new();
                let mut index = Vec::new();
                for (i, value) in sources[0].snapshot().into_iter().enumerate() {
                    if predicate(&value) {
                        index.push(i);
                        kept.push(value);
                    }
                }
                debug!("filter view {} keeps {} rows", output.id(), kept.len());
                *rows.lock() = index;
                output.replace_values(kept, cause);
            })
        };
        FilterView {
            output,
            rows,
            binding,
        }
    }

    /// Read-only output series
    pub fn series(&self) -> &Series {
        &self.output
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Value> {
        self.output.get(index)
    }

    pub fn values(&self) -> Vec<Value> {
        self.output.values()
    }

    /// Source row of view row `index`
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.rows.lock().get(index).copied()
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    /// Detach from the source. The output keeps its last content.
    pub fn dispose(mut self) {
        self.binding.detach();
    }
}

impl Observable for FilterView {
    fn notifier(&self) -> &ChangeNotifier {
        self.output.notifier()
    }
}

/// A subset of a table's series, by label, in the requested order.
///
/// The output table shares the source's series handles. Requested labels that
/// are missing from the source are skipped and picked up if they appear later.
pub struct SelectionView {
    output: Table,
    labels: Vec<String>,
    binding: Binding,
}

impl SelectionView {
    pub fn new(source: &Table, labels: &[&str]) -> Self {
        let output = Table::derived(format!("{}[selection]", source.name()));
        let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();

        let weak = source.downgrade();
        let recompute = {
            let output = output.clone();
            let labels = labels.clone();
            move |cause: Option<&ChangeEvent>| {
                let Some(source) = WeakTable::upgrade(&weak) else {
                    debug!("selection source dropped, keeping last content");
                    return;
                };
                let entries: Vec<(String, Series)> = labels
                    .iter()
                    .filter_map(|label| {
                        source
                            .get_series(label)
                            .ok()
                            .map(|series| (label.clone(), series))
                    })
                    .collect();
                if output.set_entries(entries, cause) {
                    debug!("selection {} membership changed", output.name());
                }
            }
        };

        let binding = {
            let _section = source.lock();
            recompute(None);
            Binding::attach(&[source as &dyn Observable], move |event| recompute(Some(event)))
        };

        SelectionView {
            output,
            labels,
            binding,
        }
    }

    /// Read-only output table
    pub fn table(&self) -> &Table {
        &self.output
    }

    /// Labels requested at construction
    pub fn requested(&self) -> &[String] {
        &self.labels
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    pub fn dispose(mut self) {
        self.binding.detach();
    }
}

impl Observable for SelectionView {
    fn notifier(&self) -> &ChangeNotifier {
        self.output.notifier()
    }
}

impl Series {
    /// Filtered view of this series
    pub fn filter<F>(&self, predicate: F) -> FilterView
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        FilterView::new(self, predicate)
    }
}

impl Table {
    /// View of the named series of this table
    pub fn select(&self, labels: &[&str]) -> SelectionView {
        SelectionView::new(self, labels)
    }
}

/// LiveSeries SortedView
///
/// A SortedView presents the values of a source series in sorted order. The
/// sort is stable: values equal under the comparator keep their relative
/// source order. Any source change triggers a full re-sort of the current
/// source content.
///
/// # Examples
///
/// ```
/// use liveseries::{Series, Value, ValueKind};
///
/// let series = Series::from_values(ValueKind::Int32, [3, 45, 21, 9, 3]).unwrap();
/// let sorted = series.sorted().unwrap();
/// assert_eq!(
///     sorted.values(),
///     [3, 3, 9, 21, 45].map(Value::Int32).to_vec()
/// );
///
/// series.append(Value::Int32(1)).unwrap();
/// assert_eq!(sorted.get(0).unwrap(), Value::Int32(1));
/// assert_eq!(sorted.source_index(0), Some(5));
/// ```

use crate::changes::{ChangeNotifier, Observable};
use crate::error::{Error, Result};
use crate::series::Series;
use crate::value::Value;
use crate::view::{bind_series, Binding};
use log::{debug, warn};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::Arc;

/// Direction of the natural order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

type Comparator = dyn Fn(&Value, &Value) -> Ordering + Send + Sync;

enum SortKey {
    Natural(SortOrder),
    Custom(Arc<Comparator>),
}

impl SortKey {
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            SortKey::Natural(SortOrder::Ascending) => a.total_cmp(b),
            // Empty values stay last in both directions
            SortKey::Natural(SortOrder::Descending) => {
                match (a.is_empty_value(), b.is_empty_value()) {
                    (false, false) => b.total_cmp(a),
                    _ => a.total_cmp(b),
                }
            }
            SortKey::Custom(cmp) => cmp(a, b),
        }
    }
}

/// Fails unless all non-empty values share one ordering class.
fn check_comparable(values: &[Value]) -> Result<()> {
    let mut present = values.iter().filter(|v| !v.is_empty_value());
    let Some(first) = present.next() else {
        return Ok(());
    };
    match present.find(|v| !first.is_comparable_with(v)) {
        Some(other) => Err(Error::TypeMismatch {
            expected: format!("{:?}", first.order_class()),
            found: format!("{:?}", other),
        }),
        None => Ok(()),
    }
}

/// Stable sort of row indices
fn sort_indices(values: &[Value], key: &SortKey) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| key.compare(&values[a], &values[b]));
    order
}

pub struct SortedView {
    output: Series,
    order: Arc<Mutex<Vec<usize>>>,
    binding: Binding,
}

impl SortedView {
    /// Natural ascending order. Fails with `TypeMismatch` if the source holds
    /// values that are not mutually comparable.
    pub fn new(source: &Series) -> Result<Self> {
        Self::natural(source, SortOrder::Ascending)
    }

    /// Natural order in the given direction. Empty values sort last.
    pub fn natural(source: &Series, order: SortOrder) -> Result<Self> {
        {
            let _section = source.lock();
            check_comparable(&source.snapshot())?;
        }
        Ok(Self::build(source, SortKey::Natural(order)))
    }

    /// Order by a caller-supplied comparator
    pub fn with_comparator<F>(source: &Series, comparator: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        Self::build(source, SortKey::Custom(Arc::new(comparator)))
    }

    fn build(source: &Series, key: SortKey) -> Self {
        let output = Series::derived(source.kind());
        let order = Arc::new(Mutex::new(Vec::new()));
        let binding = {
            let output = output.clone();
            let order = order.clone();
            bind_series(&[source], move |sources, cause| {
                let values = sources[0].snapshot();
                if matches!(key, SortKey::Natural(_)) && check_comparable(&values).is_err() {
                    warn!(
                        "sorted view {}: source {} holds incomparable values, ordering by class",
                        output.id(),
                        sources[0].id()
                    );
                }
                let indices = sort_indices(&values, &key);
                let sorted: Vec<Value> = indices.iter().map(|&i| values[i].clone()).collect();
                debug!("sorted view {} re-sorted {} values", output.id(), sorted.len());
                *order.lock() = indices;
                output.replace_values(sorted, cause);
            })
        };
        SortedView {
            output,
            order,
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

    /// Source row shown at sorted position `index`
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.order.lock().get(index).copied()
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    pub fn dispose(mut self) {
        self.binding.detach();
    }
}

impl Observable for SortedView {
    fn notifier(&self) -> &ChangeNotifier {
        self.output.notifier()
    }
}

impl Series {
    /// Natural-order sorted view of this series
    pub fn sorted(&self) -> Result<SortedView> {
        SortedView::new(self)
    }

    /// Sorted view of this series under `comparator`
    pub fn sorted_by<F>(&self, comparator: F) -> SortedView
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        SortedView::with_comparator(self, comparator)
    }
}

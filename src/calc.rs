/// LiveSeries CalcView
///
/// Element-wise computed series: `output[i] = f(input_0[i], input_1[i], ...)`.
/// The output length follows the first input; shorter secondary inputs
/// contribute their empty value. Results are coerced to the output kind, and
/// a result that cannot be coerced is stored as the empty value.
///
/// The numeric coercion views (`as_int`, `as_float`, `as_double`,
/// `to_unit_range`) are CalcViews over a single numeric series.

use crate::changes::{ChangeNotifier, Observable};
use crate::error::{Error, Result};
use crate::series::{extent_of, Series};
use crate::value::{Value, ValueKind};
use crate::view::{bind_series, Binding};
use log::{debug, warn};

pub struct CalcView {
    output: Series,
    arity: usize,
    binding: Binding,
}

impl CalcView {
    /// Computed series over one or more inputs
    ///
    /// # Examples
    ///
    /// ```
    /// use liveseries::{CalcView, Series, Value, ValueKind};
    ///
    /// let qty = Series::from_values(ValueKind::Int32, [2, 3]).unwrap();
    /// let price = Series::from_values(ValueKind::Float64, [1.5, 4.0]).unwrap();
    /// let total = CalcView::new(&[&qty, &price], ValueKind::Float64, |args| {
    ///     let qty = args[0].to_f64().unwrap_or(f64::NAN);
    ///     Value::Float64(qty * args[1].to_f64().unwrap_or(f64::NAN))
    /// })
    /// .unwrap();
    ///
    /// assert_eq!(total.get(1).unwrap(), Value::Float64(12.0));
    /// qty.set(0, Value::Int32(10)).unwrap();
    /// assert_eq!(total.get(0).unwrap(), Value::Float64(15.0));
    /// ```
    pub fn new<F>(inputs: &[&Series], kind: ValueKind, f: F) -> Result<Self>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        if inputs.is_empty() {
            return Err(Error::ArityMismatch {
                expected: 1,
                found: 0,
            });
        }
        Ok(Self::build(inputs, kind, move |columns, empties| {
            elementwise(columns, empties, kind, &f)
        }))
    }

    /// Like [`CalcView::new`], but requires exactly `expected` inputs
    pub fn with_arity<F>(inputs: &[&Series], expected: usize, kind: ValueKind, f: F) -> Result<Self>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        if inputs.len() != expected {
            return Err(Error::ArityMismatch {
                expected,
                found: inputs.len(),
            });
        }
        Self::new(inputs, kind, f)
    }

    /// Single-input computed series
    pub fn map<F>(input: &Series, kind: ValueKind, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self::build(&[input], kind, move |columns, empties| {
            elementwise(columns, empties, kind, &|args: &[Value]| f(&args[0]))
        })
    }

    /// Two-input computed series
    pub fn zip<F>(a: &Series, b: &Series, kind: ValueKind, f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self::build(&[a, b], kind, move |columns, empties| {
            elementwise(columns, empties, kind, &|args: &[Value]| f(&args[0], &args[1]))
        })
    }

    /// Bind a whole-column computation. `inputs` is never empty here.
    fn build<C>(inputs: &[&Series], kind: ValueKind, compute: C) -> Self
    where
        C: Fn(&[Vec<Value>], &[Value]) -> Vec<Value> + Send + Sync + 'static,
    {
        let output = Series::derived(kind);
        let binding = {
            let output = output.clone();
            bind_series(inputs, move |sources, cause| {
                let columns: Vec<Vec<Value>> = sources.iter().map(Series::snapshot).collect();
                let empties: Vec<Value> = sources.iter().map(Series::empty_value).collect();
                let values = compute(&columns, &empties);
                debug!("calc view {} recomputed {} values", output.id(), values.len());
                output.replace_values(values, cause);
            })
        };
        CalcView {
            output,
            arity: inputs.len(),
            binding,
        }
    }

    /// Read-only output series
    pub fn series(&self) -> &Series {
        &self.output
    }

    pub fn kind(&self) -> ValueKind {
        self.output.kind()
    }

    /// Number of inputs
    pub fn arity(&self) -> usize {
        self.arity
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

    pub fn get_double(&self, index: usize) -> Result<f64> {
        self.output.get_double(index)
    }

    pub fn values(&self) -> Vec<Value> {
        self.output.values()
    }

    pub fn is_attached(&self) -> bool {
        self.binding.is_attached()
    }

    pub fn dispose(mut self) {
        self.binding.detach();
    }
}

impl Observable for CalcView {
    fn notifier(&self) -> &ChangeNotifier {
        self.output.notifier()
    }
}

fn elementwise<F>(columns: &[Vec<Value>], empties: &[Value], kind: ValueKind, f: &F) -> Vec<Value>
where
    F: Fn(&[Value]) -> Value + ?Sized,
{
    let len = columns.first().map_or(0, Vec::len);
    let mut args: Vec<Value> = Vec::with_capacity(columns.len());
    let mut out = Vec::with_capacity(len);
    let mut rejected = 0usize;
    for i in 0..len {
        args.clear();
        for (column, empty) in columns.iter().zip(empties) {
            args.push(column.get(i).cloned().unwrap_or_else(|| empty.clone()));
        }
        let value = f(&args);
        out.push(value.coerce(kind).unwrap_or_else(|| {
            rejected += 1;
            kind.empty_value()
        }));
    }
    if rejected > 0 {
        warn!("{} computed values could not be stored as {:?}", rejected, kind);
    }
    out
}

/// `(v - min) / (max - min)` over the current extent; NaN throughout when the
/// extent is degenerate.
fn unit_range(column: &[Value]) -> Vec<Value> {
    let doubles: Vec<f64> = column
        .iter()
        .map(|v| v.to_f64().unwrap_or(f64::NAN))
        .collect();
    let span = extent_of(&doubles).filter(|(lo, hi)| hi > lo);
    doubles
        .into_iter()
        .map(|v| match span {
            Some((lo, hi)) => Value::Float64((v - lo) / (hi - lo)),
            None => Value::Float64(f64::NAN),
        })
        .collect()
}

impl Series {
    fn coerced_view(&self, kind: ValueKind) -> Result<CalcView> {
        self.require_numeric()?;
        Ok(CalcView::map(self, kind, Value::clone))
    }

    /// Int32 view of this numeric series (truncating, saturating)
    pub fn as_int(&self) -> Result<CalcView> {
        self.coerced_view(ValueKind::Int32)
    }

    /// Float32 view of this numeric series
    pub fn as_float(&self) -> Result<CalcView> {
        self.coerced_view(ValueKind::Float32)
    }

    /// Float64 view of this numeric series
    pub fn as_double(&self) -> Result<CalcView> {
        self.coerced_view(ValueKind::Float64)
    }

    /// Values scaled into [0, 1] over the series' current extent
    ///
    /// ```
    /// use liveseries::{Series, Value, ValueKind};
    ///
    /// let series = Series::from_values(ValueKind::Int32, [10, 20, 30]).unwrap();
    /// let unit = series.to_unit_range().unwrap();
    /// assert_eq!(unit.get_double(1).unwrap(), 0.5);
    ///
    /// series.append(Value::Int32(50)).unwrap();
    /// assert_eq!(unit.get_double(1).unwrap(), 0.25);
    /// ```
    pub fn to_unit_range(&self) -> Result<CalcView> {
        self.require_numeric()?;
        Ok(CalcView::build(&[self], ValueKind::Float64, |columns, _| {
            columns.first().map_or_else(Vec::new, |column| unit_range(column))
        }))
    }
}

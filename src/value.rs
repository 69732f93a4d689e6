/// LiveSeries Value Model
///
/// A `Value` is a single tagged scalar. Every series has a `ValueKind` which
/// decides which values it accepts and what its canonical empty value is.
///
/// # Empty values
///
/// Missing data is never represented by shrinking a series. Instead each kind
/// has one placeholder value used for padding and for cells a producer could
/// not parse:
///
/// | kind    | empty value       |
/// |---------|-------------------|
/// | Int32   | `Int32(i32::MIN)` |
/// | Int64   | `Int64(i64::MIN)` |
/// | Float32 | `Float32(NaN)`    |
/// | Float64 | `Float64(NaN)`    |
/// | Generic | `Null`            |

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Series value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int32,
    Int64,
    Float32,
    Float64,
    /// Accepts any value, including text and booleans
    Generic,
}

impl ValueKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueKind::Generic)
    }

    /// Canonical placeholder for missing data of this kind
    pub fn empty_value(&self) -> Value {
        match self {
            ValueKind::Int32 => Value::Int32(i32::MIN),
            ValueKind::Int64 => Value::Int64(i64::MIN),
            ValueKind::Float32 => Value::Float32(f32::NAN),
            ValueKind::Float64 => Value::Float64(f64::NAN),
            ValueKind::Generic => Value::Null,
        }
    }

    /// Returns true if a series of this kind can store `value` as-is.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (ValueKind::Generic, _)
                | (_, Value::Null)
                | (ValueKind::Int32, Value::Int32(_))
                | (ValueKind::Int64, Value::Int64(_))
                | (ValueKind::Float32, Value::Float32(_))
                | (ValueKind::Float64, Value::Float64(_))
        )
    }

    /// Parse a text cell into a value of this kind.
    ///
    /// Returns None when the text is not a valid literal for the kind; callers
    /// ingesting external data substitute [`ValueKind::empty_value`].
    pub fn parse(&self, text: &str) -> Option<Value> {
        let text = text.trim();
        match self {
            ValueKind::Int32 => text.parse().ok().map(Value::Int32),
            ValueKind::Int64 => text.parse().ok().map(Value::Int64),
            ValueKind::Float32 => text.parse().ok().map(Value::Float32),
            ValueKind::Float64 => text.parse().ok().map(Value::Float64),
            ValueKind::Generic => {
                if text.is_empty() {
                    Some(Value::Null)
                } else {
                    Some(Value::Text(text.to_string()))
                }
            }
        }
    }
}

/// Value enum covering every kind a series can hold
///
/// Equality is total: two NaNs of the same width are equal, and `0.0 == -0.0`.
/// This makes `Value` usable as a grouping key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bool(bool),
    Null,
}

/// Ordering classes for natural comparison. Values in different classes are
/// not mutually comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrderClass {
    Numeric,
    Bool,
    Text,
}

impl Value {
    /// The narrowest kind that accepts this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::Float32(_) => ValueKind::Float32,
            Value::Float64(_) => ValueKind::Float64,
            Value::Text(_) | Value::Bool(_) | Value::Null => ValueKind::Generic,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is the empty value of its kind.
    pub fn is_empty_value(&self) -> bool {
        match self {
            Value::Int32(v) => *v == i32::MIN,
            Value::Int64(v) => *v == i64::MIN,
            Value::Float32(v) => v.is_nan(),
            Value::Float64(v) => v.is_nan(),
            Value::Null => true,
            Value::Text(_) | Value::Bool(_) => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_)
        )
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Widen any numeric value to f64. Empty numeric values become NaN.
    /// Returns None for non-numeric values.
    #[inline]
    pub fn to_f64(&self) -> Option<f64> {
        if self.is_empty_value() {
            return if self.is_null() { None } else { Some(f64::NAN) };
        }
        match self {
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert this value to `kind`.
    ///
    /// Empty values (and `Null`) map to the target's empty value. Numeric
    /// conversions truncate toward zero and saturate; the integer sentinel is
    /// never produced from a real number. Non-numeric values only convert to
    /// `Generic`.
    pub fn coerce(&self, kind: ValueKind) -> Option<Value> {
        if kind == ValueKind::Generic {
            return Some(self.clone());
        }
        if self.is_empty_value() {
            return Some(kind.empty_value());
        }
        if self.kind() == kind {
            return Some(self.clone());
        }
        let wide = self.wide()?;
        Some(match kind {
            ValueKind::Int32 => {
                let lo = i32::MIN as i64 + 1;
                let hi = i32::MAX as i64;
                Value::Int32(wide.to_i64(lo, hi) as i32)
            }
            ValueKind::Int64 => Value::Int64(wide.to_i64(i64::MIN + 1, i64::MAX)),
            ValueKind::Float32 => Value::Float32(wide.to_f64() as f32),
            ValueKind::Float64 => Value::Float64(wide.to_f64()),
            ValueKind::Generic => unreachable!("handled above"),
        })
    }

    pub fn order_class(&self) -> Option<OrderClass> {
        match self {
            Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_) => {
                Some(OrderClass::Numeric)
            }
            Value::Bool(_) => Some(OrderClass::Bool),
            Value::Text(_) => Some(OrderClass::Text),
            Value::Null => None,
        }
    }

    /// Returns true if natural ordering between the two values is meaningful.
    /// Empty values compare with everything.
    pub fn is_comparable_with(&self, other: &Value) -> bool {
        if self.is_empty_value() || other.is_empty_value() {
            return true;
        }
        self.order_class() == other.order_class()
    }

    /// Natural total order.
    ///
    /// Empty values sort last. Numbers of different widths compare by value.
    /// Values from different order classes fall back to class rank
    /// (numeric < bool < text) so the order stays total.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        match (self.is_empty_value(), other.is_empty_value()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float32(a), Value::Float32(b)) => a.total_cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (a, b) => match (a.wide(), b.wide()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => a.order_class().cmp(&b.order_class()),
            },
        }
    }

    fn wide(&self) -> Option<Wide> {
        match self {
            Value::Int32(v) => Some(Wide::Int(*v as i64)),
            Value::Int64(v) => Some(Wide::Int(*v)),
            Value::Float32(v) => Some(Wide::Float(*v as f64)),
            Value::Float64(v) => Some(Wide::Float(*v)),
            _ => None,
        }
    }
}

enum Wide {
    Int(i64),
    Float(f64),
}

impl Wide {
    fn to_i64(&self, lo: i64, hi: i64) -> i64 {
        match self {
            Wide::Int(v) => (*v).clamp(lo, hi),
            // `as` saturates at the i64 bounds; clamp then keeps the sentinel free
            Wide::Float(v) => (v.trunc() as i64).clamp(lo, hi),
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Wide::Int(v) => *v as f64,
            Wide::Float(v) => *v,
        }
    }

    /// Exact order, without rounding integers through f64. Floats are never
    /// NaN here: NaN is the empty value.
    fn cmp(&self, other: &Wide) -> Ordering {
        match (self, other) {
            (Wide::Int(a), Wide::Int(b)) => a.cmp(b),
            (Wide::Float(a), Wide::Float(b)) => a.total_cmp(b),
            (Wide::Int(a), Wide::Float(b)) => cmp_int_float(*a, *b),
            (Wide::Float(a), Wide::Int(b)) => cmp_int_float(*b, *a).reverse(),
        }
    }
}

fn cmp_int_float(int: i64, float: f64) -> Ordering {
    // 2^63; every finite float below it in magnitude truncates into i64
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if float >= LIMIT {
        return Ordering::Less;
    }
    if float < -LIMIT {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.total_cmp(&(float - whole)),
        unequal => unequal,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Float64(a), Value::Float64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::Float32(v) => float_key(*v as f64).hash(state),
            Value::Float64(v) => float_key(*v).hash(state),
            Value::Text(v) => v.hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Null => {}
        }
    }
}

/// Hash key consistent with `PartialEq`: all NaNs collapse, and so do the zeros.
fn float_key(v: f64) -> u64 {
    if v.is_nan() {
        u64::MAX
    } else if v == 0.0 {
        0
    } else {
        v.to_bits()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Null => f.write_str("null"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_values() {
        assert_eq!(ValueKind::Int32.empty_value(), Value::Int32(i32::MIN));
        assert!(ValueKind::Float64.empty_value().is_empty_value());
        assert!(ValueKind::Generic.empty_value().is_null());
        assert!(!Value::Int32(0).is_empty_value());
        assert!(!Value::Text(String::new()).is_empty_value());
    }

    #[test]
    fn test_accepts() {
        assert!(ValueKind::Int32.accepts(&Value::Int32(1)));
        assert!(ValueKind::Int32.accepts(&Value::Null));
        assert!(!ValueKind::Int32.accepts(&Value::Int64(1)));
        assert!(!ValueKind::Float64.accepts(&Value::Text("1.0".to_string())));
        assert!(ValueKind::Generic.accepts(&Value::Bool(true)));
    }

    #[test]
    fn test_parse() {
        assert_eq!(ValueKind::Int32.parse(" 42 "), Some(Value::Int32(42)));
        assert_eq!(ValueKind::Int32.parse("4.2"), None);
        assert_eq!(ValueKind::Float64.parse("4.5"), Some(Value::Float64(4.5)));
        assert_eq!(ValueKind::Float64.parse("n/a"), None);
        assert_eq!(ValueKind::Generic.parse(""), Some(Value::Null));
        assert_eq!(ValueKind::Generic.parse("abc"), Some(Value::Text("abc".to_string())));
    }

    #[test]
    fn test_to_f64() {
        assert_eq!(Value::Int32(3).to_f64(), Some(3.0));
        assert_eq!(Value::Float32(1.5).to_f64(), Some(1.5));
        assert!(Value::Int64(i64::MIN).to_f64().unwrap().is_nan());
        assert_eq!(Value::Text("3".to_string()).to_f64(), None);
        assert_eq!(Value::Null.to_f64(), None);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Float64(3.9).coerce(ValueKind::Int32), Some(Value::Int32(3)));
        assert_eq!(Value::Float64(-3.9).coerce(ValueKind::Int32), Some(Value::Int32(-3)));
        assert_eq!(Value::Int32(7).coerce(ValueKind::Float32), Some(Value::Float32(7.0)));
        assert_eq!(
            Value::Int64(i64::MAX).coerce(ValueKind::Int32),
            Some(Value::Int32(i32::MAX))
        );
        // Large negative numbers never collide with the empty sentinel
        assert_eq!(
            Value::Float64(-1e30).coerce(ValueKind::Int32),
            Some(Value::Int32(i32::MIN + 1))
        );
        assert_eq!(
            Value::Float64(f64::NAN).coerce(ValueKind::Int32),
            Some(Value::Int32(i32::MIN))
        );
        assert_eq!(Value::Null.coerce(ValueKind::Float64).map(|v| v.is_empty_value()), Some(true));
        assert_eq!(Value::Text("x".to_string()).coerce(ValueKind::Int64), None);
        assert_eq!(Value::Bool(true).coerce(ValueKind::Generic), Some(Value::Bool(true)));
    }

    #[test]
    fn test_total_cmp() {
        assert_eq!(Value::Int32(1).total_cmp(&Value::Int32(2)), Ordering::Less);
        assert_eq!(Value::Int32(2).total_cmp(&Value::Float64(1.5)), Ordering::Greater);
        // Empty values sort last
        assert_eq!(Value::Float64(f64::NAN).total_cmp(&Value::Float64(1e9)), Ordering::Greater);
        assert_eq!(Value::Int32(i32::MIN).total_cmp(&Value::Int32(-5)), Ordering::Greater);
        assert_eq!(Value::Null.total_cmp(&Value::Null), Ordering::Equal);
        // Mixed widths compare exactly
        let big = 1i64 << 53;
        let rounded = Value::Float64(big as f64);
        assert_eq!(Value::Int64(big + 1).total_cmp(&rounded), Ordering::Greater);
        assert_eq!(rounded.total_cmp(&Value::Int64(big)), Ordering::Equal);
        assert_eq!(Value::Int64(-3).total_cmp(&Value::Float32(-2.5)), Ordering::Less);
        assert_eq!(Value::Int64(-2).total_cmp(&Value::Float64(-2.5)), Ordering::Greater);
        assert_eq!(Value::Int64(i64::MAX).total_cmp(&Value::Float64(1e19)), Ordering::Less);
        let floor = Value::Float64(f64::NEG_INFINITY);
        assert_eq!(Value::Int32(7).total_cmp(&floor), Ordering::Greater);
        // Mixed classes fall back to class rank
        assert_eq!(
            Value::Int32(100).total_cmp(&Value::Text("a".to_string())),
            Ordering::Less
        );
    }

    #[test]
    fn test_comparability() {
        assert!(Value::Int32(1).is_comparable_with(&Value::Float32(1.0)));
        assert!(Value::Null.is_comparable_with(&Value::Text("a".to_string())));
        assert!(!Value::Bool(true).is_comparable_with(&Value::Text("a".to_string())));
    }

    #[test]
    fn test_equality_and_hash() {
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
        assert_eq!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_ne!(Value::Int32(1), Value::Int64(1));

        let mut set = HashSet::new();
        set.insert(Value::Float64(f64::NAN));
        set.insert(Value::Float64(f64::NAN));
        set.insert(Value::Float64(0.0));
        set.insert(Value::Float64(-0.0));
        set.insert(Value::Text("a".to_string()));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int32(5).to_string(), "5");
        assert_eq!(Value::Text("abc".to_string()).to_string(), "abc");
        assert_eq!(Value::Null.to_string(), "null");
    }
}

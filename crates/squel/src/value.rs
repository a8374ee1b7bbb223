//! The wire-level value model: what may actually be pushed into a query's
//! parameter vector, and how a parameter chooses to cast itself.

use serde_json::Value as JsonValue;

/// A single positional parameter value.
///
/// This is the set of shapes the driver understands directly, plus `Json`
/// for values that should cross the wire as `jsonb`/`json` text. Composite
/// Rust values are not accepted implicitly — a caller wanting JSON behavior
/// wraps the value in `Param::Json` (or lets [`Cast::Json`] do it), rather
/// than the engine guessing from an object's shape the way the original
/// "plain object" ownership-chain check did (spec.md §4.2, Design Notes §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Json(JsonValue),
    Numeric(rust_decimal::Decimal),
    Timestamp(chrono::NaiveDateTime),
    TimestampTz(chrono::DateTime<chrono::Utc>),
    Uuid(uuid::Uuid),
    Array(Vec<Param>),
}

impl Param {
    pub fn is_null(&self) -> bool {
        matches!(self, Param::Null)
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Param {
            fn from(v: $ty) -> Self {
                Param::$variant(v)
            }
        }
    };
}

from_impl!(bool, Bool);
from_impl!(i16, I16);
from_impl!(i32, I32);
from_impl!(i64, I64);
from_impl!(f32, F32);
from_impl!(f64, F64);
from_impl!(String, String);
from_impl!(Vec<u8>, Bytes);
from_impl!(JsonValue, Json);
from_impl!(rust_decimal::Decimal, Numeric);
from_impl!(chrono::NaiveDateTime, Timestamp);
from_impl!(uuid::Uuid, Uuid);

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::String(v.to_owned())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Param::Null,
        }
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(v: Vec<T>) -> Self {
        Param::Array(v.into_iter().map(Into::into).collect())
    }
}

/// How a parameter should be cast when compiled, per spec.md §4.2.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cast {
    /// No cast directive given: fall back to the compiler's auto-cast
    /// config (`castArrayParamsToJson`/`castObjectParamsToJson`) if the
    /// value is an array or JSON object; otherwise render bare `$k`.
    #[default]
    Auto,
    /// Render `CAST($k AS "typename")`; value pushed unchanged.
    Typed(String),
    /// JSON-serialize the value and render `CAST($k AS "json")`,
    /// unconditionally, regardless of auto-cast config.
    Json,
    /// Force bare `$k` even if auto-cast config would otherwise apply.
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_none_is_null() {
        let p: Param = Option::<i32>::None.into();
        assert_eq!(p, Param::Null);
    }

    #[test]
    fn option_some_unwraps() {
        let p: Param = Some(5i32).into();
        assert_eq!(p, Param::I32(5));
    }

    #[test]
    fn vec_becomes_array() {
        let p: Param = vec![1i32, 2, 3].into();
        assert_eq!(p, Param::Array(vec![Param::I32(1), Param::I32(2), Param::I32(3)]));
    }
}

//! Row-shaping helpers: the default snake_case→camelCase key transform
//! (spec.md §4.8) and the `Jsonb<T>` wrapper for typed JSON columns.

use std::ops::{Deref, DerefMut};

use bytes::BytesMut;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type as PgTypeInfo, to_sql_checked};

use crate::ident::to_camel_case;
use crate::value::Param;

/// Default `runResultTransform`: every row's keys go from snake_case to
/// camelCase, recursively through nested objects/arrays, since a row's
/// JSON object may itself carry lateral sub-results.
pub fn snake_to_camel(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter().map(|(k, v)| (to_camel_case(&k), snake_to_camel(v))).collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(snake_to_camel).collect())
        }
        other => other,
    }
}

/// Adapts [`Param`] to `tokio_postgres`'s `ToSql`, the wire boundary a
/// `Queryable` implementation over `tokio_postgres::Client` uses to hand
/// compiled values to the driver.
#[derive(Debug)]
pub struct SqlParam<'a>(pub &'a Param);

impl ToSql for SqlParam<'_> {
    fn to_sql(
        &self,
        ty: &PgTypeInfo,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Param::Null => Ok(IsNull::Yes),
            Param::Bool(v) => v.to_sql(ty, out),
            Param::I16(v) => v.to_sql(ty, out),
            Param::I32(v) => v.to_sql(ty, out),
            Param::I64(v) => v.to_sql(ty, out),
            Param::F32(v) => v.to_sql(ty, out),
            Param::F64(v) => v.to_sql(ty, out),
            Param::String(v) => v.to_sql(ty, out),
            Param::Bytes(v) => v.to_sql(ty, out),
            Param::Json(v) => v.to_sql(ty, out),
            Param::Numeric(v) => v.to_sql(ty, out),
            Param::Timestamp(v) => v.to_sql(ty, out),
            Param::TimestampTz(v) => v.to_sql(ty, out),
            Param::Uuid(v) => v.to_sql(ty, out),
            Param::Array(items) => {
                let json = serde_json::Value::Array(
                    items.iter().map(|p| param_to_json_lossy(p)).collect(),
                );
                json.to_sql(ty, out)
            }
        }
    }

    fn accepts(_ty: &PgTypeInfo) -> bool {
        true
    }

    to_sql_checked!();
}

fn param_to_json_lossy(p: &Param) -> serde_json::Value {
    match p {
        Param::Null => serde_json::Value::Null,
        Param::Bool(b) => serde_json::json!(b),
        Param::I16(n) => serde_json::json!(n),
        Param::I32(n) => serde_json::json!(n),
        Param::I64(n) => serde_json::json!(n),
        Param::F32(n) => serde_json::json!(n),
        Param::F64(n) => serde_json::json!(n),
        Param::String(s) => serde_json::json!(s),
        Param::Bytes(b) => serde_json::json!(b),
        Param::Json(v) => v.clone(),
        Param::Numeric(d) => serde_json::json!(d.to_string()),
        Param::Timestamp(t) => serde_json::json!(t.to_string()),
        Param::TimestampTz(t) => serde_json::json!(t.to_rfc3339()),
        Param::Uuid(u) => serde_json::json!(u.to_string()),
        Param::Array(items) => {
            serde_json::Value::Array(items.iter().map(param_to_json_lossy).collect())
        }
    }
}

/// Wraps a typed value stored in a `json`/`jsonb` column so a caller gets
/// the column's declared Rust shape back instead of a bare
/// `serde_json::Value` (spec.md §6's `json`/`jsonb` row). Backed by `serde`
/// rather than reflection, so any `Serialize`/`DeserializeOwned` type works.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jsonb<T>(pub T);

impl<T> Deref for Jsonb<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Jsonb<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Jsonb<T> {
    fn from(value: T) -> Self {
        Jsonb(value)
    }
}

impl<'a, T: serde::de::DeserializeOwned> FromSql<'a> for Jsonb<T> {
    fn from_sql(
        ty: &PgTypeInfo,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        let value: serde_json::Value = <serde_json::Value as FromSql>::from_sql(ty, raw)?;
        Ok(Jsonb(serde_json::from_value(value)?))
    }

    fn accepts(ty: &PgTypeInfo) -> bool {
        matches!(*ty, PgTypeInfo::JSON | PgTypeInfo::JSONB)
    }
}

impl<T: serde::Serialize> ToSql for Jsonb<T> {
    fn to_sql(
        &self,
        ty: &PgTypeInfo,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        let json = serde_json::to_value(&self.0)?;
        json.to_sql(ty, out)
    }

    fn accepts(ty: &PgTypeInfo) -> bool {
        matches!(*ty, PgTypeInfo::JSON | PgTypeInfo::JSONB)
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_to_camel_recurses() {
        let input = serde_json::json!({"user_id": 1, "created_at": "x", "nested_thing": {"a_b": 2}});
        let out = snake_to_camel(input);
        assert_eq!(out["userId"], serde_json::json!(1));
        assert_eq!(out["createdAt"], serde_json::json!("x"));
        assert_eq!(out["nestedThing"]["aB"], serde_json::json!(2));
    }

    #[test]
    fn jsonb_derefs_to_inner() {
        let j = Jsonb(vec![1, 2, 3]);
        assert_eq!(j.len(), 3);
    }
}

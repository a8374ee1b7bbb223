//! The derived shortcut builders (spec.md §4.3–§4.7): `insert`, `upsert`,
//! `update`, `delete`/`deletes`, `truncate`, `select` and its thin callers
//! `selectOne`/`selectExactlyOne`/`count`/`sum`/`avg`/`min`/`max`.
//!
//! Every builder here emits a [`crate::fragment::SqlFragment`]; none of
//! them talk to a connection. That happens in [`crate::exec::run`].

mod insert;
mod select;
mod truncate;
mod update_delete;
mod upsert;

pub use insert::{InsertOptions, InsertRows, insert};
pub use select::{
    Aggregate, DistinctOpt, Lateral, Lock, LockStrength, LockWait, NullsOrder, OrderSpec,
    SelectMode, SelectOptions, SortDirection, aggregate, avg, count, max, min, select,
    select_exactly_one, select_one, sum,
};
pub use truncate::{ForeignKeyOpt, IdentityOpt, truncate};
pub use update_delete::{delete, deletes, update};
pub use upsert::{ConflictTarget, NoNullUpdateColumns, ReportAction, UpsertOptions, upsert};

use std::collections::BTreeMap;

use crate::expr::Expr;
use crate::fragment::SqlFragment;
use crate::ident::quote_ident;

/// `select`'s predicate argument, and `update`/`delete`'s `<where>`
/// (spec.md §4.5, §4.7): a column-value map, an arbitrary fragment, or the
/// `all` sentinel (no filter at all).
pub enum Where {
    Predicate(BTreeMap<String, Expr>),
    Fragment(SqlFragment),
    All,
}

impl Where {
    pub(crate) fn into_expr(self) -> Expr {
        match self {
            Where::Predicate(map) => Expr::Predicate(map),
            Where::Fragment(f) => Expr::fragment(f),
            Where::All => Expr::raw("TRUE"),
        }
    }
}

/// The row-level JSON selector shared by insert/upsert/update/delete's
/// `RETURNING` and select's row projection (spec.md §4.3: `to_jsonb(t.*)`
/// if no columns specified, else `jsonb_build_object($1::text, col1, ...)`,
/// `||`-merged with a sorted `extras` map).
pub(crate) fn row_selector(
    alias: &str,
    columns: Option<&[String]>,
    extras: &BTreeMap<String, Expr>,
) -> Expr {
    let mut parts = Vec::new();
    match columns {
        None => parts.push(Expr::raw(format!("to_jsonb({}.*)", quote_ident(alias)))),
        Some(cols) => {
            parts.push(Expr::raw("jsonb_build_object("));
            for (i, c) in cols.iter().enumerate() {
                if i > 0 {
                    parts.push(Expr::raw(", "));
                }
                parts.push(Expr::param(c.as_str()));
                parts.push(Expr::raw("::text, "));
                parts.push(Expr::ident(format!("{alias}.{c}")));
            }
            parts.push(Expr::raw(")"));
        }
    }
    if !extras.is_empty() {
        parts.push(Expr::raw(" || jsonb_build_object("));
        for (i, (k, v)) in extras.iter().enumerate() {
            if i > 0 {
                parts.push(Expr::raw(", "));
            }
            parts.push(Expr::param(k.as_str()));
            parts.push(Expr::raw(", "));
            parts.push(v.clone());
        }
        parts.push(Expr::raw(")"));
    }
    Expr::Array(parts)
}

/// Union the keys of a set of rows in sorted order, per §4.3's "array"
/// insert case, reused by `upsert` for the same reason.
pub(crate) fn union_keys(rows: &[BTreeMap<String, Expr>]) -> Vec<String> {
    let mut keys: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for row in rows {
        keys.extend(row.keys().cloned());
    }
    keys.into_iter().collect()
}

/// Fill every row with every key in `keys`, defaulting to `Expr::Default`
/// for keys a given row didn't supply.
pub(crate) fn fill_defaults(
    rows: Vec<BTreeMap<String, Expr>>,
    keys: &[String],
) -> Vec<BTreeMap<String, Expr>> {
    rows.into_iter()
        .map(|row| {
            keys.iter()
                .map(|k| (k.clone(), row.get(k).cloned().unwrap_or(Expr::Default)))
                .collect()
        })
        .collect()
}

/// Render a `VALUES (r1), (r2), ...` clause for rows that all carry
/// exactly `keys` (call [`fill_defaults`] first).
pub(crate) fn value_tuples(rows: &[BTreeMap<String, Expr>], keys: &[String]) -> Expr {
    let mut parts = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            parts.push(Expr::raw(", "));
        }
        parts.push(Expr::raw("("));
        for (j, k) in keys.iter().enumerate() {
            if j > 0 {
                parts.push(Expr::raw(", "));
            }
            parts.push(row.get(k).cloned().unwrap_or(Expr::Default));
        }
        parts.push(Expr::raw(")"));
    }
    Expr::Array(parts)
}

//! `insert` (spec.md §4.3).

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{fill_defaults, row_selector, union_keys, value_tuples};
use crate::expr::Expr;
use crate::fragment::{QueryResult, SqlFragment};
use crate::ident::quote_ident;

/// One insertable row, or several.
pub enum InsertRows {
    Single(BTreeMap<String, Expr>),
    Many(Vec<BTreeMap<String, Expr>>),
}

#[derive(Default, Clone)]
pub struct InsertOptions {
    /// Restrict the `RETURNING` JSON object to these columns (as
    /// `jsonb_build_object`) instead of `to_jsonb(t.*)`.
    pub returning_columns: Option<Vec<String>>,
    /// Extra `{name: fragment}` pairs merged into the returned object.
    pub extras: BTreeMap<String, Expr>,
}

/// `insert(table, rows, opts)` (spec.md §4.3).
///
/// - An empty row list compiles to a no-op: `INSERT INTO t SELECT null
///   WHERE false`, yielding `[]` unless `run` is forced.
/// - Several rows union their keys; any row missing a key is filled with
///   `DEFAULT`.
/// - The result transform unwraps `row.result` for a single row, or maps
///   `rows -> row.result[]` for several.
pub fn insert(table: &str, rows: InsertRows, opts: InsertOptions) -> SqlFragment {
    match rows {
        InsertRows::Many(list) if list.is_empty() => insert_noop(table),
        InsertRows::Single(row) => insert_one(table, row, &opts),
        InsertRows::Many(list) => insert_many(table, list, &opts),
    }
}

fn insert_noop(table: &str) -> SqlFragment {
    SqlFragment::literal(format!("INSERT INTO {} SELECT null WHERE false", quote_ident(table)))
        .with_noop_result(serde_json::Value::Array(vec![]))
}

fn insert_one(table: &str, row: BTreeMap<String, Expr>, opts: &InsertOptions) -> SqlFragment {
    let (names, values) = Expr::column_names_and_values(row);
    let selector = row_selector(table, opts.returning_columns.as_deref(), &opts.extras);
    let parts = vec![
        Expr::raw("INSERT INTO "),
        Expr::ident(table),
        Expr::raw(" ("),
        names,
        Expr::raw(") VALUES ("),
        values,
        Expr::raw(") RETURNING "),
        selector,
        Expr::raw(" AS result"),
    ];
    SqlFragment::compose(parts).with_result_transform(unwrap_single_result())
}

fn insert_many(table: &str, rows: Vec<BTreeMap<String, Expr>>, opts: &InsertOptions) -> SqlFragment {
    let keys = union_keys(&rows);
    let filled = fill_defaults(rows, &keys);
    let names = Expr::ColumnNames(crate::expr::NameList::List(keys.clone()));
    let values = value_tuples(&filled, &keys);
    let selector = row_selector(table, opts.returning_columns.as_deref(), &opts.extras);
    let parts = vec![
        Expr::raw("INSERT INTO "),
        Expr::ident(table),
        Expr::raw(" ("),
        names,
        Expr::raw(") VALUES "),
        values,
        Expr::raw(" RETURNING "),
        selector,
        Expr::raw(" AS result"),
    ];
    SqlFragment::compose(parts).with_result_transform(unwrap_result_array())
}

use crate::compile::CompiledQuery;

pub(crate) fn unwrap_single_result() -> crate::fragment::ResultTransform {
    Arc::new(|_query: &CompiledQuery, rows: QueryResult| {
        Ok(rows.into_iter().next().and_then(|mut r| r.remove("result")).unwrap_or(serde_json::Value::Null))
    })
}

pub(crate) fn unwrap_result_array() -> crate::fragment::ResultTransform {
    Arc::new(|_query: &CompiledQuery, rows: QueryResult| {
        Ok(serde_json::Value::Array(
            rows.into_iter().filter_map(|mut r| r.remove("result")).collect(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileCtx, compile};

    fn row(pairs: &[(&str, i64)]) -> BTreeMap<String, Expr> {
        pairs.iter().map(|(k, v)| (k.to_string(), Expr::param(*v))).collect()
    }

    #[test]
    fn single_row_insert() {
        let mut row = BTreeMap::new();
        row.insert("email".to_string(), Expr::param("x@y"));
        row.insert("name".to_string(), Expr::param("X"));
        let f = insert("users", InsertRows::Single(row), InsertOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert_eq!(
            c.text,
            "INSERT INTO \"users\" (\"email\", \"name\") VALUES ($1, $2) RETURNING to_jsonb(\"users\".*) AS result"
        );
        assert_eq!(c.values.len(), 2);
    }

    #[test]
    fn empty_array_is_noop() {
        let f = insert("users", InsertRows::Many(vec![]), InsertOptions::default());
        assert!(f.is_noop());
    }

    #[test]
    fn many_rows_union_keys_and_fill_default() {
        let rows = vec![row(&[("id", 1), ("v", 2)]), {
            let mut m = BTreeMap::new();
            m.insert("id".to_string(), Expr::param(3i64));
            m
        }];
        let f = insert("t", InsertRows::Many(rows), InsertOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.contains("VALUES ($1, $2), ($3, DEFAULT)"));
    }
}

//! `upsert` (spec.md §4.4).

use std::collections::BTreeMap;

use super::insert::{InsertOptions, InsertRows, insert, unwrap_result_array, unwrap_single_result};
use super::{fill_defaults, row_selector, union_keys, value_tuples};
use crate::expr::Expr;
use crate::fragment::SqlFragment;
use crate::ident::quote_ident;

/// The `ON CONFLICT` target: one column, several, or a named constraint.
pub enum ConflictTarget {
    Column(String),
    Columns(Vec<String>),
    Constraint(String),
}

/// Which update columns should fall back to the existing row's value when
/// `EXCLUDED` is `NULL` (spec.md §4.4).
#[derive(Default)]
pub enum NoNullUpdateColumns {
    #[default]
    None,
    All,
    Columns(Vec<String>),
}

impl NoNullUpdateColumns {
    fn applies_to(&self, column: &str) -> bool {
        match self {
            NoNullUpdateColumns::None => false,
            NoNullUpdateColumns::All => true,
            NoNullUpdateColumns::Columns(cols) => cols.iter().any(|c| c == column),
        }
    }
}

/// Whether the `$action` (`INSERT`/`UPDATE`) key is merged into the
/// returned row.
#[derive(Default, PartialEq, Eq)]
pub enum ReportAction {
    #[default]
    Include,
    Suppress,
}

#[derive(Default)]
pub struct UpsertOptions {
    /// Explicit per-column update expressions. Per spec.md §9's
    /// conservative reading of the source's dead-code branch: a supplied
    /// value here overrides the default `EXCLUDED.c` (and any
    /// `noNullUpdateColumns` treatment) for that column entirely.
    pub update_values: BTreeMap<String, Expr>,
    pub update_columns: Option<Vec<String>>,
    pub no_null_update_columns: NoNullUpdateColumns,
    pub report_action: ReportAction,
    pub returning_columns: Option<Vec<String>>,
    pub extras: BTreeMap<String, Expr>,
}

/// `upsert(table, rows, conflict, opts)` (spec.md §4.4). Delegates to
/// `insert` for an empty row list.
pub fn upsert(table: &str, rows: InsertRows, conflict: ConflictTarget, opts: UpsertOptions) -> SqlFragment {
    let rows = match rows {
        InsertRows::Many(list) if list.is_empty() => {
            return insert(
                table,
                InsertRows::Many(vec![]),
                InsertOptions { returning_columns: opts.returning_columns, extras: opts.extras },
            );
        }
        InsertRows::Single(row) => vec![row],
        InsertRows::Many(list) => list,
    };

    let inserted_keys = union_keys(&rows);
    let filled = fill_defaults(rows, &inserted_keys);
    let names = Expr::ColumnNames(crate::expr::NameList::List(inserted_keys.clone()));
    let values = value_tuples(&filled, &inserted_keys);

    let conflict_sql = match &conflict {
        ConflictTarget::Column(c) => format!("({})", quote_ident(c)),
        ConflictTarget::Columns(cs) => {
            format!("({})", cs.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "))
        }
        ConflictTarget::Constraint(name) => format!("ON CONSTRAINT {}", quote_ident(name)),
    };

    // Union(specifiedUpdateColumns, keys(updateValues)), deduplicated,
    // preserving first-seen order; default to the full inserted column set.
    let mut update_cols: Vec<String> = Vec::new();
    if let Some(cols) = &opts.update_columns {
        for c in cols {
            if !update_cols.contains(c) {
                update_cols.push(c.clone());
            }
        }
    }
    for c in opts.update_values.keys() {
        if !update_cols.contains(c) {
            update_cols.push(c.clone());
        }
    }
    // An explicit empty `update_columns` (distinct from "not given at all")
    // asks for `DO NOTHING`; otherwise an empty union falls back to the
    // full inserted column set.
    let explicit_do_nothing =
        matches!(&opts.update_columns, Some(cols) if cols.is_empty()) && opts.update_values.is_empty();
    if update_cols.is_empty() && !explicit_do_nothing {
        update_cols = inserted_keys.clone();
    }

    let selector = {
        let mut selector_parts = vec![row_selector(table, opts.returning_columns.as_deref(), &opts.extras)];
        if opts.report_action != ReportAction::Suppress {
            selector_parts.push(Expr::raw(
                " || jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)",
            ));
        }
        Expr::Array(selector_parts)
    };

    let mut parts = vec![
        Expr::raw("INSERT INTO "),
        Expr::ident(table),
        Expr::raw(" ("),
        names,
        Expr::raw(") VALUES "),
        values,
        Expr::raw(" ON CONFLICT "),
        Expr::raw(conflict_sql),
    ];

    if update_cols.is_empty() {
        parts.push(Expr::raw(" DO NOTHING"));
    } else {
        let update_values_map: BTreeMap<String, Expr> = update_cols
            .iter()
            .map(|c| (c.clone(), update_value_expr(table, c, &opts)))
            .collect();
        let (update_names, update_values) = Expr::column_names_and_values(update_values_map);
        parts.push(Expr::raw(" DO UPDATE SET ("));
        parts.push(update_names);
        parts.push(Expr::raw(") = ROW("));
        parts.push(update_values);
        parts.push(Expr::raw(")"));
    }

    parts.push(Expr::raw(" RETURNING "));
    parts.push(selector);
    parts.push(Expr::raw(" AS result"));

    let fragment = SqlFragment::compose(parts);
    if filled.len() == 1 {
        fragment.with_result_transform(unwrap_single_result())
    } else {
        fragment.with_result_transform(unwrap_result_array())
    }
}

fn update_value_expr(table: &str, column: &str, opts: &UpsertOptions) -> Expr {
    if let Some(supplied) = opts.update_values.get(column) {
        return supplied.clone();
    }
    if opts.no_null_update_columns.applies_to(column) {
        Expr::raw(format!(
            "CASE WHEN EXCLUDED.{ident} IS NULL THEN {table}.{ident} ELSE EXCLUDED.{ident} END",
            ident = quote_ident(column),
            table = quote_ident(table)
        ))
    } else {
        Expr::raw(format!("EXCLUDED.{}", quote_ident(column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileCtx, compile};

    #[test]
    fn no_null_update_columns_renders_case() {
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), Expr::param(1i64));
        row.insert("v".to_string(), Expr::param("a"));

        let f = upsert(
            "t",
            InsertRows::Single(row),
            ConflictTarget::Column("id".to_string()),
            UpsertOptions {
                no_null_update_columns: NoNullUpdateColumns::Columns(vec!["v".to_string()]),
                ..Default::default()
            },
        );
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.contains("CASE WHEN EXCLUDED.\"v\" IS NULL THEN \"t\".\"v\" ELSE EXCLUDED.\"v\" END"));
        assert!(c.text.contains("jsonb_build_object('$action', CASE xmax WHEN 0 THEN 'INSERT' ELSE 'UPDATE' END)"));
    }

    #[test]
    fn suppressed_action_omits_dollar_action() {
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), Expr::param(1i64));
        let f = upsert(
            "t",
            InsertRows::Single(row),
            ConflictTarget::Column("id".to_string()),
            UpsertOptions { report_action: ReportAction::Suppress, ..Default::default() },
        );
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(!c.text.contains("$action"));
    }
}

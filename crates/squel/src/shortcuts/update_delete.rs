//! `update` and `delete`/`deletes` (spec.md §4.5).

use std::collections::BTreeMap;

use super::{Where, row_selector};
use crate::expr::Expr;
use crate::fragment::SqlFragment;
use crate::shortcuts::insert::unwrap_single_result;

#[derive(Default)]
pub struct UpdateOptions {
    pub returning_columns: Option<Vec<String>>,
    pub extras: BTreeMap<String, Expr>,
}

/// `UPDATE t SET (cols) = ROW(vals) WHERE <where> RETURNING ...`. The
/// `ROW(...)` form is required so a single-column update still parses
/// (spec.md §4.5).
pub fn update(table: &str, values: BTreeMap<String, Expr>, where_: Where, opts: UpdateOptions) -> SqlFragment {
    let (names, col_values) = Expr::column_names_and_values(values);
    let selector = row_selector(table, opts.returning_columns.as_deref(), &opts.extras);
    let parts = vec![
        Expr::raw("UPDATE "),
        Expr::ident(table),
        Expr::raw(" SET ("),
        names,
        Expr::raw(") = ROW("),
        col_values,
        Expr::raw(") WHERE "),
        where_.into_expr(),
        Expr::raw(" RETURNING "),
        selector,
        Expr::raw(" AS result"),
    ];
    SqlFragment::compose(parts).with_result_transform(unwrap_single_result())
}

#[derive(Default)]
pub struct DeleteOptions {
    pub returning_columns: Option<Vec<String>>,
    pub extras: BTreeMap<String, Expr>,
}

/// `DELETE FROM t WHERE <where> RETURNING ...`, unwrapping to a single
/// result row.
pub fn delete(table: &str, where_: Where, opts: DeleteOptions) -> SqlFragment {
    let selector = row_selector(table, opts.returning_columns.as_deref(), &opts.extras);
    let parts = vec![
        Expr::raw("DELETE FROM "),
        Expr::ident(table),
        Expr::raw(" WHERE "),
        where_.into_expr(),
        Expr::raw(" RETURNING "),
        selector,
        Expr::raw(" AS result"),
    ];
    SqlFragment::compose(parts).with_result_transform(unwrap_single_result())
}

/// `deletes`: the plural alias spec.md §2 lists alongside `insert`'s
/// single/array duality — `delete` already accepts any predicate matching
/// zero, one, or many rows, so this is the same builder under the name
/// the source exposes for bulk deletes.
pub fn deletes(table: &str, where_: Where, opts: DeleteOptions) -> SqlFragment {
    delete(table, where_, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileCtx, compile};

    #[test]
    fn update_uses_row_form() {
        let mut values = BTreeMap::new();
        values.insert("status".to_string(), Expr::param("inactive"));
        let mut pred = BTreeMap::new();
        pred.insert("id".to_string(), Expr::param(42i64));
        let f = update("users", values, Where::Predicate(pred), UpdateOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.starts_with("UPDATE \"users\" SET (\"status\") = ROW($1) WHERE (\"id\" = $2)"));
    }

    #[test]
    fn delete_with_predicate() {
        let mut pred = BTreeMap::new();
        pred.insert("id".to_string(), Expr::param(42i64));
        let f = delete("users", Where::Predicate(pred), DeleteOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.starts_with("DELETE FROM \"users\" WHERE (\"id\" = $1)"));
    }
}

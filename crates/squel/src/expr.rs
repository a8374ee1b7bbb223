//! The interpolation expression: a closed tagged union of everything that
//! may appear between a fragment's literal segments (spec.md §3).
//!
//! This supersedes the dynamic, structurally-tested interpolation value of
//! the source system with an explicit Rust enum, per Design Notes §9
//! ("From dynamic interpolation to a closed variant").

use std::collections::BTreeMap;

use crate::fragment::SqlFragment;
use crate::value::{Cast, Param};

/// Column names/values derived from an object literal keep their shared
/// sorted-key order by construction: a `NameList::Keys` wraps the very map
/// a sibling `Expr::ColumnValues` was built from, so both sides walk the
/// same `BTreeMap` iterator (spec.md §3 invariant: "both iterate keys in
/// the same sorted order").
#[derive(Debug, Clone)]
pub enum NameList {
    /// Names are the sorted keys of a column-value object.
    Keys(BTreeMap<String, Expr>),
    /// Names given directly, in caller order (array form).
    List(Vec<String>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// A nested fragment, compiled recursively.
    Fragment(Box<SqlFragment>),
    /// A table/column identifier, quoted per [`crate::ident::quote_ident`].
    Ident(String),
    /// Literal SQL text, spliced verbatim. Unsafe: the caller vouches that
    /// it contains no untrusted data.
    Raw(String),
    /// A sequence of expressions, concatenated with no separator.
    Array(Vec<Expr>),
    /// A typed parameter: renders `$k`, or `CAST($k AS "type")` depending
    /// on `cast`.
    Param { value: Param, cast: Cast },
    /// The `DEFAULT` sentinel.
    Default,
    /// The `self` sentinel: renders as the current column identifier.
    /// Errors ([`crate::error::Error::SelfWithoutColumn`]) outside a
    /// column-bound context.
    SelfColumn,
    /// A parent-table column reference, valid only inside a lateral
    /// sub-query. `column = None` means "the ambient current column".
    /// Errors ([`crate::error::Error::ParentWithoutTable`]) with no
    /// parent-table alias in scope.
    Parent { column: Option<String> },
    /// Quoted, comma-separated identifier list.
    ColumnNames(NameList),
    /// Comma-separated values of a column-value object, in sorted key
    /// order; each value compiled as a fragment or wrapped into a
    /// parameter.
    ColumnValues(BTreeMap<String, Expr>),
    /// `(col1 = v1 AND col2 = v2 ...)` in sorted-key order. An empty map
    /// renders `TRUE`.
    Predicate(BTreeMap<String, Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn raw(text: impl Into<String>) -> Self {
        Expr::Raw(text.into())
    }

    pub fn fragment(frag: SqlFragment) -> Self {
        Expr::Fragment(Box::new(frag))
    }

    pub fn param(value: impl Into<Param>) -> Self {
        Expr::Param { value: value.into(), cast: Cast::Auto }
    }

    pub fn param_cast(value: impl Into<Param>, cast: Cast) -> Self {
        Expr::Param { value: value.into(), cast }
    }

    pub fn default_value() -> Self {
        Expr::Default
    }

    pub fn self_column() -> Self {
        Expr::SelfColumn
    }

    /// Reference the ambient current column on the outer table.
    pub fn parent_self() -> Self {
        Expr::Parent { column: None }
    }

    /// Reference an explicit column on the outer table.
    pub fn parent(column: impl Into<String>) -> Self {
        Expr::Parent { column: Some(column.into()) }
    }

    pub fn predicate(map: BTreeMap<String, Expr>) -> Self {
        Expr::Predicate(map)
    }

    /// Build a `ColumnNames`/`ColumnValues` pair from the same object so
    /// their key orders are guaranteed identical, per spec.md §3.
    pub fn column_names_and_values(map: BTreeMap<String, Expr>) -> (Expr, Expr) {
        (Expr::ColumnNames(NameList::Keys(map.clone())), Expr::ColumnValues(map))
    }
}

impl From<&str> for Expr {
    fn from(v: &str) -> Self {
        Expr::param(v)
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::param(v)
    }
}

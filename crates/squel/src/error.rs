//! The error taxonomy (spec.md §7). One `thiserror`-derived enum; every
//! public fallible function in this crate returns `Result<_, Error>`.

use thiserror::Error;

use crate::compile::CompiledQuery;

#[derive(Debug, Error)]
pub enum Error {
    /// An interpolated value was none of the permitted `Expr` shapes. In a
    /// closed Rust enum this mostly can't happen by construction, but it
    /// stays as a defensive case for paths that build an `Expr` from
    /// caller-controlled data (e.g. a dynamic column-value map) and find
    /// it shaped wrong at compile time.
    #[error("alien expression encountered during compilation: {0}")]
    AlienExpression(String),

    /// `Expr::SelfColumn` compiled outside a column-bound context.
    #[error("`self` used outside a column-bound context")]
    SelfWithoutColumn,

    /// `Expr::Parent` compiled outside a lateral sub-query.
    #[error("parent-column reference used outside a lateral sub-query")]
    ParentWithoutTable,

    /// An order spec gave a direction outside `ASC`/`DESC`.
    #[error("bad order direction: {0:?}")]
    BadOrderDirection(String),

    /// An order spec gave a nulls-placement outside `FIRST`/`LAST`.
    #[error("bad order nulls placement: {0:?}")]
    BadOrderNulls(String),

    /// `selectExactlyOne` found zero rows. Carries the compiled query so
    /// the caller can log or re-throw with context.
    #[error("expected exactly one row, got none for query: {}", query.text)]
    NotExactlyOne { query: CompiledQuery },

    /// Anything the queryable's `query` call raised, propagated unchanged.
    #[error("postgres error: {0}")]
    Driver(#[from] tokio_postgres::Error),
}

#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]
#![allow(clippy::should_implement_trait)]

//! Typed SQL fragment composer and result-shaping engine for Postgres.
//!
//! A [`fragment::SqlFragment`] interleaves literal SQL text with typed
//! [`expr::Expr`] interpolations and compiles to parameterized SQL plus a
//! positional value vector. The [`shortcuts`] module builds fragments for
//! the common shapes — insert, upsert, update, delete, truncate, select —
//! so most callers never touch `Expr` directly. [`exec::run`] sends a
//! compiled fragment to a [`pool::ConnectionProvider`]/[`exec::Queryable`]
//! and applies the fragment's result transform, with [`exec::Listeners`]
//! hooks around each call.
//!
//! # Naming Convention
//!
//! Identifiers are quoted and, where mixed-case, snake-cased on the way in
//! ([`ident::quote_ident`]); result row keys are camelCased on the way out
//! ([`row::snake_to_camel`]), the default `runResultTransform` every
//! builder here relies on unless it supplies its own.
//!
//! # Example
//!
//! ```ignore
//! use squel::shortcuts::{insert, InsertOptions, InsertRows};
//! use squel::expr::Expr;
//! use std::collections::BTreeMap;
//!
//! let mut row = BTreeMap::new();
//! row.insert("email".to_string(), Expr::param("a@b.com"));
//! let fragment = insert("user", InsertRows::Single(row), InsertOptions::default());
//! ```

pub mod compile;
pub mod error;
pub mod exec;
pub mod expr;
pub mod fragment;
pub mod ident;
pub mod pool;
pub mod row;
pub mod schema;
pub mod shortcuts;
pub mod value;

pub use compile::{CompileCtx, CompiledQuery, compile};
pub use error::Error;
pub use exec::{Listeners, Queryable, RunContext, TracingListeners, run};
pub use expr::{Expr, NameList};
pub use fragment::{QueryResult, ResultTransform, Row, RunResult, SqlFragment};
pub use ident::quote_ident;
pub use pool::ConnectionProvider;
pub use row::Jsonb;
pub use schema::{Column, EnumDescriptor, Insertable, PgType, Selectable, Table, Updatable, UniqueIndex, Whereable};
pub use value::{Cast, Param};

/// Result type for fallible `squel` operations.
pub type Result<T> = std::result::Result<T, Error>;

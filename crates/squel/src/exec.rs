//! Execution and telemetry (spec.md §4.8, §5): the `Queryable` contract, the
//! `run()` entry point, and the pluggable `Listeners`/`RunContext` that
//! replace the source's ambient global configuration (Design Notes §9).

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_postgres::Client;
use tokio_postgres::types::Type as PgTypeInfo;

use crate::compile::{CompileCtx, CompiledQuery, compile};
use crate::error::Error;
use crate::fragment::{QueryResult, Row, RunResult, SqlFragment};
use crate::row::{SqlParam, snake_to_camel};

/// Anything exposing `query({text, values, name?}) -> {rows}` (spec.md §6).
/// An optional transaction-id decoration is read from a conventional slot.
pub trait Queryable: Send + Sync {
    fn query(
        &self,
        query: &CompiledQuery,
    ) -> impl Future<Output = Result<QueryResult, Error>> + Send;

    fn transaction_id(&self) -> Option<String> {
        None
    }
}

impl Queryable for Client {
    async fn query(&self, query: &CompiledQuery) -> Result<QueryResult, Error> {
        let params: Vec<SqlParam<'_>> = query.values.iter().map(SqlParam).collect();
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync)).collect();
        let rows = Client::query(self, &query.text, &param_refs).await?;
        Ok(rows.iter().map(pg_row_to_json_row).collect())
    }
}

impl Queryable for Arc<Client> {
    async fn query(&self, query: &CompiledQuery) -> Result<QueryResult, Error> {
        <Client as Queryable>::query(self.as_ref(), query).await
    }
}

fn pg_row_to_json_row(row: &tokio_postgres::Row) -> Row {
    let mut out = Row::new();
    for (i, col) in row.columns().iter().enumerate() {
        out.insert(col.name().to_string(), pg_cell_to_json(row, i, col.type_()));
    }
    out
}

/// Result columns are almost always a single `jsonb` `result` column, since
/// every shortcut builder's `RETURNING`/outer `SELECT` wraps its output in
/// `to_jsonb`/`jsonb_build_object`/`jsonb_agg`. Numeric mode (§4.7) is the
/// exception: the aggregate comes back as a driver-native scalar (`int8` as
/// text, in particular — "accept numeric precision loss for counts").
fn pg_cell_to_json(row: &tokio_postgres::Row, idx: usize, ty: &PgTypeInfo) -> serde_json::Value {
    match *ty {
        PgTypeInfo::JSON | PgTypeInfo::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .unwrap_or(serde_json::Value::Null),
        PgTypeInfo::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        PgTypeInfo::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        PgTypeInfo::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        PgTypeInfo::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
        PgTypeInfo::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, |f| serde_json::json!(f)),
        PgTypeInfo::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, |f| serde_json::json!(f)),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map_or(serde_json::Value::Null, serde_json::Value::from),
    }
}

/// Telemetry hooks fired around a query, replacing the source's
/// process-wide `queryListener`/`resultListener` pair (spec.md §4.8, §6).
pub trait Listeners: Send + Sync {
    fn on_query(&self, _query: &CompiledQuery, _transaction_id: Option<&str>) {}
    fn on_result(&self, _query: &CompiledQuery, _elapsed: Duration, _result: &Result<RunResult, Error>) {}
}

/// The default `Listeners`, built on `tracing` spans/events the way
/// `dibs`/`dibs-sql` log elsewhere in this lineage.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListeners;

impl Listeners for TracingListeners {
    fn on_query(&self, query: &CompiledQuery, transaction_id: Option<&str>) {
        tracing::debug!(
            sql = %query.text,
            params = query.values.len(),
            transaction_id = ?transaction_id,
            "executing query"
        );
    }

    fn on_result(&self, query: &CompiledQuery, elapsed: Duration, result: &Result<RunResult, Error>) {
        match result {
            Ok(_) => tracing::debug!(sql = %query.text, elapsed_ms = elapsed.as_millis() as u64, "query completed"),
            Err(err) => {
                tracing::warn!(sql = %query.text, elapsed_ms = elapsed.as_millis() as u64, error = %err, "query failed")
            }
        }
    }
}

/// Explicit execution context, carried by the caller into each `run()`
/// rather than read from a mutable global singleton (Design Notes §9).
#[derive(Clone)]
pub struct RunContext {
    pub listeners: Arc<dyn Listeners>,
    pub compile: CompileCtx,
}

impl Default for RunContext {
    fn default() -> Self {
        Self { listeners: Arc::new(TracingListeners), compile: CompileCtx::default() }
    }
}

impl RunContext {
    /// Load a `.env` file if present, then build a [`RunContext`] with
    /// `compile`'s auto-cast flags overridden from `SQUEL_CAST_ARRAY_PARAMS_TO_JSON`/
    /// `SQUEL_CAST_OBJECT_PARAMS_TO_JSON` if set. Mirrors the
    /// `let _ = dotenvy::dotenv();` + `std::env::var(...)` pattern other
    /// binaries in this lineage use at startup.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut ctx = Self::default();
        if let Some(v) = env_bool("SQUEL_CAST_ARRAY_PARAMS_TO_JSON") {
            ctx.compile.cast_array_params_to_json = v;
        }
        if let Some(v) = env_bool("SQUEL_CAST_OBJECT_PARAMS_TO_JSON") {
            ctx.compile.cast_object_params_to_json = v;
        }
        ctx
    }
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| match v.trim() {
        "1" | "true" | "TRUE" | "yes" => Some(true),
        "0" | "false" | "FALSE" | "no" => Some(false),
        _ => None,
    })
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext").field("compile", &self.compile).finish_non_exhaustive()
    }
}

/// Compile `fragment`, send it to `queryable`, and apply its result
/// transform (spec.md §4.8). Honours the no-op fast path unless `force`.
pub async fn run<Q: Queryable>(
    fragment: &SqlFragment,
    queryable: &Q,
    ctx: &RunContext,
    force: bool,
) -> Result<RunResult, Error> {
    let fragment = if fragment.prepared_name.is_some() {
        fragment.clone()
    } else {
        fragment.clone().with_prepared_name(crate::compile::next_prepared_name())
    };

    let compiled = compile(&fragment, &ctx.compile)?;
    let transaction_id = queryable.transaction_id();
    ctx.listeners.on_query(&compiled, transaction_id.as_deref());

    if fragment.is_noop() && !force {
        let result = Ok(fragment.noop_result.clone().unwrap_or(serde_json::Value::Null));
        ctx.listeners.on_result(&compiled, Duration::ZERO, &result);
        return result;
    }

    let started = Instant::now();
    let result = match queryable.query(&compiled).await {
        Ok(rows) => transform(&fragment, &compiled, rows),
        Err(err) => Err(err),
    };
    let elapsed = started.elapsed();
    ctx.listeners.on_result(&compiled, elapsed, &result);
    result
}

fn transform(fragment: &SqlFragment, compiled: &CompiledQuery, rows: QueryResult) -> Result<RunResult, Error> {
    match &fragment.result_transform {
        Some(custom) => custom(compiled, rows),
        None => Ok(default_transform(rows)),
    }
}

/// The default transform: snake_case→camelCase every row's keys, return
/// the plain array of row objects.
fn default_transform(rows: QueryResult) -> RunResult {
    let rows: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|row| snake_to_camel(serde_json::Value::Object(row.into_iter().collect())))
        .collect();
    serde_json::Value::Array(rows)
}

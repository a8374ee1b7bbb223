//! `select` and the lateral model (spec.md §4.7), plus the thin callers
//! `selectOne`/`selectExactlyOne`/`count`/`sum`/`avg`/`min`/`max`.

use std::collections::BTreeMap;

use super::{Where, row_selector};
use crate::compile::CompiledQuery;
use crate::error::Error;
use crate::expr::Expr;
use crate::fragment::{QueryResult, ResultTransform, SqlFragment};
use crate::ident::quote_ident;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Clone)]
pub struct OrderSpec {
    pub by: String,
    pub direction: SortDirection,
    pub nulls: Option<NullsOrder>,
}

impl OrderSpec {
    pub fn new(by: impl Into<String>, direction: SortDirection) -> Self {
        Self { by: by.into(), direction, nulls: None }
    }

    pub fn with_nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Build from free-form strings, validating direction/nulls the way a
    /// caller assembling an order spec from user input (e.g. a query
    /// string) would need to (spec.md §7's `BadOrderDirection`/
    /// `BadOrderNulls`). A Rust caller building one with [`OrderSpec::new`]
    /// can't hit these by construction; this is the escape hatch that can.
    pub fn try_from_strs(by: impl Into<String>, direction: &str, nulls: Option<&str>) -> Result<Self, Error> {
        let direction = match direction {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            other => return Err(Error::BadOrderDirection(other.to_string())),
        };
        let nulls = match nulls {
            None => None,
            Some("FIRST") => Some(NullsOrder::First),
            Some("LAST") => Some(NullsOrder::Last),
            Some(other) => return Err(Error::BadOrderNulls(other.to_string())),
        };
        Ok(Self { by: by.into(), direction, nulls })
    }

    fn to_sql(&self) -> String {
        let mut s = format!(
            "{} {}",
            quote_ident(&self.by),
            match self.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            }
        );
        if let Some(nulls) = self.nulls {
            s.push_str(match nulls {
                NullsOrder::First => " NULLS FIRST",
                NullsOrder::Last => " NULLS LAST",
            });
        }
        s
    }
}

pub enum DistinctOpt {
    On,
    Expr(Expr),
    Columns(Vec<String>),
}

#[derive(Clone, Copy)]
pub enum LockStrength {
    Update,
    Share,
    NoKeyUpdate,
    KeyShare,
}

#[derive(Clone, Copy)]
pub enum LockWait {
    Nowait,
    SkipLocked,
}

pub struct Lock {
    pub strength: LockStrength,
    pub of: Option<Vec<String>>,
    pub wait: Option<LockWait>,
}

impl Lock {
    fn to_sql(&self) -> String {
        let mut s = String::from("FOR ");
        s.push_str(match self.strength {
            LockStrength::Update => "UPDATE",
            LockStrength::Share => "SHARE",
            LockStrength::NoKeyUpdate => "NO KEY UPDATE",
            LockStrength::KeyShare => "KEY SHARE",
        });
        if let Some(of) = &self.of {
            s.push_str(" OF ");
            s.push_str(&of.iter().map(|t| quote_ident(t)).collect::<Vec<_>>().join(", "));
        }
        if let Some(wait) = self.wait {
            s.push(' ');
            s.push_str(match wait {
                LockWait::Nowait => "NOWAIT",
                LockWait::SkipLocked => "SKIP LOCKED",
            });
        }
        s
    }
}

/// A sub-query spliced via `LEFT JOIN LATERAL`, either one per named slot
/// (merged into the row as separate keys) or a single one that replaces
/// the row entirely ("passthru", spec.md §4.7).
pub enum Lateral {
    Map(BTreeMap<String, SqlFragment>),
    Single(Box<SqlFragment>),
}

#[derive(Default)]
pub struct SelectOptions {
    pub distinct: Option<DistinctOpt>,
    pub columns: Option<Vec<String>>,
    pub extras: BTreeMap<String, Expr>,
    pub order: Vec<OrderSpec>,
    pub group_by: Vec<String>,
    pub having: Option<Expr>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub with_ties: bool,
    pub alias: Option<String>,
    pub lock: Vec<Lock>,
    pub lateral: Option<Lateral>,
}

pub enum Aggregate {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

impl Aggregate {
    fn to_sql(&self) -> String {
        match self {
            Aggregate::Count => "count(*)".to_string(),
            Aggregate::Sum(c) => format!("sum({})", quote_ident(c)),
            Aggregate::Avg(c) => format!("avg({})", quote_ident(c)),
            Aggregate::Min(c) => format!("min({})", quote_ident(c)),
            Aggregate::Max(c) => format!("max({})", quote_ident(c)),
        }
    }
}

pub enum SelectMode {
    Many,
    One,
    ExactlyOne,
    Numeric(Aggregate),
}

/// `select(table, where, opts, mode)` (spec.md §4.7). The heart of the
/// engine: builds the inner tuple-producing query, wraps it per `mode`,
/// and splices any lateral sub-queries with the outer alias threaded in as
/// their parent table.
pub fn select(table: &str, where_: Where, opts: SelectOptions, mode: SelectMode) -> SqlFragment {
    let alias = opts.alias.clone().unwrap_or_else(|| table.to_string());
    let where_expr = where_.into_expr();

    let projection = match mode {
        SelectMode::Numeric(ref agg) => vec![Expr::raw(format!("SELECT {} AS result ", agg.to_sql()))],
        _ => {
            let mut parts = vec![Expr::raw("SELECT ")];
            if let Some(distinct) = &opts.distinct {
                parts.push(distinct_sql(distinct));
            }
            parts.push(row_projection(&alias, &opts));
            parts.push(Expr::raw(" AS result "));
            parts
        }
    };

    let mut from_parts = vec![Expr::raw("FROM "), Expr::ident(table), Expr::raw(" AS "), Expr::ident(alias.clone())];
    if !matches!(mode, SelectMode::Numeric(_)) {
        splice_laterals(&mut from_parts, &alias, &opts);
    }

    let mut inner_parts = projection;
    inner_parts.extend(from_parts);
    inner_parts.push(Expr::raw(" WHERE "));
    inner_parts.push(where_expr);
    apply_common_clauses(&mut inner_parts, &opts);

    match mode {
        SelectMode::Many => {
            let sq_alias = format!("sq_{alias}");
            let parts = vec![
                Expr::raw("SELECT coalesce(jsonb_agg(result), '[]') AS result FROM ("),
                Expr::Array(inner_parts),
                Expr::raw(format!(") AS \"{sq_alias}\"")),
            ];
            SqlFragment::compose(parts).with_result_transform(many_transform())
        }
        SelectMode::One => {
            inner_parts.push(Expr::raw(" LIMIT 1"));
            SqlFragment::compose(inner_parts).with_result_transform(one_transform())
        }
        SelectMode::ExactlyOne => {
            inner_parts.push(Expr::raw(" LIMIT 1"));
            SqlFragment::compose(inner_parts).with_result_transform(exactly_one_transform())
        }
        SelectMode::Numeric(_) => SqlFragment::compose(inner_parts).with_result_transform(numeric_transform()),
    }
}

/// Builds the row-level JSON projection, merging in lateral results per
/// spec.md §4.7. Laterals themselves are spliced into the FROM clause by
/// [`splice_laterals`]; this only builds the matching projection half.
fn row_projection(alias: &str, opts: &SelectOptions) -> Expr {
    match &opts.lateral {
        Some(Lateral::Single(_)) => Expr::raw("\"lateral_passthru\".result"),
        Some(Lateral::Map(map)) => {
            let mut merge_parts = vec![row_selector(alias, opts.columns.as_deref(), &opts.extras)];
            merge_parts.push(Expr::raw(" || jsonb_build_object("));
            for (i, key) in map.keys().enumerate() {
                if i > 0 {
                    merge_parts.push(Expr::raw(", "));
                }
                merge_parts.push(Expr::param(key.as_str()));
                merge_parts.push(Expr::raw("::text, "));
                merge_parts.push(Expr::raw(format!("\"lateral_{key}\".result")));
            }
            merge_parts.push(Expr::raw(")"));
            Expr::Array(merge_parts)
        }
        None => row_selector(alias, opts.columns.as_deref(), &opts.extras),
    }
}

/// Appends `LEFT JOIN LATERAL (...) AS "lateral_<key>" ON true` clauses to
/// `from_parts`, each sub-query copied with `parentTable` set to the outer
/// alias so its `parent(col)` references resolve (spec.md §4.7).
fn splice_laterals(from_parts: &mut Vec<Expr>, alias: &str, opts: &SelectOptions) {
    match &opts.lateral {
        Some(Lateral::Single(sub)) => {
            let spliced = sub.as_ref().clone().with_parent_table(alias.to_string());
            from_parts.push(Expr::raw(" LEFT JOIN LATERAL ("));
            from_parts.push(Expr::fragment(spliced));
            from_parts.push(Expr::raw(") AS \"lateral_passthru\" ON true"));
        }
        Some(Lateral::Map(map)) => {
            for (key, sub) in map {
                let spliced = sub.clone().with_parent_table(alias.to_string());
                from_parts.push(Expr::raw(" LEFT JOIN LATERAL ("));
                from_parts.push(Expr::fragment(spliced));
                from_parts.push(Expr::raw(format!(") AS \"lateral_{key}\" ON true")));
            }
        }
        None => {}
    }
}

fn distinct_sql(distinct: &DistinctOpt) -> Expr {
    match distinct {
        DistinctOpt::On => Expr::raw("DISTINCT "),
        DistinctOpt::Expr(e) => Expr::Array(vec![Expr::raw("DISTINCT ON ("), e.clone(), Expr::raw(") ")]),
        DistinctOpt::Columns(cols) => {
            let list = cols.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
            Expr::raw(format!("DISTINCT ON ({list}) "))
        }
    }
}

/// GROUP BY / HAVING / ORDER BY / LIMIT-OFFSET(-WITH-TIES) / FOR locking —
/// shared between the row-projecting modes and `Numeric` (spec.md §4.7).
fn apply_common_clauses(parts: &mut Vec<Expr>, opts: &SelectOptions) {
    if !opts.group_by.is_empty() {
        let list = opts.group_by.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
        parts.push(Expr::raw(format!(" GROUP BY {list}")));
    }
    if let Some(having) = &opts.having {
        parts.push(Expr::raw(" HAVING "));
        parts.push(having.clone());
    }
    if !opts.order.is_empty() {
        let list = opts.order.iter().map(OrderSpec::to_sql).collect::<Vec<_>>().join(", ");
        parts.push(Expr::raw(format!(" ORDER BY {list}")));
    }

    if opts.with_ties {
        if let Some(offset) = opts.offset {
            parts.push(Expr::raw(" OFFSET "));
            parts.push(Expr::param(offset));
        }
        if let Some(limit) = opts.limit {
            parts.push(Expr::raw(" FETCH FIRST "));
            parts.push(Expr::param(limit));
            parts.push(Expr::raw(" ROWS WITH TIES"));
        }
    } else {
        if let Some(limit) = opts.limit {
            parts.push(Expr::raw(" LIMIT "));
            parts.push(Expr::param(limit));
        }
        if let Some(offset) = opts.offset {
            parts.push(Expr::raw(" OFFSET "));
            parts.push(Expr::param(offset));
        }
    }

    for lock in &opts.lock {
        parts.push(Expr::raw(format!(" {}", lock.to_sql())));
    }
}

fn many_transform() -> ResultTransform {
    std::sync::Arc::new(|_q: &CompiledQuery, rows: QueryResult| {
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut r| r.remove("result"))
            .unwrap_or_else(|| serde_json::Value::Array(vec![])))
    })
}

fn one_transform() -> ResultTransform {
    std::sync::Arc::new(|_q: &CompiledQuery, rows: QueryResult| {
        Ok(rows.into_iter().next().and_then(|mut r| r.remove("result")).unwrap_or(serde_json::Value::Null))
    })
}

fn exactly_one_transform() -> ResultTransform {
    std::sync::Arc::new(|q: &CompiledQuery, rows: QueryResult| match rows.into_iter().next() {
        Some(mut r) => Ok(r.remove("result").unwrap_or(serde_json::Value::Null)),
        None => Err(Error::NotExactlyOne { query: q.clone() }),
    })
}

fn numeric_transform() -> ResultTransform {
    std::sync::Arc::new(|_q: &CompiledQuery, rows: QueryResult| {
        let raw = rows.into_iter().next().and_then(|mut r| r.remove("result"));
        let n: f64 = match &raw {
            Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        };
        Ok(serde_json::json!(n))
    })
}

pub fn count(table: &str, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(Aggregate::Count))
}

pub fn sum(table: &str, column: impl Into<String>, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(Aggregate::Sum(column.into())))
}

pub fn avg(table: &str, column: impl Into<String>, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(Aggregate::Avg(column.into())))
}

pub fn min(table: &str, column: impl Into<String>, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(Aggregate::Min(column.into())))
}

pub fn max(table: &str, column: impl Into<String>, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(Aggregate::Max(column.into())))
}

pub fn aggregate(table: &str, agg: Aggregate, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::Numeric(agg))
}

pub fn select_one(table: &str, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::One)
}

pub fn select_exactly_one(table: &str, where_: Where, opts: SelectOptions) -> SqlFragment {
    select(table, where_, opts, SelectMode::ExactlyOne)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileCtx, compile};

    fn pred(pairs: &[(&str, i64)]) -> Where {
        Where::Predicate(pairs.iter().map(|(k, v)| (k.to_string(), Expr::param(*v))).collect())
    }

    #[test]
    fn many_mode_wraps_in_coalesce_jsonb_agg() {
        let opts = SelectOptions {
            order: vec![OrderSpec::new("created_at", SortDirection::Desc)],
            limit: Some(10),
            ..Default::default()
        };
        let f = select("posts", Where::All, opts, SelectMode::Many);
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.starts_with("SELECT coalesce(jsonb_agg(result), '[]') AS result FROM ("));
        assert!(c.text.contains("SELECT to_jsonb(\"posts\".*) AS result FROM \"posts\" AS \"posts\""));
        assert!(c.text.contains("ORDER BY \"created_at\" DESC"));
        assert!(c.text.contains("LIMIT $1"));
        assert!(c.text.ends_with(") AS \"sq_posts\""));
    }

    #[test]
    fn select_exactly_one_missing_row_errors_with_query() {
        let f = select_exactly_one("users", pred(&[("id", 1)]), SelectOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        let transform = f.result_transform.clone().unwrap();
        let err = transform(&c, vec![]).unwrap_err();
        match err {
            Error::NotExactlyOne { query } => assert_eq!(query.text, c.text),
            other => panic!("expected NotExactlyOne, got {other:?}"),
        }
    }

    #[test]
    fn lateral_map_splices_join_and_merges_result() {
        let mut laterals = BTreeMap::new();
        laterals.insert(
            "comments".to_string(),
            select("comments", Where::All, SelectOptions::default(), SelectMode::Many),
        );
        let opts = SelectOptions { lateral: Some(Lateral::Map(laterals)), ..Default::default() };
        let f = select_one("posts", Where::All, opts);
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.contains("LEFT JOIN LATERAL ("));
        assert!(c.text.contains("AS \"lateral_comments\" ON true"));
        assert!(c.text.contains("jsonb_build_object($1::text, \"lateral_comments\".result)"));
    }

    #[test]
    fn lateral_single_replaces_row_with_passthru() {
        let sub = select("comments", Where::All, SelectOptions::default(), SelectMode::Many);
        let opts = SelectOptions { lateral: Some(Lateral::Single(Box::new(sub))), ..Default::default() };
        let f = select_one("posts", Where::All, opts);
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert!(c.text.contains("SELECT \"lateral_passthru\".result AS result"));
        assert!(c.text.contains("AS \"lateral_passthru\" ON true"));
    }

    #[test]
    fn numeric_count_builds_plain_aggregate() {
        let f = count("users", Where::All, SelectOptions::default());
        let c = compile(&f, &CompileCtx::default()).unwrap();
        assert_eq!(c.text, "SELECT count(*) AS result FROM \"users\" AS \"users\" WHERE TRUE");
    }

    #[test]
    fn numeric_transform_parses_text_and_number() {
        let transform = numeric_transform();
        let q = CompiledQuery { text: String::new(), values: vec![], name: None };
        let mut row = crate::fragment::Row::new();
        row.insert("result".to_string(), serde_json::json!("42"));
        assert_eq!(transform(&q, vec![row]).unwrap(), serde_json::json!(42.0));

        let mut row2 = crate::fragment::Row::new();
        row2.insert("result".to_string(), serde_json::json!(7));
        assert_eq!(transform(&q, vec![row2]).unwrap(), serde_json::json!(7.0));
    }

    #[test]
    fn order_spec_try_from_strs_validates() {
        assert!(OrderSpec::try_from_strs("id", "ASC", None).is_ok());
        assert!(matches!(
            OrderSpec::try_from_strs("id", "sideways", None),
            Err(Error::BadOrderDirection(_))
        ));
        assert!(matches!(
            OrderSpec::try_from_strs("id", "ASC", Some("MIDDLE")),
            Err(Error::BadOrderNulls(_))
        ));
    }
}

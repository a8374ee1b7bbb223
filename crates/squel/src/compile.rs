//! The compiler: a recursive walk of a fragment tree producing
//! `{text, values, name?}` (spec.md §3, §4.2).

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::expr::{Expr, NameList};
use crate::fragment::SqlFragment;
use crate::ident::quote_ident;
use crate::value::{Cast, Param};

static PREPARED_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Mint a default prepared-statement name when a fragment doesn't carry
/// its own. The monotonic counter is the one piece of mutable state the
/// engine carries outside a fragment tree (spec.md §5).
pub fn next_prepared_name() -> String {
    format!("squel_{}", PREPARED_COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub text: String,
    pub values: Vec<Param>,
    pub name: Option<String>,
}

/// Ambient state threaded through compilation: the outer table alias (for
/// [`Expr::Parent`]) and the column currently bound for [`Expr::SelfColumn`]
/// — set, for instance, while compiling one column's value inside an
/// upsert's update-value map.
#[derive(Debug, Clone)]
pub struct CompileCtx {
    pub parent_table: Option<String>,
    pub current_column: Option<String>,
    /// Process-wide auto-cast config (spec.md §4.2, §6), carried explicitly
    /// here rather than read from an ambient global (Design Notes §9).
    pub cast_array_params_to_json: bool,
    pub cast_object_params_to_json: bool,
}

impl Default for CompileCtx {
    fn default() -> Self {
        Self {
            parent_table: None,
            current_column: None,
            cast_array_params_to_json: true,
            cast_object_params_to_json: true,
        }
    }
}

impl CompileCtx {
    pub fn with_current_column(&self, column: impl Into<String>) -> Self {
        Self { current_column: Some(column.into()), ..self.clone() }
    }

    pub fn with_parent_table(&self, alias: impl Into<String>) -> Self {
        Self { parent_table: Some(alias.into()), ..self.clone() }
    }
}

/// Compile a fragment to `{text, values, name}`. Referentially transparent
/// for a given fragment tree starting from the empty `{text: "", values:
/// []}` state (spec.md §3 invariant).
pub fn compile(fragment: &SqlFragment, ctx: &CompileCtx) -> Result<CompiledQuery, Error> {
    let ctx = match &fragment.parent_table {
        Some(alias) => ctx.with_parent_table(alias.clone()),
        None => ctx.clone(),
    };

    let mut text = String::new();
    let mut values = Vec::new();

    for (i, segment) in fragment.segments.iter().enumerate() {
        text.push_str(segment);
        if let Some(expr) = fragment.exprs.get(i) {
            compile_expr(expr, &ctx, &mut text, &mut values)?;
        }
    }

    tracing::trace!(text, params = values.len(), "compiled fragment");

    Ok(CompiledQuery { text, values, name: fragment.prepared_name.clone() })
}

fn compile_expr(
    expr: &Expr,
    ctx: &CompileCtx,
    text: &mut String,
    values: &mut Vec<Param>,
) -> Result<(), Error> {
    match expr {
        Expr::Fragment(inner) => {
            let compiled = compile(inner, ctx)?;
            text.push_str(&rebase_placeholders(&compiled.text, values.len()));
            values.extend(compiled.values);
        }
        Expr::Ident(name) => text.push_str(&quote_ident(name)),
        Expr::Raw(raw) => text.push_str(raw),
        Expr::Array(items) => {
            for item in items {
                compile_expr(item, ctx, text, values)?;
            }
        }
        Expr::Param { value, cast } => push_param(value.clone(), cast, ctx, text, values),
        Expr::Default => text.push_str("DEFAULT"),
        Expr::SelfColumn => match &ctx.current_column {
            Some(col) => text.push_str(&quote_ident(col)),
            None => return Err(Error::SelfWithoutColumn),
        },
        Expr::Parent { column } => match &ctx.parent_table {
            Some(parent) => {
                let col = column.clone().or_else(|| ctx.current_column.clone()).ok_or_else(|| {
                    Error::AlienExpression(
                        "parent() with no explicit column and no ambient current column".into(),
                    )
                })?;
                text.push_str(&format!("{}.{}", quote_ident(parent), quote_ident(&col)));
            }
            None => return Err(Error::ParentWithoutTable),
        },
        Expr::ColumnNames(names) => {
            let rendered: Vec<String> = match names {
                NameList::Keys(map) => map.keys().map(|k| quote_ident(k)).collect(),
                NameList::List(list) => list.iter().map(|k| quote_ident(k)).collect(),
            };
            text.push_str(&rendered.join(", "));
        }
        Expr::ColumnValues(map) => {
            let mut first = true;
            for (col, value_expr) in map {
                if !first {
                    text.push_str(", ");
                }
                first = false;
                let ctx = ctx.with_current_column(col.clone());
                compile_expr(value_expr, &ctx, text, values)?;
            }
        }
        Expr::Predicate(map) => {
            if map.is_empty() {
                text.push_str("TRUE");
            } else {
                text.push('(');
                let mut first = true;
                for (col, value_expr) in map {
                    if !first {
                        text.push_str(" AND ");
                    }
                    first = false;
                    text.push_str(&quote_ident(col));
                    text.push_str(" = ");
                    let ctx = ctx.with_current_column(col.clone());
                    compile_expr(value_expr, &ctx, text, values)?;
                }
                text.push(')');
            }
        }
    }
    Ok(())
}

/// A nested fragment compiles its own placeholders starting at `$1`; when
/// splicing it into the outer text they need shifting by however many
/// parameters the outer compilation has already allocated.
fn rebase_placeholders(text: &str, offset: usize) -> String {
    if offset == 0 {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '$' {
            let mut digits = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    digits.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                out.push('$');
            } else {
                let n: usize = digits.parse().unwrap_or(0);
                out.push('$');
                out.push_str(&(n + offset).to_string());
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn push_param(value: Param, cast: &Cast, ctx: &CompileCtx, text: &mut String, values: &mut Vec<Param>) {
    let k = values.len() + 1;
    match cast {
        Cast::Typed(ty) => {
            text.push_str(&format!("CAST(${k} AS \"{ty}\")"));
            values.push(value);
        }
        Cast::Json => {
            let json = param_to_json(&value);
            text.push_str(&format!("CAST(${k} AS \"json\")"));
            values.push(Param::String(json.to_string()));
        }
        Cast::None => {
            text.push_str(&format!("${k}"));
            values.push(value);
        }
        Cast::Auto => {
            let should_cast = match &value {
                Param::Array(_) => ctx.cast_array_params_to_json,
                Param::Json(serde_json::Value::Object(_)) => ctx.cast_object_params_to_json,
                _ => false,
            };
            if should_cast {
                let json = param_to_json(&value);
                text.push_str(&format!("CAST(${k} AS \"json\")"));
                values.push(Param::String(json.to_string()));
            } else {
                text.push_str(&format!("${k}"));
                values.push(value);
            }
        }
    }
}

fn param_to_json(value: &Param) -> serde_json::Value {
    match value {
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
            serde_json::Value::Array(items.iter().map(param_to_json).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx() -> CompileCtx {
        CompileCtx::default()
    }

    #[test]
    fn param_count_identity() {
        let f = SqlFragment::new(
            vec!["select ", " , ", ""],
            vec![Expr::param(1i32), Expr::param("x")],
        );
        let c = compile(&f, &ctx()).unwrap();
        assert_eq!(c.text, "select $1 , $2");
        assert_eq!(c.values.len(), 2);
    }

    #[test]
    fn ident_quotes_and_snake_cases() {
        let f = SqlFragment::new(vec!["", ""], vec![Expr::ident("userId")]);
        let c = compile(&f, &ctx()).unwrap();
        assert_eq!(c.text, "\"user_id\"");
    }

    #[test]
    fn self_without_column_errors() {
        let f = SqlFragment::new(vec!["", ""], vec![Expr::self_column()]);
        assert!(matches!(compile(&f, &ctx()), Err(Error::SelfWithoutColumn)));
    }

    #[test]
    fn parent_without_table_errors() {
        let f = SqlFragment::new(vec!["", ""], vec![Expr::parent("id")]);
        assert!(matches!(compile(&f, &ctx()), Err(Error::ParentWithoutTable)));
    }

    #[test]
    fn parent_renders_when_table_set() {
        let f = SqlFragment::new(vec!["", ""], vec![Expr::parent("id")])
            .with_parent_table("a");
        let c = compile(&f, &ctx()).unwrap();
        assert_eq!(c.text, "\"a\".\"id\"");
    }

    #[test]
    fn predicate_sorted_and_deterministic() {
        let mut m1 = BTreeMap::new();
        m1.insert("b".to_string(), Expr::param(2i32));
        m1.insert("a".to_string(), Expr::param(1i32));

        let mut m2 = BTreeMap::new();
        m2.insert("a".to_string(), Expr::param(1i32));
        m2.insert("b".to_string(), Expr::param(2i32));

        let f1 = SqlFragment::new(vec!["", ""], vec![Expr::predicate(m1)]);
        let f2 = SqlFragment::new(vec!["", ""], vec![Expr::predicate(m2)]);

        let c1 = compile(&f1, &ctx()).unwrap();
        let c2 = compile(&f2, &ctx()).unwrap();
        assert_eq!(c1.text, c2.text);
        assert_eq!(c1.values, c2.values);
        assert_eq!(c1.text, "(\"a\" = $1 AND \"b\" = $2)");
    }

    #[test]
    fn empty_predicate_is_true() {
        let f = SqlFragment::new(vec!["", ""], vec![Expr::predicate(BTreeMap::new())]);
        let c = compile(&f, &ctx()).unwrap();
        assert_eq!(c.text, "TRUE");
    }
}

#[cfg(test)]
mod proptests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// spec.md §8: the number of `$k` placeholders a compiled fragment
        /// renders always equals the number of parameter values it returns,
        /// for any number of interleaved params.
        #[test]
        fn param_count_identity(values in proptest::collection::vec(any::<i32>(), 0..30)) {
            let n = values.len();
            let exprs: Vec<Expr> = values.into_iter().map(Expr::param).collect();
            let segments: Vec<String> = std::iter::repeat(String::new()).take(n + 1).collect();
            let f = SqlFragment::new(segments, exprs);
            let c = compile(&f, &CompileCtx::default()).unwrap();
            prop_assert_eq!(c.values.len(), n);
            prop_assert_eq!(c.text.matches('$').count(), n);
        }

        /// spec.md §8: a predicate built from the same column-value pairs
        /// renders identical SQL text regardless of the order the pairs were
        /// inserted in, since `Expr::Predicate` always walks a `BTreeMap`.
        #[test]
        fn predicate_is_order_independent(
            pairs in proptest::collection::vec(("[a-z]{1,8}", any::<i32>()), 1..10)
        ) {
            let mut forward: BTreeMap<String, Expr> = BTreeMap::new();
            for (k, v) in &pairs {
                forward.insert(k.clone(), Expr::param(*v));
            }
            let mut backward: BTreeMap<String, Expr> = BTreeMap::new();
            for (k, v) in pairs.iter().rev() {
                backward.insert(k.clone(), Expr::param(*v));
            }

            let fa = SqlFragment::new(vec!["", ""], vec![Expr::predicate(forward)]);
            let fb = SqlFragment::new(vec!["", ""], vec![Expr::predicate(backward)]);
            let ca = compile(&fa, &CompileCtx::default()).unwrap();
            let cb = compile(&fb, &CompileCtx::default()).unwrap();
            prop_assert_eq!(ca.text, cb.text);
            prop_assert_eq!(ca.values, cb.values);
        }
    }
}

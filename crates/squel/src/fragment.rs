//! `SqlFragment`: the compositional unit of the engine (spec.md §3).
//!
//! A fragment interleaves literal SQL text with interpolated [`Expr`]
//! values. The source expresses this with a tagged-template literal;
//! without that facility this crate expresses the same shape as an ordered
//! list of text segments plus an ordered list of expressions, built either
//! directly or through the [`sql!`] macro.

use std::sync::Arc;

use crate::compile::CompiledQuery;
use crate::error::Error;
use crate::expr::Expr;

/// One row of a driver result, already shaped to JSON-ish values by the
/// `to_jsonb`/`jsonb_build_object` wrapping every shortcut builder emits.
pub type Row = std::collections::BTreeMap<String, serde_json::Value>;

/// The raw rows a `Queryable` hands back.
pub type QueryResult = Vec<Row>;

/// What `run()` ultimately returns to the caller, after the fragment's
/// result transform has run. Callers needing a concrete Rust type
/// `serde_json::from_value` this themselves (see `schema::Selectable`).
pub type RunResult = serde_json::Value;

/// Takes the compiled query (for diagnostics — `selectExactlyOne`'s
/// `NotExactlyOne` carries it, per spec.md §7) alongside the raw rows.
pub type ResultTransform =
    Arc<dyn Fn(&CompiledQuery, QueryResult) -> Result<RunResult, Error> + Send + Sync>;

/// Literal segments `L0..Ln` interleaved with expressions `E1..En`: the
/// rendered text is `L0 . render(E1) . L1 . ... . render(En) . Ln`.
#[derive(Clone)]
pub struct SqlFragment {
    pub(crate) segments: Vec<String>,
    pub(crate) exprs: Vec<Expr>,
    pub(crate) prepared_name: Option<String>,
    pub(crate) parent_table: Option<String>,
    pub(crate) noop: bool,
    pub(crate) noop_result: Option<RunResult>,
    pub(crate) result_transform: Option<ResultTransform>,
}

impl std::fmt::Debug for SqlFragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlFragment")
            .field("segments", &self.segments)
            .field("exprs", &self.exprs)
            .field("prepared_name", &self.prepared_name)
            .field("parent_table", &self.parent_table)
            .field("noop", &self.noop)
            .finish_non_exhaustive()
    }
}

impl SqlFragment {
    /// `segments.len()` must be `exprs.len() + 1`; this is the shape every
    /// tagged-template literal produces and every shortcut builder must
    /// preserve.
    pub fn new(segments: Vec<impl Into<String>>, exprs: Vec<Expr>) -> Self {
        assert_eq!(
            segments.len(),
            exprs.len() + 1,
            "a fragment needs one more literal segment than expressions"
        );
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            exprs,
            prepared_name: None,
            parent_table: None,
            noop: false,
            noop_result: None,
            result_transform: None,
        }
    }

    /// A fragment with no interpolations at all.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()], vec![])
    }

    /// Splits `template` on `{}` to produce segments, pairing each gap with
    /// the corresponding expression in order. Used by [`sql!`]; panics (at
    /// macro-expansion time, on a literal template) if the brace count
    /// doesn't match the expression count.
    pub fn from_template(template: &str, exprs: Vec<Expr>) -> Self {
        let segments: Vec<String> = template.split("{}").map(str::to_owned).collect();
        assert_eq!(
            segments.len(),
            exprs.len() + 1,
            "sql! template has {} placeholder(s) but {} expression(s) were given",
            segments.len() - 1,
            exprs.len()
        );
        Self::new(segments, exprs)
    }

    pub fn with_parent_table(mut self, alias: impl Into<String>) -> Self {
        self.parent_table = Some(alias.into());
        self
    }

    pub fn with_prepared_name(mut self, name: impl Into<String>) -> Self {
        self.prepared_name = Some(name.into());
        self
    }

    pub fn with_result_transform(mut self, transform: ResultTransform) -> Self {
        self.result_transform = Some(transform);
        self
    }

    /// Mark as a no-op fragment with a synthetic result, per spec.md §3
    /// ("allows a shortcut that otherwise degenerates... to return a
    /// synthetic result without a round-trip"). Still renders real SQL so
    /// `run(queryable, force = true)` can execute it.
    pub fn with_noop_result(mut self, result: RunResult) -> Self {
        self.noop = true;
        self.noop_result = Some(result);
        self
    }

    pub fn is_noop(&self) -> bool {
        self.noop
    }

    /// Copy with selected fields replaced, mirroring the source's
    /// `copy(overrides)`. Takes a closure so callers only touch the
    /// fields they mean to override.
    pub fn copy_with(&self, f: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        f(&mut next);
        next
    }

    /// Build a fragment from a flat sequence of expressions with no
    /// literal text between them — the shortcut builders' workhorse, since
    /// their SQL shape varies with caller options (how many columns, how
    /// many value tuples, whether a lateral clause is present) in a way a
    /// fixed `{}` template can't express. Each [`Expr::Raw`] piece in
    /// `parts` supplies the literal SQL; the rest are the same typed
    /// expressions any fragment can interpolate.
    pub fn compose(parts: Vec<Expr>) -> Self {
        Self::new(vec!["", ""], vec![Expr::Array(parts)])
    }
}

/// Build a [`SqlFragment`] from a template literal with `{}` placeholders,
/// each paired with an expression convertible via `Expr::from`/the
/// dedicated `Expr` constructors.
///
/// ```ignore
/// let f = sql!("select * from {} where {}", Expr::ident("users"), Expr::predicate(preds));
/// ```
#[macro_export]
macro_rules! sql {
    ($tpl:expr $(, $e:expr)* $(,)?) => {
        $crate::fragment::SqlFragment::from_template($tpl, vec![$($e),*])
    };
}

//! Compile-time schema description: the static facts a crate's generated
//! table types carry, consumed by the runtime composer for column
//! validation and row reshaping (spec.md §6, §9 "Type-level shape
//! inference").
//!
//! Catalog introspection and textual code emission are external
//! collaborators (spec.md §1) — this module only describes the shapes a
//! generator would have produced, and the marker traits the shortcut
//! builders (`crate::shortcuts`) use to keep a caller's value maps
//! column-checked against a specific table.

use std::collections::BTreeMap;

use crate::ident::to_pascal_case;

/// The SQL-type -> target-type mapping of spec.md §6, narrowed to the
/// shapes this engine needs to know about at the wire boundary. Dialect
/// portability is explicitly out of scope; this is PostgreSQL only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgType {
    Money,
    Int8,
    Numeric,
    Bytea,
    Date,
    Timestamp,
    TimestampTz,
    Time,
    TimeTz,
    Int4Range,
    Int8Range,
    NumRange,
    TsRange,
    TsTzRange,
    DateRange,
    Interval,
    Char,
    Varchar,
    Text,
    Citext,
    Uuid,
    Inet,
    Name,
    Int2,
    Int4,
    Float4,
    Float8,
    Oid,
    Bool,
    Json,
    Jsonb,
    Enum,
    Array(&'static PgType),
    Unknown,
}

impl std::fmt::Display for PgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PgType::Money => "money",
            PgType::Int8 => "int8",
            PgType::Numeric => "numeric",
            PgType::Bytea => "bytea",
            PgType::Date => "date",
            PgType::Timestamp => "timestamp",
            PgType::TimestampTz => "timestamptz",
            PgType::Time => "time",
            PgType::TimeTz => "timetz",
            PgType::Int4Range => "int4range",
            PgType::Int8Range => "int8range",
            PgType::NumRange => "numrange",
            PgType::TsRange => "tsrange",
            PgType::TsTzRange => "tstzrange",
            PgType::DateRange => "daterange",
            PgType::Interval => "interval",
            PgType::Char => "char",
            PgType::Varchar => "varchar",
            PgType::Text => "text",
            PgType::Citext => "citext",
            PgType::Uuid => "uuid",
            PgType::Inet => "inet",
            PgType::Name => "name",
            PgType::Int2 => "int2",
            PgType::Int4 => "int4",
            PgType::Float4 => "float4",
            PgType::Float8 => "float8",
            PgType::Oid => "oid",
            PgType::Bool => "bool",
            PgType::Json => "json",
            PgType::Jsonb => "jsonb",
            PgType::Enum => "enum",
            PgType::Array(inner) => return write!(f, "_{inner}"),
            PgType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Describes one table column as the generator would have emitted it:
/// enough to validate which keys a caller's insert/update/predicate map
/// may use, and what cast a parameter built from it should carry.
///
/// This intentionally carries no admin-UI facing fields
/// (`long`/`label`/`lang`/`icon`/`subtype`) — this engine has no admin
/// surface.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub pg_type: PgType,
    pub nullable: bool,
    pub has_default: bool,
}

impl Column {
    pub const fn new(name: &'static str, pg_type: PgType) -> Self {
        Self { name, pg_type, nullable: false, has_default: false }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn has_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// A named unique constraint, usable as an upsert conflict target
/// (spec.md §4.4's "constraint wrapper" arm).
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

/// The static description of one table: its columns and unique indexes.
/// A code generator would emit one `const` of this shape per table; this
/// engine only reads it.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub unique_indexes: &'static [UniqueIndex],
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// An enum type's ordered labels, as the generator's enum query would
/// return them (spec.md §8 scenario 7). `pg_enum` preserves declaration
/// order; it is kept verbatim here, not re-sorted.
#[derive(Debug, Clone)]
pub struct EnumDescriptor {
    pub sql_name: &'static str,
    pub labels: &'static [&'static str],
}

impl EnumDescriptor {
    /// The pascal-cased Rust type name a generator would emit for this
    /// enum (spec.md §6: "pascal-cased name"). The labels themselves stay
    /// in declaration order; only the type name is cased.
    pub fn type_name(&self) -> String {
        to_pascal_case(self.sql_name)
    }

    pub fn labels_in_order(&self) -> BTreeMap<usize, &'static str> {
        self.labels.iter().enumerate().map(|(i, l)| (i, *l)).collect()
    }
}

/// A type whose columns may be supplied to `insert`. Implemented by a
/// generated per-table marker so `shortcuts::insert` can be called
/// generically while still tying a value map's valid keys to one table.
pub trait Insertable {
    fn table() -> &'static Table;
}

/// A type whose columns may be supplied to `update`'s `SET` / `upsert`'s
/// `updateValues`.
pub trait Updatable {
    fn table() -> &'static Table;
}

/// A type whose columns may appear in a predicate map (`WHERE`, `ON
/// CONFLICT`'s conflict target).
pub trait Whereable {
    fn table() -> &'static Table;
}

/// A type whose columns may be requested via `select`'s `columns` option
/// or read back out of a JSON row.
pub trait Selectable {
    fn table() -> &'static Table;
}

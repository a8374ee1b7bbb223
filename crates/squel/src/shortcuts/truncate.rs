//! `truncate` (spec.md §4.6).

use crate::expr::Expr;
use crate::fragment::SqlFragment;
use crate::ident::quote_ident;

#[derive(Clone, Copy)]
pub enum IdentityOpt {
    ContinueIdentity,
    RestartIdentity,
}

#[derive(Clone, Copy)]
pub enum ForeignKeyOpt {
    Restrict,
    Cascade,
}

/// `TRUNCATE t[, ...] [identity] [fk]`, options appended in caller order
/// (spec.md §4.6).
pub fn truncate(tables: &[&str], identity: Option<IdentityOpt>, foreign_key: Option<ForeignKeyOpt>) -> SqlFragment {
    let mut text = String::from("TRUNCATE ");
    text.push_str(&tables.iter().map(|t| quote_ident(t)).collect::<Vec<_>>().join(", "));
    if let Some(identity) = identity {
        text.push(' ');
        text.push_str(match identity {
            IdentityOpt::ContinueIdentity => "CONTINUE IDENTITY",
            IdentityOpt::RestartIdentity => "RESTART IDENTITY",
        });
    }
    if let Some(fk) = foreign_key {
        text.push(' ');
        text.push_str(match fk {
            ForeignKeyOpt::Restrict => "RESTRICT",
            ForeignKeyOpt::Cascade => "CASCADE",
        });
    }
    SqlFragment::new(vec![text], vec![] as Vec<Expr>)
}

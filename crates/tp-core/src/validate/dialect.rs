//! Column type grammars for the two CSV dialects.
//!
//! Both dialects share the row-shape rules; they differ only in how a type
//! token is read and which base types exist.

use tp_common::Dialect;

/// Base types accepted by dialect 1.
pub const V1_TYPES: &[&str] = &[
    "str", "string", "int", "integer", "reg", "region", "time", "ip", "ipaddr", "ipv6", "ll",
    "null",
];

/// Base types accepted by dialect 2.
pub const V2_TYPES: &[&str] = &["str", "int", "float", "time", "ip", "ipv6", "null"];

/// How a dialect reads a column type token.
pub trait TypeGrammar: Sync {
    /// Extract the base type name from a raw token.
    fn base_type<'a>(&self, token: &'a str) -> &'a str;

    /// Base types this dialect knows.
    fn allowed(&self) -> &'static [&'static str];

    /// Whether the token names a known base type. Names are case-sensitive.
    fn accepts(&self, token: &str) -> bool {
        let base = self.base_type(token);
        self.allowed().iter().any(|t| *t == base)
    }
}

/// Dialect 1: the token is the type name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTypes;

impl TypeGrammar for PlainTypes {
    fn base_type<'a>(&self, token: &'a str) -> &'a str {
        token
    }

    fn allowed(&self) -> &'static [&'static str] {
        V1_TYPES
    }
}

/// Dialect 2: `prefix)base?suffix` or `prefix)base!suffix`.
///
/// The base type starts after the first `)` (or at the start when there is
/// none) and runs to the first `?` or `!` after that point, or to the end.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoratedTypes;

impl TypeGrammar for DecoratedTypes {
    fn base_type<'a>(&self, token: &'a str) -> &'a str {
        let rest = match token.find(')') {
            Some(paren) => &token[paren + 1..],
            None => token,
        };
        match rest.find(['?', '!']) {
            Some(marker) => &rest[..marker],
            None => rest,
        }
    }

    fn allowed(&self) -> &'static [&'static str] {
        V2_TYPES
    }
}

/// The grammar for a dialect.
pub fn grammar_for(dialect: Dialect) -> &'static dyn TypeGrammar {
    match dialect {
        Dialect::V1 => &PlainTypes,
        Dialect::V2 => &DecoratedTypes,
    }
}

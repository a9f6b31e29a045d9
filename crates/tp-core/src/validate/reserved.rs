//! Reserved words of the downstream query language.
//!
//! A table named after one of these cannot be queried without quoting, so
//! such tables are rejected.

pub const RESERVED_WORDS: &[&str] = &[
    "add", "all", "alter", "and", "any", "as", "asc", "avg", "begin", "between", "by", "case",
    "cast", "column", "columns", "count", "create", "cross", "current", "database", "default",
    "delete", "desc", "describe", "distinct", "drop", "else", "end", "escape", "except", "exists",
    "explain", "false", "fetch", "first", "for", "foreign", "from", "full", "group", "having",
    "if", "in", "index", "inner", "insert", "intersect", "interval", "into", "is", "join", "key",
    "last", "left", "like", "limit", "max", "min", "natural", "not", "null", "offset", "on", "or",
    "order", "outer", "primary", "references", "right", "rows", "select", "set", "show", "sum",
    "table", "tables", "then", "to", "true", "union", "unique", "update", "using", "values",
    "view", "when", "where", "with",
];

/// Case-insensitive membership test.
pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

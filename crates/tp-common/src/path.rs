//! Path helpers shared by the index loader and the naming utility.

/// Removes directory components and one trailing `.suffix`.
///
/// `a` → `a`, `a.csv` → `a`, `x/y/c.csv` → `c`, `x/b.c.csv` → `b.c`.
pub fn basename(s: &str) -> &str {
    let s = match s.rfind('/') {
        Some(slash) => &s[slash + 1..],
        None => s,
    };
    match s.rfind('.') {
        Some(dot) => &s[..dot],
        None => s,
    }
}

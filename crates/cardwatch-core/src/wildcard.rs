//! Wildcard name matching.
//!
//! `*` is the only special character and only has meaning at either end of a
//! pattern:
//!
//! | pattern   | matches when `value`      |
//! |-----------|---------------------------|
//! | `*mid*`   | contains `mid`            |
//! | `*tail`   | ends with `tail`          |
//! | `head*`   | starts with `head`        |
//! | `exact`   | equals `exact`            |
//!
//! Runs of asterisks collapse, so `**` behaves like `*` and matches anything.

const WILDCARD: char = '*';

/// Check `value` against a wildcard `pattern`.
pub fn matches(value: &str, pattern: &str) -> bool {
    let leading = pattern.starts_with(WILDCARD);
    let trailing = pattern.ends_with(WILDCARD);
    let core = pattern.trim_matches(WILDCARD);

    match (leading, trailing) {
        (true, true) => value.contains(core),
        (true, false) => value.ends_with(core),
        (false, true) => value.starts_with(core),
        (false, false) => value == pattern,
    }
}

use std::borrow::Cow;

mod procedure;

pub use procedure::{ProcedureCall, is_procedure_call};

/// Positional marker emitted by the query compiler.
const MARKER: u8 = b'?';
/// Escape that turns the following marker into a literal `?`.
const ESCAPE: u8 = b'\\';
/// Prefix of the named parameters SQL Server sees (`@c0`, `@c1`, ...).
pub const PARAM_PREFIX: &str = "c";

/// SQL text after positional markers have been numbered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedSql<'a> {
    pub sql: Cow<'a, str>,
    /// Number of named markers emitted; the bindings list must have exactly this length.
    pub markers: usize,
}

/// Name of the parameter bound at `position` in a plain query.
#[must_use]
pub fn param_name(position: usize) -> String {
    format!("{PARAM_PREFIX}{position}")
}

/// Rewrite `?` markers into `@c0`, `@c1`, ... in left-to-right order.
///
/// `\?` becomes a literal `?` and does not take a slot. Procedure calls already name their
/// parameters and are returned untouched.
/// ```rust
/// use mssql_middleware::prelude::*;
///
/// let sql = position_bindings("select * from t where a = ? and b like '\\?%' and c = ?");
/// assert_eq!(sql, "select * from t where a = @c0 and b like '?%' and c = @c1");
/// ```
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn position_bindings(sql: &str) -> Cow<'_, str> {
    rewrite_markers(sql).sql
}

/// Same as [`position_bindings`], also reporting how many named markers were produced.
#[must_use]
pub fn rewrite_markers(sql: &str) -> PositionedSql<'_> {
    if is_procedure_call(sql) {
        tracing::trace!("Skipping position binding for a procedure.");
        return PositionedSql {
            sql: Cow::Borrowed(sql),
            markers: 0,
        };
    }

    let mut out: Option<String> = None;
    let mut markers = 0;
    let mut idx = 0;
    let bytes = sql.as_bytes();

    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            ESCAPE if bytes.get(idx + 1) == Some(&MARKER) => {
                let buf = out.get_or_insert_with(|| sql[..idx].to_string());
                buf.push('?');
                idx += 2;
                continue;
            }
            MARKER => {
                let buf = out.get_or_insert_with(|| sql[..idx].to_string());
                buf.push('@');
                buf.push_str(&param_name(markers));
                markers += 1;
                idx += 1;
                continue;
            }
            _ => {}
        }

        // Copy whole UTF-8 sequences; markers and escapes are ASCII so they never split one.
        let width = utf8_width(b);
        if let Some(ref mut buf) = out {
            buf.push_str(&sql[idx..idx + width]);
        }
        idx += width;
    }

    PositionedSql {
        sql: out.map_or(Cow::Borrowed(sql), Cow::Owned),
        markers,
    }
}

fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_markers_in_order() {
        let res = rewrite_markers("insert into t (a, b, c) values (?, ?, ?)");
        assert_eq!(res.sql, "insert into t (a, b, c) values (@c0, @c1, @c2)");
        assert_eq!(res.markers, 3);
    }

    #[test]
    fn escaped_marker_is_literal_and_uncounted() {
        let res = rewrite_markers(r"select '\?' as q, ? as v");
        assert_eq!(res.sql, "select '?' as q, @c0 as v");
        assert_eq!(res.markers, 1);
    }

    #[test]
    fn lone_backslash_is_kept() {
        let res = rewrite_markers(r"select 'a\b', ?");
        assert_eq!(res.sql, r"select 'a\b', @c0");
    }

    #[test]
    fn borrowed_when_nothing_to_do() {
        let res = position_bindings("select 1");
        assert!(matches!(res, Cow::Borrowed(_)));
    }

    #[test]
    fn procedure_calls_are_untouched() {
        let sql = "exec dbo.get_user @id = ?";
        let res = rewrite_markers(sql);
        assert!(matches!(res.sql, Cow::Borrowed(_)));
        assert_eq!(res.sql, sql);
        assert_eq!(res.markers, 0);
    }

    #[test]
    fn keeps_multibyte_text() {
        let res = position_bindings("select N'héllo ✓', ?");
        assert_eq!(res, "select N'héllo ✓', @c0");
    }
}

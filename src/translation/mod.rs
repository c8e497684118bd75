//! Placeholder handling on top of a quote- and comment-aware scanner.
//!
//! Two bind syntaxes reach the runner:
//! - driver-level (`%s`, `%(name)s`), executed through [`Cursor::exec_driver_sql`](crate::connectable::Cursor::exec_driver_sql),
//! - portable (`:name`, or backend `$N` / `?N` with positional parameters).
//!
//! Both are rewritten into the backend's positional style before binding. Placeholder-looking
//! text inside string literals, quoted identifiers, dollar-quoted bodies and comments is never
//! touched.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;

mod parsers;
mod scanner;

pub(crate) use parsers::is_ident_char;
use parsers::scan_ident;
use scanner::scan_digits;
pub use scanner::{Segment, SegmentKind, segments};

use crate::error::SqlRunnerError;
use crate::params::DriverParams;
use crate::types::RowValues;

// `\w` is Unicode-aware, matching what DB-API drivers accept in `%(name)s`.
static NAMED_PYFORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\((\w+)\)s").expect("named placeholder pattern compiles"));

/// Target placeholder style for translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// PostgreSQL-style placeholders like `$1`.
    Postgres,
    /// SQLite-style placeholders like `?1`.
    Sqlite,
}

impl PlaceholderStyle {
    /// Render the 1-based positional placeholder `n`.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            PlaceholderStyle::Postgres => format!("${n}"),
            PlaceholderStyle::Sqlite => format!("?{n}"),
        }
    }
}

/// Rebuild `sql`, passing every code segment through `f` and copying everything else verbatim.
fn rewrite_code<F>(sql: &str, mut f: F) -> Result<String, SqlRunnerError>
where
    F: FnMut(&str, &mut String) -> Result<(), SqlRunnerError>,
{
    let mut out = String::with_capacity(sql.len() + 8);
    for segment in segments(sql) {
        let text = &sql[segment.range];
        if segment.kind == SegmentKind::Code {
            f(text, &mut out)?;
        } else {
            out.push_str(text);
        }
    }
    Ok(out)
}

/// Translate placeholders between Postgres-style `$N` and SQLite-style `?N`.
///
/// Returns a borrowed `Cow` when no changes are needed.
#[must_use]
pub fn translate_placeholders(sql: &str, target: PlaceholderStyle, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(sql);
    }
    let (from, to) = match target {
        PlaceholderStyle::Postgres => (b'?', '$'),
        PlaceholderStyle::Sqlite => (b'$', '?'),
    };

    let mut changed = false;
    let rewritten = rewrite_code(sql, |code, out| {
        let bytes = code.as_bytes();
        let mut last = 0;
        let mut idx = 0;
        while idx < bytes.len() {
            if bytes[idx] == from
                && let Some((digits_end, digits)) = scan_digits(bytes, idx + 1)
            {
                out.push_str(&code[last..idx]);
                out.push(to);
                out.push_str(digits);
                changed = true;
                last = digits_end;
                idx = digits_end;
                continue;
            }
            idx += 1;
        }
        out.push_str(&code[last..]);
        Ok(())
    });

    match rewritten {
        Ok(buf) if changed => Cow::Owned(buf),
        _ => Cow::Borrowed(sql),
    }
}

/// Whether `sql` carries driver-native `%s` / `%(name)s` placeholders outside literals and
/// comments, so it must go through the driver-level execution path.
///
/// Text that only looks like a placeholder inside a literal is treated as portable.
#[must_use]
pub fn needs_driver_level_execution(sql: &str) -> bool {
    segments(sql)
        .into_iter()
        .filter(|segment| segment.kind == SegmentKind::Code)
        .map(|segment| &sql[segment.range])
        .any(|code| {
            code.contains("%s") || NAMED_PYFORMAT.is_match(code)
        })
}

/// Assigns positional indexes to names in first-use order.
#[derive(Default)]
struct NamedSlots<'p> {
    index: HashMap<String, usize>,
    values: Vec<RowValues>,
    source: Option<&'p BTreeMap<String, RowValues>>,
}

impl NamedSlots<'_> {
    fn slot(&mut self, name: &str, style: PlaceholderStyle) -> Result<String, SqlRunnerError> {
        if let Some(idx) = self.index.get(name) {
            return Ok(style.placeholder(*idx));
        }
        let value = self
            .source
            .and_then(|map| map.get(name))
            .ok_or_else(|| {
                SqlRunnerError::ParameterError(format!("missing value for bind parameter '{name}'"))
            })?;
        self.values.push(value.clone());
        let idx = self.values.len();
        self.index.insert(name.to_string(), idx);
        Ok(style.placeholder(idx))
    }
}

/// The name of a `%(name)s` placeholder starting at byte `idx` of `code`.
fn named_placeholder_at(code: &str, idx: usize) -> Option<&str> {
    let rest = code.get(idx..)?;
    let caps = NAMED_PYFORMAT.captures(rest)?;
    if caps.get(0)?.start() != 0 {
        return None;
    }
    caps.get(1).map(|name| name.as_str())
}

/// The first `chars` characters of `text`, for error messages.
fn snippet(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Rewrite driver-level `%s` / `%(name)s` placeholders into the backend positional style.
///
/// With no parameters the text is returned untouched, `%%` included. With parameters, `%%`
/// collapses to `%`, and any other `%` sequence in code is rejected.
///
/// # Errors
/// Returns `SqlRunnerError::ParameterError` when placeholders and parameters disagree.
pub fn rewrite_pyformat(
    sql: &str,
    style: PlaceholderStyle,
    params: Option<&DriverParams>,
) -> Result<(String, Vec<RowValues>), SqlRunnerError> {
    let Some(params) = params else {
        return Ok((sql.to_string(), Vec::new()));
    };

    let (positional, named) = match params {
        DriverParams::Positional(values) => (Some(values), None),
        DriverParams::Named(map) => (None, Some(map)),
    };
    let mut used_positional = 0usize;
    let mut slots = NamedSlots {
        source: named,
        ..NamedSlots::default()
    };

    let rewritten = rewrite_code(sql, |code, out| {
        let bytes = code.as_bytes();
        let mut last = 0;
        let mut idx = 0;
        while idx < bytes.len() {
            if bytes[idx] != b'%' {
                idx += 1;
                continue;
            }
            out.push_str(&code[last..idx]);
            match bytes.get(idx + 1) {
                Some(b'%') => {
                    out.push('%');
                    idx += 2;
                }
                Some(b's') => {
                    let Some(values) = positional else {
                        return Err(SqlRunnerError::ParameterError(
                            "positional %s placeholder used with named parameters".into(),
                        ));
                    };
                    used_positional += 1;
                    if used_positional > values.len() {
                        return Err(SqlRunnerError::ParameterError(format!(
                            "statement has more %s placeholders than the {} parameters supplied",
                            values.len()
                        )));
                    }
                    out.push_str(&style.placeholder(used_positional));
                    idx += 2;
                }
                Some(b'(') => {
                    let Some(name) = named_placeholder_at(code, idx) else {
                        return Err(SqlRunnerError::ParameterError(format!(
                            "malformed named placeholder near '{}'",
                            snippet(&code[idx..], 16)
                        )));
                    };
                    if named.is_none() {
                        return Err(SqlRunnerError::ParameterError(
                            "named %(name)s placeholder used with positional parameters".into(),
                        ));
                    }
                    out.push_str(&slots.slot(name, style)?);
                    idx += name.len() + 4;
                }
                _ => {
                    return Err(SqlRunnerError::ParameterError(format!(
                        "unsupported format sequence near '{}' (use %% for a literal percent)",
                        snippet(&code[idx..], 2)
                    )));
                }
            }
            last = idx;
        }
        out.push_str(&code[last..]);
        Ok(())
    })?;

    match positional {
        Some(values) if used_positional != values.len() => Err(SqlRunnerError::ParameterError(
            format!(
                "{} parameters supplied but statement uses {used_positional} %s placeholders",
                values.len()
            ),
        )),
        Some(values) => Ok((rewritten, values.clone())),
        None => Ok((rewritten, slots.values)),
    }
}

/// Rewrite portable binds into the backend positional style.
///
/// Named parameters bind `:name` tokens. Casts such as `x::int` and `:name:` are left alone, so
/// a bind that needs a cast is written `CAST(:name AS int)`. Positional
/// parameters keep their `$N` / `?N` placeholders, translated to the backend style.
///
/// # Errors
/// Returns `SqlRunnerError::ParameterError` when a `:name` has no value.
pub fn rewrite_named_binds(
    sql: &str,
    style: PlaceholderStyle,
    params: Option<&DriverParams>,
) -> Result<(String, Vec<RowValues>), SqlRunnerError> {
    match params {
        None => Ok((sql.to_string(), Vec::new())),
        Some(DriverParams::Positional(values)) => Ok((
            translate_placeholders(sql, style, true).into_owned(),
            values.clone(),
        )),
        Some(DriverParams::Named(map)) => {
            let mut slots = NamedSlots {
                source: Some(map),
                ..NamedSlots::default()
            };
            let rewritten = rewrite_code(sql, |code, out| {
                let bytes = code.as_bytes();
                let mut last = 0;
                let mut idx = 0;
                while idx < bytes.len() {
                    let bind_start = bytes[idx] == b':'
                        && (idx == 0
                            || !(bytes[idx - 1] == b':'
                                || bytes[idx - 1] == b'\\'
                                || is_ident_char(bytes[idx - 1])));
                    if bind_start
                        && let Some(name_end) = scan_ident(bytes, idx + 1)
                        && bytes.get(name_end) != Some(&b':')
                    {
                        out.push_str(&code[last..idx]);
                        out.push_str(&slots.slot(&code[idx + 1..name_end], style)?);
                        last = name_end;
                        idx = name_end;
                        continue;
                    }
                    idx += 1;
                }
                out.push_str(&code[last..]);
                Ok(())
            })?;
            Ok((rewritten, slots.values))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(pairs: &[(&str, RowValues)]) -> DriverParams {
        DriverParams::Named(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn translates_sqlite_to_postgres() {
        let sql = "select * from t where a = ?1 and b = ?2";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres, true);
        assert_eq!(res, "select * from t where a = $1 and b = $2");
    }

    #[test]
    fn translates_postgres_to_sqlite() {
        let sql = "insert into t values($1, $2)";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "insert into t values(?1, ?2)");
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select '?1', $1 -- $2\n/* ?3 */ from t where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "select '?1', ?1 -- $2\n/* ?3 */ from t where a = ?1");
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select $1 from t $foo$ where a = $1";
        let res = translate_placeholders(sql, PlaceholderStyle::Sqlite, true);
        assert_eq!(res, "$foo$ select $1 from t $foo$ where a = ?1");
    }

    #[test]
    fn respects_disabled_flag() {
        let sql = "select * from t where a = ?1";
        let res = translate_placeholders(sql, PlaceholderStyle::Postgres, false);
        assert!(matches!(res, Cow::Borrowed(_)));
        assert_eq!(res, sql);
    }

    #[test]
    fn detects_driver_placeholders_in_code_only() {
        assert!(needs_driver_level_execution("INSERT INTO t VALUES (%s)"));
        assert!(needs_driver_level_execution("SELECT * FROM t WHERE id = %(id)s"));
        assert!(!needs_driver_level_execution("SELECT * FROM t WHERE id = :id"));
        assert!(!needs_driver_level_execution("SELECT '%s' -- %(id)s"));
        assert!(!needs_driver_level_execution("SELECT 'a%' LIKE 'a%%'"));
    }

    #[test]
    fn pyformat_positional_rewrite() {
        let params = DriverParams::Positional(vec![RowValues::Int(1), RowValues::Int(2)]);
        let (sql, values) = rewrite_pyformat(
            "INSERT INTO t VALUES (%s, %s) -- %s",
            PlaceholderStyle::Postgres,
            Some(&params),
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES ($1, $2) -- %s");
        assert_eq!(values, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn pyformat_named_reuses_slots() {
        let params = named(&[("a", RowValues::Int(7)), ("unused", RowValues::Null)]);
        let (sql, values) = rewrite_pyformat(
            "SELECT %(a)s + %(a)s, 5 %% 2",
            PlaceholderStyle::Sqlite,
            Some(&params),
        )
        .unwrap();
        assert_eq!(sql, "SELECT ?1 + ?1, 5 % 2");
        assert_eq!(values, vec![RowValues::Int(7)]);
    }

    #[test]
    fn pyformat_without_params_is_untouched() {
        let (sql, values) =
            rewrite_pyformat("SELECT 5 %% 2", PlaceholderStyle::Sqlite, None).unwrap();
        assert_eq!(sql, "SELECT 5 %% 2");
        assert!(values.is_empty());
    }

    #[test]
    fn pyformat_count_mismatch_is_rejected() {
        let params = DriverParams::Positional(vec![RowValues::Int(1)]);
        let err = rewrite_pyformat("SELECT %s, %s", PlaceholderStyle::Sqlite, Some(&params))
            .unwrap_err();
        assert!(matches!(err, SqlRunnerError::ParameterError(_)));

        let params = DriverParams::Positional(vec![RowValues::Int(1), RowValues::Int(2)]);
        let err =
            rewrite_pyformat("SELECT %s", PlaceholderStyle::Sqlite, Some(&params)).unwrap_err();
        assert!(matches!(err, SqlRunnerError::ParameterError(_)));
    }

    #[test]
    fn pyformat_accepts_unicode_names() {
        let sql = "INSERT INTO t VALUES (%(größe)s,%(höhe)s)";
        assert!(needs_driver_level_execution(sql));
        let params = named(&[("größe", RowValues::Int(1)), ("höhe", RowValues::Int(2))]);
        let (sql, values) = rewrite_pyformat(sql, PlaceholderStyle::Sqlite, Some(&params)).unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES (?1,?2)");
        assert_eq!(values, vec![RowValues::Int(1), RowValues::Int(2)]);
    }

    #[test]
    fn pyformat_errors_quote_multibyte_text_safely() {
        let params = DriverParams::Positional(vec![RowValues::Int(1)]);
        let err = rewrite_pyformat("SELECT %s, 5 %é", PlaceholderStyle::Sqlite, Some(&params))
            .unwrap_err();
        assert!(err.to_string().contains("'%é'"));

        let params = named(&[("a", RowValues::Int(1))]);
        let err = rewrite_pyformat("SELECT %(ä ö ü ä ö ü ä ö ü", PlaceholderStyle::Sqlite, Some(&params))
            .unwrap_err();
        assert!(matches!(err, SqlRunnerError::ParameterError(_)));
    }

    #[test]
    fn named_binds_skip_casts_and_literals() {
        let params = named(&[("id", RowValues::Int(3)), ("name", RowValues::from("x"))]);
        let (sql, values) = rewrite_named_binds(
            "SELECT CAST(:id AS int), x::text, ':id', :name, :id",
            PlaceholderStyle::Postgres,
            Some(&params),
        )
        .unwrap();
        assert_eq!(sql, "SELECT CAST($1 AS int), x::text, ':id', $2, $1");
        assert_eq!(values, vec![RowValues::Int(3), RowValues::from("x")]);
    }

    #[test]
    fn named_binds_report_missing_values() {
        let params = named(&[("id", RowValues::Int(3))]);
        let err = rewrite_named_binds("SELECT :other", PlaceholderStyle::Sqlite, Some(&params))
            .unwrap_err();
        assert!(err.to_string().contains("other"));
    }

    #[test]
    fn positional_portable_params_translate_backend_style() {
        let params = DriverParams::Positional(vec![RowValues::Int(1)]);
        let (sql, _) =
            rewrite_named_binds("SELECT $1", PlaceholderStyle::Sqlite, Some(&params)).unwrap();
        assert_eq!(sql, "SELECT ?1");
    }
}

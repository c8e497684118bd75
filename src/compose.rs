//! Composable SQL fragments that are rendered into statement text before execution.
//!
//! A [`Fragment`] carries structural SQL (identifiers, keywords, whole sub-queries) that can't
//! travel as a driver bind value. Fragments render per dialect, so identifier and literal
//! quoting always matches the backend they run against.
//!
//! ```rust
//! use sql_runner::prelude::*;
//!
//! let query = Fragment::sql("SELECT {fields} FROM {table}")
//!     .format(&PreBindParams::named([
//!         (
//!             "fields",
//!             Fragment::sql(", ").join([Fragment::identifier(["id"]), Fragment::identifier(["name"])]),
//!         ),
//!         ("table", Fragment::identifier(["public", "users"])),
//!     ]))
//!     .unwrap();
//! assert_eq!(
//!     query.as_string(DatabaseType::Postgres).unwrap(),
//!     r#"SELECT "id", "name" FROM "public"."users""#
//! );
//! ```

use std::fmt::Write as _;

use crate::error::SqlRunnerError;
use crate::params::PreBindParams;
use crate::types::{DatabaseType, RowValues};

/// A piece of SQL that is rendered into the statement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Raw SQL text, emitted verbatim. Also the template for [`Fragment::format`].
    Sql(String),
    /// A possibly qualified identifier; each part is quoted separately.
    Identifier(Vec<String>),
    /// A value rendered as a quoted SQL literal.
    Literal(RowValues),
    /// A driver-level placeholder: `%s` when unnamed, `%(name)s` when named.
    Placeholder(Option<String>),
    /// A sequence of fragments rendered back to back.
    Composed(Vec<Fragment>),
}

impl Fragment {
    #[must_use]
    pub fn sql(text: impl Into<String>) -> Self {
        Fragment::Sql(text.into())
    }

    #[must_use]
    pub fn identifier<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fragment::Identifier(parts.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn literal(value: impl Into<RowValues>) -> Self {
        Fragment::Literal(value.into())
    }

    #[must_use]
    pub fn placeholder(name: Option<&str>) -> Self {
        Fragment::Placeholder(name.map(str::to_string))
    }

    /// Join `items` using `self` as the separator.
    #[must_use]
    pub fn join<I>(&self, items: I) -> Self
    where
        I: IntoIterator<Item = Fragment>,
    {
        let mut parts = Vec::new();
        for (idx, item) in items.into_iter().enumerate() {
            if idx > 0 {
                parts.push(self.clone());
            }
            parts.push(item);
        }
        Fragment::Composed(parts)
    }

    /// Substitute fragments into a [`Fragment::Sql`] template.
    ///
    /// Supports `{}` (automatic numbering), `{0}` (explicit index) and `{name}`; `{{` and `}}`
    /// produce literal braces. Automatic and explicit numbering can't be mixed.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::RenderError` when the template is malformed, refers to a
    /// missing argument, or `self` is not a `Sql` fragment.
    pub fn format(&self, args: &PreBindParams) -> Result<Fragment, SqlRunnerError> {
        let Fragment::Sql(template) = self else {
            return Err(SqlRunnerError::RenderError(
                "only raw SQL fragments can be used as a format template".into(),
            ));
        };

        let mut parts = Vec::new();
        let mut text = String::new();
        let mut auto_index: Option<usize> = None;
        let mut manual = false;
        let mut chars = template.char_indices().peekable();

        while let Some((pos, ch)) = chars.next() {
            match ch {
                '{' if chars.peek().map(|(_, c)| *c) == Some('{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek().map(|(_, c)| *c) == Some('}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => {
                    return Err(SqlRunnerError::RenderError(format!(
                        "single '}}' encountered in format template at byte {pos}"
                    )));
                }
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        key.push(c);
                    }
                    if !closed {
                        return Err(SqlRunnerError::RenderError(format!(
                            "unclosed '{{' in format template at byte {pos}"
                        )));
                    }
                    let arg = if key.is_empty() {
                        if manual {
                            return Err(mixed_numbering());
                        }
                        let idx = auto_index.map_or(0, |i| i + 1);
                        auto_index = Some(idx);
                        positional_arg(args, idx)?
                    } else if let Ok(idx) = key.parse::<usize>() {
                        if auto_index.is_some() {
                            return Err(mixed_numbering());
                        }
                        manual = true;
                        positional_arg(args, idx)?
                    } else if key.chars().all(|c| c.is_alphanumeric() || c == '_') {
                        named_arg(args, &key)?
                    } else {
                        return Err(SqlRunnerError::RenderError(format!(
                            "unsupported format field '{{{key}}}'"
                        )));
                    };
                    if !text.is_empty() {
                        parts.push(Fragment::Sql(std::mem::take(&mut text)));
                    }
                    parts.push(arg.clone());
                }
                _ => text.push(ch),
            }
        }
        if !text.is_empty() {
            parts.push(Fragment::Sql(text));
        }
        Ok(Fragment::Composed(parts))
    }

    /// Render the fragment as SQL text for `dialect`.
    ///
    /// # Errors
    /// Returns `SqlRunnerError::RenderError` for empty identifiers or values the dialect
    /// has no literal syntax for.
    pub fn as_string(&self, dialect: DatabaseType) -> Result<String, SqlRunnerError> {
        let mut out = String::new();
        self.render_into(dialect, &mut out)?;
        Ok(out)
    }

    fn render_into(&self, dialect: DatabaseType, out: &mut String) -> Result<(), SqlRunnerError> {
        match self {
            Fragment::Sql(text) => out.push_str(text),
            Fragment::Identifier(parts) => {
                if parts.is_empty() {
                    return Err(SqlRunnerError::RenderError(
                        "identifier needs at least one part".into(),
                    ));
                }
                for (idx, part) in parts.iter().enumerate() {
                    if idx > 0 {
                        out.push('.');
                    }
                    push_quoted(out, part, '"');
                }
            }
            Fragment::Literal(value) => render_literal(value, dialect, out)?,
            Fragment::Placeholder(None) => out.push_str("%s"),
            Fragment::Placeholder(Some(name)) => {
                let _ = write!(out, "%({name})s");
            }
            Fragment::Composed(items) => {
                for item in items {
                    item.render_into(dialect, out)?;
                }
            }
        }
        Ok(())
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Fragment::sql(value)
    }
}

fn mixed_numbering() -> SqlRunnerError {
    SqlRunnerError::RenderError(
        "cannot switch between automatic and manual field numbering".into(),
    )
}

fn positional_arg(args: &PreBindParams, idx: usize) -> Result<&Fragment, SqlRunnerError> {
    match args {
        PreBindParams::Positional(values) => values.get(idx).ok_or_else(|| {
            SqlRunnerError::RenderError(format!(
                "format field {idx} out of range ({} fragments supplied)",
                values.len()
            ))
        }),
        PreBindParams::Named(_) => Err(SqlRunnerError::RenderError(format!(
            "positional format field {idx} used with named fragments"
        ))),
    }
}

fn named_arg<'a>(args: &'a PreBindParams, name: &str) -> Result<&'a Fragment, SqlRunnerError> {
    match args {
        PreBindParams::Named(values) => values.get(name).ok_or_else(|| {
            SqlRunnerError::RenderError(format!("no fragment supplied for '{{{name}}}'"))
        }),
        PreBindParams::Positional(_) => Err(SqlRunnerError::RenderError(format!(
            "named format field '{{{name}}}' used with positional fragments"
        ))),
    }
}

fn push_quoted(out: &mut String, text: &str, quote: char) {
    out.push(quote);
    for ch in text.chars() {
        if ch == quote {
            out.push(quote);
        }
        out.push(ch);
    }
    out.push(quote);
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
}

fn render_literal(
    value: &RowValues,
    dialect: DatabaseType,
    out: &mut String,
) -> Result<(), SqlRunnerError> {
    match (value, dialect) {
        (RowValues::Null, _) => out.push_str("NULL"),
        (RowValues::Int(i), _) => {
            let _ = write!(out, "{i}");
        }
        (RowValues::Float(f), _) if f.is_finite() => {
            let _ = write!(out, "{f:?}");
        }
        (RowValues::Float(f), DatabaseType::Postgres) => {
            let word = if f.is_nan() {
                "NaN"
            } else if f.is_sign_positive() {
                "Infinity"
            } else {
                "-Infinity"
            };
            let _ = write!(out, "'{word}'::float8");
        }
        (RowValues::Float(f), DatabaseType::Sqlite) => {
            return Err(SqlRunnerError::RenderError(format!(
                "SQLite has no literal for the float value {f}"
            )));
        }
        (RowValues::Text(s), _) => push_quoted(out, s, '\''),
        (RowValues::Bool(b), DatabaseType::Postgres) => {
            out.push_str(if *b { "TRUE" } else { "FALSE" });
        }
        (RowValues::Bool(b), DatabaseType::Sqlite) => out.push_str(if *b { "1" } else { "0" }),
        (RowValues::Timestamp(ts), dialect) => {
            push_quoted(out, &ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(), '\'');
            if dialect == DatabaseType::Postgres {
                out.push_str("::timestamp");
            }
        }
        (RowValues::JSON(json), dialect) => {
            push_quoted(out, &json.to_string(), '\'');
            if dialect == DatabaseType::Postgres {
                out.push_str("::json");
            }
        }
        (RowValues::Blob(bytes), DatabaseType::Postgres) => {
            out.push_str("'\\x");
            push_hex(out, bytes);
            out.push_str("'::bytea");
        }
        (RowValues::Blob(bytes), DatabaseType::Sqlite) => {
            out.push_str("X'");
            push_hex(out, bytes);
            out.push('\'');
        }
    }
    Ok(())
}

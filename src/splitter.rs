//! Turning caller input into an ordered list of statements.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compose::Fragment;
use crate::error::SqlRunnerError;
use crate::translation::{SegmentKind, is_ident_char, segments};

/// Keywords that mark single-line text as SQL rather than a file path.
const SQL_KEYWORDS: [&str; 8] = [
    "select", "insert", "update", "create", "drop", "delete", "alter", "set",
];

/// Everything the runner accepts as SQL input.
pub enum SqlInput {
    /// SQL text, or a file path when it is classified as one.
    Text(String),
    /// A file that is always read.
    Path(PathBuf),
    /// An open handle that is read to the end.
    Reader(Box<dyn Read + Send>),
    /// A pre-built fragment, executed as a single statement.
    Fragment(Fragment),
    /// Several inputs, flattened in order.
    Many(Vec<SqlInput>),
}

impl std::fmt::Debug for SqlInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlInput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            SqlInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            SqlInput::Reader(_) => f.write_str("Reader(..)"),
            SqlInput::Fragment(fragment) => f.debug_tuple("Fragment").field(fragment).finish(),
            SqlInput::Many(items) => f.debug_tuple("Many").field(items).finish(),
        }
    }
}

impl From<&str> for SqlInput {
    fn from(value: &str) -> Self {
        SqlInput::Text(value.to_string())
    }
}

impl From<String> for SqlInput {
    fn from(value: String) -> Self {
        SqlInput::Text(value)
    }
}

impl From<&Path> for SqlInput {
    fn from(value: &Path) -> Self {
        SqlInput::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for SqlInput {
    fn from(value: PathBuf) -> Self {
        SqlInput::Path(value)
    }
}

impl From<File> for SqlInput {
    fn from(value: File) -> Self {
        SqlInput::Reader(Box::new(value))
    }
}

impl From<Fragment> for SqlInput {
    fn from(value: Fragment) -> Self {
        SqlInput::Fragment(value)
    }
}

impl<T: Into<SqlInput>> From<Vec<T>> for SqlInput {
    fn from(value: Vec<T>) -> Self {
        SqlInput::Many(value.into_iter().map(Into::into).collect())
    }
}

/// One executable unit produced by splitting.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Comment-stripped, trimmed text without its terminator. May be empty.
    Text(String),
    Fragment(Fragment),
}

impl Statement {
    /// Text form for logs and dry runs; fragments are shown as their raw structure.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Statement::Text(text) => text.clone(),
            Statement::Fragment(fragment) => format!("{fragment:?}"),
        }
    }
}

/// How a piece of single-string input should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputKind {
    Sql,
    File,
}

/// Whether `text` looks like SQL: more than one line, or a leading SQL keyword.
///
/// This is a prefix check, so `settings.sql` counts as SQL too.
#[must_use]
pub fn infer_is_sql_text(text: &str) -> bool {
    if text.contains('\n') {
        return true;
    }
    let lowered = text.trim().to_lowercase();
    SQL_KEYWORDS
        .iter()
        .any(|keyword| lowered.starts_with(keyword))
}

/// Decide whether `text` is SQL or the path of a file holding SQL.
///
/// | condition                         | result |
/// |-----------------------------------|--------|
/// | spans several lines               | `Sql`  |
/// | starts with a SQL keyword         | `Sql`  |
/// | names an existing regular file    | `File` |
/// | anything else                     | `Sql`  |
#[must_use]
pub fn classify_text_input(text: &str) -> TextInputKind {
    if infer_is_sql_text(text) {
        return TextInputKind::Sql;
    }
    if Path::new(text).is_file() {
        TextInputKind::File
    } else {
        TextInputKind::Sql
    }
}

/// Split `input` into statements.
///
/// `interpret_as_file` forces text to be read as a path (`Some(true)`) or used as SQL
/// (`Some(false)`); `None` applies [`classify_text_input`]. Empty text returns `None`.
///
/// # Errors
/// Returns `SqlRunnerError::Io` when a file or reader can't be read.
pub fn split_input(
    input: SqlInput,
    interpret_as_file: Option<bool>,
) -> Result<Option<Vec<Statement>>, SqlRunnerError> {
    let text = match input {
        SqlInput::Fragment(fragment) => return Ok(Some(vec![Statement::Fragment(fragment)])),
        SqlInput::Many(items) => {
            let mut statements = Vec::new();
            for item in items {
                if let Some(mut more) = split_input(item, interpret_as_file)? {
                    statements.append(&mut more);
                }
            }
            return Ok(Some(statements));
        }
        SqlInput::Text(text) if text.is_empty() => return Ok(None),
        SqlInput::Text(text) => {
            let as_file = match interpret_as_file {
                Some(forced) => forced,
                None => classify_text_input(&text) == TextInputKind::File,
            };
            if as_file {
                read_file(Path::new(&text))?
            } else {
                text
            }
        }
        SqlInput::Path(path) => read_file(&path)?,
        SqlInput::Reader(mut reader) => {
            let mut text = String::new();
            reader.read_to_string(&mut text)?;
            text
        }
    };

    Ok(Some(
        split_statements(&text)
            .into_iter()
            .map(Statement::Text)
            .collect(),
    ))
}

fn read_file(path: &Path) -> Result<String, SqlRunnerError> {
    debug!(path = %path.display(), "reading SQL file");
    Ok(std::fs::read_to_string(path)?)
}

/// Tracks `BEGIN ... END` bodies of `CREATE TRIGGER` / `FUNCTION` / `PROCEDURE` statements so
/// their inner `;` don't end the statement.
#[derive(Default)]
struct BlockDepth {
    words: usize,
    has_body: Option<bool>,
    depth: u32,
}

const CREATE_MODIFIERS: [&str; 5] = ["or", "replace", "temp", "temporary", "constraint"];
const BODY_OBJECTS: [&str; 3] = ["trigger", "function", "procedure"];

impl BlockDepth {
    fn observe(&mut self, word: &str) {
        self.words += 1;
        if self.has_body.is_none() {
            let lowered = word.to_ascii_lowercase();
            if self.words == 1 {
                if lowered != "create" {
                    self.has_body = Some(false);
                }
            } else if BODY_OBJECTS.contains(&lowered.as_str()) {
                self.has_body = Some(true);
            } else if !CREATE_MODIFIERS.contains(&lowered.as_str()) {
                self.has_body = Some(false);
            }
            return;
        }
        if self.has_body != Some(true) {
            return;
        }
        if word.eq_ignore_ascii_case("begin") || (self.depth > 0 && word.eq_ignore_ascii_case("case"))
        {
            self.depth += 1;
        } else if word.eq_ignore_ascii_case("end") {
            self.depth = self.depth.saturating_sub(1);
        }
    }
}

/// Split SQL text on `;` terminators outside literals, comments and `CREATE ... BEGIN ... END`
/// bodies.
///
/// Each statement is comment-stripped and trimmed. Whitespace-only pieces are dropped;
/// comment-only pieces come back as empty strings.
#[must_use]
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut block = BlockDepth::default();
    let mut start = 0;

    for segment in segments(sql) {
        if segment.kind != SegmentKind::Code {
            continue;
        }
        let base = segment.range.start;
        let bytes = sql[segment.range].as_bytes();
        let mut idx = 0;
        while idx < bytes.len() {
            if is_ident_char(bytes[idx]) {
                let word_start = idx;
                while idx < bytes.len() && is_ident_char(bytes[idx]) {
                    idx += 1;
                }
                block.observe(&sql[base + word_start..base + idx]);
                continue;
            }
            if bytes[idx] == b';' && block.depth == 0 {
                pieces.push(&sql[start..base + idx]);
                start = base + idx + 1;
                block = BlockDepth::default();
            }
            idx += 1;
        }
    }
    pieces.push(&sql[start..]);

    pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .map(|piece| strip_comments(piece).trim().to_string())
        .collect()
}

/// Remove `--` and `/* */` comments that sit outside literals.
///
/// A comment wedged between two tokens is replaced by a single space so the tokens stay apart.
#[must_use]
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pending_gap = false;
    for segment in segments(sql) {
        let text = &sql[segment.range];
        if segment.kind == SegmentKind::Comment {
            pending_gap = true;
            continue;
        }
        if pending_gap
            && out.chars().last().is_some_and(|c| !c.is_whitespace())
            && text.chars().next().is_some_and(|c| !c.is_whitespace())
        {
            out.push(' ');
        }
        pending_gap = false;
        out.push_str(text);
    }
    out
}

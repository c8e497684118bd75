use std::ops::Range;

use super::parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// Lexical class of a run of SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Plain SQL: keywords, identifiers, operators, placeholders.
    Code,
    /// A `'...'` string or `$tag$...$tag$` body.
    Literal,
    /// A `"..."` quoted identifier.
    QuotedIdent,
    /// A `-- ...` or `/* ... */` comment.
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub range: Range<usize>,
}

pub(super) fn scan_digits(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let mut idx = start;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        std::str::from_utf8(&bytes[start..idx])
            .ok()
            .map(|digits| (idx, digits))
    }
}

fn kind_of(state: &State) -> SegmentKind {
    match state {
        State::Normal => SegmentKind::Code,
        State::SingleQuoted | State::DollarQuoted(_) => SegmentKind::Literal,
        State::DoubleQuoted => SegmentKind::QuotedIdent,
        State::LineComment | State::BlockComment(_) => SegmentKind::Comment,
    }
}

/// Break `sql` into contiguous segments of code, literals, quoted identifiers and comments.
///
/// Unterminated literals and comments run to the end of the input.
#[must_use]
pub fn segments(sql: &str) -> Vec<Segment> {
    let bytes = sql.as_bytes();
    let mut out = Vec::new();
    let mut push = |kind: SegmentKind, range: Range<usize>| {
        if !range.is_empty() {
            out.push(Segment { kind, range });
        }
    };

    let mut state = State::Normal;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let mut next = None;
                let mut skip = 0;
                if b == b'\'' {
                    next = Some(State::SingleQuoted);
                } else if b == b'"' {
                    next = Some(State::DoubleQuoted);
                } else if is_line_comment_start(bytes, idx) {
                    next = Some(State::LineComment);
                    skip = 1;
                } else if is_block_comment_start(bytes, idx) {
                    next = Some(State::BlockComment(1));
                    skip = 1;
                } else if b == b'$'
                    && let Some((tag, advance)) = try_start_dollar_quote(bytes, idx)
                {
                    next = Some(State::DollarQuoted(tag));
                    skip = advance - idx;
                }
                if let Some(next) = next {
                    push(SegmentKind::Code, start..idx);
                    start = idx;
                    state = next;
                    idx += skip;
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        push(SegmentKind::Literal, start..idx + 1);
                        start = idx + 1;
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        push(SegmentKind::QuotedIdent, start..idx + 1);
                        start = idx + 1;
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    push(SegmentKind::Comment, start..idx);
                    start = idx;
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    idx += 1;
                    if depth == 1 {
                        push(SegmentKind::Comment, start..idx + 1);
                        start = idx + 1;
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    let end = idx + tag.len() + 2;
                    push(SegmentKind::Literal, start..end);
                    start = end;
                    idx = end - 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    push(kind_of(&state), start..bytes.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<(SegmentKind, &str)> {
        segments(sql)
            .into_iter()
            .map(|s| (s.kind, &sql[s.range]))
            .collect()
    }

    #[test]
    fn separates_literals_and_comments() {
        let sql = "select 'a;b' -- c;\nfrom \"t\" /* x */";
        assert_eq!(
            kinds(sql),
            vec![
                (SegmentKind::Code, "select "),
                (SegmentKind::Literal, "'a;b'"),
                (SegmentKind::Code, " "),
                (SegmentKind::Comment, "-- c;"),
                (SegmentKind::Code, "\nfrom "),
                (SegmentKind::QuotedIdent, "\"t\""),
                (SegmentKind::Code, " "),
                (SegmentKind::Comment, "/* x */"),
            ]
        );
    }

    #[test]
    fn nested_block_comments_close_once() {
        let sql = "/* a /* b */ c */select 1";
        assert_eq!(
            kinds(sql),
            vec![
                (SegmentKind::Comment, "/* a /* b */ c */"),
                (SegmentKind::Code, "select 1"),
            ]
        );
    }

    #[test]
    fn dollar_quoted_body_is_a_literal() {
        let sql = "do $fn$ begin; end; $fn$; select $1";
        assert_eq!(
            kinds(sql),
            vec![
                (SegmentKind::Code, "do "),
                (SegmentKind::Literal, "$fn$ begin; end; $fn$"),
                (SegmentKind::Code, "; select $1"),
            ]
        );
    }

    #[test]
    fn escaped_quotes_stay_inside_literal() {
        let sql = "'it''s' x";
        assert_eq!(
            kinds(sql),
            vec![(SegmentKind::Literal, "'it''s'"), (SegmentKind::Code, " x")]
        );
    }

    #[test]
    fn unterminated_literal_runs_to_end() {
        let sql = "select 'oops; select 2";
        assert_eq!(
            kinds(sql),
            vec![
                (SegmentKind::Code, "select "),
                (SegmentKind::Literal, "'oops; select 2"),
            ]
        );
    }
}

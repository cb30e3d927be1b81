//! Statement segmentation for SQL buffers.
//!
//! A single-pass lexer splits buffer text into ordered statement spans.
//! Semicolons separate statements only in plain SQL text: semicolons inside
//! line comments, block comments, quoted strings, quoted identifiers, and
//! dollar-quoted strings are inert. Statements that were never terminated
//! with a semicolon are split where a new line begins at column zero with a
//! statement-starting keyword.
//!
//! The lexer does not parse SQL. Classification of a span as "likely SQL"
//! looks only at its first token, which is what gates execute-at-cursor
//! affordances in the query pane.

/// A statement chunk located in the buffer.
///
/// Offsets are char (Unicode scalar) indices into the full buffer text,
/// half-open, covering the trimmed statement text including any terminating
/// semicolon. Line numbers are zero-based and inclusive on both ends.
///
/// Spans never overlap and are ordered by `start`. Whitespace-only and
/// comment-only chunks produce no span, so gaps between spans are normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementSpan {
    /// Char offset of the first char of the statement.
    pub start: usize,
    /// Char offset one past the last char of the statement.
    pub end: usize,
    /// Line the statement starts on.
    pub start_line: usize,
    /// Line the statement ends on (inclusive).
    pub end_line: usize,
    /// Whether the first token marks this chunk as executable SQL.
    pub is_likely_sql: bool,
}

impl StatementSpan {
    /// Whether `offset` falls inside this span (half-open).
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Keywords that can begin a SQL statement.
const STARTER_KEYWORDS: &[&str] = &[
    "with",
    "select",
    "insert",
    "update",
    "delete",
    "create",
    "alter",
    "drop",
    "truncate",
    "begin",
    "commit",
    "rollback",
    "grant",
    "revoke",
    "call",
    "explain",
    "analyze",
    "show",
    "describe",
];

/// Verbs that end the CTE prologue of a `WITH` statement.
const MAIN_VERBS: &[&str] = &["select", "insert", "update", "delete"];

/// Lexer state while walking the buffer.
enum Lex {
    Plain,
    LineComment,
    BlockComment,
    SingleQuoted,
    DoubleQuoted,
    /// Inside `$tag$ ... $tag$`; the payload is the tag between the dollars.
    DollarQuoted(String),
}

/// Per-chunk accumulation state, reset at every chunk boundary.
struct Chunk {
    start: usize,
    paren_depth: usize,
    has_content: bool,
    /// Content other than comments has appeared in the chunk.
    saw_code: bool,
    saw_first_token: bool,
    /// A chunk whose code opened with `WITH` holds off column-zero
    /// splitting until its main verb has been seen at paren depth zero, so
    /// a CTE body and its final query stay one statement.
    with_pending: bool,
}

impl Chunk {
    fn new(start: usize) -> Self {
        Self {
            start,
            paren_depth: 0,
            has_content: false,
            saw_code: false,
            saw_first_token: false,
            with_pending: false,
        }
    }
}

/// Splits `text` into ordered statement spans.
///
/// # Examples
///
/// ```
/// use squil_document::segment::segment;
///
/// let spans = segment("SELECT 1;\nSELECT 2;");
/// assert_eq!(spans.len(), 2);
/// assert!(spans[0].is_likely_sql);
/// assert_eq!((spans[1].start_line, spans[1].end_line), (1, 1));
/// ```
pub fn segment(text: &str) -> Vec<StatementSpan> {
    let chars: Vec<char> = text.chars().collect();
    let line_starts = line_starts(&chars);

    let mut spans = Vec::new();
    let mut state = Lex::Plain;
    let mut chunk = Chunk::new(0);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            Lex::Plain => {
                // Column-zero keyword splitting for statements that were
                // never terminated with a semicolon. Suppressed inside
                // parentheses and while a WITH prologue is still open;
                // indented continuations never reach here.
                if (i == 0 || chars[i - 1] == '\n')
                    && chunk.has_content
                    && chunk.paren_depth == 0
                    && !chunk.with_pending
                    && starter_at(&chars, i)
                {
                    push_span(&chars, &line_starts, chunk.start, i, &mut spans);
                    chunk = Chunk::new(i);
                }

                if c == '-' && chars.get(i + 1) == Some(&'-') {
                    chunk.has_content = true;
                    state = Lex::LineComment;
                    i += 2;
                } else if c == '/' && chars.get(i + 1) == Some(&'*') {
                    chunk.has_content = true;
                    state = Lex::BlockComment;
                    i += 2;
                } else if c == '\'' {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    state = Lex::SingleQuoted;
                    i += 1;
                } else if c == '"' {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    state = Lex::DoubleQuoted;
                    i += 1;
                } else if c == '$' {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    // A dollar quote opens only when a well-formed
                    // `$tag$` delimiter is present; otherwise the dollar
                    // is an ordinary char.
                    let mut j = i + 1;
                    while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    if chars.get(j) == Some(&'$') {
                        let tag: String = chars[i + 1..j].iter().collect();
                        state = Lex::DollarQuoted(tag);
                        i = j + 1;
                    } else {
                        i += 1;
                    }
                } else if c == ';' {
                    // The terminator belongs to the chunk it ends.
                    push_span(&chars, &line_starts, chunk.start, i + 1, &mut spans);
                    chunk = Chunk::new(i + 1);
                    i += 1;
                } else if c == '(' {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    chunk.paren_depth += 1;
                    i += 1;
                } else if c == ')' {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    chunk.paren_depth = chunk.paren_depth.saturating_sub(1);
                    i += 1;
                } else if c.is_ascii_alphabetic() || c == '_' {
                    chunk.has_content = true;
                    let opens_code = !chunk.saw_code;
                    chunk.saw_code = true;
                    let (token, next) = read_token(&chars, i, chars.len());
                    if !chunk.saw_first_token {
                        chunk.saw_first_token = true;
                        chunk.with_pending = opens_code && token == "with";
                    } else if chunk.with_pending
                        && chunk.paren_depth == 0
                        && MAIN_VERBS.contains(&token.as_str())
                    {
                        chunk.with_pending = false;
                    }
                    i = next;
                } else if c.is_whitespace() {
                    i += 1;
                } else {
                    chunk.has_content = true;
                    chunk.saw_code = true;
                    i += 1;
                }
            }
            Lex::LineComment => {
                if c == '\n' {
                    state = Lex::Plain;
                }
                i += 1;
            }
            Lex::BlockComment => {
                if c == '*' && chars.get(i + 1) == Some(&'/') {
                    state = Lex::Plain;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Lex::SingleQuoted => {
                if c == '\\' {
                    i += 2;
                } else if c == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        i += 2;
                    } else {
                        state = Lex::Plain;
                        i += 1;
                    }
                } else {
                    i += 1;
                }
            }
            Lex::DoubleQuoted => {
                if c == '"' {
                    if chars.get(i + 1) == Some(&'"') {
                        i += 2;
                    } else {
                        state = Lex::Plain;
                        i += 1;
                    }
                } else {
                    i += 1;
                }
            }
            Lex::DollarQuoted(ref tag) => {
                if c == '$' && dollar_close(&chars, i, tag) {
                    let advance = tag.len() + 2;
                    state = Lex::Plain;
                    i += advance;
                } else {
                    i += 1;
                }
            }
        }
    }

    // A buffer ending inside a block comment or any quote form is not yet a
    // statement; the trailing chunk is dropped entirely. A line comment is
    // closed by end of buffer.
    let terminated = matches!(state, Lex::Plain | Lex::LineComment);
    if terminated {
        push_span(&chars, &line_starts, chunk.start, chars.len(), &mut spans);
    }

    spans
}

/// Resolves the statement a cursor at `offset` refers to.
///
/// A cursor inside a span selects it. A cursor in a gap selects the previous
/// span when that span is likely SQL, otherwise the following span. Returns
/// `None` when the selected span is not likely SQL, or when there is none.
pub fn statement_at(spans: &[StatementSpan], offset: usize) -> Option<&StatementSpan> {
    if let Some(hit) = spans.iter().find(|s| s.contains(offset)) {
        return hit.is_likely_sql.then_some(hit);
    }

    if let Some(previous) = spans.iter().rev().find(|s| s.end <= offset) {
        if previous.is_likely_sql {
            return Some(previous);
        }
    }

    spans
        .iter()
        .find(|s| s.start > offset)
        .filter(|s| s.is_likely_sql)
}

/// Char offsets of every line start.
fn line_starts(chars: &[char]) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, &c) in chars.iter().enumerate() {
        if c == '\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn line_of(line_starts: &[usize], offset: usize) -> usize {
    line_starts.partition_point(|&s| s <= offset) - 1
}

/// Reads an identifier-shaped token at `i`, returning it lowercased along
/// with the index just past it. `i` must point at an ASCII letter or
/// underscore.
fn read_token(chars: &[char], i: usize, end: usize) -> (String, usize) {
    let mut j = i + 1;
    while j < end {
        let c = chars[j];
        if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
            j += 1;
        } else {
            break;
        }
    }
    let token: String = chars[i..j].iter().collect();
    (token.to_ascii_lowercase(), j)
}

fn starter_at(chars: &[char], i: usize) -> bool {
    let c = chars[i];
    if !(c.is_ascii_alphabetic() || c == '_') {
        return false;
    }
    let (token, _) = read_token(chars, i, chars.len());
    is_starter(&token)
}

fn is_starter(token: &str) -> bool {
    STARTER_KEYWORDS.contains(&token)
}

/// Whether `chars[i..]` begins the closing delimiter `$tag$`.
fn dollar_close(chars: &[char], i: usize, tag: &str) -> bool {
    let mut j = i + 1;
    for tc in tag.chars() {
        if chars.get(j) != Some(&tc) {
            return false;
        }
        j += 1;
    }
    chars.get(j) == Some(&'$')
}

/// Trims a raw chunk, classifies it, and appends a span when it has any
/// non-comment content.
fn push_span(
    chars: &[char],
    line_starts: &[usize],
    raw_start: usize,
    raw_end: usize,
    spans: &mut Vec<StatementSpan>,
) {
    let mut start = raw_start;
    while start < raw_end && chars[start].is_whitespace() {
        start += 1;
    }
    let mut end = raw_end;
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if start == end {
        return;
    }

    let Some(is_likely_sql) = classify(chars, start, end) else {
        return;
    };

    spans.push(StatementSpan {
        start,
        end,
        start_line: line_of(line_starts, start),
        end_line: line_of(line_starts, end - 1),
        is_likely_sql,
    });
}

/// Classifies a trimmed chunk by its first meaningful token, skipping
/// comments and opening parentheses. Returns `None` when the chunk has no
/// content outside comments.
fn classify(chars: &[char], start: usize, end: usize) -> Option<bool> {
    let mut i = start;
    let mut saw_content = false;

    while i < end {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '-' && i + 1 < end && chars[i + 1] == '-' {
            while i < end && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && i + 1 < end && chars[i + 1] == '*' {
            i += 2;
            while i < end && !(chars[i] == '*' && i + 1 < end && chars[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(end);
        } else if c == '(' {
            saw_content = true;
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let (token, _) = read_token(chars, i, end);
            return Some(is_starter(&token));
        } else {
            return Some(false);
        }
    }

    saw_content.then_some(false)
}

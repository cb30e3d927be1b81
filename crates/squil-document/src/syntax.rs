//! Tree-sitter backed SQL highlighter.
//!
//! Parses a snapshot with the `tree-sitter-sequel` grammar and flattens the
//! syntax tree into non-overlapping [`HighlightSpan`]s with char offsets,
//! ready for the coordinator. The grammar's conventions drive classification:
//! `keyword_*` nodes are keywords (with boolean and null literals split out),
//! `literal` nodes are disambiguated by their text, and operators appear as
//! anonymous terminal tokens rather than named nodes.

use crate::highlight::{HighlightKind, HighlightSpan, Highlighter};
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tree_sitter::{Node, Parser};

#[derive(Debug, Error)]
pub enum HighlighterError {
    #[error("failed to load SQL grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),
}

/// SQL highlighter over the sequel grammar.
///
/// The tree-sitter parser is kept behind a mutex so the highlighter can be
/// shared as `Arc<dyn Highlighter>`; parsing itself is synchronous and fast
/// enough to run inline on request tasks.
///
/// # Example
///
/// ```
/// use squil_document::syntax::SqlHighlighter;
///
/// let highlighter = SqlHighlighter::new().unwrap();
/// let spans = highlighter.scan("SELECT * FROM users");
/// assert!(!spans.is_empty());
/// ```
pub struct SqlHighlighter {
    parser: Mutex<Parser>,
}

impl SqlHighlighter {
    pub fn new() -> Result<Self, HighlighterError> {
        let mut parser = Parser::new();
        let language = tree_sitter::Language::new(tree_sitter_sequel::LANGUAGE);
        parser.set_language(&language)?;
        Ok(Self {
            parser: Mutex::new(parser),
        })
    }

    /// Highlights `text`, returning spans sorted by start with overlaps
    /// merged. Offsets are char indices into `text`.
    pub fn scan(&self, text: &str) -> Vec<HighlightSpan> {
        let tree = {
            let mut parser = self.parser.lock();
            parser.parse(text, None)
        };
        let Some(tree) = tree else {
            return Vec::new();
        };

        let mut raw = Vec::new();
        collect(tree.root_node(), text, &mut raw);

        // Node offsets are bytes; the rest of the pipeline works in chars.
        let char_starts: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        let to_char = |byte: usize| char_starts.partition_point(|&start| start < byte);

        let mut spans: Vec<HighlightSpan> = raw
            .into_iter()
            .map(|(start, end, kind)| HighlightSpan {
                start: to_char(start),
                end: to_char(end),
                kind,
            })
            .filter(|span| span.end > span.start)
            .collect();
        spans.sort_by_key(|span| span.start);
        merge_overlapping(spans)
    }

    /// The highlight kind at a char offset, `Default` when unstyled.
    pub fn kind_at(&self, text: &str, offset: usize) -> HighlightKind {
        self.scan(text)
            .into_iter()
            .find(|span| offset >= span.start && offset < span.end)
            .map(|span| span.kind)
            .unwrap_or_default()
    }

    /// Ranges the parser flagged as errors, for diagnostic underlines.
    pub fn error_spans(&self, text: &str) -> Vec<HighlightSpan> {
        self.scan(text)
            .into_iter()
            .filter(|span| span.kind == HighlightKind::Error)
            .collect()
    }
}

#[async_trait]
impl Highlighter for SqlHighlighter {
    async fn highlight(&self, text: &str, _language: &str) -> anyhow::Result<Vec<HighlightSpan>> {
        Ok(self.scan(text))
    }
}

fn classify(node: &Node, text: &str) -> HighlightKind {
    let kind = node.kind();
    if let Some(keyword) = kind.strip_prefix("keyword_") {
        return match keyword {
            "true" | "false" => HighlightKind::Boolean,
            "null" => HighlightKind::Null,
            _ => HighlightKind::Keyword,
        };
    }
    match kind {
        "comment" | "comment_statement" => HighlightKind::Comment,
        "invocation" => HighlightKind::Function,
        "identifier" => HighlightKind::Identifier,
        "ERROR" => HighlightKind::Error,
        "literal" => classify_literal(&text[node.byte_range()]),
        _ => HighlightKind::Default,
    }
}

fn classify_literal(literal: &str) -> HighlightKind {
    if literal.starts_with('\'') || literal.starts_with('"') {
        HighlightKind::String
    } else if literal.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        HighlightKind::Number
    } else {
        // TRUE/FALSE/NULL literals carry keyword_ children; recursion below
        // picks those up with their own kinds.
        HighlightKind::Default
    }
}

fn is_operator(token: &str) -> bool {
    matches!(
        token,
        "=" | "!="
            | "<>"
            | "<"
            | "<="
            | ">"
            | ">="
            | "+"
            | "-"
            | "*"
            | "/"
            | "%"
            | "^"
            | "||"
            | "&"
            | "|"
            | "~"
    )
}

/// Walks the tree, emitting byte ranges. Classified nodes are not descended
/// into; their children would only produce nested duplicate ranges.
fn collect(node: Node, text: &str, out: &mut Vec<(usize, usize, HighlightKind)>) {
    let kind = classify(&node, text);
    if kind != HighlightKind::Default {
        out.push((node.start_byte(), node.end_byte(), kind));
        return;
    }

    // Operators are anonymous leaf tokens in this grammar.
    if !node.is_named() && node.child_count() == 0 && is_operator(&text[node.byte_range()]) {
        out.push((node.start_byte(), node.end_byte(), HighlightKind::Operator));
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, text, out);
    }
}

/// Collapses overlaps in start-sorted spans; the earlier span keeps its kind
/// and absorbs the overlapping range.
fn merge_overlapping(spans: Vec<HighlightSpan>) -> Vec<HighlightSpan> {
    let mut merged: Vec<HighlightSpan> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start < last.end => {
                last.end = last.end.max(span.end);
            }
            _ => merged.push(span),
        }
    }
    merged
}

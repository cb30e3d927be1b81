//! SQUIL Document Engine - SQL editing model behind the query pane
//!
//! The terminal surface owns rendering and key handling; this crate owns the
//! text. It keeps the authoritative line store, maps between char indices and
//! display columns, segments the buffer into SQL statements, and coordinates
//! asynchronous syntax highlighting.
//!
//! ## Architecture
//!
//! - **LineStore**: ordered lines with stable ids that survive edits on other
//!   lines
//! - **Coordinate mapping**: grapheme- and tab-aware char index to display
//!   column conversion
//! - **Statement segmentation**: single-pass lexer that splits the buffer
//!   into statement spans without parsing SQL
//! - **Highlight coordination**: versioned snapshot requests where the last
//!   issued request always wins
//! - **Debouncer**: trailing-edge coalescing for host change notifications
//!
//! ## Surface protocol
//!
//! The engine and the render surface reconcile line by line:
//!
//! - Engine-initiated text (initial load, splits, merges, pastes) leaves the
//!   line *unrendered* and queues a [`SurfaceCommand::SetLineText`] for it.
//! - The surface reports every line it has drawn via
//!   [`SqlDocument::reconcile_line`]. The first report after a `SetLineText`
//!   is the echo of the engine's own content and marks the line rendered
//!   without counting as a user edit.
//! - Reports for rendered lines are user edits: a changed single-line report
//!   replaces the line, and a report containing `'\n'` is a paste that
//!   splits into multiple lines.
//!
//! Commands accumulate until the surface drains them with
//! [`SqlDocument::drain_commands`].

pub mod config;
pub mod coords;
pub mod debounce;
pub mod highlight;
pub mod segment;
pub mod store;
pub mod syntax;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub use config::DocumentConfig;
pub use debounce::Debouncer;
pub use highlight::{
    HighlightCoordinator, HighlightKind, HighlightSpan, HighlightTheme, Highlighter, LineSpan,
    StyleId, StyleRegistry, TextStyle,
};
pub use segment::{statement_at, StatementSpan};
pub use store::{LineId, LineStore};
pub use syntax::{HighlighterError, SqlHighlighter};

/// Cursor location as the surface understands it: a line index plus a
/// display column, not a char index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

/// Target of a horizontal cursor jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEdge {
    Start,
    End,
}

/// Instruction queued for the render surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    /// Replace the widget content of the line identified by `id`.
    SetLineText { id: LineId, text: String },
    /// Move the visible cursor.
    PlaceCursor { line: usize, column: usize },
}

/// Host callback for debounced document change notifications.
pub trait ChangeSink: Send + Sync {
    fn text_changed(&self, text: &str, modified: bool);
}

/// The document engine for one editor pane.
///
/// Owns the line store, cursor, statement spans, and the highlight
/// coordinator for a single document. All methods are synchronous; the
/// asynchronous work (highlighting, debounced notifications) runs on spawned
/// tasks, so the engine must be created and used within a Tokio runtime.
pub struct SqlDocument {
    store: LineStore,
    config: DocumentConfig,
    cursor: CursorPosition,
    /// Column vertical motion tries to return to.
    sticky_column: usize,
    spans: Vec<StatementSpan>,
    coordinator: HighlightCoordinator,
    debouncer: Debouncer,
    sink: Option<Arc<dyn ChangeSink>>,
    commands: Vec<SurfaceCommand>,
    modified: bool,
    disposed: bool,
}

impl SqlDocument {
    /// Opens a document with the default highlight theme.
    pub fn new(text: &str, config: DocumentConfig, highlighter: Arc<dyn Highlighter>) -> Self {
        Self::with_theme(text, config, highlighter, &HighlightTheme::default())
    }

    /// Opens a document. Queues a [`SurfaceCommand::SetLineText`] per line
    /// and issues the initial highlight request; the document starts
    /// unmodified.
    pub fn with_theme(
        text: &str,
        config: DocumentConfig,
        highlighter: Arc<dyn Highlighter>,
        theme: &HighlightTheme,
    ) -> Self {
        let coordinator = HighlightCoordinator::new(highlighter, config.language.clone(), theme);
        let debouncer = Debouncer::new(Duration::from_millis(config.debounce_ms));
        let mut document = Self {
            store: LineStore::from_text(text),
            config,
            cursor: CursorPosition::default(),
            sticky_column: 0,
            spans: Vec::new(),
            coordinator,
            debouncer,
            sink: None,
            commands: Vec::new(),
            modified: false,
            disposed: false,
        };
        document.push_all_line_commands();
        document.refresh_derived();
        document
    }

    /// Registers the host callback for debounced change notifications.
    pub fn set_change_sink(&mut self, sink: Arc<dyn ChangeSink>) {
        self.sink = Some(sink);
    }

    pub fn text(&self) -> String {
        self.store.full_text()
    }

    pub fn line_count(&self) -> usize {
        self.store.len()
    }

    pub fn line_text(&self, index: usize) -> Option<&str> {
        self.store.text_at(index)
    }

    pub fn line_id(&self, index: usize) -> Option<LineId> {
        self.store.id_at(index)
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    /// Statement spans for the current text, in document order.
    pub fn statements(&self) -> &[StatementSpan] {
        &self.spans
    }

    /// The highlight coordinator, for span queries and applied-version
    /// subscriptions.
    pub fn highlights(&self) -> &HighlightCoordinator {
        &self.coordinator
    }

    /// Highlight spans for a line, in display columns.
    pub fn line_highlights(&self, index: usize) -> Vec<LineSpan> {
        match self.store.id_at(index) {
            Some(id) => self.coordinator.line_spans(id),
            None => Vec::new(),
        }
    }

    /// The cursor as a char offset into the full text.
    pub fn cursor_offset(&self) -> usize {
        let line_start = self.store.line_start_offset(self.cursor.line);
        let text = self.store.text_at(self.cursor.line).unwrap_or("");
        line_start + coords::char_index_at_column(text, self.cursor.column, self.config.tab_width)
    }

    /// The statement the cursor is in, or the nearest likely-SQL neighbor.
    pub fn statement_at_cursor(&self) -> Option<StatementSpan> {
        segment::statement_at(&self.spans, self.cursor_offset()).copied()
    }

    /// Applies a line as reported by the surface after drawing it.
    ///
    /// The first report for an unrendered line is the echo of engine content
    /// and only marks the line rendered. Later reports are user edits.
    /// Reports containing `'\n'` are split into multiple lines on either
    /// path, with the cursor placed after the inserted text; a line record
    /// never holds an embedded newline.
    pub fn reconcile_line(&mut self, index: usize, reported: &str) {
        if self.disposed {
            return;
        }
        let Some(current) = self.store.text_at(index).map(str::to_string) else {
            debug!(index, "ignoring reconcile for an out-of-range line");
            return;
        };

        if !self.store.is_rendered(index) {
            self.store.mark_rendered(index);
            if reported != current {
                // The surface mutated the line while drawing it. Adopt the
                // surface's version, still without counting it as an edit.
                if reported.contains('\n') {
                    self.apply_paste(index, reported);
                } else {
                    self.store.set_text_at(index, reported, true);
                }
                self.refresh_derived();
            }
            return;
        }

        if reported == current {
            return;
        }

        if reported.contains('\n') {
            self.apply_paste(index, reported);
        } else {
            self.store.set_text_at(index, reported, true);
        }
        self.after_mutation();
    }

    /// Splits the cursor line at the cursor column.
    pub fn split_at_cursor(&mut self) {
        if self.disposed {
            return;
        }
        let line = self.cursor.line;
        let Some(text) = self.store.text_at(line).map(str::to_string) else {
            return;
        };
        let split_char =
            coords::char_index_at_column(&text, self.cursor.column, self.config.tab_width);
        let split_byte = coords::byte_offset(&text, split_char);
        let (head, tail) = text.split_at(split_byte);

        self.store.set_text_at(line, head, false);
        let tail_id = self.store.insert(line + 1, tail);
        if let Some(head_id) = self.store.id_at(line) {
            self.commands.push(SurfaceCommand::SetLineText {
                id: head_id,
                text: head.to_string(),
            });
        }
        self.commands.push(SurfaceCommand::SetLineText {
            id: tail_id,
            text: tail.to_string(),
        });
        self.set_cursor_internal(line + 1, 0);
        self.after_mutation();
    }

    /// Joins the cursor line onto the previous one, cursor landing at the
    /// seam. No-op on the first line.
    pub fn merge_with_previous(&mut self) {
        if self.disposed {
            return;
        }
        let line = self.cursor.line;
        if line == 0 {
            return;
        }
        let Some(current) = self.store.text_at(line).map(str::to_string) else {
            return;
        };
        let Some(previous) = self.store.text_at(line - 1).map(str::to_string) else {
            return;
        };
        let join_column = self.store.display_width(line - 1, self.config.tab_width);

        let joined = previous + &current;
        self.store.set_text_at(line - 1, &joined, false);
        self.store.remove(line);
        if let Some(id) = self.store.id_at(line - 1) {
            self.commands
                .push(SurfaceCommand::SetLineText { id, text: joined });
        }
        self.set_cursor_internal(line - 1, join_column);
        self.after_mutation();
    }

    /// Joins the next line onto the cursor line, cursor landing at the
    /// seam. No-op on the last line.
    pub fn merge_with_next(&mut self) {
        if self.disposed {
            return;
        }
        let line = self.cursor.line;
        if line + 1 >= self.store.len() {
            return;
        }
        let Some(current) = self.store.text_at(line).map(str::to_string) else {
            return;
        };
        let Some(next) = self.store.text_at(line + 1).map(str::to_string) else {
            return;
        };
        let join_column = self.store.display_width(line, self.config.tab_width);

        let joined = current + &next;
        self.store.set_text_at(line, &joined, false);
        self.store.remove(line + 1);
        if let Some(id) = self.store.id_at(line) {
            self.commands
                .push(SurfaceCommand::SetLineText { id, text: joined });
        }
        self.set_cursor_internal(line, join_column);
        self.after_mutation();
    }

    /// Replaces the whole document with fresh content. All line ids are
    /// invalidated, the cursor is clamped into the new text, and the
    /// modified flag is cleared; the change notification still fires.
    pub fn set_text(&mut self, text: &str) {
        if self.disposed {
            return;
        }
        self.reset_lines(text);
        self.modified = false;
        self.refresh_and_notify();
    }

    /// Replaces the whole document as an edit. Same as [`set_text`] except
    /// the document counts as modified afterwards; rewriting features such
    /// as formatting route through this.
    pub fn apply_edit(&mut self, text: &str) {
        if self.disposed {
            return;
        }
        self.reset_lines(text);
        self.after_mutation();
    }

    /// Moves the cursor, clamping to the document. Out-of-range input is
    /// clamped, never an error.
    pub fn set_cursor(&mut self, line: usize, column: usize) {
        if self.disposed {
            return;
        }
        self.set_cursor_internal(line, column);
    }

    /// Moves the cursor `delta` lines, keeping the sticky column: moving
    /// through a short line and back restores the original column.
    pub fn move_vertical(&mut self, delta: isize) {
        if self.disposed {
            return;
        }
        let last = self.store.len() as isize - 1;
        let line = (self.cursor.line as isize + delta).clamp(0, last) as usize;
        let width = self.store.display_width(line, self.config.tab_width);
        let column = self.sticky_column.min(width);
        self.cursor = CursorPosition { line, column };
        self.commands
            .push(SurfaceCommand::PlaceCursor { line, column });
    }

    /// Jumps to the start or end of the cursor line. A cursor already at the
    /// requested edge wraps to the adjacent line instead: `Start` moves to
    /// the end of the previous line, `End` to column 0 of the next. No-op at
    /// the document boundaries.
    pub fn jump_horizontal(&mut self, edge: LineEdge) {
        if self.disposed {
            return;
        }
        let line = self.cursor.line;
        let width = self.store.display_width(line, self.config.tab_width);
        let (line, column) = match edge {
            LineEdge::Start if self.cursor.column == 0 => {
                if line == 0 {
                    return;
                }
                let previous = line - 1;
                let width = self.store.display_width(previous, self.config.tab_width);
                (previous, width)
            }
            LineEdge::Start => (line, 0),
            LineEdge::End if self.cursor.column == width => {
                if line + 1 >= self.store.len() {
                    return;
                }
                (line + 1, 0)
            }
            LineEdge::End => (line, width),
        };
        self.cursor = CursorPosition { line, column };
        self.sticky_column = column;
        self.commands
            .push(SurfaceCommand::PlaceCursor { line, column });
    }

    /// Swaps the highlight theme, recoloring existing spans without a new
    /// highlight request.
    pub fn set_theme(&self, theme: &HighlightTheme) {
        self.coordinator.set_theme(theme);
    }

    /// Clears the modified flag, e.g. after the host saves the document.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Takes the queued surface commands, leaving the queue empty.
    pub fn drain_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Runs the pending change notification now instead of after the quiet
    /// period.
    pub fn flush_changes(&self) {
        self.debouncer.flush();
    }

    /// Stops the document: cancels pending notifications, discards in-flight
    /// highlight responses, and turns every later edit into a no-op.
    /// Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.debouncer.cancel();
        self.coordinator.dispose();
    }

    fn set_cursor_internal(&mut self, line: usize, column: usize) {
        let line = line.min(self.store.len().saturating_sub(1));
        let width = self.store.display_width(line, self.config.tab_width);
        let column = column.min(width);
        self.cursor = CursorPosition { line, column };
        self.sticky_column = column;
        self.commands
            .push(SurfaceCommand::PlaceCursor { line, column });
    }

    fn apply_paste(&mut self, index: usize, reported: &str) {
        let parts: Vec<&str> = reported.split('\n').collect();
        self.store.set_text_at(index, parts[0], false);
        if let Some(id) = self.store.id_at(index) {
            self.commands.push(SurfaceCommand::SetLineText {
                id,
                text: parts[0].to_string(),
            });
        }
        for (extra, part) in parts[1..].iter().enumerate() {
            let id = self.store.insert(index + 1 + extra, part);
            self.commands.push(SurfaceCommand::SetLineText {
                id,
                text: part.to_string(),
            });
        }
        let last = index + parts.len() - 1;
        let column = self.store.display_width(last, self.config.tab_width);
        self.set_cursor_internal(last, column);
    }

    fn reset_lines(&mut self, text: &str) {
        self.store.reset(text);
        self.push_all_line_commands();
        let CursorPosition { line, column } = self.cursor;
        self.set_cursor_internal(line, column);
    }

    fn push_all_line_commands(&mut self) {
        for index in 0..self.store.len() {
            if let (Some(id), Some(text)) = (self.store.id_at(index), self.store.text_at(index)) {
                let text = text.to_string();
                self.commands.push(SurfaceCommand::SetLineText { id, text });
            }
        }
    }

    /// Re-derives statement spans and re-requests highlights without
    /// touching the modified flag.
    fn refresh_derived(&mut self) {
        let text = self.store.full_text();
        self.spans = segment::segment(&text);
        self.request_highlights(text);
    }

    fn after_mutation(&mut self) {
        self.modified = true;
        self.refresh_and_notify();
    }

    // The sink call captures the modified flag as it is here, so the flag
    // must be settled before this runs.
    fn refresh_and_notify(&mut self) {
        let text = self.store.full_text();
        self.spans = segment::segment(&text);
        self.request_highlights(text.clone());
        self.notify_change(text);
    }

    fn request_highlights(&mut self, text: String) {
        let ids: Vec<LineId> = self.store.ids().collect();
        let live: HashSet<LineId> = ids.iter().copied().collect();
        self.coordinator.retain_lines(move |id| live.contains(&id));
        self.coordinator
            .request(text, ids, self.config.tab_width);
    }

    fn notify_change(&mut self, snapshot: String) {
        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            let modified = self.modified;
            self.debouncer
                .schedule(move || sink.text_changed(&snapshot, modified));
        }
    }
}

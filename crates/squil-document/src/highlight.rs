//! Asynchronous highlight coordination.
//!
//! Highlighting is computed from full document snapshots by an external
//! [`Highlighter`], which may be slow, out of order, or failing. The
//! [`HighlightCoordinator`] stamps every request with a strictly increasing
//! version and applies a response only while its version is still the most
//! recently issued one, so a slow response for version 1 can never overwrite
//! the display of version 3. The winner is always the last request *issued*,
//! not the last response to complete.
//!
//! Accepted document-wide spans are cut per line, converted to display
//! columns, and stored keyed by [`LineId`] so the render surface can fetch
//! highlights for exactly the lines it redraws. Styling is indirect: spans
//! carry a semantic [`HighlightKind`] plus a dense [`StyleId`] resolved
//! through the current theme, and a theme change recolors the stored spans
//! without re-invoking the highlighter.

use crate::coords;
use crate::store::LineId;
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Semantic classification of a highlighted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    /// SQL keywords (SELECT, FROM, WHERE, ...)
    Keyword,
    /// String literals
    String,
    /// Line and block comments
    Comment,
    /// Numeric literals
    Number,
    /// Table names, column names, aliases
    Identifier,
    /// Operators (+, -, =, <>, ...)
    Operator,
    /// Function invocations (COUNT, SUM, ...)
    Function,
    /// Punctuation
    Punctuation,
    /// TRUE / FALSE literals
    Boolean,
    /// NULL literal
    Null,
    /// Ranges the parser could not make sense of
    Error,
    /// Unstyled text
    Default,
}

impl HighlightKind {
    /// Every kind, in the order style ids are assigned.
    pub const ALL: [HighlightKind; 12] = [
        HighlightKind::Keyword,
        HighlightKind::String,
        HighlightKind::Comment,
        HighlightKind::Number,
        HighlightKind::Identifier,
        HighlightKind::Operator,
        HighlightKind::Function,
        HighlightKind::Punctuation,
        HighlightKind::Boolean,
        HighlightKind::Null,
        HighlightKind::Error,
        HighlightKind::Default,
    ];
}

impl Default for HighlightKind {
    fn default() -> Self {
        HighlightKind::Default
    }
}

/// A highlighted range in a document snapshot.
///
/// Offsets are char (Unicode scalar) indices into the snapshot, half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightSpan {
    pub start: usize,
    pub end: usize,
    pub kind: HighlightKind,
}

/// Render attributes for one highlight kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextStyle {
    /// Foreground color as a hex string, e.g. `"#c678dd"`.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
}

impl TextStyle {
    pub fn with_color(hex: &str) -> Self {
        Self {
            color: Some(hex.to_string()),
            ..Self::default()
        }
    }
}

/// Mapping from highlight kinds to text styles.
///
/// Kinds missing from the table fall back to the unstyled default, so a
/// partial theme is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HighlightTheme {
    styles: HashMap<HighlightKind, TextStyle>,
}

impl HighlightTheme {
    /// Parses a theme from JSON, e.g.
    /// `{"keyword": {"color": "#c678dd", "bold": true}}`.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse highlight theme")
    }

    /// The style for `kind`, or the default style when the theme does not
    /// define one.
    pub fn style_for(&self, kind: HighlightKind) -> TextStyle {
        self.styles.get(&kind).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, kind: HighlightKind, style: TextStyle) {
        self.styles.insert(kind, style);
    }
}

impl Default for HighlightTheme {
    fn default() -> Self {
        let mut styles = HashMap::new();
        styles.insert(HighlightKind::Keyword, TextStyle::with_color("#c678dd"));
        styles.insert(HighlightKind::String, TextStyle::with_color("#98c379"));
        styles.insert(
            HighlightKind::Comment,
            TextStyle {
                color: Some("#5c6370".to_string()),
                italic: true,
                ..TextStyle::default()
            },
        );
        styles.insert(HighlightKind::Number, TextStyle::with_color("#d19a66"));
        styles.insert(HighlightKind::Operator, TextStyle::with_color("#56b6c2"));
        styles.insert(HighlightKind::Function, TextStyle::with_color("#61afef"));
        styles.insert(HighlightKind::Boolean, TextStyle::with_color("#d19a66"));
        styles.insert(HighlightKind::Null, TextStyle::with_color("#d19a66"));
        styles.insert(
            HighlightKind::Error,
            TextStyle {
                color: Some("#e06c75".to_string()),
                underline: true,
                ..TextStyle::default()
            },
        );
        Self { styles }
    }
}

/// Dense identifier of a resolved style, stable until the next theme change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StyleId(pub u16);

/// Resolved kind-to-style table for the active theme.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    ids: HashMap<HighlightKind, StyleId>,
    styles: Vec<TextStyle>,
}

impl StyleRegistry {
    pub fn from_theme(theme: &HighlightTheme) -> Self {
        let mut registry = Self::default();
        registry.rebuild(theme);
        registry
    }

    /// Re-resolves every kind against `theme`. Ids are assigned in
    /// [`HighlightKind::ALL`] order, so they are stable across rebuilds.
    pub fn rebuild(&mut self, theme: &HighlightTheme) {
        self.ids.clear();
        self.styles.clear();
        for (index, kind) in HighlightKind::ALL.iter().enumerate() {
            self.ids.insert(*kind, StyleId(index as u16));
            self.styles.push(theme.style_for(*kind));
        }
    }

    pub fn style_id(&self, kind: HighlightKind) -> StyleId {
        self.ids.get(&kind).copied().unwrap_or(StyleId(0))
    }

    pub fn style(&self, id: StyleId) -> Option<&TextStyle> {
        self.styles.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// A highlight clipped to a single line, in display columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start_col: usize,
    pub end_col: usize,
    pub kind: HighlightKind,
    pub style: StyleId,
}

/// Computes highlight spans for a document snapshot.
///
/// Implementations may run anywhere (in process, remote service) and may
/// fail; the coordinator discards stale responses and treats a failure of
/// the current version as an empty span set.
#[async_trait]
pub trait Highlighter: Send + Sync {
    async fn highlight(&self, text: &str, language: &str) -> anyhow::Result<Vec<HighlightSpan>>;
}

struct CoordinatorState {
    registry: StyleRegistry,
    by_line: HashMap<LineId, Vec<LineSpan>>,
}

/// Issues versioned highlight requests and applies the winning response.
///
/// The coordinator owns no tasks beyond the one spawned per request; dropped
/// or superseded requests simply see a newer version and return without
/// touching shared state. After [`dispose`](Self::dispose) every outstanding
/// completion is a no-op.
pub struct HighlightCoordinator {
    highlighter: Arc<dyn Highlighter>,
    language: String,
    latest: Arc<AtomicU64>,
    disposed: Arc<AtomicBool>,
    state: Arc<Mutex<CoordinatorState>>,
    applied_tx: Arc<watch::Sender<u64>>,
}

impl HighlightCoordinator {
    pub fn new(
        highlighter: Arc<dyn Highlighter>,
        language: impl Into<String>,
        theme: &HighlightTheme,
    ) -> Self {
        let (applied_tx, _) = watch::channel(0);
        Self {
            highlighter,
            language: language.into(),
            latest: Arc::new(AtomicU64::new(0)),
            disposed: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(CoordinatorState {
                registry: StyleRegistry::from_theme(theme),
                by_line: HashMap::new(),
            })),
            applied_tx: Arc::new(applied_tx),
        }
    }

    /// Issues a highlight request for `snapshot`, superseding any request
    /// still in flight. `line_ids` must be the ids of the snapshot's lines
    /// in document order. Returns the version assigned to the request.
    ///
    /// Must be called within a Tokio runtime.
    #[tracing::instrument(skip(self, snapshot, line_ids), fields(chars = snapshot.len()))]
    pub fn request(&self, snapshot: String, line_ids: Vec<LineId>, tab_width: usize) -> u64 {
        let version = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if self.disposed.load(Ordering::SeqCst) {
            return version;
        }
        debug!(version, "issuing highlight request");

        let highlighter = Arc::clone(&self.highlighter);
        let language = self.language.clone();
        let latest = Arc::clone(&self.latest);
        let disposed = Arc::clone(&self.disposed);
        let state = Arc::clone(&self.state);
        let applied_tx = Arc::clone(&self.applied_tx);

        tokio::spawn(async move {
            let result = highlighter.highlight(&snapshot, &language).await;
            if disposed.load(Ordering::SeqCst) {
                return;
            }
            if latest.load(Ordering::SeqCst) != version {
                debug!(version, "discarding stale highlight response");
                return;
            }
            let spans = match result {
                Ok(spans) => spans,
                Err(error) => {
                    warn!(version, %error, "highlighter failed, clearing highlights");
                    Vec::new()
                }
            };

            let mut guard = state.lock();
            // The latest version may have moved while the response was in
            // flight to the lock.
            if disposed.load(Ordering::SeqCst) || latest.load(Ordering::SeqCst) != version {
                return;
            }
            guard.by_line = remap_spans(&spans, &snapshot, &line_ids, tab_width, &guard.registry);
            // Published under the lock so the applied version cannot move
            // backwards once a newer response has landed.
            applied_tx.send_replace(version);
        });

        version
    }

    /// The version of the most recently issued request.
    pub fn version(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// The version of the most recently applied response, `0` before any.
    pub fn applied_version(&self) -> u64 {
        *self.applied_tx.borrow()
    }

    /// A receiver that observes every applied version.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.applied_tx.subscribe()
    }

    /// Highlight spans for one line, sorted by start column.
    pub fn line_spans(&self, id: LineId) -> Vec<LineSpan> {
        self.state
            .lock()
            .by_line
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    /// Drops stored spans for lines that no longer exist.
    pub fn retain_lines(&self, keep: impl Fn(LineId) -> bool) {
        self.state.lock().by_line.retain(|id, _| keep(*id));
    }

    /// Swaps the theme, recoloring stored spans against the new registry.
    /// The highlighter is not re-invoked; span geometry is unchanged.
    pub fn set_theme(&self, theme: &HighlightTheme) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.registry.rebuild(theme);
        for spans in state.by_line.values_mut() {
            for span in spans.iter_mut() {
                span.style = state.registry.style_id(span.kind);
            }
        }
    }

    /// Resolved style for a style id under the current theme.
    pub fn style(&self, id: StyleId) -> Option<TextStyle> {
        self.state.lock().registry.style(id).cloned()
    }

    /// Style id for a kind under the current theme.
    pub fn style_id(&self, kind: HighlightKind) -> StyleId {
        self.state.lock().registry.style_id(kind)
    }

    /// Stops the coordinator: in-flight responses are discarded and later
    /// requests are not dispatched.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Distributes snapshot-wide spans onto lines, converting char offsets to
/// display columns. Spans that cross a line boundary are dropped.
fn remap_spans(
    spans: &[HighlightSpan],
    snapshot: &str,
    line_ids: &[LineId],
    tab_width: usize,
    registry: &StyleRegistry,
) -> HashMap<LineId, Vec<LineSpan>> {
    let lines: Vec<&str> = snapshot.split('\n').collect();
    let mut line_starts = Vec::with_capacity(lines.len());
    let mut line_chars = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in &lines {
        line_starts.push(offset);
        let chars = coords::char_len(line);
        line_chars.push(chars);
        offset += chars + 1;
    }

    let mut by_line: HashMap<LineId, Vec<LineSpan>> = HashMap::new();
    for span in spans {
        if span.end <= span.start {
            continue;
        }
        let line = line_starts.partition_point(|&start| start <= span.start) - 1;
        let Some(&id) = line_ids.get(line) else {
            continue;
        };
        if span.end > line_starts[line] + line_chars[line] {
            debug!(
                start = span.start,
                end = span.end,
                "dropping highlight span crossing a line boundary"
            );
            continue;
        }
        let local_start = span.start - line_starts[line];
        let local_end = span.end - line_starts[line];
        by_line.entry(id).or_default().push(LineSpan {
            start_col: coords::display_column(lines[line], local_start, tab_width),
            end_col: coords::display_column(lines[line], local_end, tab_width),
            kind: span.kind,
            style: registry.style_id(span.kind),
        });
    }

    for spans in by_line.values_mut() {
        spans.sort_by_key(|span| span.start_col);
    }
    by_line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LineStore;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn span(start: usize, end: usize, kind: HighlightKind) -> HighlightSpan {
        HighlightSpan { start, end, kind }
    }

    /// Returns canned spans per snapshot text, immediately.
    struct CannedHighlighter {
        responses: HashMap<String, Vec<HighlightSpan>>,
        calls: AtomicUsize,
    }

    impl CannedHighlighter {
        fn new(responses: HashMap<String, Vec<HighlightSpan>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Highlighter for CannedHighlighter {
        async fn highlight(&self, text: &str, _language: &str) -> anyhow::Result<Vec<HighlightSpan>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses.get(text).cloned().unwrap_or_default())
        }
    }

    /// Blocks each call on a oneshot gate keyed by snapshot text, so tests
    /// control completion order.
    struct GatedHighlighter {
        gates: Mutex<HashMap<String, oneshot::Receiver<anyhow::Result<Vec<HighlightSpan>>>>>,
        calls: AtomicUsize,
    }

    impl GatedHighlighter {
        fn new() -> Self {
            Self {
                gates: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn gate(&self, text: &str) -> oneshot::Sender<anyhow::Result<Vec<HighlightSpan>>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(text.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl Highlighter for GatedHighlighter {
        async fn highlight(&self, text: &str, _language: &str) -> anyhow::Result<Vec<HighlightSpan>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gates.lock().remove(text);
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Ok(Vec::new())),
                None => Ok(Vec::new()),
            }
        }
    }

    async fn wait_for_version(coordinator: &HighlightCoordinator, version: u64) {
        let mut rx = coordinator.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *rx.borrow_and_update() < version {
                rx.changed().await.expect("coordinator dropped");
            }
        })
        .await
        .expect("timed out waiting for highlight version");
    }

    #[test]
    fn test_style_registry_assigns_dense_stable_ids() {
        let theme = HighlightTheme::default();
        let registry = StyleRegistry::from_theme(&theme);

        assert_eq!(registry.len(), HighlightKind::ALL.len());
        let keyword = registry.style_id(HighlightKind::Keyword);
        let string = registry.style_id(HighlightKind::String);
        assert_ne!(keyword, string);

        let rebuilt = StyleRegistry::from_theme(&theme);
        assert_eq!(rebuilt.style_id(HighlightKind::Keyword), keyword);
    }

    #[test]
    fn test_theme_falls_back_to_default_style() {
        let theme = HighlightTheme::default();
        assert_eq!(theme.style_for(HighlightKind::Punctuation), TextStyle::default());
        assert!(theme.style_for(HighlightKind::Keyword).color.is_some());
    }

    #[test]
    fn test_theme_from_json() {
        let theme =
            HighlightTheme::from_json(r##"{"keyword": {"color": "#ff0000", "bold": true}}"##)
                .unwrap();
        let style = theme.style_for(HighlightKind::Keyword);
        assert_eq!(style.color.as_deref(), Some("#ff0000"));
        assert!(style.bold);
        assert!(HighlightTheme::from_json("not json").is_err());
    }

    #[test]
    fn test_remap_drops_spans_crossing_line_boundaries() {
        let store = LineStore::from_text("ab\ncd");
        let ids: Vec<LineId> = store.ids().collect();
        let registry = StyleRegistry::from_theme(&HighlightTheme::default());

        let spans = [
            span(0, 2, HighlightKind::Keyword),
            // Crosses the newline between the lines.
            span(1, 4, HighlightKind::String),
            span(3, 5, HighlightKind::Number),
        ];
        let by_line = remap_spans(&spans, "ab\ncd", &ids, 4, &registry);

        assert_eq!(by_line[&ids[0]].len(), 1);
        assert_eq!(by_line[&ids[0]][0].kind, HighlightKind::Keyword);
        assert_eq!(by_line[&ids[1]].len(), 1);
        assert_eq!((by_line[&ids[1]][0].start_col, by_line[&ids[1]][0].end_col), (0, 2));
    }

    #[test]
    fn test_remap_converts_to_display_columns() {
        let text = "\tSELECT\n世x";
        let store = LineStore::from_text(text);
        let ids: Vec<LineId> = store.ids().collect();
        let registry = StyleRegistry::from_theme(&HighlightTheme::default());

        let spans = [
            // SELECT after the tab: chars 1..7 on line 0.
            span(1, 7, HighlightKind::Keyword),
            // The wide char on line 1: chars 8..9 in the snapshot.
            span(8, 9, HighlightKind::Identifier),
        ];
        let by_line = remap_spans(&spans, text, &ids, 4, &registry);

        assert_eq!((by_line[&ids[0]][0].start_col, by_line[&ids[0]][0].end_col), (4, 10));
        assert_eq!((by_line[&ids[1]][0].start_col, by_line[&ids[1]][0].end_col), (0, 2));
    }

    #[test]
    fn test_remap_sorts_spans_within_a_line() {
        let store = LineStore::from_text("abcdef");
        let ids: Vec<LineId> = store.ids().collect();
        let registry = StyleRegistry::from_theme(&HighlightTheme::default());

        let spans = [
            span(4, 6, HighlightKind::Number),
            span(0, 2, HighlightKind::Keyword),
        ];
        let by_line = remap_spans(&spans, "abcdef", &ids, 4, &registry);
        let cols: Vec<usize> = by_line[&ids[0]].iter().map(|s| s.start_col).collect();
        assert_eq!(cols, vec![0, 4]);
    }

    #[tokio::test]
    async fn test_latest_issued_request_wins() {
        let mut responses = HashMap::new();
        responses.insert("a".to_string(), vec![span(0, 1, HighlightKind::Keyword)]);
        responses.insert("c".to_string(), vec![span(0, 1, HighlightKind::Number)]);
        let coordinator = HighlightCoordinator::new(
            Arc::new(CannedHighlighter::new(responses)),
            "sql",
            &HighlightTheme::default(),
        );

        let store = LineStore::from_text("c");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        coordinator.request("b".to_string(), ids.clone(), 4);
        let v3 = coordinator.request("c".to_string(), ids.clone(), 4);
        assert_eq!(v3, 3);

        wait_for_version(&coordinator, 3).await;
        assert_eq!(coordinator.applied_version(), 3);
        let spans = coordinator.line_spans(ids[0]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, HighlightKind::Number);
    }

    #[tokio::test]
    async fn test_out_of_order_completions_keep_latest() {
        let highlighter = Arc::new(GatedHighlighter::new());
        let gate_a = highlighter.gate("a");
        let gate_b = highlighter.gate("b");
        let gate_c = highlighter.gate("c");
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("c");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        coordinator.request("b".to_string(), ids.clone(), 4);
        coordinator.request("c".to_string(), ids.clone(), 4);

        // Version 3 completes first, then 1, then 2.
        gate_c
            .send(Ok(vec![span(0, 1, HighlightKind::Keyword)]))
            .unwrap();
        wait_for_version(&coordinator, 3).await;

        gate_a
            .send(Ok(vec![span(0, 1, HighlightKind::Error)]))
            .unwrap();
        gate_b
            .send(Ok(vec![span(0, 1, HighlightKind::Error)]))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(coordinator.applied_version(), 3);
        let spans = coordinator.line_spans(ids[0]);
        assert_eq!(spans[0].kind, HighlightKind::Keyword);
    }

    #[tokio::test]
    async fn test_failure_of_current_version_clears_highlights() {
        let highlighter = Arc::new(GatedHighlighter::new());
        let gate_ok = highlighter.gate("ok");
        let gate_bad = highlighter.gate("bad");
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("ok");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("ok".to_string(), ids.clone(), 4);
        gate_ok
            .send(Ok(vec![span(0, 2, HighlightKind::Keyword)]))
            .unwrap();
        wait_for_version(&coordinator, 1).await;
        assert_eq!(coordinator.line_spans(ids[0]).len(), 1);

        coordinator.request("bad".to_string(), ids.clone(), 4);
        gate_bad.send(Err(anyhow::anyhow!("backend down"))).unwrap();
        wait_for_version(&coordinator, 2).await;

        assert_eq!(coordinator.applied_version(), 2);
        assert!(coordinator.line_spans(ids[0]).is_empty());
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded() {
        let highlighter = Arc::new(GatedHighlighter::new());
        let gate_a = highlighter.gate("a");
        let gate_b = highlighter.gate("b");
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("b");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        coordinator.request("b".to_string(), ids.clone(), 4);

        gate_b
            .send(Ok(vec![span(0, 1, HighlightKind::Keyword)]))
            .unwrap();
        wait_for_version(&coordinator, 2).await;

        // The stale failure must not clear version 2's result.
        gate_a.send(Err(anyhow::anyhow!("too late"))).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(coordinator.applied_version(), 2);
        assert_eq!(coordinator.line_spans(ids[0]).len(), 1);
    }

    #[tokio::test]
    async fn test_stale_success_does_not_regress_applied_version() {
        let highlighter = Arc::new(GatedHighlighter::new());
        let gate_a = highlighter.gate("a");
        let gate_b = highlighter.gate("b");
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("b");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        coordinator.request("b".to_string(), ids.clone(), 4);

        gate_b
            .send(Ok(vec![span(0, 1, HighlightKind::Keyword)]))
            .unwrap();
        wait_for_version(&coordinator, 2).await;

        gate_a
            .send(Ok(vec![span(0, 1, HighlightKind::Error)]))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // A subscriber arriving after the stale completion must see the
        // newer version immediately, never a rewound one.
        let mut rx = coordinator.subscribe();
        assert_eq!(*rx.borrow_and_update(), 2);
        assert_eq!(coordinator.applied_version(), 2);
        assert_eq!(coordinator.line_spans(ids[0])[0].kind, HighlightKind::Keyword);
    }

    #[tokio::test]
    async fn test_dispose_makes_late_responses_no_ops() {
        let highlighter = Arc::new(GatedHighlighter::new());
        let gate = highlighter.gate("a");
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("a");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        coordinator.dispose();

        gate.send(Ok(vec![span(0, 1, HighlightKind::Keyword)]))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(coordinator.applied_version(), 0);
        assert!(coordinator.line_spans(ids[0]).is_empty());
    }

    #[tokio::test]
    async fn test_requests_after_dispose_are_not_dispatched() {
        let highlighter = Arc::new(CannedHighlighter::new(HashMap::new()));
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        coordinator.dispose();
        coordinator.request("a".to_string(), Vec::new(), 4);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(highlighter.call_count(), 0);
    }

    #[tokio::test]
    async fn test_theme_change_recolors_without_new_request() {
        let mut responses = HashMap::new();
        responses.insert("a".to_string(), vec![span(0, 1, HighlightKind::Keyword)]);
        let highlighter = Arc::new(CannedHighlighter::new(responses));
        let coordinator =
            HighlightCoordinator::new(highlighter.clone(), "sql", &HighlightTheme::default());

        let store = LineStore::from_text("a");
        let ids: Vec<LineId> = store.ids().collect();

        coordinator.request("a".to_string(), ids.clone(), 4);
        wait_for_version(&coordinator, 1).await;
        assert_eq!(highlighter.call_count(), 1);

        let before = coordinator.line_spans(ids[0])[0];
        let before_style = coordinator.style(before.style).unwrap();

        let mut theme = HighlightTheme::default();
        theme.set(HighlightKind::Keyword, TextStyle::with_color("#123456"));
        coordinator.set_theme(&theme);

        let after = coordinator.line_spans(ids[0])[0];
        assert_eq!((after.start_col, after.end_col), (before.start_col, before.end_col));
        let after_style = coordinator.style(after.style).unwrap();
        assert_ne!(before_style, after_style);
        assert_eq!(after_style.color.as_deref(), Some("#123456"));
        assert_eq!(highlighter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retain_lines_prunes_dead_ids() {
        let mut responses = HashMap::new();
        responses.insert("a\nb".to_string(), vec![
            span(0, 1, HighlightKind::Keyword),
            span(2, 3, HighlightKind::Number),
        ]);
        let coordinator = HighlightCoordinator::new(
            Arc::new(CannedHighlighter::new(responses)),
            "sql",
            &HighlightTheme::default(),
        );

        let store = LineStore::from_text("a\nb");
        let ids: Vec<LineId> = store.ids().collect();
        coordinator.request("a\nb".to_string(), ids.clone(), 4);
        wait_for_version(&coordinator, 1).await;

        coordinator.retain_lines(|id| id == ids[0]);
        assert_eq!(coordinator.line_spans(ids[0]).len(), 1);
        assert!(coordinator.line_spans(ids[1]).is_empty());
    }
}

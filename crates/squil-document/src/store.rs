//! Ordered line storage with stable per-line identity.
//!
//! The document is a sequence of lines; joining their text with `"\n"`
//! reconstructs the buffer exactly, for any input including trailing
//! newlines. Each line carries a [`LineId`] allocated from a slotmap arena,
//! so surface widgets and highlight registries can stay bound to a line
//! while its neighbours are inserted, removed, or reordered.
//!
//! Lines start out unrendered. A line becomes rendered once the surface has
//! echoed it back; the engine uses the flag to tell its own text pushes
//! apart from user edits arriving from the surface.

use crate::coords;
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable identity of a line, preserved across edits to other lines.
    pub struct LineId;
}

#[derive(Debug, Clone)]
struct LineRecord {
    text: String,
    rendered: bool,
    /// Lazily computed display width together with the tab width it was
    /// measured at.
    width_cache: Option<(usize, usize)>,
}

impl LineRecord {
    fn new(text: String) -> Self {
        Self {
            text,
            rendered: false,
            width_cache: None,
        }
    }
}

/// Ordered collection of document lines.
///
/// A store always holds at least one line (possibly empty), mirroring how a
/// text buffer with no content still renders one empty row.
///
/// # Examples
///
/// ```
/// use squil_document::store::LineStore;
///
/// let store = LineStore::from_text("SELECT 1;\nSELECT 2;\n");
/// assert_eq!(store.len(), 3);
/// assert_eq!(store.full_text(), "SELECT 1;\nSELECT 2;\n");
/// ```
#[derive(Debug)]
pub struct LineStore {
    records: SlotMap<LineId, LineRecord>,
    order: Vec<LineId>,
}

impl LineStore {
    /// Creates a store with a single empty line.
    pub fn new() -> Self {
        Self::from_text("")
    }

    /// Creates a store from buffer text, splitting on `'\n'`.
    pub fn from_text(text: &str) -> Self {
        let mut store = Self {
            records: SlotMap::with_key(),
            order: Vec::new(),
        };
        store.fill(text);
        store
    }

    /// Replaces the entire content. All previous line ids are invalidated.
    pub fn reset(&mut self, text: &str) {
        self.records.clear();
        self.order.clear();
        self.fill(text);
    }

    fn fill(&mut self, text: &str) {
        for line in text.split('\n') {
            let id = self.records.insert(LineRecord::new(line.to_string()));
            self.order.push(id);
        }
    }

    /// Number of lines. Always at least one.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The id of the line at `index`.
    pub fn id_at(&self, index: usize) -> Option<LineId> {
        self.order.get(index).copied()
    }

    /// The current index of the line with `id`, if it still exists.
    pub fn index_of(&self, id: LineId) -> Option<usize> {
        self.order.iter().position(|&other| other == id)
    }

    /// Text of the line at `index`.
    pub fn text_at(&self, index: usize) -> Option<&str> {
        let id = self.id_at(index)?;
        self.records.get(id).map(|r| r.text.as_str())
    }

    /// Text of the line with `id`.
    pub fn text_of(&self, id: LineId) -> Option<&str> {
        self.records.get(id).map(|r| r.text.as_str())
    }

    /// Whether the line at `index` has been rendered by the surface.
    pub fn is_rendered(&self, index: usize) -> bool {
        self.id_at(index)
            .and_then(|id| self.records.get(id))
            .map(|r| r.rendered)
            .unwrap_or(false)
    }

    /// Marks the line at `index` as rendered.
    pub fn mark_rendered(&mut self, index: usize) {
        if let Some(record) = self.record_at_mut(index) {
            record.rendered = true;
        }
    }

    /// Replaces the text of the line at `index`.
    ///
    /// `rendered` records whether the surface is already displaying the new
    /// text (true for edits reported by the surface, false for text the
    /// engine is about to push). Returns the line's id.
    pub fn set_text_at(&mut self, index: usize, text: &str, rendered: bool) -> Option<LineId> {
        let id = self.id_at(index)?;
        let record = self.records.get_mut(id)?;
        record.text.clear();
        record.text.push_str(text);
        record.rendered = rendered;
        record.width_cache = None;
        Some(id)
    }

    /// Inserts a new unrendered line at `index` (clamped to the line count).
    pub fn insert(&mut self, index: usize, text: &str) -> LineId {
        let id = self.records.insert(LineRecord::new(text.to_string()));
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        id
    }

    /// Removes the line at `index`, returning its text.
    ///
    /// Refuses to remove the last remaining line; the store never becomes
    /// lineless.
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if self.order.len() <= 1 || index >= self.order.len() {
            return None;
        }
        let id = self.order.remove(index);
        self.records.remove(id).map(|r| r.text)
    }

    /// The full buffer text, lines joined with `'\n'`.
    pub fn full_text(&self) -> String {
        let mut text = String::new();
        for (i, id) in self.order.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            if let Some(record) = self.records.get(*id) {
                text.push_str(&record.text);
            }
        }
        text
    }

    /// Ids of all lines in document order.
    pub fn ids(&self) -> impl Iterator<Item = LineId> + '_ {
        self.order.iter().copied()
    }

    /// Char length of the line at `index`.
    pub fn char_len(&self, index: usize) -> usize {
        self.text_at(index).map(coords::char_len).unwrap_or(0)
    }

    /// Char offset of the start of the line at `index` within the full
    /// text. Indices past the end clamp to the total char length.
    pub fn line_start_offset(&self, index: usize) -> usize {
        let mut offset = 0;
        for i in 0..index.min(self.order.len()) {
            offset += self.char_len(i) + 1;
        }
        if index >= self.order.len() {
            // Clamp: offset currently points one past the final newline.
            offset = offset.saturating_sub(1);
        }
        offset
    }

    /// Display width of the line at `index`, cached per tab width.
    pub fn display_width(&mut self, index: usize, tab_width: usize) -> usize {
        let Some(id) = self.id_at(index) else {
            return 0;
        };
        let Some(record) = self.records.get_mut(id) else {
            return 0;
        };
        if let Some((tab, width)) = record.width_cache {
            if tab == tab_width {
                return width;
            }
        }
        let width = coords::line_width(&record.text, tab_width);
        record.width_cache = Some((tab_width, width));
        width
    }

    fn record_at_mut(&mut self, index: usize) -> Option<&mut LineRecord> {
        let id = self.id_at(index)?;
        self.records.get_mut(id)
    }
}

impl Default for LineStore {
    fn default() -> Self {
        Self::new()
    }
}

//! Conversion between char indices and terminal display columns.
//!
//! Line text is measured in grapheme clusters so that multi-char clusters
//! (combining accents, emoji sequences) occupy a single caret position, and
//! widths come from Unicode East Asian Width data so that wide characters
//! advance the column by two cells. Tabs advance to the next multiple of the
//! tab width.
//!
//! All functions take char (Unicode scalar) indices, not byte offsets, and
//! clamp out-of-range input instead of panicking.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width of one grapheme cluster rendered at `col`.
///
/// Tabs are the only position-dependent cluster: they pad to the next tab
/// stop. Everything else uses its Unicode width.
fn cluster_width(cluster: &str, col: usize, tab_width: usize) -> usize {
    if cluster == "\t" {
        tab_width - (col % tab_width)
    } else {
        UnicodeWidthStr::width(cluster)
    }
}

/// Converts a char index within `text` to a display column.
///
/// A grapheme cluster contributes its width only when it lies entirely
/// before `char_index`; an index falling inside a cluster maps to the
/// cluster's starting column. Indices past the end of the text clamp to the
/// full line width.
///
/// # Examples
///
/// ```
/// use squil_document::coords::display_column;
///
/// // '世' is double width: the char after it sits at column 2.
/// assert_eq!(display_column("世x", 1, 4), 2);
///
/// // A tab at column 3 advances to the next stop at 4.
/// assert_eq!(display_column("abc\tx", 4, 4), 4);
/// ```
pub fn display_column(text: &str, char_index: usize, tab_width: usize) -> usize {
    let tab_width = tab_width.max(1);
    let mut col = 0;
    let mut chars_seen = 0;

    for cluster in text.graphemes(true) {
        let cluster_chars = cluster.chars().count();
        if chars_seen + cluster_chars > char_index {
            break;
        }
        col += cluster_width(cluster, col, tab_width);
        chars_seen += cluster_chars;
    }

    col
}

/// Converts a display column to the char index of the grapheme cluster
/// covering that column.
///
/// A column falling in the interior of a wide cluster lands on the cluster
/// start. Columns at or past the end of the line clamp to the char length of
/// the text.
pub fn char_index_at_column(text: &str, target_column: usize, tab_width: usize) -> usize {
    let tab_width = tab_width.max(1);
    let mut col = 0;
    let mut index = 0;

    for cluster in text.graphemes(true) {
        let width = cluster_width(cluster, col, tab_width);
        if target_column < col + width {
            return index;
        }
        col += width;
        index += cluster.chars().count();
    }

    index
}

/// Display width of an entire line.
pub fn line_width(text: &str, tab_width: usize) -> usize {
    let tab_width = tab_width.max(1);
    let mut col = 0;
    for cluster in text.graphemes(true) {
        col += cluster_width(cluster, col, tab_width);
    }
    col
}

/// Char length of `text` (number of Unicode scalars).
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the char at `char_index`, clamped to the text length.
///
/// Used when a char-indexed range has to be sliced out of a `&str`.
pub fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

//! A text file shown as a page, with a mouse/keyboard selection.

use crate::content::{Page, PageSelection, Rect};
use std::path::Path;
use unicode_width::UnicodeWidthChar;

/// A position in the wrapped document: row index and char index in that row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone)]
pub struct TerminalPage {
    url: String,
    title: String,
    source: String,
    rows: Vec<String>,
    width: usize,
    cursor: Cursor,
    /// Fixed end of the selection; the cursor is the moving end.
    anchor: Option<Cursor>,
    scroll: usize,
}

impl TerminalPage {
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
        width: usize,
    ) -> Self {
        let source = text.into();
        let rows = wrap_rows(&source, width);
        Self {
            url: url.into(),
            title: title.into(),
            source,
            rows,
            width,
            cursor: Cursor::default(),
            anchor: None,
            scroll: 0,
        }
    }

    /// Load `path`, titled by its file name and addressed by its `file://` URL.
    pub fn open(path: &Path, width: usize) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let absolute = std::fs::canonicalize(path)?;
        let url = url::Url::from_file_path(&absolute)
            .map(String::from)
            .unwrap_or_else(|()| absolute.display().to_string());
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.clone());
        Ok(Self::new(url, title, text, width))
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Re-wrap for a new width. Drops the selection; returns true if there
    /// was one.
    pub fn rewrap(&mut self, width: usize) -> bool {
        if width == self.width {
            return false;
        }
        let had = self.clear_selection();
        self.width = width;
        self.rows = wrap_rows(&self.source, width);
        self.cursor = Cursor::default();
        self.scroll = self.scroll.min(self.rows.len().saturating_sub(1));
        had
    }

    /// Scroll by `delta` rows, keeping at least one row on screen.
    pub fn scroll_by(&mut self, delta: isize) {
        let max = self.rows.len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(max);
    }

    /// Document position under screen cell (`x`, `y`) of the text area.
    #[must_use]
    pub fn hit(&self, x: u16, y: u16) -> Cursor {
        let row = (self.scroll + y as usize).min(self.rows.len().saturating_sub(1));
        let col = self
            .rows
            .get(row)
            .map_or(0, |line| char_index_at(line, x as usize));
        Cursor { row, col }
    }

    /// Start a selection at `at`. Returns true if a selection was cleared.
    pub fn begin_selection(&mut self, at: Cursor) -> bool {
        let had = self.selected_range().is_some();
        self.cursor = at;
        self.anchor = Some(at);
        had
    }

    /// Move the free end of the selection. Returns true if the selection changed.
    pub fn extend_selection(&mut self, to: Cursor) -> bool {
        let before = self.selected_range();
        if self.anchor.is_none() {
            self.anchor = Some(self.cursor);
        }
        self.cursor = to;
        before != self.selected_range()
    }

    /// Move the cursor. With `extend`, grow the selection; otherwise drop it.
    /// Returns true if the selection changed.
    pub fn move_cursor(&mut self, direction: Direction, extend: bool) -> bool {
        let before = self.selected_range();
        if extend && self.anchor.is_none() {
            self.anchor = Some(self.cursor);
        } else if !extend {
            self.anchor = None;
        }

        let last_row = self.rows.len().saturating_sub(1);
        let row_len = |row: usize| self.rows.get(row).map_or(0, |l| l.chars().count());
        let Cursor { row, col } = self.cursor;
        self.cursor = match direction {
            Direction::Left if col > 0 => Cursor { row, col: col - 1 },
            Direction::Left if row > 0 => Cursor {
                row: row - 1,
                col: row_len(row - 1),
            },
            Direction::Right if col < row_len(row) => Cursor { row, col: col + 1 },
            Direction::Right if row < last_row => Cursor { row: row + 1, col: 0 },
            Direction::Up if row > 0 => Cursor {
                row: row - 1,
                col: col.min(row_len(row - 1)),
            },
            Direction::Down if row < last_row => Cursor {
                row: row + 1,
                col: col.min(row_len(row + 1)),
            },
            _ => self.cursor,
        };
        before != self.selected_range()
    }

    /// Drop the selection. Returns true if there was one.
    pub fn clear_selection(&mut self) -> bool {
        let had = self.selected_range().is_some();
        self.anchor = None;
        had
    }

    /// Ordered, non-empty selection bounds (end exclusive).
    #[must_use]
    pub fn selected_range(&self) -> Option<(Cursor, Cursor)> {
        let anchor = self.anchor?;
        if anchor == self.cursor {
            return None;
        }
        Some((anchor.min(self.cursor), anchor.max(self.cursor)))
    }

    #[must_use]
    pub fn is_selected(&self, row: usize, col: usize) -> bool {
        self.selected_range()
            .is_some_and(|(start, end)| (start..end).contains(&Cursor { row, col }))
    }

    #[must_use]
    pub fn selected_text(&self) -> Option<String> {
        let (start, end) = self.selected_range()?;
        let mut parts = Vec::new();
        for row in start.row..=end.row {
            let line = self.rows.get(row)?;
            let from = if row == start.row { start.col } else { 0 };
            let to = if row == end.row {
                end.col
            } else {
                line.chars().count()
            };
            parts.push(line.chars().skip(from).take(to.saturating_sub(from)).collect::<String>());
        }
        Some(parts.join("\n"))
    }

    /// Screen-independent box around the selection, in document cells.
    fn selection_bounds(&self, start: Cursor, end: Cursor) -> Rect {
        let cells = |row: usize, col: usize| {
            self.rows
                .get(row)
                .map_or(0, |line| display_width(line.chars().take(col)))
        };
        let (left, right) = if start.row == end.row {
            (cells(start.row, start.col), cells(end.row, end.col))
        } else {
            (0, self.width)
        };
        Rect {
            top: start.row as f64,
            left: left as f64,
            bottom: (end.row + 1) as f64,
            right: right as f64,
        }
    }
}

impl Page for TerminalPage {
    fn selection(&self) -> Option<PageSelection> {
        let (start, end) = self.selected_range()?;
        Some(PageSelection {
            text: self.selected_text()?,
            bounds: self.selection_bounds(start, end),
        })
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn body_text(&self) -> String {
        self.source.clone()
    }
}

fn display_width(chars: impl Iterator<Item = char>) -> usize {
    chars.map(|c| UnicodeWidthChar::width(c).unwrap_or(0)).sum()
}

/// Char index whose cell span covers `cell`, clamped to the line end.
fn char_index_at(line: &str, cell: usize) -> usize {
    let mut col = 0;
    for (i, c) in line.chars().enumerate() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if cell < col + w.max(1) {
            return i;
        }
        col += w;
    }
    line.chars().count()
}

/// Word-wrap `text` to `width` cells. Hard newlines always break.
pub fn wrap_rows(text: &str, width: usize) -> Vec<String> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.replace('\t', "    ");
        if width == 0 {
            rows.push(line);
            continue;
        }

        let chars: Vec<char> = line.chars().collect();
        let mut start = 0;
        let mut col = 0;
        let mut last_space = None::<usize>;

        for (i, &c) in chars.iter().enumerate() {
            let w = UnicodeWidthChar::width(c).unwrap_or(0);
            if col + w > width && i > start {
                let split = last_space.filter(|&s| s > start).unwrap_or(i);
                rows.push(chars[start..split].iter().collect());
                start = split;
                col = display_width(chars[start..i].iter().copied());
                last_space = None;
            }
            if c == ' ' {
                last_space = Some(i + 1);
            }
            col += w;
        }
        rows.push(chars[start..].iter().collect());
    }
    if rows.is_empty() {
        rows.push(String::new());
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str) -> TerminalPage {
        TerminalPage::new("file:///notes.txt", "notes.txt", text, 20)
    }

    #[test]
    fn test_wrap_at_spaces() {
        assert_eq!(
            wrap_rows("the quick brown fox jumps", 10),
            vec!["the quick ", "brown fox ", "jumps"]
        );
        assert_eq!(wrap_rows("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_rows("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_rows("", 10), vec![""]);
    }

    #[test]
    fn test_wrap_wide_chars() {
        assert_eq!(wrap_rows("日本語日本", 4), vec!["日本", "語日", "本"]);
    }

    #[test]
    fn test_mouse_selection_text_and_bounds() {
        let mut p = page("gradient descent\nsecond line");
        assert!(p.selection().is_none());

        p.begin_selection(p.hit(0, 0));
        assert!(p.selection().is_none(), "empty selection is no selection");

        assert!(p.extend_selection(p.hit(8, 0)));
        let sel = p.selection().unwrap();
        assert_eq!(sel.text, "gradient");
        assert_eq!(sel.bounds.left, 0.0);
        assert_eq!(sel.bounds.bottom, 1.0);
        assert_eq!(sel.bounds.right, 8.0);
    }

    #[test]
    fn test_selection_across_rows() {
        let mut p = page("gradient descent\nsecond line");
        p.begin_selection(Cursor { row: 0, col: 9 });
        p.extend_selection(Cursor { row: 1, col: 6 });
        assert_eq!(p.selected_text().unwrap(), "descent\nsecond");
        assert!(p.is_selected(1, 0));
        assert!(!p.is_selected(1, 6));
    }

    #[test]
    fn test_backwards_drag_is_ordered() {
        let mut p = page("gradient descent");
        p.begin_selection(Cursor { row: 0, col: 16 });
        p.extend_selection(Cursor { row: 0, col: 9 });
        assert_eq!(p.selected_text().unwrap(), "descent");
    }

    #[test]
    fn test_shift_arrows_extend_plain_arrows_clear() {
        let mut p = page("abc");
        assert!(!p.move_cursor(Direction::Right, false));
        assert!(p.move_cursor(Direction::Right, true));
        assert!(p.move_cursor(Direction::Right, true));
        assert_eq!(p.selected_text().unwrap(), "bc");

        assert!(p.move_cursor(Direction::Left, false));
        assert!(p.selection().is_none());
    }

    #[test]
    fn test_cursor_wraps_between_rows() {
        let mut p = page("ab\ncd");
        p.move_cursor(Direction::Right, false);
        p.move_cursor(Direction::Right, false);
        p.move_cursor(Direction::Right, false);
        assert_eq!(p.cursor(), Cursor { row: 1, col: 0 });
        p.move_cursor(Direction::Left, false);
        assert_eq!(p.cursor(), Cursor { row: 0, col: 2 });
    }

    #[test]
    fn test_hit_clamps_to_line() {
        let p = page("ab\ncd");
        assert_eq!(p.hit(50, 0), Cursor { row: 0, col: 2 });
        assert_eq!(p.hit(0, 50), Cursor { row: 1, col: 0 });
    }

    #[test]
    fn test_scroll_offsets_hits() {
        let mut p = page("a\nb\nc");
        p.scroll_by(1);
        assert_eq!(p.hit(0, 0).row, 1);
        p.scroll_by(10);
        assert_eq!(p.scroll(), 2);
        p.scroll_by(-10);
        assert_eq!(p.scroll(), 0);
    }

    #[test]
    fn test_rewrap_drops_selection() {
        let mut p = page("one two three four five six");
        p.begin_selection(Cursor { row: 0, col: 0 });
        p.extend_selection(Cursor { row: 0, col: 3 });
        assert!(p.rewrap(8));
        assert!(p.selection().is_none());
        assert!(!p.rewrap(8));
        assert!(p.rows().len() > 1);
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Entropy measures disorder.").unwrap();

        let p = TerminalPage::open(&path, 80).unwrap();
        assert_eq!(p.title(), "paper.txt");
        assert!(p.url().starts_with("file://"));
        assert!(p.url().ends_with("paper.txt"));
        assert_eq!(p.body_text(), "Entropy measures disorder.");
    }
}

//! Layout and drawing for the reader.

use super::Reader;
use super::surface::RenderedPopup;
use crate::content::{Anchor, POPUP_TITLE, PROMPT_LABEL};
use crate::popup::SessionStats;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use std::io::{self, Write};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const MAX_POPUP_WIDTH: u16 = 72;
const PANEL_WIDTH: u16 = 38;
const CLOSE_BUTTON: &str = "[x]";
const HELP: &str = "drag/shift+arrows: select  enter: ask  a: menu  s: session  q: quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Region {
    #[must_use]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Rows available to the document; the last row is the status line.
#[must_use]
pub fn text_height(term_height: u16) -> u16 {
    term_height.saturating_sub(1)
}

#[must_use]
pub fn popup_width(term_width: u16) -> u16 {
    term_width.saturating_sub(4).min(MAX_POPUP_WIDTH)
}

/// Inner text width of the popup box (borders and one cell of padding each side).
#[must_use]
pub fn popup_text_width(term_width: u16) -> usize {
    popup_width(term_width).saturating_sub(4) as usize
}

/// Centered popup box for `body_lines` of explanation. The selected text and
/// a spacer line sit above the body.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn popup_region(term_width: u16, term_height: u16, body_lines: usize) -> Region {
    let width = popup_width(term_width);
    let max_height = text_height(term_height).saturating_sub(2).max(5);
    let height = (body_lines.saturating_add(4)).min(max_height as usize) as u16;
    Region {
        x: (term_width.saturating_sub(width)) / 2,
        y: (text_height(term_height).saturating_sub(height)) / 2,
        width,
        height,
    }
}

/// The close button sits on the popup's top border.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn close_button(popup: Region) -> Region {
    let width = CLOSE_BUTTON.len() as u16;
    Region {
        x: (popup.x + popup.width).saturating_sub(width + 2),
        y: popup.y,
        width,
        height: 1,
    }
}

#[must_use]
pub fn prompt_text() -> String {
    format!("[{PROMPT_LABEL}]")
}

/// Where the prompt is on screen, if its anchor row is visible.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn prompt_region(anchor: Anchor, scroll: usize, term_width: u16, term_height: u16) -> Option<Region> {
    let row = (anchor.y as usize).checked_sub(scroll)?;
    if row >= text_height(term_height) as usize {
        return None;
    }
    let width = prompt_text().width() as u16;
    let x = (anchor.x as u16).min(term_width.saturating_sub(width));
    Some(Region {
        x,
        y: row as u16,
        width,
        height: 1,
    })
}

fn panel_region(term_width: u16, lines: usize) -> Region {
    let width = PANEL_WIDTH.min(term_width);
    #[allow(clippy::cast_possible_truncation)]
    let height = (lines + 2) as u16;
    Region {
        x: term_width.saturating_sub(width),
        y: 0,
        width,
        height,
    }
}

/// Truncate to `width` cells, ending in an ellipsis when cut.
fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn pad(text: &str, width: usize) -> String {
    let text = fit(text, width);
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}

fn draw_box<W: Write>(
    out: &mut W,
    region: Region,
    title: &str,
    lines: &[String],
    close: bool,
) -> io::Result<()> {
    let inner = region.width.saturating_sub(2) as usize;
    let mut top = format!("─ {title} ");
    if close {
        let room = inner.saturating_sub(CLOSE_BUTTON.len() + 1);
        top = format!("{}{CLOSE_BUTTON}─", pad_with(&top, room, '─'));
    }
    queue!(
        out,
        MoveTo(region.x, region.y),
        Print(format!("┌{}┐", pad_with(&top, inner, '─')))
    )?;

    let body_rows = region.height.saturating_sub(2) as usize;
    for i in 0..body_rows {
        let text = lines.get(i).map_or("", String::as_str);
        #[allow(clippy::cast_possible_truncation)]
        let y = region.y + 1 + i as u16;
        queue!(
            out,
            MoveTo(region.x, y),
            Print(format!("│ {} │", pad(text, inner.saturating_sub(2))))
        )?;
    }
    queue!(
        out,
        MoveTo(region.x, region.y + region.height.saturating_sub(1)),
        Print(format!("└{}┘", "─".repeat(inner)))
    )?;
    Ok(())
}

fn pad_with(text: &str, width: usize, fill: char) -> String {
    let text = fit(text, width);
    let n = width.saturating_sub(text.width());
    format!("{text}{}", fill.to_string().repeat(n))
}

fn draw_document<W: Write>(out: &mut W, reader: &Reader, width: u16, height: u16) -> io::Result<()> {
    let page = reader.page();
    let rows = page.rows();
    for y in 0..text_height(height) {
        queue!(out, MoveTo(0, y), Clear(ClearType::CurrentLine))?;
        let row = page.scroll() + y as usize;
        let Some(line) = rows.get(row) else {
            continue;
        };

        let mut used = 0;
        let mut selected = false;
        let mut run = String::new();
        for (col, c) in line.chars().enumerate() {
            let w = UnicodeWidthChar::width(c).unwrap_or(0);
            if used + w > width as usize {
                break;
            }
            let is_selected = page.is_selected(row, col);
            if is_selected != selected {
                flush_run(out, &mut run, selected)?;
                selected = is_selected;
            }
            run.push(c);
            used += w;
        }
        flush_run(out, &mut run, selected)?;
    }
    Ok(())
}

fn flush_run<W: Write>(out: &mut W, run: &mut String, reversed: bool) -> io::Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    if reversed {
        queue!(
            out,
            SetAttribute(Attribute::Reverse),
            Print(std::mem::take(run)),
            SetAttribute(Attribute::NoReverse)
        )
    } else {
        queue!(out, Print(std::mem::take(run)))
    }
}

fn popup_body(popup: &RenderedPopup, inner: usize) -> Vec<String> {
    let mut lines = vec![fit(&format!("\u{201c}{}\u{201d}", popup.selected_text), inner), String::new()];
    lines.extend(popup.body.iter().cloned());
    lines
}

fn panel_lines(stats: &SessionStats) -> Vec<String> {
    let mut lines = vec![
        stats.session_id.clone(),
        format!("Concepts: {}   URLs: {}", stats.concept_count, stats.url_count),
        String::new(),
    ];
    if stats.recent.is_empty() {
        lines.push("No concepts yet".to_string());
    } else {
        lines.extend(stats.recent.iter().map(|c| format!("• {}", c.text)));
    }
    lines.push(String::new());
    lines.push("n: new  e: export  h: history".to_string());
    lines
}

/// Draw one full frame.
pub fn draw<W: Write>(out: &mut W, reader: &Reader, width: u16, height: u16) -> io::Result<()> {
    draw_document(out, reader, width, height)?;

    if let Some(anchor) = reader.surface().prompt()
        && let Some(region) = prompt_region(anchor, reader.page().scroll(), width, height)
    {
        queue!(
            out,
            MoveTo(region.x, region.y),
            SetAttribute(Attribute::Bold),
            SetAttribute(Attribute::Reverse),
            Print(prompt_text()),
            SetAttribute(Attribute::Reset)
        )?;
    }

    if let Some(stats) = reader.stats() {
        let lines = panel_lines(stats);
        draw_box(out, panel_region(width, lines.len()), "Sona Session", &lines, false)?;
    }

    if let Some(popup) = reader.surface().popup() {
        let inner = popup_text_width(width);
        let lines = popup_body(popup, inner);
        let region = popup_region(width, height, popup.body.len());
        draw_box(out, region, POPUP_TITLE, &lines, true)?;
    }

    let status = match reader.notice() {
        Some(notice) => notice.message.clone(),
        None => format!("{}  |  {HELP}", reader.page_title()),
    };
    queue!(
        out,
        MoveTo(0, height.saturating_sub(1)),
        Clear(ClearType::CurrentLine),
        SetAttribute(Attribute::Dim),
        Print(fit(&status, width as usize)),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

use std::collections::{BTreeSet, VecDeque};
use std::io::{self, Write};

use anyhow::Result;
use crossterm::cursor;
use crossterm::event::{self, Event};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;
use versemark_core::{Frontend, HighlightConfig, Tag};

use crate::input::{EditOutcome, LineEditor};
use crate::write_status_line;

pub trait EventSource {
    fn next_event(&mut self) -> io::Result<Event>;
}

/// Blocking reads from the controlling terminal.
pub struct TerminalEvents;

impl EventSource for TerminalEvents {
    fn next_event(&mut self) -> io::Result<Event> {
        event::read()
    }
}

/// Pre-recorded events, for driving prompts without a terminal.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    queue: VecDeque<Event>,
}

impl ScriptedEvents {
    pub fn new(events: impl IntoIterator<Item = Event>) -> Self {
        Self {
            queue: events.into_iter().collect(),
        }
    }
}

impl EventSource for ScriptedEvents {
    fn next_event(&mut self) -> io::Result<Event> {
        self.queue
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted events left"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bookmark: Color,
    pub search: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            bookmark: Color::Blue,
            search: Color::Yellow,
        }
    }
}

impl Palette {
    pub fn from_config(config: &HighlightConfig) -> Self {
        let defaults = Self::default();
        Self {
            bookmark: parse_color(&config.bookmark, defaults.bookmark),
            search: parse_color(&config.search, defaults.search),
        }
    }
}

fn parse_color(name: &str, fallback: Color) -> Color {
    Color::try_from(name).unwrap_or_else(|_| {
        warn!(color = name, "unknown highlight colour, using default");
        fallback
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Message {
    Info(String),
    Error(String),
}

/// The bookmark listing, shown as an overlay when open.
#[derive(Debug, Default)]
pub struct BookmarkMenu {
    entries: Vec<String>,
    selected: usize,
    scroll_offset: usize,
    open: bool,
}

impl BookmarkMenu {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn selected_entry(&self) -> Option<&str> {
        self.entries.get(self.selected).map(String::as_str)
    }

    fn set_entries(&mut self, names: &[&str]) {
        self.entries = names.iter().map(|n| n.to_string()).collect();
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let len = self.entries.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.entries.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.entries.len().saturating_sub(viewport_height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + viewport_height {
            self.scroll_offset = self.selected + 1 - viewport_height;
        }
    }
}

/// Terminal rendering of the open document: a line-numbered text pane, a
/// status row and the bookmark menu overlay.
pub struct TerminalFrontend<W: Write, S: EventSource> {
    writer: W,
    events: S,
    palette: Palette,
    columns: u16,
    rows: u16,
    title: String,
    content: String,
    line_starts: Vec<usize>,
    cursor: (usize, usize),
    top: usize,
    bookmark_lines: BTreeSet<usize>,
    search_spans: Vec<(usize, usize)>,
    menu: BookmarkMenu,
    message: Option<Message>,
}

impl<W: Write, S: EventSource> TerminalFrontend<W, S> {
    pub fn new(writer: W, events: S, palette: Palette) -> Self {
        Self {
            writer,
            events,
            palette,
            columns: 80,
            rows: 24,
            title: String::from("[no document]"),
            content: String::new(),
            line_starts: Vec::new(),
            cursor: (1, 0),
            top: 1,
            bookmark_lines: BTreeSet::new(),
            search_spans: Vec::new(),
            menu: BookmarkMenu::default(),
            message: None,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn next_event(&mut self) -> io::Result<Event> {
        self.events.next_event()
    }

    pub fn resize(&mut self, columns: u16, rows: u16) {
        self.columns = columns.max(1);
        self.rows = rows.max(2);
        self.scroll_into_view();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor.0
    }

    pub fn top_line(&self) -> usize {
        self.top
    }

    pub fn bookmarked_lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.bookmark_lines.iter().copied()
    }

    pub fn search_spans(&self) -> &[(usize, usize)] {
        &self.search_spans
    }

    pub fn menu(&self) -> &BookmarkMenu {
        &self.menu
    }

    pub fn open_menu(&mut self) {
        self.menu.open = true;
    }

    pub fn close_menu(&mut self) {
        self.menu.open = false;
    }

    pub fn move_menu_selection(&mut self, delta: isize) -> bool {
        self.menu.move_selection(delta)
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    /// Moves the cursor line without recording it anywhere.
    pub fn move_cursor(&mut self, delta: isize) {
        let line = self.cursor.0 as isize + delta;
        self.cursor = (self.clamp_line(line.max(1) as usize), 0);
        self.scroll_into_view();
    }

    pub fn page(&mut self, delta: isize) {
        self.move_cursor(delta * self.text_rows() as isize);
    }

    fn text_rows(&self) -> usize {
        usize::from(self.rows.saturating_sub(1)).max(1)
    }

    fn clamp_line(&self, line: usize) -> usize {
        line.clamp(1, self.line_count().max(1))
    }

    /// Byte range of `line` without its terminator.
    fn line_range(&self, line: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.content.len());
        let text = self.content[start..end].trim_end_matches(&['\r', '\n'][..]);
        Some((start, start + text.len()))
    }

    pub fn draw(&mut self, pending_input: Option<&str>) -> Result<()> {
        queue!(self.writer, Clear(ClearType::All))?;
        let gutter = self.line_count().max(1).to_string().len().max(3);
        for row in 0..self.text_rows() {
            let line = self.top + row;
            queue!(self.writer, cursor::MoveTo(0, row as u16))?;
            if line > self.line_count() {
                queue!(self.writer, Print("~"))?;
                continue;
            }
            self.draw_line(line, gutter)?;
        }
        self.draw_status(pending_input)?;
        if self.menu.open {
            self.draw_menu()?;
        }
        self.writer.flush()?;
        Ok(())
    }

    fn draw_line(&mut self, line: usize, gutter: usize) -> Result<()> {
        let Some((start, end)) = self.line_range(line) else {
            return Ok(());
        };
        if line == self.cursor.0 {
            queue!(
                self.writer,
                SetAttribute(Attribute::Reverse),
                Print(format!("{:>gutter$}", line)),
                SetAttribute(Attribute::Reset),
                Print(" ")
            )?;
        } else {
            queue!(self.writer, Print(format!("{:>gutter$} ", line)))?;
        }

        let width = usize::from(self.columns).saturating_sub(gutter + 1);
        let bookmarked = self.bookmark_lines.contains(&line);
        let spans: Vec<(usize, usize)> = self
            .search_spans
            .iter()
            .copied()
            .filter(|&(s, e)| s < end && e > start)
            .collect();

        let mut active: Option<Color> = None;
        for (offset, ch) in self.content[start..end].char_indices().take(width) {
            let at = start + offset;
            let background = if spans.iter().any(|&(s, e)| at >= s && at < e) {
                Some(self.palette.search)
            } else if bookmarked {
                Some(self.palette.bookmark)
            } else {
                None
            };
            if background != active {
                match background {
                    Some(color) => queue!(self.writer, SetBackgroundColor(color))?,
                    None => queue!(self.writer, ResetColor)?,
                }
                active = background;
            }
            let ch = if ch.is_control() { ' ' } else { ch };
            queue!(self.writer, Print(ch))?;
        }
        if active.is_some() {
            queue!(self.writer, ResetColor)?;
        }
        Ok(())
    }

    fn status_text(&self, pending_input: Option<&str>) -> String {
        let mut status = match &self.message {
            Some(Message::Info(text)) | Some(Message::Error(text)) => text.replace('\n', " | "),
            None => format!(
                "{} — line {}/{} — {} bookmarks",
                self.title,
                self.cursor.0,
                self.line_count(),
                self.menu.entries.len()
            ),
        };
        if let Some(pending) = pending_input.filter(|s| !s.is_empty()) {
            status.push_str(" | ");
            status.push_str(pending);
        }
        status
    }

    fn draw_status(&mut self, pending_input: Option<&str>) -> Result<()> {
        let status = truncate_with_ellipsis(
            self.status_text(pending_input),
            usize::from(self.columns),
        );
        let row = self.rows.saturating_sub(1);
        queue!(
            self.writer,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine)
        )?;
        if matches!(self.message, Some(Message::Error(_))) {
            queue!(self.writer, SetForegroundColor(Color::Red))?;
            write_status_line(&mut self.writer, &status)?;
            queue!(self.writer, ResetColor)?;
        } else {
            write_status_line(&mut self.writer, &status)?;
        }
        Ok(())
    }

    fn draw_prompt(&mut self, title: &str, prompt: &str, text: &str) -> Result<()> {
        let line = truncate_with_ellipsis(
            format!("{}: {} {}", title, prompt, text),
            usize::from(self.columns),
        );
        let row = self.rows.saturating_sub(1);
        queue!(
            self.writer,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Bold)
        )?;
        write_status_line(&mut self.writer, &line)?;
        queue!(self.writer, SetAttribute(Attribute::Reset))?;
        self.writer.flush()?;
        Ok(())
    }

    fn draw_menu(&mut self) -> Result<()> {
        const TITLE: &str = "Bookmarks";
        const EMPTY_MESSAGE: &str = "No bookmarks";

        let total_cols = usize::from(self.columns);
        let rows_available = self.text_rows();
        if total_cols < 20 || rows_available < 6 {
            return Ok(());
        }
        let max_inner_width = total_cols.saturating_sub(6);

        let base_width = if self.menu.entries.is_empty() {
            EMPTY_MESSAGE.len() + 2
        } else {
            self.menu
                .entries
                .iter()
                .map(|name| name.chars().count() + 2)
                .max()
                .unwrap_or(0)
                .max(TITLE.len())
        };
        let inner_width = base_width.clamp(20.min(max_inner_width), max_inner_width);

        let max_content_height = rows_available.saturating_sub(6).max(1);
        let total_entries = self.menu.entries.len().max(1);
        let content_height = total_entries.min(max_content_height);
        self.menu.ensure_visible(content_height);

        let window_height = content_height + 4;
        let start_col = ((total_cols - (inner_width + 2)) / 2) as u16;
        let start_row = (rows_available.saturating_sub(window_height) / 2) as u16;

        let border = format!("+{}+", "-".repeat(inner_width));
        let mut row = start_row;
        let mut lines = vec![
            border.clone(),
            format!("|{: ^inner_width$}|", TITLE),
            format!("|{}|", "-".repeat(inner_width)),
        ];
        if self.menu.entries.is_empty() {
            lines.push(format!(
                "|{}|",
                truncate_with_ellipsis(format!("  {}", EMPTY_MESSAGE), inner_width)
            ));
        } else {
            let end = (self.menu.scroll_offset + content_height).min(self.menu.entries.len());
            for idx in self.menu.scroll_offset..end {
                let marker = if idx == self.menu.selected { '>' } else { ' ' };
                let text = format!("{} {}", marker, self.menu.entries[idx]);
                lines.push(format!("|{}|", truncate_with_ellipsis(text, inner_width)));
            }
        }
        lines.push(border);

        for line in lines {
            queue!(
                self.writer,
                cursor::MoveTo(start_col, row),
                SetAttribute(Attribute::Reverse),
                Print(line),
                SetAttribute(Attribute::Reset)
            )?;
            row = row.saturating_add(1);
        }
        Ok(())
    }
}

impl<W: Write, S: EventSource> Frontend for TerminalFrontend<W, S> {
    fn render_document(&mut self, content: &str) {
        self.content = content.to_string();
        self.line_starts = if content.is_empty() {
            Vec::new()
        } else {
            std::iter::once(0)
                .chain(
                    content
                        .match_indices('\n')
                        .map(|(idx, _)| idx + 1)
                        .filter(|&start| start < content.len()),
                )
                .collect()
        };
        self.search_spans.clear();
        self.cursor = (1, 0);
        self.top = 1;
    }

    fn set_cursor(&mut self, line: usize, column: usize) {
        self.cursor = (self.clamp_line(line), column);
    }

    fn scroll_into_view(&mut self) {
        let rows = self.text_rows();
        let line = self.cursor.0;
        if line < self.top {
            self.top = line;
        } else if line >= self.top + rows {
            self.top = line + 1 - rows;
        }
    }

    fn apply_line_tag(&mut self, tag: Tag, line: usize) {
        match tag {
            Tag::Bookmark => {
                self.bookmark_lines.insert(line);
            }
            Tag::SearchMatch => {
                if let Some(range) = self.line_range(line) {
                    self.search_spans.push(range);
                }
            }
        }
    }

    fn apply_span_tag(&mut self, tag: Tag, start: usize, end: usize) {
        match tag {
            Tag::SearchMatch => self.search_spans.push((start, end)),
            Tag::Bookmark => {
                let line = self.line_starts.partition_point(|&s| s <= start).max(1);
                self.bookmark_lines.insert(line);
            }
        }
    }

    fn clear_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Bookmark => self.bookmark_lines.clear(),
            Tag::SearchMatch => self.search_spans.clear(),
        }
    }

    fn refresh_bookmark_menu(&mut self, names: &[&str]) {
        self.menu.set_entries(names);
    }

    fn prompt_string(
        &mut self,
        title: &str,
        prompt: &str,
        initial: Option<&str>,
    ) -> Option<String> {
        let mut editor = LineEditor::with_text(initial.unwrap_or_default());
        loop {
            if let Err(err) = self.draw_prompt(title, prompt, editor.text()) {
                warn!(?err, "failed to draw prompt");
            }
            match self.events.next_event() {
                Ok(Event::Key(key)) => match editor.apply(key) {
                    EditOutcome::Submit(text) => return Some(text),
                    EditOutcome::Cancel => return None,
                    EditOutcome::Changed | EditOutcome::Ignored => {}
                },
                Ok(Event::Resize(columns, rows)) => self.resize(columns, rows),
                Ok(_) => {}
                Err(err) => {
                    warn!(%err, "prompt input failed");
                    return None;
                }
            }
        }
    }

    fn show_error(&mut self, message: &str) {
        self.message = Some(Message::Error(message.to_string()));
    }

    fn show_info(&mut self, message: &str) {
        self.message = Some(Message::Info(message.to_string()));
    }
}

fn truncate_with_ellipsis(mut text: String, width: usize) -> String {
    if text.chars().count() > width {
        if width <= 3 {
            text = text.chars().take(width).collect();
        } else {
            let mut truncated = text.chars().take(width - 3).collect::<String>();
            truncated.push_str("...");
            text = truncated;
        }
    }
    let len = text.chars().count();
    if len < width {
        text.push_str(&" ".repeat(width - len));
    }
    text
}

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use versemark_core::Command;

/// Actions available on a single bookmark, from the cursor line or the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkAction {
    View,
    Edit,
    Remove,
}

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    MoveCursor { delta: isize },
    Page { delta: isize },
    OpenBookmarkMenu,
    CloseOverlay,
    MenuMoveSelection { delta: isize },
    MenuActivate,
    Bookmark(BookmarkAction),
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Menu,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Changed,
    Submit(String),
    Cancel,
    Ignored,
}

/// Single-line text input shared by the search bar and prompts.
#[derive(Debug, Default, Clone)]
pub struct LineEditor {
    text: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(initial: &str) -> Self {
        Self {
            text: initial.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    pub fn apply(&mut self, key: KeyEvent) -> EditOutcome {
        if key.kind == KeyEventKind::Release {
            return EditOutcome::Ignored;
        }
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => EditOutcome::Cancel,
            (KeyCode::Char('c'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                EditOutcome::Cancel
            }
            (KeyCode::Enter, _) => EditOutcome::Submit(self.text.clone()),
            (KeyCode::Backspace, _) => {
                self.text.pop();
                EditOutcome::Changed
            }
            (KeyCode::Char('u'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                self.text.clear();
                EditOutcome::Changed
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.text.push(c);
                EditOutcome::Changed
            }
            _ => EditOutcome::Ignored,
        }
    }
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    search: LineEditor,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.search.clear();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Key(key) if key.kind == KeyEventKind::Release => UiEvent::None,
            Event::Key(key) => match self.mode {
                InputMode::Normal => self.map_key_normal(key),
                InputMode::Menu => self.map_key_menu(key),
                InputMode::Search => self.map_key_search(key),
            },
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('s'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                self.command(Command::SaveBookmarks)
            }
            (KeyCode::Char('r'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                self.command(Command::ReloadBookmarks)
            }
            (KeyCode::Char('f'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                let count = self.take_count() as isize;
                UiEvent::Page { delta: count }
            }
            (KeyCode::Char('b'), mods) if mods.contains(KeyModifiers::CONTROL) => {
                let count = self.take_count() as isize;
                UiEvent::Page { delta: -count }
            }
            (KeyCode::PageDown, _) => {
                let count = self.take_count() as isize;
                UiEvent::Page { delta: count }
            }
            (KeyCode::PageUp, _) => {
                let count = self.take_count() as isize;
                UiEvent::Page { delta: -count }
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                let count = self.take_count() as isize;
                UiEvent::MoveCursor { delta: count }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                let count = self.take_count() as isize;
                UiEvent::MoveCursor { delta: -count }
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let line = self.take_count();
                UiEvent::Command(Command::GotoLine { line })
            }
            (KeyCode::Char('G'), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                let line = self.pending_count.take().unwrap_or(usize::MAX).max(1);
                self.reset_count();
                UiEvent::Command(Command::GotoLine { line })
            }
            (KeyCode::End, _) => self.command(Command::GotoLine { line: usize::MAX }),
            (KeyCode::Char('a'), KeyModifiers::NONE) => self.command(Command::AddBookmark),
            (KeyCode::Char('\''), _) => self.command(Command::GotoBookmark { name: None }),
            (KeyCode::Char('o'), KeyModifiers::NONE) => {
                self.command(Command::OpenDocument { path: None })
            }
            (KeyCode::Char('b'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenBookmarkMenu
            }
            (KeyCode::Char('v'), KeyModifiers::NONE) => self.bookmark(BookmarkAction::View),
            (KeyCode::Char('e'), KeyModifiers::NONE) => self.bookmark(BookmarkAction::Edit),
            (KeyCode::Char('x'), KeyModifiers::NONE) => self.bookmark(BookmarkAction::Remove),
            (KeyCode::Char('/'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            (KeyCode::Esc, _) => self.command(Command::ClearSearch),
            (KeyCode::Char('q'), _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_menu(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) | (KeyCode::Char('b'), _) => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) => UiEvent::MenuActivate,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::MenuMoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::MenuMoveSelection { delta: -1 }
            }
            (KeyCode::Char('v'), _) => UiEvent::Bookmark(BookmarkAction::View),
            (KeyCode::Char('e'), _) => UiEvent::Bookmark(BookmarkAction::Edit),
            (KeyCode::Char('x'), _) => UiEvent::Bookmark(BookmarkAction::Remove),
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_key_search(&mut self, key: KeyEvent) -> UiEvent {
        match self.search.apply(key) {
            EditOutcome::Changed => UiEvent::SearchQueryChanged {
                query: self.search.text().to_string(),
            },
            EditOutcome::Submit(query) => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchSubmit { query }
            }
            EditOutcome::Cancel => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchCancel
            }
            EditOutcome::Ignored => UiEvent::None,
        }
    }

    fn command(&mut self, command: Command) -> UiEvent {
        self.reset_count();
        UiEvent::Command(command)
    }

    fn bookmark(&mut self, action: BookmarkAction) -> UiEvent {
        self.reset_count();
        UiEvent::Bookmark(action)
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// Typed-but-unfinished input for the status line.
    pub fn pending_input(&self) -> Option<String> {
        if matches!(self.mode, InputMode::Search) {
            return Some(format!("/{}", self.search.text()));
        }
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

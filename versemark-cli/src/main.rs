use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};
use versemark_core::{
    find_all, line_column, Command, Config, DocumentStore, FileSnapshotStore, Frontend, Session,
    SnapshotStore,
};
use versemark_tty::{
    BookmarkAction, EventMapper, EventSource, InputMode, Palette, TerminalEvents,
    TerminalFrontend, UiEvent,
};

type Tui = TerminalFrontend<io::Stdout, TerminalEvents>;

#[derive(Debug, Parser)]
#[command(
    name = "versemark",
    version,
    about = "terminal text reader with persistent named bookmarks"
)]
struct Args {
    /// Text document to open
    file: Option<PathBuf>,

    /// Bookmark snapshot file (defaults to the platform data directory)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the stored bookmarks and exit
    #[arg(long, conflicts_with = "search")]
    list_bookmarks: bool,

    /// Print every match of TERM in FILE and exit
    #[arg(long, value_name = "TERM", requires = "file")]
    search: Option<String>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let project_dirs = Config::project_dirs();

    let config_path = args
        .config
        .clone()
        .or_else(|| project_dirs.as_ref().map(Config::default_path));
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let interactive = !args.list_bookmarks && args.search.is_none();
    let _log_guard = init_logging(project_dirs.as_ref(), &config.log_filter, !interactive)?;

    if let Some(term) = &args.search {
        let file = args
            .file
            .as_deref()
            .ok_or_else(|| anyhow!("--search needs a FILE"))?;
        return print_matches(file, term);
    }

    let snapshot_path = args
        .snapshot
        .clone()
        .or_else(|| config.snapshot_path(project_dirs.as_ref()))
        .ok_or_else(|| anyhow!("unable to resolve platform data directories, pass --snapshot"))?;
    info!(path = ?snapshot_path, "using bookmark snapshot");
    let store: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(snapshot_path));
    let mut session = Session::new(store);

    if args.list_bookmarks {
        session.restore()?;
        return print_bookmarks(&session);
    }

    run_interactive(args.file, config, session)
}

fn run_interactive(file: Option<PathBuf>, config: Config, mut session: Session) -> Result<()> {
    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    let mut ui: Tui = TerminalFrontend::new(
        stdout,
        TerminalEvents,
        Palette::from_config(&config.highlight),
    );
    let (columns, rows) = terminal::size()?;
    ui.resize(columns, rows);

    if let Err(err) = session.restore() {
        warn!(%err, "starting with an empty bookmark set");
        ui.show_error(&err.to_string());
    }
    session.sync_view(&mut ui);

    let initial = file
        .or_else(|| session.registry().document_path().map(Path::to_path_buf))
        .or(config.default_document);
    if let Some(path) = initial {
        session.handle(Command::OpenDocument { path: Some(path) }, &mut ui);
        update_title(&session, &mut ui);
    }

    let outcome = run_until_quit(&mut session, &mut ui);
    {
        let writer = ui.writer();
        crossterm::execute!(writer, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    }
    outcome
}

/// Drives the event loop and flushes bookmarks however it ends.
fn run_until_quit<W: Write, S: EventSource>(
    session: &mut Session,
    ui: &mut TerminalFrontend<W, S>,
) -> Result<()> {
    let outcome = event_loop(session, ui);
    if let Err(err) = &outcome {
        warn!(%err, "event loop aborted");
    }
    session.handle(Command::Close, ui);
    outcome
}

fn event_loop<W: Write, S: EventSource>(
    session: &mut Session,
    ui: &mut TerminalFrontend<W, S>,
) -> Result<()> {
    let mut mapper = EventMapper::new();
    let mut dirty = true;

    loop {
        if ui.menu().is_open() {
            if mapper.mode() != InputMode::Menu {
                mapper.set_mode(InputMode::Menu);
            }
        } else if mapper.mode() == InputMode::Menu {
            mapper.set_mode(InputMode::Normal);
        }

        if dirty {
            let pending = mapper.pending_input();
            ui.draw(pending.as_deref())?;
            dirty = false;
        }

        let ev = ui.next_event().context("failed to read terminal input")?;
        let pending_before = mapper.pending_input();
        let ui_event = mapper.map_event(ev);
        if mapper.pending_input() != pending_before {
            dirty = true;
        }
        match handle_event(ui_event, session, ui, &mut mapper) {
            LoopAction::ContinueRedraw => dirty = true,
            LoopAction::Continue => {}
            LoopAction::Quit => return Ok(()),
        }
    }
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    Quit,
}

fn handle_event<W: Write, S: EventSource>(
    event: UiEvent,
    session: &mut Session,
    ui: &mut TerminalFrontend<W, S>,
    mapper: &mut EventMapper,
) -> LoopAction {
    if !matches!(event, UiEvent::None | UiEvent::Resize { .. }) {
        ui.clear_message();
    }
    match event {
        UiEvent::None => LoopAction::Continue,
        UiEvent::Quit => LoopAction::Quit,
        UiEvent::Resize { columns, rows } => {
            ui.resize(columns, rows);
            LoopAction::ContinueRedraw
        }
        UiEvent::Command(command) => {
            let opens = matches!(command, Command::OpenDocument { .. });
            session.handle(command, ui);
            if opens {
                update_title(session, ui);
            }
            LoopAction::ContinueRedraw
        }
        UiEvent::MoveCursor { delta } => {
            ui.move_cursor(delta);
            LoopAction::ContinueRedraw
        }
        UiEvent::Page { delta } => {
            ui.page(delta);
            LoopAction::ContinueRedraw
        }
        UiEvent::OpenBookmarkMenu => {
            ui.open_menu();
            mapper.set_mode(InputMode::Menu);
            LoopAction::ContinueRedraw
        }
        UiEvent::CloseOverlay => {
            ui.close_menu();
            mapper.set_mode(InputMode::Normal);
            LoopAction::ContinueRedraw
        }
        UiEvent::MenuMoveSelection { delta } => {
            if ui.move_menu_selection(delta) {
                LoopAction::ContinueRedraw
            } else {
                LoopAction::Continue
            }
        }
        UiEvent::MenuActivate => {
            if let Some(name) = ui.menu().selected_entry().map(str::to_string) {
                ui.close_menu();
                mapper.set_mode(InputMode::Normal);
                session.handle(Command::GotoBookmark { name: Some(name) }, ui);
            }
            LoopAction::ContinueRedraw
        }
        UiEvent::Bookmark(action) => {
            let target = if ui.menu().is_open() {
                ui.menu().selected_entry().map(str::to_string)
            } else {
                session
                    .bookmark_at_line(ui.cursor_line())
                    .map(str::to_string)
            };
            match target {
                Some(name) => session.handle(bookmark_command(action, name), ui),
                None => ui.show_error("No bookmark selected."),
            }
            LoopAction::ContinueRedraw
        }
        UiEvent::BeginSearch | UiEvent::SearchQueryChanged { .. } => LoopAction::ContinueRedraw,
        UiEvent::SearchSubmit { query } => {
            session.handle(Command::Search { term: query }, ui);
            LoopAction::ContinueRedraw
        }
        UiEvent::SearchCancel => {
            session.handle(Command::ClearSearch, ui);
            LoopAction::ContinueRedraw
        }
    }
}

fn bookmark_command(action: BookmarkAction, name: String) -> Command {
    match action {
        BookmarkAction::View => Command::ViewBookmark { name },
        BookmarkAction::Edit => Command::EditBookmark { name },
        BookmarkAction::Remove => Command::RemoveBookmark { name },
    }
}

fn update_title<W: Write, S: EventSource>(session: &Session, ui: &mut TerminalFrontend<W, S>) {
    let title = session
        .document()
        .current_path()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "[no document]".to_string());
    ui.set_title(title);
}

fn print_bookmarks(session: &Session) -> Result<()> {
    let mut out = io::stdout().lock();
    for bookmark in session.registry().iter() {
        writeln!(
            out,
            "{}\t{}\t{}",
            bookmark.name,
            bookmark.line,
            bookmark.description.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn print_matches(file: &Path, term: &str) -> Result<()> {
    let mut document = DocumentStore::new();
    document.load(file)?;
    let content = document.current_content();
    let mut out = io::stdout().lock();
    for found in find_all(content, term)? {
        let (line, column) = line_column(content, found.start);
        writeln!(out, "{}:{}:{}", line, column + 1, line_text(content, found.start))?;
    }
    Ok(())
}

fn line_text(content: &str, offset: usize) -> &str {
    let start = content[..offset].rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let end = content[offset..]
        .find('\n')
        .map(|idx| offset + idx)
        .unwrap_or(content.len());
    content[start..end].trim_end_matches('\r')
}

fn init_logging(
    project_dirs: Option<&ProjectDirs>,
    default_filter: &str,
    console: bool,
) -> Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let log_dir = project_dirs
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .filter(|dir| fs::create_dir_all(dir).is_ok());
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::never(dir, "versemark.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let console_layer = console.then(|| tracing_subscriber::fmt::layer().with_writer(io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
    use tempfile::tempdir;
    use versemark_core::{resolve_document_path, MemorySnapshotStore, Snapshot};
    use versemark_tty::ScriptedEvents;

    fn opened(
        events: Vec<Event>,
    ) -> (
        tempfile::TempDir,
        PathBuf,
        Session,
        Arc<MemorySnapshotStore>,
        TerminalFrontend<Vec<u8>, ScriptedEvents>,
    ) {
        let dir = tempdir().unwrap();
        let doc = dir.path().join("genesis.txt");
        fs::write(&doc, "In the beginning\nand the light\n").unwrap();
        let store = Arc::new(MemorySnapshotStore::new());
        let mut session = Session::new(store.clone());
        let mut ui = TerminalFrontend::new(
            Vec::new(),
            ScriptedEvents::new(events),
            Palette::default(),
        );
        ui.resize(80, 24);
        session.handle(Command::OpenDocument { path: Some(doc.clone()) }, &mut ui);
        store.save(&Snapshot::default()).unwrap();
        (dir, doc, session, store, ui)
    }

    #[test]
    fn quit_flushes_bookmarks() {
        let quit = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        let (_dir, doc, mut session, store, mut ui) = opened(vec![quit]);

        run_until_quit(&mut session, &mut ui).unwrap();
        assert_eq!(
            store.current().unwrap().current_file,
            Some(resolve_document_path(&doc))
        );
    }

    #[test]
    fn input_failure_still_flushes_bookmarks() {
        let (_dir, doc, mut session, store, mut ui) = opened(vec![Event::Resize(100, 30)]);

        assert!(run_until_quit(&mut session, &mut ui).is_err());
        assert_eq!(
            store.current().unwrap().current_file,
            Some(resolve_document_path(&doc))
        );
    }
}

use std::io::{self, Write};

mod input;
mod view;

pub use input::{BookmarkAction, EditOutcome, EventMapper, InputMode, LineEditor, UiEvent};
pub use view::{
    BookmarkMenu, EventSource, Palette, ScriptedEvents, TerminalEvents, TerminalFrontend,
};

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

/// What the user asked for, already stripped of transport and locale details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// `/start` or the inline "start" button
    Start,
    /// `/view_notes`
    ViewNotes,
    Text(String),
    /// A reply-keyboard button. `raw` is the text the user sent, so states
    /// that expect free text still see it verbatim.
    Command { command: Command, raw: String },
    /// Inline "add" button under a `/view_notes` entry
    AddNoteFor(String),
    /// Inline "delete" button under a `/view_notes` entry
    DeleteNotesFor(String),
    /// Anything else (stickers, photos, unknown commands, unknown callbacks)
    Unsupported,
}

impl Intent {
    /// The user's text for states that take free-form input.
    pub fn free_text(&self) -> Option<&str> {
        match self {
            Intent::Text(text) => Some(text),
            Intent::Command { raw, .. } => Some(raw),
            _ => None,
        }
    }

    pub fn command(&self) -> Option<Command> {
        match self {
            Intent::Command { command, .. } => Some(*command),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    NewSearch,
    AddNote,
    /// 1-based position in the shown notes; `None` when it did not parse
    DeleteNote(Option<usize>),
    DeleteAll,
    Back,
}

/// Normalized inbound event from any transport.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub user_id: i64,
    /// Display name recorded as the note author
    pub user_name: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// One-time reply keyboard, rows of button labels
    Reply(Vec<Vec<String>>),
    Inline(Vec<Vec<InlineButton>>),
    /// Hide any reply keyboard currently shown
    Remove,
}

/// A render request handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Text is HTML-formatted
    pub html: bool,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            html: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
            html: true,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

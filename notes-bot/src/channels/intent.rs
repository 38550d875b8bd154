//! Translation from raw chat input to [`Intent`]s.
//!
//! The only place that knows the button labels and command names; the
//! conversation controller works purely on the tagged intents.

use super::types::{Command, Intent};

/// Reply-keyboard labels shown to users.
pub mod labels {
    pub const NEW_SEARCH: &str = "Начать новый поиск";
    pub const ADD_NOTE: &str = "Добавить заметку";
    pub const DELETE_NOTE: &str = "Удалить заметку";
    pub const DELETE_ALL: &str = "Удалить все заметки";
    pub const BACK: &str = "Вернуться назад";
    pub const INLINE_ADD: &str = "➕ Добавить";
    pub const INLINE_DELETE: &str = "🗑️ Удалить";
}

/// Callback data prefixes for inline buttons.
pub mod callbacks {
    pub const START: &str = "start";
    pub const ADD_PREFIX: &str = "add_";
    pub const DELETE_PREFIX: &str = "del_";
}

pub fn from_text(text: &str) -> Intent {
    let trimmed = text.trim();

    if let Some(command) = trimmed.strip_prefix('/') {
        // "/start@my_bot payload" -> "start"
        let name = command
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('@')
            .next()
            .unwrap_or_default();
        return match name {
            "start" => Intent::Start,
            "view_notes" => Intent::ViewNotes,
            _ => Intent::Unsupported,
        };
    }

    let command = if trimmed.to_lowercase() == labels::NEW_SEARCH.to_lowercase() {
        Some(Command::NewSearch)
    } else if trimmed == labels::ADD_NOTE {
        Some(Command::AddNote)
    } else if trimmed == labels::DELETE_ALL {
        Some(Command::DeleteAll)
    } else if trimmed == labels::BACK {
        Some(Command::Back)
    } else {
        trimmed
            .strip_prefix(labels::DELETE_NOTE)
            .map(|rest| Command::DeleteNote(parse_position(rest.trim())))
    };

    match command {
        Some(command) => Intent::Command {
            command,
            raw: text.to_string(),
        },
        None => Intent::Text(text.to_string()),
    }
}

pub fn from_callback(data: &str) -> Intent {
    if data == callbacks::START {
        return Intent::Start;
    }
    if let Some(id) = data.strip_prefix(callbacks::ADD_PREFIX).filter(|id| !id.is_empty()) {
        return Intent::AddNoteFor(id.to_string());
    }
    if let Some(id) = data.strip_prefix(callbacks::DELETE_PREFIX).filter(|id| !id.is_empty()) {
        return Intent::DeleteNotesFor(id.to_string());
    }
    Intent::Unsupported
}

/// Parse a 1-based position typed by the user. Only plain ASCII digits are
/// accepted: no sign, no inner whitespace, no empty string.
pub fn parse_position(text: &str) -> Option<usize> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_of(text: &str) -> Option<Command> {
        from_text(text).command()
    }

    #[test]
    fn test_commands() {
        assert_eq!(from_text("/start"), Intent::Start);
        assert_eq!(from_text("/start@store_notes_bot"), Intent::Start);
        assert_eq!(from_text(" /view_notes "), Intent::ViewNotes);
        assert_eq!(from_text("/help"), Intent::Unsupported);
    }

    #[test]
    fn test_button_labels() {
        assert_eq!(command_of("Начать новый поиск"), Some(Command::NewSearch));
        assert_eq!(command_of("начать НОВЫЙ поиск"), Some(Command::NewSearch));
        assert_eq!(command_of("Добавить заметку"), Some(Command::AddNote));
        assert_eq!(command_of("Удалить все заметки"), Some(Command::DeleteAll));
        assert_eq!(command_of("Вернуться назад"), Some(Command::Back));
        assert_eq!(command_of("Удалить заметку 2"), Some(Command::DeleteNote(Some(2))));
        assert_eq!(command_of("Удалить заметку -1"), Some(Command::DeleteNote(None)));
        assert_eq!(command_of("Удалить заметку"), Some(Command::DeleteNote(None)));
    }

    #[test]
    fn test_command_keeps_raw_text() {
        let intent = from_text("Вернуться назад");
        assert_eq!(intent.free_text(), Some("Вернуться назад"));
        assert_eq!(from_text("Moscow").free_text(), Some("Moscow"));
        assert_eq!(Intent::Start.free_text(), None);
    }

    #[test]
    fn test_callbacks() {
        assert_eq!(from_callback("start"), Intent::Start);
        assert_eq!(from_callback("add_101"), Intent::AddNoteFor("101".to_string()));
        assert_eq!(from_callback("del_101"), Intent::DeleteNotesFor("101".to_string()));
        assert_eq!(from_callback("add_"), Intent::Unsupported);
        assert_eq!(from_callback("other"), Intent::Unsupported);
    }

    #[test]
    fn test_parse_position_digits_only() {
        assert_eq!(parse_position("3"), Some(3));
        assert_eq!(parse_position("0"), Some(0));
        assert_eq!(parse_position("10"), Some(10));
        assert_eq!(parse_position(""), None);
        assert_eq!(parse_position("+3"), None);
        assert_eq!(parse_position("-3"), None);
        assert_eq!(parse_position(" 3"), None);
        assert_eq!(parse_position("3a"), None);
        assert_eq!(parse_position("٣"), None);
        assert_eq!(parse_position("99999999999999999999999999"), None);
    }
}

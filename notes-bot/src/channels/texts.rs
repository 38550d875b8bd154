//! User-facing message texts.

use crate::error::{NoteAction, PersistenceError};

pub const SEARCH_PROMPT: &str =
    "📊 Введите слово для поиска по таблице или используйте команду /view_notes для просмотра заметок.";
pub const NEW_SEARCH_PROMPT: &str = "Введите новое ключевое слово для поиска:";
pub const EMPTY_KEYWORD: &str = "Введите слово для поиска.";
pub const NOTHING_FOUND: &str = "🔍 Ничего не найдено. Введите другое ключевое слово.";
pub const PICK_RESULT: &str =
    "Выберите номер результата для добавления/удаления заметки или начните новый поиск.";
pub const NOT_A_NUMBER: &str = "Ошибка: пожалуйста, введите только номер результата из списка.";
pub const RESULT_OUT_OF_RANGE: &str =
    "Ошибка: номер результата вне допустимого диапазона. Выберите номер из списка.";
pub const ENTER_NOTE: &str = "Введите текст заметки:";
pub const ENTER_NEW_NOTE: &str = "Введите текст для новой заметки:";
pub const EMPTY_NOTE: &str = "Текст заметки не может быть пустым. Введите текст заметки:";
pub const NOTE_ADDED: &str = "📝 Заметка добавлена!";
pub const CHOOSE_ACTION: &str = "Выберите действие:";
pub const NOTE_DELETED: &str = "🗑️ Заметка удалена.";
pub const ALL_NOTES_DELETED: &str = "🗑️ Все заметки удалены.";
pub const NOTE_OUT_OF_RANGE: &str =
    "Ошибка: номер заметки вне допустимого диапазона. Попробуйте снова.";
pub const BAD_ACTION: &str = "Ошибка: выберите корректное действие.";
pub const SESSION_FINISHED: &str = "❌ Сессия завершена. Нажмите /start для начала поиска";
pub const UNRECOGNIZED: &str = "Это сообщение не было распознано в текущем процессе. \
     Пожалуйста, продолжите поиск или используйте /view_notes.";
pub const NO_NOTES_YET: &str = "📋 У вас пока нет заметок.";
pub const START_HINT: &str = "Для начала поиска нажмите /start";
pub const INTERNAL_FAILURE: &str = "⚠️ Внутренняя ошибка. Попробуйте ещё раз или нажмите /start.";

pub const NO_DATA: &str = "Нет данных";
/// Store name for records missing from the dataset when listing notes
pub const UNKNOWN_STORE: &str = "Неизвестно";
/// Store name recorded for notes added to a record missing from the dataset
pub const UNSPECIFIED_STORE: &str = "Не указан";

pub fn persistence_failure(action: NoteAction, error: &PersistenceError) -> String {
    match action {
        NoteAction::Load => format!("⚠️ Ошибка при загрузке заметок: {}", error),
        NoteAction::Add => format!("❌ Ошибка при добавлении заметки: {}", error),
        NoteAction::Delete | NoteAction::DeleteAll => {
            format!("❌ Ошибка при удалении заметки: {}", error)
        }
    }
}

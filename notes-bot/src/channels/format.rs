//! Rendering records and notes as chat text.

use teloxide::utils::html::escape;

use super::texts::NO_DATA;
use crate::notes::Note;
use crate::records::{columns, Record};

/// A search result card: heading with the 1-based position, then the record.
pub fn format_search_result(index: usize, record: &Record, notes: &[Note]) -> String {
    format!(
        "🔍 <b>Результат поиска: {}</b>\n\n{}",
        index + 1,
        format_record(record, notes)
    )
}

/// Record fields (with placeholders for blanks) followed by its numbered notes.
pub fn format_record(record: &Record, notes: &[Note]) -> String {
    let field = |column: &str| escape(record.get(column).unwrap_or(NO_DATA));
    let id = if record.id.is_empty() {
        NO_DATA.to_string()
    } else {
        escape(&record.id)
    };

    let mut text = format!(
        "<b>Код:</b> {}\n\
         <b>Магазин:</b> {}\n\
         <b>Тип:</b> {}\n\
         <b>ФИО системотехника:</b> {}\n\
         <b>Адрес:</b> <code>{}</code>\n\
         <b>Полный адрес:</b> {}\n\n",
        id,
        field(columns::STORE),
        field(columns::KIND),
        field(columns::TECHNICIAN),
        field(columns::ADDRESS),
        field(columns::FULL_ADDRESS),
    );

    text.push_str("📌 <b>Заметки:</b>\n");
    if notes.is_empty() {
        text.push_str("-\n");
    } else {
        for (i, note) in notes.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, escape(&note.text)));
        }
    }
    text
}

/// Plain-text block for `/view_notes`: one store with every note and author.
pub fn format_notes_overview(store_name: &str, record_id: &str, notes: &[Note]) -> String {
    let mut text = format!("🏪 Магазин: {} (Код: {})\n\n", store_name, record_id);
    for note in notes {
        let author = if note.author.is_empty() { "-" } else { note.author.as_str() };
        text.push_str(&format!("📝 {} (от {})\n", note.text, author));
    }
    text
}

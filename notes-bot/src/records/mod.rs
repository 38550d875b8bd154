//! Records: the read-only store dataset searched by keyword.
//!
//! Loaded once at startup from a CSV export of the distribution spreadsheet
//! and shared across every session without locking.

pub mod source;

pub use source::{normalize_id, Record, RecordSource, MAX_SEARCH_RESULTS};

/// Dataset column names used by the bot.
pub mod columns {
    pub const ID: &str = "Код";
    pub const STORE: &str = "Магазин";
    pub const KIND: &str = "Тип";
    pub const TECHNICIAN: &str = "ФИО системотехника";
    pub const ADDRESS: &str = "Адрес";
    pub const FULL_ADDRESS: &str = "Полный адрес";
}
